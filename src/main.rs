use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use waiter::client::{WaiterClient, DEFAULT_RETRY_BACKOFF};
use waiter::error::{Result, WaiterError};

#[derive(Parser, Debug)]
#[command(name = "waiter")]
#[command(about = "Wait for, or allocate, an event by correlation id")]
struct Cli {
    #[arg(long, default_value = "localhost:50051")]
    address: String,

    #[arg(long)]
    id: String,

    #[arg(long, help = "Allocate this message for --id instead of waiting")]
    alloc: Option<String>,

    #[arg(long, default_value_t = false, help = "Fail instead of blocking when the queue is full")]
    no_block: bool,

    #[arg(long, default_value_t = false, help = "Keep waiting for further allocations")]
    follow: bool,

    #[arg(long, default_value_t = DEFAULT_RETRY_BACKOFF.as_secs())]
    backoff_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,waiter=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();
    let client = WaiterClient::new(cli.address.clone())?;

    if let Some(message) = &cli.alloc {
        if cli.no_block {
            client.try_alloc(&cli.id, message).await?;
        } else {
            client.alloc(&cli.id, message).await?;
        }
        info!(id = %cli.id, "allocation submitted");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        interrupt.cancel();
    });

    let backoff = Duration::from_secs(cli.backoff_secs.max(1));
    loop {
        match client.wait_with_retry(&cli.id, backoff, &cancel).await {
            Ok(response) => {
                let line = serde_json::to_string(&response)
                    .map_err(|e| WaiterError::Serialization(e.to_string()))?;
                println!("{line}");
                if !cli.follow {
                    return Ok(());
                }
            }
            Err(WaiterError::Cancelled(_)) => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}
