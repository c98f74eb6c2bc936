use clap::Parser;
use tracing_subscriber::EnvFilter;
use waiter::config::{MirrorConfig, ServerConfig};
use waiter::daemon;
use waiter::error::Result;

#[derive(Parser, Debug)]
#[command(name = "waiterd")]
#[command(about = "Correlates allocations with the waiters blocked on their id")]
struct Cli {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    queue_capacity: Option<usize>,

    #[arg(long)]
    max_wait_secs: Option<u64>,

    #[arg(long, env = "WAITER_MIRROR_URL")]
    mirror_url: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        if let Some(secs) = self.max_wait_secs {
            config.max_wait_secs = Some(secs);
        }
        if let Some(url) = self.mirror_url.filter(|url| !url.trim().is_empty()) {
            config.mirror = Some(MirrorConfig::new(url));
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,waiter=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let config = Cli::parse().into_config()?;

    daemon::run(config).await
}
