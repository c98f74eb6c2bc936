use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domains::message::WaitResponse;
use crate::error::{Result, WaiterError};

#[async_trait]
pub trait Outbound: Send {
    async fn send(&mut self, response: WaitResponse) -> Result<()>;
}

#[async_trait]
impl Outbound for mpsc::Sender<WaitResponse> {
    async fn send(&mut self, response: WaitResponse) -> Result<()> {
        mpsc::Sender::send(self, response)
            .await
            .map_err(|_| WaiterError::TransportFailure("waiter stream closed".to_string()))
    }
}
