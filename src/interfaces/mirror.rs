use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domains::envelope::Envelope;
use crate::error::Result;

pub const ALLOCATION_TOPIC: &str = "allocation";
pub const WAITING_TOPIC: &str = "waiting";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MirrorRecord {
    pub fn allocation(envelope: &Envelope) -> Self {
        Self {
            id: envelope.id().to_string(),
            message: Some(String::from_utf8_lossy(envelope.payload()).into_owned()),
        }
    }

    pub fn waiting(id: &str) -> Self {
        Self {
            id: id.to_string(),
            message: None,
        }
    }
}

#[async_trait]
pub trait Mirror: Send + Sync {
    async fn publish(&self, topic: &str, record: &MirrorRecord) -> Result<()>;
}
