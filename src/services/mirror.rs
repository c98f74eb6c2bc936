use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::MirrorConfig;
use crate::error::{Result, WaiterError};
use crate::interfaces::mirror::{Mirror, MirrorRecord};

pub struct NoopMirror;

#[async_trait]
impl Mirror for NoopMirror {
    async fn publish(&self, _topic: &str, _record: &MirrorRecord) -> Result<()> {
        Ok(())
    }
}

pub struct NsqMirror {
    base_url: String,
    client: reqwest::Client,
}

impl NsqMirror {
    pub fn new(config: &MirrorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.timeout_ms))
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| WaiterError::Config(e.to_string()))?;
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Mirror for NsqMirror {
    async fn publish(&self, topic: &str, record: &MirrorRecord) -> Result<()> {
        let url = format!("{}/pub?topic={}", self.base_url, urlencoding::encode(topic));
        let body = serde_json::to_vec(record)
            .map_err(|e| WaiterError::Serialization(e.to_string()))?;
        let response = self
            .client
            .post(url)
            .body(body)
            .send()
            .await
            .map_err(|e| WaiterError::MirrorFailure(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(WaiterError::MirrorFailure(format!(
                "nsqd answered {status} for topic {topic}"
            )));
        }
        Ok(())
    }
}

pub fn from_config(config: Option<&MirrorConfig>) -> Result<Arc<dyn Mirror>> {
    match config {
        Some(config) => Ok(Arc::new(NsqMirror::new(config)?)),
        None => Ok(Arc::new(NoopMirror)),
    }
}

pub fn publish_detached(mirror: &Arc<dyn Mirror>, topic: &'static str, record: MirrorRecord) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        let err = WaiterError::MirrorFailure("no tokio runtime to publish from".to_string());
        warn!(topic, id = %record.id, error = %err, "mirror publish skipped");
        return;
    };
    let mirror = Arc::clone(mirror);
    runtime.spawn(async move {
        if let Err(err) = mirror.publish(topic, &record).await {
            warn!(topic, id = %record.id, error = %err, "mirror publish failed");
        }
    });
}
