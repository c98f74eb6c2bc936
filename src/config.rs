use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::dispatch::DEFAULT_CAPACITY;
use crate::error::{Result, WaiterError};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 50051;
pub const DEFAULT_MIRROR_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MirrorConfig {
    pub url: String,
    #[serde(default = "default_mirror_timeout_ms")]
    pub timeout_ms: u64,
}

impl MirrorConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: DEFAULT_MIRROR_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub queue_capacity: usize,
    pub max_wait_secs: Option<u64>,
    pub mirror: Option<MirrorConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            queue_capacity: DEFAULT_CAPACITY,
            max_wait_secs: None,
            mirror: None,
        }
    }
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| WaiterError::Config(e.to_string()))?;
        let config: ServerConfig =
            serde_json::from_str(&content).map_err(|e| WaiterError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(WaiterError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_wait_secs == Some(0) {
            return Err(WaiterError::Config(
                "max_wait_secs must be positive when set".to_string(),
            ));
        }
        if let Some(mirror) = &self.mirror {
            if mirror.url.trim().is_empty() {
                return Err(WaiterError::Config("mirror url must not be empty".to_string()));
            }
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_secs.map(Duration::from_secs)
    }
}

fn default_mirror_timeout_ms() -> u64 {
    DEFAULT_MIRROR_TIMEOUT_MS
}
