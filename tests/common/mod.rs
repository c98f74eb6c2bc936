#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use waiter::config::ServerConfig;
use waiter::daemon;
use waiter::error::{Result, WaiterError};
use waiter::interfaces::mirror::{Mirror, MirrorRecord};

#[derive(Default)]
pub struct RecordingMirror {
    pub published: Mutex<Vec<(String, MirrorRecord)>>,
}

impl RecordingMirror {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn wait_for(&self, count: usize) -> Vec<(String, MirrorRecord)> {
        for _ in 0..100 {
            {
                let guard = self.published.lock().await;
                if guard.len() >= count {
                    return guard.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl Mirror for RecordingMirror {
    async fn publish(&self, topic: &str, record: &MirrorRecord) -> Result<()> {
        self.published
            .lock()
            .await
            .push((topic.to_string(), record.clone()));
        Ok(())
    }
}

pub struct FailingMirror;

#[async_trait]
impl Mirror for FailingMirror {
    async fn publish(&self, topic: &str, _record: &MirrorRecord) -> Result<()> {
        Err(WaiterError::MirrorFailure(format!("{topic} bus unreachable")))
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<()>>,
}

impl TestServer {
    pub async fn start(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(daemon::serve(listener, config, async move {
            let _ = rx.await;
        }));
        Self {
            addr,
            shutdown: Some(tx),
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .unwrap()
            .unwrap()
    }
}
