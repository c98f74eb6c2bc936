use std::time::Duration;

use futures::StreamExt;
use http::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domains::message::{AllocRequest, ErrorResponse, WaitResponse};
use crate::error::{require_id, Result, WaiterError};
use crate::sse::{Frame, FrameDecoder};

pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(2);

const CANCELLED_PREFIX: &str = "wait cancelled: ";

pub struct WaiterClient {
    base_url: String,
    client: reqwest::Client,
}

impl WaiterClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        // No overall timeout: a wait stays open until its allocation arrives.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .build()
            .map_err(|e| WaiterError::Http(e.to_string()))?;
        Ok(Self {
            base_url: normalize_base(&base_url.into()),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn alloc(&self, id: &str, message: &str) -> Result<()> {
        self.post_alloc("alloc", id, message).await
    }

    pub async fn try_alloc(&self, id: &str, message: &str) -> Result<()> {
        self.post_alloc("try_alloc", id, message).await
    }

    async fn post_alloc(&self, path: &str, id: &str, message: &str) -> Result<()> {
        require_id(id)?;
        let body = AllocRequest {
            id: id.to_string(),
            message: message.to_string(),
        };
        let response = self
            .client
            .post(join_url(&self.base_url, path))
            .json(&body)
            .send()
            .await
            .map_err(|e| WaiterError::Http(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(error_for_status(status, &text))
    }

    pub async fn wait(&self, id: &str) -> Result<WaitResponse> {
        require_id(id)?;
        let url = format!(
            "{}?id={}",
            join_url(&self.base_url, "wait"),
            urlencoding::encode(id)
        );
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WaiterError::TransportFailure(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &text));
        }

        let mut stream = response.bytes_stream();
        let mut decoder = FrameDecoder::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| WaiterError::TransportFailure(e.to_string()))?;
            if let Some(frame) = decoder.push(&chunk).into_iter().next() {
                return response_from_frame(frame);
            }
        }
        Err(WaiterError::TransportFailure(
            "wait stream closed without a response".to_string(),
        ))
    }

    pub async fn wait_with_retry(
        &self,
        id: &str,
        backoff: Duration,
        cancel: &CancellationToken,
    ) -> Result<WaitResponse> {
        loop {
            let attempt = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(WaiterError::Cancelled(format!("wait for {id} cancelled")));
                }
                attempt = self.wait(id) => attempt,
            };
            match attempt {
                Ok(response) => return Ok(response),
                Err(err @ WaiterError::InvalidArgument(_)) => return Err(err),
                Err(err) => {
                    warn!(id, error = %err, "error while waiting, retrying in {:?}", backoff);
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(WaiterError::Cancelled(format!("wait for {id} cancelled")));
                }
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }
}

fn response_from_frame(frame: Frame) -> Result<WaitResponse> {
    if frame.is_error() {
        let message = serde_json::from_str::<ErrorResponse>(&frame.data)
            .map(|body| body.error)
            .unwrap_or(frame.data);
        return Err(WaiterError::TransportFailure(message));
    }
    serde_json::from_str::<WaitResponse>(&frame.data)
        .map_err(|e| WaiterError::Serialization(e.to_string()))
}

fn error_for_status(status: StatusCode, body: &str) -> WaiterError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|body| body.error)
        .unwrap_or_else(|_| format!("server answered {status}"));
    match status {
        StatusCode::BAD_REQUEST => {
            WaiterError::InvalidArgument(strip_kind(message, "invalid argument: "))
        }
        // Both a full queue and a server shutdown answer 503; the body says which.
        StatusCode::SERVICE_UNAVAILABLE if message.starts_with(CANCELLED_PREFIX) => {
            WaiterError::Cancelled(strip_kind(message, CANCELLED_PREFIX))
        }
        StatusCode::SERVICE_UNAVAILABLE => {
            WaiterError::Backpressure(strip_kind(message, "backpressure: "))
        }
        _ => WaiterError::Http(message),
    }
}

fn strip_kind(message: String, prefix: &str) -> String {
    match message.strip_prefix(prefix) {
        Some(rest) => rest.to_string(),
        None => message,
    }
}

fn normalize_base(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
