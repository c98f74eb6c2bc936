use std::future::Future;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ServerConfig;
use crate::domains::message::{AllocRequest, AllocResponse, ErrorResponse, WaitRequest, WaitResponse};
use crate::engine::Engine;
use crate::error::{Result, WaiterError};
use crate::services::mirror;
use crate::sse;

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub shutdown: CancellationToken,
    pub max_wait: Option<Duration>,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            shutdown: CancellationToken::new(),
            max_wait: None,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/wait", get(wait))
        .route("/alloc", post(alloc))
        .route("/try_alloc", post(try_alloc))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.stats())
}

async fn alloc(State(state): State<AppState>, Json(payload): Json<AllocRequest>) -> Response {
    let submitted = tokio::select! {
        submitted = state.engine.submit(&payload.id, payload.message) => submitted,
        _ = state.shutdown.cancelled() => {
            Err(WaiterError::Cancelled("server shutting down".to_string()))
        }
    };
    match submitted {
        Ok(_) => (StatusCode::OK, Json(AllocResponse {})).into_response(),
        Err(err) => error_response(err),
    }
}

async fn try_alloc(State(state): State<AppState>, Json(payload): Json<AllocRequest>) -> Response {
    match state.engine.try_submit(&payload.id, payload.message) {
        Ok(_) => (StatusCode::OK, Json(AllocResponse {})).into_response(),
        Err(err) => error_response(err),
    }
}

async fn wait(State(state): State<AppState>, Query(query): Query<WaitRequest>) -> Response {
    let cancel = state.shutdown.child_token();
    let mut session = match state.engine.open_session(&query.id, cancel.clone()) {
        Ok(session) => session,
        Err(err) => return error_response(err),
    };
    if let Some(max_wait) = state.max_wait {
        expire_after(cancel.clone(), max_wait);
    }

    let (tx, mut rx) = mpsc::channel::<WaitResponse>(1);
    let task = tokio::spawn(async move {
        let mut outbound = tx;
        session.run(&mut outbound).await
    });
    // Dropping the body (client gone) cancels the session.
    let guard = cancel.drop_guard();

    let body = Body::from_stream(async_stream::stream! {
        let _guard = guard;
        if let Some(response) = rx.recv().await {
            yield Ok::<Bytes, std::convert::Infallible>(sse::data_frame(&response));
        }
        let failure = match task.await {
            Ok(Ok(_)) => None,
            Ok(Err(err)) => Some(err),
            Err(err) => Some(WaiterError::Runtime(err.to_string())),
        };
        if let Some(err) = failure {
            let payload = ErrorResponse { error: err.to_string() };
            yield Ok(sse::event_frame(sse::ERROR_EVENT, &payload));
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", sse::CONTENT_TYPE)
        .header("cache-control", "no-cache")
        .body(body)
        .unwrap_or_else(|err| error_response(WaiterError::Runtime(err.to_string())))
}

fn expire_after(cancel: CancellationToken, after: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(after) => cancel.cancel(),
        }
    });
}

fn status_for(err: &WaiterError) -> StatusCode {
    match err {
        WaiterError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        WaiterError::Backpressure(_) => StatusCode::SERVICE_UNAVAILABLE,
        WaiterError::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: WaiterError) -> Response {
    (
        status_for(&err),
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

pub async fn run(config: ServerConfig) -> Result<()> {
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

pub async fn run_with_shutdown<F>(config: ServerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    config.validate()?;
    let addr = config.address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| WaiterError::Runtime(e.to_string()))?;
    info!(address = %addr, "listening");
    serve(listener, config, shutdown).await
}

pub async fn serve<F>(listener: TcpListener, config: ServerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let mirror = mirror::from_config(config.mirror.as_ref())?;
    let engine = Engine::new(config.queue_capacity, mirror);
    let state = AppState {
        engine,
        shutdown: CancellationToken::new(),
        max_wait: config.max_wait(),
    };
    let root = state.shutdown.clone();
    let app = build_router(state);

    let shutdown = async move {
        shutdown.await;
        info!("shutting down, closing open waits");
        root.cancel();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| WaiterError::Runtime(e.to_string()))?;

    Ok(())
}
