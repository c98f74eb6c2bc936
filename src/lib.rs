pub mod client;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod domains;
pub mod engine;
pub mod error;
pub mod interfaces;
pub mod services;
pub mod session;
pub mod sse;

pub use crate::client::WaiterClient;
pub use crate::config::ServerConfig;
pub use crate::domains::envelope::Envelope;
pub use crate::domains::message::{AllocRequest, WaitRequest, WaitResponse};
pub use crate::engine::Engine;
pub use crate::error::{Result, WaiterError};
pub use crate::session::{SessionState, WaiterSession};
