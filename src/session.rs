use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatch::Registration;
use crate::domains::envelope::Envelope;
use crate::domains::message::WaitResponse;
use crate::error::{Result, WaiterError};
use crate::interfaces::outbound::Outbound;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Registered,
    Evaluating,
    Delivered,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Closed | Self::Failed)
    }
}

pub struct WaiterSession {
    registration: Registration,
    cancel: CancellationToken,
    state: SessionState,
    // Matched but not yet handed to the outbound stream.
    in_flight: Option<Envelope>,
}

impl WaiterSession {
    pub(crate) fn new(registration: Registration, cancel: CancellationToken) -> Self {
        Self {
            registration,
            cancel,
            state: SessionState::Registered,
            in_flight: None,
        }
    }

    pub fn waiting_id(&self) -> &str {
        self.registration.id()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn run<O>(&mut self, outbound: &mut O) -> Result<WaitResponse>
    where
        O: Outbound + ?Sized,
    {
        if let Some(envelope) = self.in_flight.take() {
            // A previous run was dropped before its send resolved.
            self.state = SessionState::Closed;
            self.registration.requeue(envelope);
            return Err(WaiterError::Cancelled(format!(
                "wait for {} interrupted during delivery",
                self.waiting_id()
            )));
        }
        if self.state.is_terminal() {
            return Err(WaiterError::Runtime(format!(
                "session for {} already finished as {:?}",
                self.waiting_id(),
                self.state
            )));
        }

        let envelope = match self.registration.recv(&self.cancel).await {
            Ok(envelope) => envelope,
            Err(err) => {
                self.state = match err {
                    WaiterError::Cancelled(_) => SessionState::Closed,
                    _ => SessionState::Failed,
                };
                info!(id = self.waiting_id(), error = %err, "wait ended without delivery");
                return Err(err);
            }
        };

        self.state = SessionState::Evaluating;
        let response = WaitResponse::from(envelope.clone());
        self.in_flight = Some(envelope);
        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                Err(WaiterError::Cancelled(format!("wait for {} cancelled", self.waiting_id())))
            }
            sent = outbound.send(response.clone()) => sent,
        };
        let envelope = self.in_flight.take();

        match sent {
            Ok(()) => {
                self.state = SessionState::Delivered;
                info!(id = self.waiting_id(), session = self.registration.session(), "delivered");
                Ok(response)
            }
            Err(err @ WaiterError::Cancelled(_)) => {
                self.state = SessionState::Closed;
                if let Some(envelope) = envelope {
                    self.registration.requeue(envelope);
                }
                Err(err)
            }
            Err(err) => {
                // A matched envelope is consumed even when the hand-off fails.
                self.state = SessionState::Failed;
                warn!(id = self.waiting_id(), error = %err, "unable to send wait response");
                Err(err)
            }
        }
    }
}

impl Drop for WaiterSession {
    fn drop(&mut self) {
        // The run future was dropped mid-send.
        if let Some(envelope) = self.in_flight.take() {
            self.registration.requeue(envelope);
        }
    }
}
