mod index;
mod pending;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{oneshot, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domains::envelope::Envelope;
use crate::error::{require_id, Result, WaiterError};

use self::index::{SessionId, WaiterIndex};
use self::pending::PendingQueue;

pub const DEFAULT_CAPACITY: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Delivered,
    Queued,
}

enum Admission {
    Placed(Placement),
    Full(Envelope),
}

struct DispatchState {
    pending: PendingQueue,
    waiters: WaiterIndex,
}

// Pending envelopes and registered waiters share one lock, so a push and a
// registration for the same id can never miss each other.
pub struct DispatchQueue {
    state: Mutex<DispatchState>,
    changed: Notify,
    capacity: usize,
    next_session: AtomicU64,
}

impl DispatchQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(DispatchState {
                pending: PendingQueue::new(capacity),
                waiters: WaiterIndex::default(),
            }),
            changed: Notify::new(),
            capacity,
            next_session: AtomicU64::new(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn pending(&self) -> usize {
        self.lock().map(|state| state.pending.len()).unwrap_or_default()
    }

    pub fn waiting(&self) -> usize {
        self.lock().map(|state| state.waiters.len()).unwrap_or_default()
    }

    pub async fn push(&self, envelope: Envelope) -> Result<Placement> {
        let mut envelope = envelope;
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            match self.admit(envelope)? {
                Admission::Placed(placement) => return Ok(placement),
                Admission::Full(rejected) => envelope = rejected,
            }
            debug!(id = envelope.id(), "dispatch queue full, waiting for room");
            notified.await;
        }
    }

    pub fn try_push(&self, envelope: Envelope) -> Result<Placement> {
        match self.admit(envelope)? {
            Admission::Placed(placement) => Ok(placement),
            Admission::Full(_) => Err(WaiterError::Backpressure(format!(
                "dispatch queue full (capacity {})",
                self.capacity
            ))),
        }
    }

    pub fn register(self: &Arc<Self>, id: &str) -> Result<Registration> {
        require_id(id)?;
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let ready = {
            let mut state = self.lock()?;
            let ready = state.pending.take(id);
            if ready.is_none() {
                state.waiters.insert(id, session, tx);
            }
            ready
        };
        // Either a slot was freed or a new waiter may unblock a full push.
        self.changed.notify_waiters();
        Ok(Registration {
            queue: Arc::clone(self),
            id: id.to_string(),
            session,
            ready,
            rx,
            settled: false,
        })
    }

    fn admit(&self, envelope: Envelope) -> Result<Admission> {
        let mut state = self.lock()?;
        let Some(envelope) = state.waiters.offer(envelope) else {
            return Ok(Admission::Placed(Placement::Delivered));
        };
        if state.pending.is_full() {
            return Ok(Admission::Full(envelope));
        }
        state.pending.push_back(envelope);
        Ok(Admission::Placed(Placement::Queued))
    }

    pub fn requeue(&self, envelope: Envelope) {
        let mut state = self.lock_for_requeue();
        warn!(id = envelope.id(), "requeueing undelivered envelope");
        requeue_locked(&mut state, envelope);
    }

    fn release(&self, id: &str, session: SessionId, salvaged: Option<Envelope>) {
        let mut state = self.lock_for_requeue();
        state.waiters.remove(id, session);
        if let Some(envelope) = salvaged {
            warn!(id, session, "requeueing envelope of a cancelled session");
            requeue_locked(&mut state, envelope);
        }
    }

    // Requeue must not lose an envelope even if another holder panicked.
    fn lock_for_requeue(&self) -> MutexGuard<'_, DispatchState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, DispatchState>> {
        self.state
            .lock()
            .map_err(|_| WaiterError::Runtime("dispatch queue lock poisoned".to_string()))
    }
}

fn requeue_locked(state: &mut DispatchState, envelope: Envelope) {
    if let Some(envelope) = state.waiters.offer(envelope) {
        state.pending.push_front(envelope);
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

pub struct Registration {
    queue: Arc<DispatchQueue>,
    id: String,
    session: SessionId,
    ready: Option<Envelope>,
    rx: oneshot::Receiver<Envelope>,
    settled: bool,
}

impl Registration {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn requeue(&self, envelope: Envelope) {
        self.queue.requeue(envelope);
    }

    pub async fn recv(&mut self, cancel: &CancellationToken) -> Result<Envelope> {
        if self.settled {
            return Err(WaiterError::Runtime(format!(
                "registration for {} already settled",
                self.id
            )));
        }
        if cancel.is_cancelled() {
            return Err(WaiterError::Cancelled(format!("wait for {} cancelled", self.id)));
        }
        if let Some(envelope) = self.ready.take() {
            self.settled = true;
            return Ok(envelope);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(WaiterError::Cancelled(format!("wait for {} cancelled", self.id)))
            }
            received = &mut self.rx => {
                self.settled = true;
                received.map_err(|_| WaiterError::Runtime("dispatch queue closed".to_string()))
            }
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.rx.close();
        let salvaged = self.ready.take().or_else(|| self.rx.try_recv().ok());
        self.queue.release(&self.id, self.session, salvaged);
    }
}
