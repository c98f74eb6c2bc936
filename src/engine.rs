use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::dispatch::{DispatchQueue, Placement};
use crate::domains::envelope::Envelope;
use crate::domains::message::QueueStats;
use crate::error::Result;
use crate::interfaces::mirror::{Mirror, MirrorRecord, ALLOCATION_TOPIC, WAITING_TOPIC};
use crate::services::mirror::{publish_detached, NoopMirror};
use crate::session::WaiterSession;

#[derive(Clone)]
pub struct Engine {
    queue: Arc<DispatchQueue>,
    mirror: Arc<dyn Mirror>,
}

impl Engine {
    pub fn new(capacity: usize, mirror: Arc<dyn Mirror>) -> Self {
        Self {
            queue: Arc::new(DispatchQueue::new(capacity)),
            mirror,
        }
    }

    pub fn without_mirror(capacity: usize) -> Self {
        Self::new(capacity, Arc::new(NoopMirror))
    }

    pub fn queue(&self) -> &Arc<DispatchQueue> {
        &self.queue
    }

    pub async fn submit(&self, id: &str, message: impl Into<Bytes>) -> Result<Placement> {
        let envelope = Envelope::new(id, message)?;
        let record = MirrorRecord::allocation(&envelope);
        let placement = self.queue.push(envelope).await?;
        self.accepted(record, placement);
        Ok(placement)
    }

    pub fn try_submit(&self, id: &str, message: impl Into<Bytes>) -> Result<Placement> {
        let envelope = Envelope::new(id, message)?;
        let record = MirrorRecord::allocation(&envelope);
        let placement = self.queue.try_push(envelope)?;
        self.accepted(record, placement);
        Ok(placement)
    }

    pub fn open_session(&self, id: &str, cancel: CancellationToken) -> Result<WaiterSession> {
        let registration = self.queue.register(id)?;
        info!(id, session = registration.session(), "waiter registered");
        publish_detached(&self.mirror, WAITING_TOPIC, MirrorRecord::waiting(id));
        Ok(WaiterSession::new(registration, cancel))
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.queue.pending(),
            waiting: self.queue.waiting(),
            capacity: self.queue.capacity(),
        }
    }

    fn accepted(&self, record: MirrorRecord, placement: Placement) {
        info!(id = %record.id, ?placement, "allocation accepted");
        publish_detached(&self.mirror, ALLOCATION_TOPIC, record);
    }
}
