use std::collections::{HashMap, VecDeque};

use tokio::sync::oneshot;

use crate::domains::envelope::Envelope;

pub(crate) type SessionId = u64;

struct Waiter {
    session: SessionId,
    tx: oneshot::Sender<Envelope>,
}

#[derive(Default)]
pub(crate) struct WaiterIndex {
    waiters: HashMap<String, VecDeque<Waiter>>,
}

impl WaiterIndex {
    pub(crate) fn insert(&mut self, id: &str, session: SessionId, tx: oneshot::Sender<Envelope>) {
        self.waiters
            .entry(id.to_string())
            .or_default()
            .push_back(Waiter { session, tx });
    }

    pub(crate) fn remove(&mut self, id: &str, session: SessionId) {
        if let Some(queue) = self.waiters.get_mut(id) {
            queue.retain(|waiter| waiter.session != session);
            if queue.is_empty() {
                self.waiters.remove(id);
            }
        }
    }

    // Hands the envelope to the oldest live waiter for its id, skipping waiters
    // whose receiver is already gone. Returns the envelope if nobody took it.
    pub(crate) fn offer(&mut self, envelope: Envelope) -> Option<Envelope> {
        let id = envelope.id().to_string();
        let Some(queue) = self.waiters.get_mut(&id) else {
            return Some(envelope);
        };
        let mut envelope = envelope;
        let undelivered = loop {
            match queue.pop_front() {
                Some(waiter) => match waiter.tx.send(envelope) {
                    Ok(()) => break None,
                    Err(returned) => envelope = returned,
                },
                None => break Some(envelope),
            }
        };
        if queue.is_empty() {
            self.waiters.remove(&id);
        }
        undelivered
    }

    pub(crate) fn len(&self) -> usize {
        self.waiters.values().map(VecDeque::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_skips_closed_receivers() {
        let mut index = WaiterIndex::default();
        let (closed_tx, closed_rx) = oneshot::channel();
        let (live_tx, mut live_rx) = oneshot::channel();
        index.insert("job", 1, closed_tx);
        index.insert("job", 2, live_tx);
        drop(closed_rx);

        let envelope = Envelope::new("job", "ready").unwrap();
        assert!(index.offer(envelope.clone()).is_none());
        assert_eq!(live_rx.try_recv().unwrap(), envelope);
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn offer_without_waiter_returns_envelope() {
        let mut index = WaiterIndex::default();
        let (tx, _rx) = oneshot::channel();
        index.insert("other", 7, tx);

        let envelope = Envelope::new("job", "ready").unwrap();
        assert_eq!(index.offer(envelope.clone()), Some(envelope));
        assert_eq!(index.len(), 1);

        index.remove("other", 7);
        assert_eq!(index.len(), 0);
    }
}
