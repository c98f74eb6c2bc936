use std::collections::VecDeque;

use crate::domains::envelope::Envelope;

pub(crate) struct PendingQueue {
    items: VecDeque<Envelope>,
    capacity: usize,
}

impl PendingQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn push_back(&mut self, envelope: Envelope) {
        self.items.push_back(envelope);
    }

    // Requeued envelopes were already admitted once, so they skip the capacity check.
    pub(crate) fn push_front(&mut self, envelope: Envelope) {
        self.items.push_front(envelope);
    }

    pub(crate) fn take(&mut self, id: &str) -> Option<Envelope> {
        let position = self.items.iter().position(|envelope| envelope.matches(id))?;
        self.items.remove(position)
    }
}
