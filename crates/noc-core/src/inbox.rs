//! Cross-NI side-effect messages (spec §9).
//!
//! A consumer dequeuing a token needs to tell the *producer's* NI that an
//! out-memory slot freed up. Rather than reach across NIs directly, it
//! posts an `InMemoryUpdate` into the producer NI's inbox; the producer
//! drains its inbox at the start of its own next `wakeup`, so the update
//! is never applied mid-cycle on a NI that isn't currently executing.

use std::collections::VecDeque;

use crate::ids::{AppIdx, CoreId, EdgeId, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InMemoryUpdate {
    pub core_id: CoreId,
    pub app_idx: AppIdx,
    pub src_task_id: TaskId,
    pub edge_id: EdgeId,
}

/// A per-NI mailbox of pending cross-NI updates, drained in FIFO order.
#[derive(Debug, Clone, Default)]
pub struct Inbox {
    queue: VecDeque<InMemoryUpdate>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&mut self, update: InMemoryUpdate) {
        self.queue.push_back(update);
    }

    /// Drains every pending update, in the order they were posted.
    pub fn drain(&mut self) -> std::collections::vec_deque::Drain<'_, InMemoryUpdate> {
        self.queue.drain(..)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Consumes the inbox, returning its pending updates in FIFO order.
    pub fn into_updates(self) -> Vec<InMemoryUpdate> {
        self.queue.into_iter().collect()
    }
}
