//! In-memory change feed
//!
//! Each subscription owns a queue of encoded frames. The store pushes frames
//! into every live queue whose prefixes and filters admit the record; the
//! subscription decodes them on `read`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use runstate_core::{ChangeRecord, RunStateError, RunStateResult};

use crate::{ChangeFeed, FilterKind, GlobPattern};

/// Subscription state shared between the store (producer) and one feed (consumer)
#[derive(Debug, Default)]
pub(crate) struct SubscriberQueue {
    state: Mutex<SubscriberState>,
    ready: Condvar,
}

#[derive(Debug, Default)]
struct SubscriberState {
    prefixes: Vec<String>,
    filters: Vec<(FilterKind, GlobPattern)>,
    pending: VecDeque<Bytes>,
}

impl SubscriberState {
    fn admits(&self, path: &str) -> bool {
        if !self.prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return false;
        }

        let mut has_accept = false;
        let mut accepted = false;
        for (kind, pattern) in &self.filters {
            match kind {
                FilterKind::Reject if pattern.matches(path) => return false,
                FilterKind::Reject => {}
                FilterKind::Accept => {
                    has_accept = true;
                    accepted |= pattern.matches(path);
                }
            }
        }
        !has_accept || accepted
    }
}

impl SubscriberQueue {
    /// Queue a frame if the record's path passes prefixes and filters
    pub(crate) fn offer(&self, path: &str, frame: &Bytes) {
        let mut state = self.state.lock();
        if state.admits(path) {
            state.pending.push_back(frame.clone());
            self.ready.notify_one();
        }
    }

    /// Queue a frame unconditionally
    pub(crate) fn push_raw(&self, frame: Bytes) {
        self.state.lock().pending.push_back(frame);
        self.ready.notify_one();
    }
}

/// Subscription connection to a [`crate::MemoryStore`]
#[derive(Debug)]
pub struct MemorySubscription {
    queue: Arc<SubscriberQueue>,
}

impl MemorySubscription {
    pub(crate) fn new(queue: Arc<SubscriberQueue>) -> Self {
        MemorySubscription { queue }
    }

    /// Number of frames waiting to be read
    pub fn pending(&self) -> usize {
        self.queue.state.lock().pending.len()
    }
}

impl ChangeFeed for MemorySubscription {
    fn subscribe(&mut self, prefix: &str) -> RunStateResult<()> {
        if prefix.is_empty() {
            return Err(RunStateError::InvalidArgument("empty subscription prefix".into()));
        }
        let mut state = self.queue.state.lock();
        if !state.prefixes.iter().any(|p| p == prefix) {
            state.prefixes.push(prefix.to_string());
        }
        Ok(())
    }

    fn unsubscribe(&mut self, prefix: &str) -> RunStateResult<()> {
        let mut state = self.queue.state.lock();
        let before = state.prefixes.len();
        state.prefixes.retain(|p| p != prefix);
        if state.prefixes.len() == before {
            return Err(RunStateError::NotFound(format!("subscription {}", prefix)));
        }
        Ok(())
    }

    fn add_filter(&mut self, kind: FilterKind, pattern: &str) -> RunStateResult<()> {
        self.queue
            .state
            .lock()
            .filters
            .push((kind, GlobPattern::new(pattern)));
        Ok(())
    }

    fn clear_filters(&mut self) {
        self.queue.state.lock().filters.clear();
    }

    fn wait_msg(&mut self, timeout: Duration) -> bool {
        let mut state = self.queue.state.lock();
        if !state.pending.is_empty() {
            return true;
        }
        if timeout.is_zero() {
            return false;
        }
        // Spurious wakeups just report whatever is queued
        self.queue.ready.wait_for(&mut state, timeout);
        !state.pending.is_empty()
    }

    fn read(&mut self) -> RunStateResult<ChangeRecord> {
        let frame = self
            .queue
            .state
            .lock()
            .pending
            .pop_front()
            .ok_or_else(|| RunStateError::NotFound("no change record pending".into()))?;
        ChangeRecord::decode(&frame)
    }
}
