//! Query Deduplication
//!
//! Keeps a short log of (filename, requesting peer) signatures that this peer
//! has already forwarded, so a flood reaching it again along another path is
//! not re-forwarded.
//!
//! # Window
//!
//! The log carries a single "previous kind" value: the kind of the most
//! recently forwarded query. An incoming query is a duplicate only when its
//! signature is in the log *and* its kind equals that value. A search and an
//! invalidation for the same signature therefore alternate past each other.
//!
//! The log is wiped when it grows past its capacity, and 15 seconds after
//! the first duplicate of a window is seen. At most one clearing timer exists
//! at a time.

use crate::types::{PeerId, QueryKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySignature {
    pub filename: String,
    pub requesting_id: PeerId,
}

/// Result of admitting an inbound query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Seen in the current window; do not forward.
    Duplicate,
    /// Not seen; recorded because it will be forwarded.
    Recorded,
    /// Not seen; not recorded because it will not be forwarded.
    Ignored,
}

#[derive(Default)]
struct DedupState {
    log: Vec<QuerySignature>,
    previous_kind: Option<QueryKind>,
    clear_timer: Option<JoinHandle<()>>,
}

impl DedupState {
    /// `previous_kind` survives between scans and is only reset when the log clears,
    /// so a query is suppressed only while the last recorded query had the same kind.
    fn is_duplicate(&self, filename: &str, requesting_id: PeerId, kind: QueryKind) -> bool {
        self.previous_kind == Some(kind)
            && self
                .log
                .iter()
                .any(|sig| sig.filename == filename && sig.requesting_id == requesting_id)
    }

    fn record(&mut self, filename: &str, requesting_id: PeerId, kind: QueryKind, capacity: usize) {
        if self.log.len() > capacity {
            tracing::debug!("query log over capacity ({}), clearing", self.log.len());
            self.log.clear();
        }
        self.log.push(QuerySignature {
            filename: filename.to_string(),
            requesting_id,
        });
        self.previous_kind = Some(kind);
    }

    fn clear(&mut self) {
        self.log.clear();
        self.previous_kind = None;
    }
}

pub struct DedupRegistry {
    state: Arc<Mutex<DedupState>>,
    window: Duration,
    capacity: usize,
}

impl DedupRegistry {
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(DedupState::default())),
            window,
            capacity,
        }
    }

    /// Checks an inbound query and records it when it is about to be forwarded.
    ///
    /// The scan, the timer arming and the append happen under one lock.
    pub async fn admit(
        &self,
        filename: &str,
        requesting_id: PeerId,
        kind: QueryKind,
        will_forward: bool,
    ) -> Admission {
        let mut state = self.state.lock().await;

        if state.is_duplicate(filename, requesting_id, kind) {
            self.arm_clear_timer(&mut state);
            return Admission::Duplicate;
        }

        if !will_forward {
            return Admission::Ignored;
        }

        state.record(filename, requesting_id, kind, self.capacity);
        Admission::Recorded
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.log.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn is_armed(&self) -> bool {
        self.state.lock().await.clear_timer.is_some()
    }

    /// Cancels a pending clearing timer.
    pub async fn shutdown(&self) {
        if let Some(timer) = self.state.lock().await.clear_timer.take() {
            timer.abort();
        }
    }

    fn arm_clear_timer(&self, state: &mut DedupState) {
        if state.clear_timer.is_some() {
            return;
        }

        let shared = self.state.clone();
        let window = self.window;
        state.clear_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let mut state = shared.lock().await;
            tracing::debug!("clearing query log ({} entries)", state.log.len());
            state.clear();
            state.clear_timer = None;
        }));
    }
}
