use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Request counters reported by a peer.
#[derive(Debug, Default)]
pub struct PeerStats {
    total_requests: AtomicU64,
    invalid_requests: AtomicU64,
    invalidations_applied: AtomicU64,
    revalidations: AtomicU64,
    failed_revalidations: AtomicU64,
    scheduler_rejections: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub invalid_requests: u64,
    pub invalidations_applied: u64,
    pub revalidations: u64,
    pub failed_revalidations: u64,
    pub scheduler_rejections: u64,
}

impl StatsSnapshot {
    pub fn invalid_percentage(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.invalid_requests as f64 / self.total_requests as f64 * 100.0
    }
}

impl PeerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, satisfied: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if !satisfied {
            self.invalid_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_invalidation(&self) {
        self.invalidations_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_revalidation(&self, succeeded: bool) {
        if succeeded {
            self.revalidations.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_revalidations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_scheduler_rejection(&self) {
        self.scheduler_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            invalid_requests: self.invalid_requests.load(Ordering::Relaxed),
            invalidations_applied: self.invalidations_applied.load(Ordering::Relaxed),
            revalidations: self.revalidations.load(Ordering::Relaxed),
            failed_revalidations: self.failed_revalidations.load(Ordering::Relaxed),
            scheduler_rejections: self.scheduler_rejections.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self, peer_id: u32) {
        let snapshot = self.snapshot();
        tracing::info!(
            peer_id,
            total_requests = snapshot.total_requests,
            invalid_requests = snapshot.invalid_requests,
            invalid_percentage = snapshot.invalid_percentage(),
            invalidations_applied = snapshot.invalidations_applied,
            revalidations = snapshot.revalidations,
            failed_revalidations = snapshot.failed_revalidations,
            scheduler_rejections = snapshot.scheduler_rejections,
            "final peer statistics"
        );
    }
}
