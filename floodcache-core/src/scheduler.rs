//! Revalidation Scheduler
//!
//! Pull-mode background task that ages cached copies. Each chain sleeps until
//! the nearest TTR deadline, decays every record, and loops until no record
//! has TTR left, at which point it runs a last decay and stands down.
//!
//! Chains draw from a fixed pool of permits. Arming while the pool is
//! exhausted is rejected and counted instead of queued.

use crate::stats::PeerStats;
use crate::storage::EntryStore;
use std::sync::Arc;
use tokio::sync::{Semaphore, TryAcquireError, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    Started,
    /// Every permit is held by a live chain.
    Rejected,
    /// The scheduler was shut down.
    Stopped,
}

pub struct RevalidationScheduler {
    entries: Arc<EntryStore>,
    stats: Arc<PeerStats>,
    permits: Arc<Semaphore>,
    max_instances: usize,
    shutdown_tx: watch::Sender<bool>,
}

impl RevalidationScheduler {
    pub fn new(entries: Arc<EntryStore>, stats: Arc<PeerStats>, max_instances: usize) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            entries,
            stats,
            permits: Arc::new(Semaphore::new(max_instances)),
            max_instances,
            shutdown_tx,
        }
    }

    /// Starts a new decay chain if a permit is free.
    pub fn arm(&self) -> ArmOutcome {
        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                self.stats.record_scheduler_rejection();
                tracing::debug!(
                    max_instances = self.max_instances,
                    "revalidation scheduler at capacity, request rejected"
                );
                return ArmOutcome::Rejected;
            }
            Err(TryAcquireError::Closed) => return ArmOutcome::Stopped,
        };

        let entries = self.entries.clone();
        let shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            let _permit = permit;
            run_chain(entries, shutdown).await;
        });

        ArmOutcome::Started
    }

    pub fn live_instances(&self) -> usize {
        self.max_instances
            .saturating_sub(self.permits.available_permits())
    }

    /// Stops every live chain and refuses further arming.
    pub fn shutdown(&self) {
        self.permits.close();
        self.shutdown_tx.send_replace(true);
    }
}

async fn run_chain(entries: Arc<EntryStore>, mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }

        let wait = entries.min_positive_ttr().await;
        if let Some(wait) = wait {
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => return,
            }
        }

        for filename in entries.decay().await {
            tracing::info!(filename = %filename, "TTR expired");
        }

        if wait.is_none() {
            tracing::debug!("no cached copy left to age, scheduler standing down");
            return;
        }
    }
}
