//! Simulation drivers used to exercise an overlay without a human at the console.

use floodcache_core::{FetchOperation, FetchOperationOutcome, ModifyOperation, Peer, PeerId};
use rand::Rng;
use rand::seq::IteratorRandom;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Highest `test{n}.txt` index the requester asks for.
const REQUESTED_FILES: u32 = 10;

/// Exponentially distributed delay with the given mean.
pub fn exponential_delay(mean: Duration) -> Duration {
    let uniform: f64 = rand::thread_rng().gen_range(0.0..1.0);
    mean.mul_f64(-(1.0 - uniform).ln())
}

pub fn pick_random(sources: &BTreeSet<PeerId>) -> Option<PeerId> {
    sources.iter().copied().choose(&mut rand::thread_rng())
}

/// Repeatedly resolves `test{n}.txt` for a random `n`, fetching from a random source.
pub async fn run_auto(peer: Arc<Peer>, iterations: u32, lambda: Duration) {
    let fetch = FetchOperation::new(peer);

    for iteration in 0..iterations {
        let index = rand::thread_rng().gen_range(1..=REQUESTED_FILES);
        let filename = format!("test{}.txt", index);
        tracing::info!(iteration, filename = %filename, "auto request");

        match fetch.run_via_search(&filename, pick_random).await {
            Ok(FetchOperationOutcome::Fetched(result)) => tracing::info!(
                filename = %filename,
                source = result.source,
                "auto request satisfied"
            ),
            Ok(outcome) => tracing::info!(filename = %filename, ?outcome, "auto request skipped"),
            Err(error) => tracing::warn!(filename = %filename, error = %error, "auto request failed"),
        }

        let wait = exponential_delay(lambda);
        tracing::debug!("sleeping {:?}", wait);
        tokio::time::sleep(wait).await;
    }
}

/// Modifies this peer's own `test{id}.txt` forever at random intervals.
pub async fn run_modifier(peer: Arc<Peer>, lambda: Duration) {
    let filename = format!("test{}.txt", peer.id());
    let modify = ModifyOperation::new(peer);

    loop {
        tokio::time::sleep(exponential_delay(lambda)).await;

        match modify.run(&filename).await {
            Ok(result) => tracing::info!(
                filename = %filename,
                version = result.version,
                "auto modification"
            ),
            Err(error) => tracing::warn!(filename = %filename, error = %error, "auto modification failed"),
        }
    }
}
