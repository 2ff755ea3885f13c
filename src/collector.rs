use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::metrics::Engine;
use crate::netdev::Sampler;
use crate::rcu::BufferRcu;

// ─── Public entry point ──────────────────────────────────────────

/// Samples, aggregates and publishes once per engine interval, forever.
///
/// This is the only writer of `snapshot`. The first tick fires immediately;
/// a slow tick delays the next one rather than causing a burst of catch-up
/// ticks.
pub async fn run<S: Sampler>(mut sampler: S, mut engine: Engine, snapshot: Arc<BufferRcu>) {
    let mut interval = tokio::time::interval(engine.interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks = IntervalStream::new(interval);

    while ticks.next().await.is_some() {
        tick(&mut sampler, &mut engine, &snapshot);
    }
}

// ─── Single tick ─────────────────────────────────────────────────

/// Runs one sample/step/publish cycle. Returns whether a snapshot was published.
///
/// A failed sample leaves the engine history and the published snapshot
/// untouched; the next tick simply tries again.
pub fn tick<S: Sampler>(sampler: &mut S, engine: &mut Engine, snapshot: &BufferRcu) -> bool {
    match sampler.sample() {
        Ok(counters) => {
            snapshot.update(|buf| engine.step(counters, buf));
            debug!(recv = counters.recv, trns = counters.trns, "published snapshot");
            true
        }
        Err(err) => {
            warn!(error = %err, "could not sample counters, skipping tick");
            false
        }
    }
}
