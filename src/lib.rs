//! netexp: a Prometheus exporter for network burst-rate metrics.
//!
//! A single collector task samples cumulative byte counters once per
//! interval, aggregates them into "maximum burst rate over a window"
//! metrics with [`metrics::Engine`], and publishes the rendered snapshot
//! through a [`rcu::BufferRcu`]. HTTP handlers read that snapshot
//! concurrently without ever blocking the collector.

use std::sync::Arc;

pub mod collector;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod netdev;
pub mod rcu;
pub mod server;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
#[derive(Debug, Default)]
pub struct AppState {
    /// Latest rendered exposition; written by the collector, read by `/metrics`.
    pub snapshot: Arc<rcu::BufferRcu>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }
}
