#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Lifecycle management for short-lived generated image artifacts.
//!
//! Every per-person crop is written into one shared directory and served
//! from there for a short time. Two independent background tasks remove
//! them, whichever fires first:
//!
//! 1. a deferred deletion scheduled once per request, a fixed delay after
//!    the response is produced ([`schedule_deletion`]);
//! 2. a periodic sweep deleting every artifact older than a maximum age
//!    ([`spawn_periodic_sweep`]).
//!
//! An administrative trigger ([`registry::ArtifactRegistry::sweep_all`])
//! empties the directory immediately. Deletions are idempotent, so the
//! triggers race safely without locks on the files themselves.

pub mod clock;
pub mod registry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

pub use clock::{Clock, ManualClock, SystemClock};
pub use registry::{ArtifactRegistry, ArtifactState, GeneratedArtifact};

/// Default delay between a response and the deletion of its artifacts.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Default interval between periodic sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Shortest interval accepted by [`spawn_periodic_sweep`].
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Default age after which a sweep deletes an artifact.
pub const DEFAULT_SWEEP_MAX_AGE: Duration = Duration::from_secs(2 * 60);

/// Errors from artifact storage.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Timing of the two deletion triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Delay before a request's artifacts are deleted.
    pub ttl: Duration,
    /// Interval between periodic sweeps.
    pub sweep_interval: Duration,
    /// Age after which the sweep deletes an artifact.
    pub sweep_max_age: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            sweep_max_age: DEFAULT_SWEEP_MAX_AGE,
        }
    }
}

/// Schedules one deferred deletion for a batch of artifacts.
///
/// The artifacts are marked pending immediately and deleted after `delay`.
/// Files already removed by a sweep are skipped silently.
pub fn schedule_deletion(
    registry: &Arc<ArtifactRegistry>,
    paths: Vec<PathBuf>,
    delay: Duration,
) -> JoinHandle<()> {
    registry.mark_pending(&paths);
    let registry = Arc::clone(registry);

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let deleted = registry.delete_all(&paths);
        log::debug!(
            "Deferred cleanup removed {deleted} of {} artifact(s)",
            paths.len()
        );
    })
}

/// Spawns the periodic sweep.
///
/// The first sweep runs one `interval` after spawning. Intervals shorter
/// than [`MIN_SWEEP_INTERVAL`] are raised to it. The task runs until
/// aborted.
pub fn spawn_periodic_sweep(
    registry: Arc<ArtifactRegistry>,
    interval: Duration,
    max_age: Duration,
) -> JoinHandle<()> {
    if interval < MIN_SWEEP_INTERVAL {
        log::warn!("Sweep interval {interval:?} too short; using {MIN_SWEEP_INTERVAL:?}");
    }
    let interval = interval.max(MIN_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        loop {
            ticker.tick().await;
            registry.sweep_stale(max_age);
        }
    })
}
