//! Core environment context trait for the monitor.

use async_trait::async_trait;
use crate::entropy::EntropySource;
use std::time::Duration;

/// The central interface for environment interaction.
///
/// This trait abstracts the "real world" so that the rhythm engine can be
/// driven either by a wall clock (tokio) or by a virtual clock during
/// deterministic simulation.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, OS entropy
/// - **Simulation**: `SimContext` - virtual clock, `ChaCha8Rng(seed)`
///
/// # Determinism
///
/// Everything that would otherwise introduce non-determinism (time, jitter
/// and probability draws) is controlled by the implementation.
#[async_trait]
pub trait MonitorContext: Send + Sync + 'static {
    /// Returns the monotonic time since context creation.
    ///
    /// The monitor runtime advances the rhythm stepper up to this instant.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Creates an entropy source for one consumer.
    ///
    /// `stream` separates independent consumers (e.g. the conduction graph and
    /// a vitals generator) so that adding one does not perturb the other.
    fn derive_entropy(&self, stream: u64) -> Box<dyn EntropySource>;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
