//! Simulation context implementing MonitorContext for deterministic runs.

use async_trait::async_trait;
use ecgsim_env::{EntropySource, MonitorContext, SeededEntropy};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Multiplier mixing the master seed into per-stream entropy seeds.
const ENTROPY_SEED_MIX: u64 = 0x517cc1b727220a95;

/// Simulation context backed by a virtual clock and seeded entropy.
///
/// - A virtual clock that only moves when advanced (or slept on)
/// - ChaCha8 entropy streams derived from one master seed
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,
}

impl SimContext {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let mut time = self.virtual_time_ns.lock().unwrap_or_else(PoisonError::into_inner);
        *time += duration.as_nanos() as u64;
    }

    /// Sets the virtual time to a specific value.
    pub fn set_time(&self, time_ns: u64) {
        let mut time = self.virtual_time_ns.lock().unwrap_or_else(PoisonError::into_inner);
        *time = time_ns;
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *self.virtual_time_ns.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current virtual time in ms.
    pub fn now_ms(&self) -> f64 {
        self.time_ns() as f64 / 1_000_000.0
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
        }
    }
}

#[async_trait]
impl MonitorContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    async fn sleep(&self, duration: Duration) {
        // Nothing else shares the clock, so sleeping is just advancing it
        self.advance_time(duration);
    }

    fn derive_entropy(&self, stream: u64) -> Box<dyn EntropySource> {
        Box::new(SeededEntropy::new(self.seed.wrapping_mul(ENTROPY_SEED_MIX) ^ stream))
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
