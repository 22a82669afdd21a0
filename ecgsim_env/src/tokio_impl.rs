//! Production implementation of MonitorContext using Tokio.

use crate::entropy::{EntropySource, OsEntropy};
use crate::MonitorContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Production context backed by Tokio and OS entropy.
///
/// Time comes from the monotonic system clock, randomness from the OS.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MonitorContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn derive_entropy(&self, _stream: u64) -> Box<dyn EntropySource> {
        Box::new(OsEntropy::new())
    }

    fn seed(&self) -> u64 {
        // Production is not seeded
        0
    }
}
