//! Conduction nodes - pacemaker and conduction-system sites.
//!
//! A node only knows its own timing state. Whether a firing is *allowed*
//! (refractory windows, competing arrivals) is decided by the conduction
//! graph before it calls [`Node::fire`].

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Index of a node inside the conduction graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIndex(pub usize);

impl std::fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// An anatomical site with automaticity and a refractory window.
#[derive(Debug, Clone)]
pub struct Node {
    /// Stable identifier (e.g. "sa", "av")
    pub id: String,

    /// Anatomical position in cm, heart frame. Only used for lead projection.
    pub position: Vector3<f64>,

    /// Intrinsic rate in beats per minute
    pub rate_bpm: f64,

    /// Refractory duration in ms
    pub refractory_ms: f64,

    /// Self-fires every `60000 / rate_bpm` ms when set
    pub automatic: bool,

    /// One-shot request to fire at the next opportunity
    pub force_next: bool,

    /// Absolute simulated time of the last firing
    last_fired_at: Option<f64>,
}

impl Node {
    /// Creates a passive (non-automatic) node.
    pub fn new(id: impl Into<String>, position: Vector3<f64>) -> Self {
        Self {
            id: id.into(),
            position,
            rate_bpm: 0.0,
            refractory_ms: 250.0,
            automatic: false,
            force_next: false,
            last_fired_at: None,
        }
    }

    /// Enables automaticity at the given rate.
    pub fn with_automaticity(mut self, rate_bpm: f64) -> Self {
        self.rate_bpm = rate_bpm;
        self.automatic = true;
        self
    }

    /// Sets the refractory duration.
    pub fn with_refractory(mut self, refractory_ms: f64) -> Self {
        self.refractory_ms = refractory_ms;
        self
    }

    /// Automatic firing interval, if the rate is positive.
    pub fn interval_ms(&self) -> Option<f64> {
        (self.rate_bpm > 0.0).then(|| 60_000.0 / self.rate_bpm)
    }

    /// Returns true if the node wants to fire at `now`.
    ///
    /// Either the automatic interval has elapsed since the last firing or the
    /// one-shot force flag is set. A refractory node is never due.
    pub fn due_to_fire(&self, now: f64) -> bool {
        if self.is_refractory(now) {
            return false;
        }
        if self.force_next {
            return true;
        }
        if !self.automatic {
            return false;
        }
        match (self.interval_ms(), self.last_fired_at) {
            (Some(interval), Some(last)) => now - last >= interval,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Records a firing at `at` and consumes the force flag.
    pub fn fire(&mut self, at: f64) {
        self.last_fired_at = Some(at);
        self.force_next = false;
    }

    /// `now - lastFiredAt < refractory`
    pub fn is_refractory(&self, now: f64) -> bool {
        match self.last_fired_at {
            Some(last) => now - last < self.refractory_ms,
            None => false,
        }
    }

    /// Time of the last firing, if any.
    pub fn last_fired_at(&self) -> Option<f64> {
        self.last_fired_at
    }
}
