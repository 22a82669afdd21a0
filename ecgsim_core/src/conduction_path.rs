//! Conduction paths - directed edges between nodes.
//!
//! A path holds three kinds of state:
//! - **Timing**: delay, jitter, refractory, in-flight marker, decremental
//!   (Wenckebach) accumulator
//! - **Gating**: blocked flag, conduction probability, paired reverse edge
//! - **Waveform**: amplitude, polarity and action-potential duration used by
//!   the closed-form voltage shape, plus cached lead weights
//!
//! # Voltage shape
//!
//! Anchored at `lastConductedAt`, each conducted impulse produces a sharp
//! depolarization spike at `delay` followed by a wider, asymmetric
//! repolarization wave at `delay + apd`:
//!
//! ```text
//!   v(s) = A · [ g(s; delay, σ_dep) + p · k · g(s; delay + apd, σ_l | σ_r) ]
//! ```
//!
//! where the repolarization widths scale with `clamp(sqrt(rr / 1000), 0.5, 1.5)`.

use crate::conduction_node::NodeIndex;
use crate::lead_projection::LeadVector;
use ecgsim_env::EntropySource;
use serde::{Deserialize, Serialize};

/// Multiplier applied to the reverse edge's refractory when the reverse edge
/// conducted more recently than this one. Empirical; exposed for calibration.
pub const REVERSE_RECOVERY_FACTOR: f64 = 1.5;

/// Depolarization spike width (s)
pub const DEPOLARIZATION_WIDTH_S: f64 = 0.010;

/// Repolarization upstroke width (s), before RR correction
pub const REPOLARIZATION_LEFT_S: f64 = 0.060;

/// Repolarization downstroke width (s), before RR correction
pub const REPOLARIZATION_RIGHT_S: f64 = 0.040;

/// Repolarization amplitude relative to the spike
pub const REPOLARIZATION_GAIN: f64 = 0.3;

/// Index of a path inside the conduction graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathIndex(pub usize);

impl std::fmt::Display for PathIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Outcome of evaluating a path's gates, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Path may conduct
    Open,
    /// Blocked flag set
    Blocked,
    /// Own refractory window not elapsed
    Refractory,
    /// An earlier scheduled impulse is still in flight
    InFlight,
    /// Paired reverse edge has not recovered
    ReverseRefractory,
    /// Probability draw failed
    Probability,
    /// Decremental accumulator would push the impulse into refractory
    Decremental,
}

/// Snapshot of a reverse edge's recovery state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecoveryWindow {
    pub last_conducted_at: Option<f64>,
    pub refractory_ms: f64,
}

/// A directed conduction edge.
#[derive(Debug, Clone)]
pub struct Path {
    /// Stable identifier (e.g. "av_his")
    pub id: String,

    /// Source node
    pub from: NodeIndex,

    /// Target node
    pub to: NodeIndex,

    /// Base conduction delay (ms)
    pub delay_ms: f64,

    /// Symmetric jitter bound (ms). Zero disables jitter.
    pub jitter_ms: f64,

    /// Refractory duration of the edge itself (ms)
    pub refractory_ms: f64,

    /// Conduction blocked outright
    pub blocked: bool,

    /// Bernoulli gate. `None` means certain conduction.
    pub probability: Option<f64>,

    /// Waveform amplitude
    pub amplitude: f64,

    /// Repolarization polarity (+1 concordant, -1 discordant)
    pub polarity: f64,

    /// Action-potential duration (ms)
    pub apd_ms: f64,

    /// Delay added per conducted beat in Wenckebach mode (ms)
    pub decremental_step_ms: f64,

    /// Wenckebach-style progressive slowing enabled
    pub wenckebach: bool,

    /// Accumulated decremental delay (ms)
    decremental_ms: f64,

    /// Paired reverse edge
    reverse: Option<PathIndex>,

    /// Waveform anchor: `fire_at - delay` of the last conducted impulse
    last_conducted_at: Option<f64>,

    /// Delay actually used by the last conducted impulse
    last_delay_ms: f64,

    /// Absolute-refractory marker set when conduction is scheduled
    refractory_until: Option<f64>,

    /// Cached dot factors
    lead_weights: LeadVector,
}

impl Path {
    /// Creates a path with default timing. Lead weights are supplied by the
    /// graph, which knows the endpoint positions.
    pub fn new(id: impl Into<String>, from: NodeIndex, to: NodeIndex, lead_weights: LeadVector) -> Self {
        Self {
            id: id.into(),
            from,
            to,
            delay_ms: 50.0,
            jitter_ms: 0.0,
            refractory_ms: 250.0,
            blocked: false,
            probability: None,
            amplitude: 1.0,
            polarity: 1.0,
            apd_ms: 250.0,
            decremental_step_ms: 0.0,
            wenckebach: false,
            decremental_ms: 0.0,
            reverse: None,
            last_conducted_at: None,
            last_delay_ms: 0.0,
            refractory_until: None,
            lead_weights,
        }
    }

    /// Evaluates every gate in order and reports the first that closes.
    ///
    /// Draws from `entropy` only when a probability is configured. A failed
    /// decremental gate resets the accumulator (the dropped beat).
    pub fn gate(
        &mut self,
        now: f64,
        reverse: Option<RecoveryWindow>,
        recovery_factor: f64,
        entropy: &mut dyn EntropySource,
    ) -> Gate {
        if self.blocked {
            return Gate::Blocked;
        }

        if let Some(last) = self.last_conducted_at {
            if now - last < self.refractory_ms {
                return Gate::Refractory;
            }
        }

        if let Some(until) = self.refractory_until {
            if now < until {
                return Gate::InFlight;
            }
        }

        if let Some(rev) = reverse {
            if let Some(rev_last) = rev.last_conducted_at {
                let reverse_is_newer = match self.last_conducted_at {
                    Some(own) => rev_last > own,
                    None => true,
                };
                let factor = if reverse_is_newer { recovery_factor } else { 1.0 };
                if now - rev_last < rev.refractory_ms * factor {
                    return Gate::ReverseRefractory;
                }
            }
        }

        if let Some(p) = self.probability {
            if entropy.next_unit() > p {
                return Gate::Probability;
            }
        }

        if self.wenckebach
            && self.delay_ms + self.decremental_ms + self.decremental_step_ms >= self.refractory_ms
        {
            self.decremental_ms = 0.0;
            return Gate::Decremental;
        }

        Gate::Open
    }

    /// `gate(..) == Gate::Open`
    pub fn can_conduct(
        &mut self,
        now: f64,
        reverse: Option<RecoveryWindow>,
        recovery_factor: f64,
        entropy: &mut dyn EntropySource,
    ) -> bool {
        self.gate(now, reverse, recovery_factor, entropy) == Gate::Open
    }

    /// Delay for the next impulse: base, plus decremental accumulation in
    /// Wenckebach mode, plus a uniform jitter draw; never negative.
    pub fn current_delay(&self, entropy: &mut dyn EntropySource) -> f64 {
        let mut delay = self.delay_ms;
        if self.wenckebach {
            delay += self.decremental_ms;
        }
        if self.jitter_ms > 0.0 {
            delay += entropy.symmetric(self.jitter_ms);
        }
        delay.max(0.0)
    }

    /// Marks the path's absolute-refractory window at scheduling time.
    /// Returns the marker it replaced.
    pub(crate) fn mark_scheduled(&mut self, now: f64) -> Option<f64> {
        self.refractory_until.replace(now + self.refractory_ms)
    }

    /// Withdraws an impulse that will never arrive, restoring the marker
    /// returned by [`Path::mark_scheduled`].
    pub(crate) fn cancel_scheduled(&mut self, previous: Option<f64>) {
        self.refractory_until = previous;
    }

    /// Records a conducted impulse arriving at `fire_at` after `delay_ms`.
    ///
    /// The waveform anchor moves to `fire_at - delay_ms` so the spike lands
    /// at the arrival instant. The anchor never moves backwards.
    pub fn conduct(&mut self, fire_at: f64, delay_ms: f64) {
        let anchor = fire_at - delay_ms;
        if let Some(prev) = self.last_conducted_at {
            if anchor < prev {
                return;
            }
        }
        self.last_conducted_at = Some(anchor);
        self.last_delay_ms = delay_ms;
        if self.wenckebach {
            self.decremental_ms += self.decremental_step_ms;
        }
    }

    /// Voltage contribution at absolute time `t` given the current RR
    /// interval. Zero before the first conduction and before the impulse
    /// left its source.
    pub fn instantaneous_voltage(&self, t: f64, rr_ms: f64) -> f64 {
        let Some(anchor) = self.last_conducted_at else {
            return 0.0;
        };
        if t < anchor {
            return 0.0;
        }

        let s = (t - anchor) / 1000.0;
        let rr_factor = (rr_ms.max(0.0) / 1000.0).sqrt().clamp(0.5, 1.5);

        let spike_center = self.last_delay_ms / 1000.0;
        let spike = gaussian(s, spike_center, DEPOLARIZATION_WIDTH_S);

        let wave_center = (self.last_delay_ms + self.apd_ms) / 1000.0;
        let base_width = if s < wave_center {
            REPOLARIZATION_LEFT_S
        } else {
            REPOLARIZATION_RIGHT_S
        };
        let width = base_width * rr_factor;
        let wave = gaussian(s, wave_center, width);

        self.amplitude * (spike + self.polarity * REPOLARIZATION_GAIN * wave)
    }

    /// Paired reverse edge, if any.
    pub fn reverse(&self) -> Option<PathIndex> {
        self.reverse
    }

    pub(crate) fn set_reverse(&mut self, reverse: PathIndex) {
        self.reverse = Some(reverse);
    }

    /// Recovery state as seen by the paired edge.
    pub fn recovery_window(&self) -> RecoveryWindow {
        RecoveryWindow {
            last_conducted_at: self.last_conducted_at,
            refractory_ms: self.refractory_ms,
        }
    }

    pub fn last_conducted_at(&self) -> Option<f64> {
        self.last_conducted_at
    }

    pub fn refractory_until(&self) -> Option<f64> {
        self.refractory_until
    }

    /// Accumulated decremental delay (ms).
    pub fn decremental_ms(&self) -> f64 {
        self.decremental_ms
    }

    pub(crate) fn reset_decremental(&mut self) {
        self.decremental_ms = 0.0;
    }

    /// Cached lead weights.
    pub fn lead_weights(&self) -> &LeadVector {
        &self.lead_weights
    }
}

#[inline]
fn gaussian(x: f64, center: f64, width: f64) -> f64 {
    let d = x - center;
    (-(d * d) / (2.0 * width * width)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ecgsim_env::ScriptedEntropy;

    fn path() -> Path {
        let mut p = Path::new("a_b", NodeIndex(0), NodeIndex(1), LeadVector::zeros());
        p.delay_ms = 20.0;
        p.refractory_ms = 250.0;
        p
    }

    fn open(p: &mut Path, now: f64) -> Gate {
        let mut entropy = ScriptedEntropy::constant(0.5);
        p.gate(now, None, REVERSE_RECOVERY_FACTOR, &mut entropy)
    }

    #[test]
    fn test_fresh_path_is_open() {
        let mut p = path();
        assert_eq!(open(&mut p, 0.0), Gate::Open);
    }

    #[test]
    fn test_blocked_short_circuits() {
        let mut p = path();
        p.blocked = true;
        p.probability = Some(1.0);

        let mut entropy = ScriptedEntropy::constant(0.5);
        assert_eq!(p.gate(0.0, None, 1.5, &mut entropy), Gate::Blocked);
        assert_eq!(entropy.draws(), 0);
    }

    #[test]
    fn test_own_refractory() {
        let mut p = path();
        p.conduct(20.0, 20.0); // anchor at 0

        assert_eq!(open(&mut p, 249.0), Gate::Refractory);
        assert_eq!(open(&mut p, 250.0), Gate::Open);
    }

    #[test]
    fn test_in_flight_marker() {
        let mut p = path();
        p.mark_scheduled(100.0);

        assert_eq!(open(&mut p, 200.0), Gate::InFlight);
        assert_eq!(open(&mut p, 350.0), Gate::Open);
    }

    #[test]
    fn test_cancelled_impulse_restores_marker() {
        let mut p = path();
        let previous = p.mark_scheduled(100.0);
        assert_eq!(previous, None);

        p.cancel_scheduled(previous);
        assert_eq!(p.refractory_until(), None);
        assert_eq!(open(&mut p, 200.0), Gate::Open);
    }

    #[test]
    fn test_reverse_window_scaled_when_reverse_newer() {
        let mut p = path();
        let reverse = RecoveryWindow {
            last_conducted_at: Some(0.0),
            refractory_ms: 200.0,
        };
        let mut entropy = ScriptedEntropy::constant(0.5);

        // Reverse conducted, this path never did: 1.5 x 200 = 300
        assert_eq!(p.gate(250.0, Some(reverse), 1.5, &mut entropy), Gate::ReverseRefractory);
        assert_eq!(p.gate(300.0, Some(reverse), 1.5, &mut entropy), Gate::Open);
    }

    #[test]
    fn test_reverse_window_unscaled_when_own_newer() {
        let mut p = path();
        p.refractory_ms = 10.0;
        p.conduct(50.0, 20.0); // anchor 30, newer than the reverse
        let reverse = RecoveryWindow {
            last_conducted_at: Some(0.0),
            refractory_ms: 200.0,
        };
        let mut entropy = ScriptedEntropy::constant(0.5);

        assert_eq!(p.gate(199.0, Some(reverse), 1.5, &mut entropy), Gate::ReverseRefractory);
        assert_eq!(p.gate(200.0, Some(reverse), 1.5, &mut entropy), Gate::Open);
    }

    #[test]
    fn test_probability_gate() {
        let mut p = path();
        p.probability = Some(0.3);

        let mut entropy = ScriptedEntropy::new(vec![0.2, 0.8]);
        assert_eq!(p.gate(0.0, None, 1.5, &mut entropy), Gate::Open);
        assert_eq!(p.gate(0.0, None, 1.5, &mut entropy), Gate::Probability);
    }

    #[test]
    fn test_decremental_gate_resets_accumulator() {
        let mut p = path();
        p.delay_ms = 100.0;
        p.refractory_ms = 250.0;
        p.wenckebach = true;
        p.decremental_step_ms = 40.0;

        let mut entropy = ScriptedEntropy::constant(0.5);
        let mut successes = 0;
        let mut t = 0.0;
        loop {
            match p.gate(t, None, 1.5, &mut entropy) {
                Gate::Open => {
                    let delay = p.current_delay(&mut entropy);
                    p.conduct(t + delay, delay);
                    successes += 1;
                }
                Gate::Decremental => break,
                other => panic!("unexpected gate {:?}", other),
            }
            t += 1000.0;
        }

        // 100 + k*40 < 250 -> k = 3
        assert_eq!(successes, 3);
        assert_eq!(p.decremental_ms(), 0.0);
    }

    #[test]
    fn test_current_delay_with_wenckebach() {
        let mut p = path();
        p.wenckebach = true;
        p.decremental_step_ms = 15.0;
        let mut entropy = ScriptedEntropy::constant(0.5);

        assert_eq!(p.current_delay(&mut entropy), 20.0);
        p.conduct(20.0, 20.0);
        assert_eq!(p.current_delay(&mut entropy), 35.0);
    }

    #[test]
    fn test_jitter_is_floored_at_zero() {
        let mut p = path();
        p.delay_ms = 5.0;
        p.jitter_ms = 10.0;

        let mut low = ScriptedEntropy::constant(0.0);
        assert_eq!(p.current_delay(&mut low), 0.0);

        let mut high = ScriptedEntropy::constant(0.75);
        assert_relative_eq!(p.current_delay(&mut high), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_anchor_never_moves_backwards() {
        let mut p = path();
        p.conduct(500.0, 20.0);
        p.conduct(100.0, 20.0);
        assert_eq!(p.last_conducted_at(), Some(480.0));
    }

    #[test]
    fn test_voltage_zero_before_first_conduction() {
        let p = path();
        assert_eq!(p.instantaneous_voltage(1000.0, 800.0), 0.0);
    }

    #[test]
    fn test_voltage_zero_before_anchor() {
        let mut p = path();
        p.conduct(120.0, 20.0); // anchor 100

        assert_eq!(p.instantaneous_voltage(95.0, 1000.0), 0.0);
        assert_eq!(p.instantaneous_voltage(-5.0, 1000.0), 0.0);
        assert!(p.instantaneous_voltage(100.0, 1000.0) > 0.0);
    }

    #[test]
    fn test_voltage_peaks_at_arrival() {
        let mut p = path();
        p.amplitude = 2.0;
        p.apd_ms = 300.0;
        p.conduct(120.0, 20.0); // anchor 100, spike at 120

        let peak = p.instantaneous_voltage(120.0, 1000.0);
        assert!(peak > 1.9);
        assert!(p.instantaneous_voltage(160.0, 1000.0) < peak * 0.1);
    }

    #[test]
    fn test_repolarization_follows_polarity() {
        let mut p = path();
        p.apd_ms = 300.0;
        p.conduct(20.0, 20.0);

        // Centre of the repolarization wave: delay + apd after the anchor
        let upright = p.instantaneous_voltage(320.0, 1000.0);
        p.polarity = -1.0;
        let inverted = p.instantaneous_voltage(320.0, 1000.0);

        assert_relative_eq!(upright, REPOLARIZATION_GAIN, epsilon = 1e-6);
        assert_relative_eq!(inverted, -REPOLARIZATION_GAIN, epsilon = 1e-6);
    }

    #[test]
    fn test_rr_widens_repolarization() {
        let mut p = path();
        p.apd_ms = 300.0;
        p.conduct(20.0, 20.0);

        // 60 ms after the wave centre
        let fast = p.instantaneous_voltage(380.0, 400.0);
        let slow = p.instantaneous_voltage(380.0, 1600.0);
        assert!(slow > fast);
    }
}
