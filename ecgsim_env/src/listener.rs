//! Boundary traits for the collaborators around the rhythm engine.

use crate::types::Vitals;

/// Pull-based accessor for the current vital signs.
///
/// # Implementations
///
/// - **Production**: backed by whatever parameter store the UI edits
/// - **Simulation**: `StaticVitals`
pub trait VitalsSource: Send {
    /// Returns the current vitals snapshot.
    fn vitals(&self) -> Vitals;
}

/// Fixed vitals, for simulation and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticVitals(pub Vitals);

impl VitalsSource for StaticVitals {
    fn vitals(&self) -> Vitals {
        self.0
    }
}

/// Receives rhythm events from the stepper.
///
/// # Event Flow
///
/// ```text
/// Stepper                       Listener
///   |-- beat detected ------------>| on_ventricular_beat(spo2)   (audio beep)
///   |-- new rate estimate -------->| on_heart_rate_update(bpm)   (numeric display)
/// ```
///
/// The engine only decides *when*; rendering the beep or number is up to the
/// listener.
pub trait RhythmListener: Send {
    /// Called whenever the ventricular-activation detector produces a new
    /// estimate. `0` signals asystole.
    fn on_heart_rate_update(&mut self, bpm: u32);

    /// Called once per detected ventricular activation.
    fn on_ventricular_beat(&mut self, spo2: f64);
}

/// Listener that records everything it hears.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    /// Every rate update, in order
    pub rates: Vec<u32>,

    /// SpO2 value passed with every beat trigger
    pub beats: Vec<f64>,
}

impl RhythmListener for RecordingListener {
    fn on_heart_rate_update(&mut self, bpm: u32) {
        self.rates.push(bpm);
    }

    fn on_ventricular_beat(&mut self, spo2: f64) {
        self.beats.push(spo2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_vitals() {
        let source = StaticVitals(Vitals { spo2: 91.0, ..Vitals::default() });
        assert_eq!(source.vitals().spo2, 91.0);
        assert_eq!(source.vitals().systolic_bp, 120.0);
    }

    #[test]
    fn test_recording_listener() {
        let mut listener = RecordingListener::default();
        listener.on_heart_rate_update(72);
        listener.on_ventricular_beat(97.0);

        assert_eq!(listener.rates, vec![72]);
        assert_eq!(listener.beats, vec![97.0]);
    }
}
