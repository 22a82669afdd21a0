//! Common types for the monitor's external collaborators.

use serde::{Deserialize, Serialize};

/// Non-ECG vital signs published to the audio and alarm collaborators.
///
/// The conduction engine never reads these; the rhythm stepper only forwards
/// the current SpO2 with each beat trigger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    /// Peripheral oxygen saturation (%)
    pub spo2: f64,

    /// Systolic blood pressure (mmHg)
    pub systolic_bp: f64,

    /// Diastolic blood pressure (mmHg)
    pub diastolic_bp: f64,

    /// End-tidal CO2 (mmHg)
    pub etco2: f64,

    /// Respiratory rate (breaths/min)
    pub resp_rate: f64,
}

impl Default for Vitals {
    fn default() -> Self {
        Self {
            spo2: 98.0,
            systolic_bp: 120.0,
            diastolic_bp: 80.0,
            etco2: 38.0,
            resp_rate: 14.0,
        }
    }
}

impl std::fmt::Display for Vitals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SpO2 {:.0}% | NIBP {:.0}/{:.0} | EtCO2 {:.0} | RR {:.0}",
            self.spo2, self.systolic_bp, self.diastolic_bp, self.etco2, self.resp_rate
        )
    }
}
