//! JSON exporter for rhythm strips.
//!
//! Exports the buffered twelve-lead signal plus run summary for external
//! plotting.

use crate::world::SimWorld;
use ecgsim_core::{Lead, ParamChange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;

/// One lead's buffered samples, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadStrip {
    pub lead: Lead,
    pub samples: Vec<f64>,
}

/// Complete strip export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripExport {
    /// Run label (scenario name or "standard")
    pub label: String,

    /// Seed used
    pub seed: u64,

    /// Simulated duration in ms
    pub duration_ms: f64,

    /// Sample spacing in ms
    pub step_ms: f64,

    /// Simulated time of the first exported sample (ms)
    pub start_ms: f64,

    /// Final heart rate estimate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<u32>,

    /// Ventricular beats detected
    pub beats: u64,

    /// Parameter changes applied before the run
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub changes: Vec<ParamChange>,

    /// Activation count per node id
    pub node_fires: BTreeMap<String, usize>,

    /// Conduction count per path id
    pub path_conductions: BTreeMap<String, usize>,

    /// All twelve leads
    pub leads: Vec<LeadStrip>,
}

impl StripExport {
    /// Captures the current state of a world.
    pub fn capture(label: &str, world: &SimWorld, changes: &[ParamChange]) -> Self {
        let stepper = world.stepper();
        let config = stepper.config();
        let leads: Vec<LeadStrip> = Lead::ALL
            .iter()
            .map(|&lead| LeadStrip {
                lead,
                samples: stepper.streams().stream(lead).snapshot(),
            })
            .collect();

        // Last sample was rendered at (step_count - 1) * step - render_delay
        let buffered = stepper.streams().len() as f64;
        let last_rendered = (stepper.step_count() as f64 - 1.0) * config.step_ms - config.render_delay_ms;
        let start_ms = last_rendered - (buffered - 1.0) * config.step_ms;

        Self {
            label: label.to_string(),
            seed: world.config.seed,
            duration_ms: world.time_ms(),
            step_ms: config.step_ms,
            start_ms,
            heart_rate: stepper.heart_rate(),
            beats: stepper.beat_count(),
            changes: changes.to_vec(),
            node_fires: world.ledger().fire_counts(),
            path_conductions: world.ledger().conduction_counts(),
            leads,
        }
    }

    pub fn lead(&self, lead: Lead) -> Option<&LeadStrip> {
        self.leads.iter().find(|s| s.lead == lead)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
