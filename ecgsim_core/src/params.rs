//! Typed parameter updates for nodes and paths.
//!
//! External code (UI, scripted pathology, replay files) changes a running
//! graph only through these setters. Values are sanitized on the way in:
//! durations are floored at zero, probabilities clamped to `[0, 1]` and
//! polarity normalized to ±1.
//!
//! Changes serialize as tagged JSON so a batch can be kept in a file:
//!
//! ```json
//! [
//!   { "target": "path", "id": "av_his", "set": { "field": "wenckebach", "value": true } },
//!   { "target": "node", "id": "sa", "set": { "field": "rate", "value": 110.0 } }
//! ]
//! ```

use crate::conduction_node::Node;
use crate::conduction_path::Path;
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;

/// A settable node field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum NodeField {
    Rate(f64),
    Refractory(f64),
    Automatic(bool),
    /// One-shot ectopic firing
    ForceNext,
}

impl NodeField {
    pub(crate) fn apply(self, node: &mut Node) {
        match self {
            NodeField::Rate(bpm) => node.rate_bpm = bpm.max(0.0),
            NodeField::Refractory(ms) => node.refractory_ms = ms.max(0.0),
            NodeField::Automatic(on) => node.automatic = on,
            NodeField::ForceNext => node.force_next = true,
        }
    }
}

/// A settable path field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum PathField {
    Delay(f64),
    Jitter(f64),
    Refractory(f64),
    Blocked(bool),
    /// `None` restores certain conduction
    Probability(Option<f64>),
    DecrementalStep(f64),
    Wenckebach(bool),
    Amplitude(f64),
    Polarity(f64),
    ActionPotential(f64),
}

impl PathField {
    pub(crate) fn apply(self, path: &mut Path) {
        match self {
            PathField::Delay(ms) => path.delay_ms = ms.max(0.0),
            PathField::Jitter(ms) => path.jitter_ms = ms.max(0.0),
            PathField::Refractory(ms) => path.refractory_ms = ms.max(0.0),
            PathField::Blocked(on) => path.blocked = on,
            PathField::Probability(p) => path.probability = p.map(|p| p.clamp(0.0, 1.0)),
            PathField::DecrementalStep(ms) => path.decremental_step_ms = ms.max(0.0),
            PathField::Wenckebach(on) => {
                path.wenckebach = on;
                if !on {
                    path.reset_decremental();
                }
            }
            PathField::Amplitude(a) => path.amplitude = a,
            PathField::Polarity(p) => path.polarity = if p < 0.0 { -1.0 } else { 1.0 },
            PathField::ActionPotential(ms) => path.apd_ms = ms.max(0.0),
        }
    }
}

/// One addressed parameter update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum ParamChange {
    Node { id: String, set: NodeField },
    Path { id: String, set: PathField },
}

impl ParamChange {
    pub fn node(id: &str, set: NodeField) -> Self {
        ParamChange::Node { id: id.to_string(), set }
    }

    pub fn path(id: &str, set: PathField) -> Self {
        ParamChange::Path { id: id.to_string(), set }
    }
}

/// Reads a JSON array of [`ParamChange`]s.
pub fn load_param_changes(path: impl AsRef<FsPath>) -> Result<Vec<ParamChange>, crate::config::ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
