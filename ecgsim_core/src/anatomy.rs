//! Static anatomical tables the conduction graph is built from.
//!
//! Tables are plain serde data, so a heart can be described in JSON as well
//! as built in code. Positions are in cm in the anatomical heart frame and are
//! only used to precompute lead weights.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Node entry in an anatomy table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    pub position: Vector3<f64>,
    #[serde(default)]
    pub rate_bpm: f64,
    #[serde(default = "default_node_refractory")]
    pub refractory_ms: f64,
    #[serde(default)]
    pub automatic: bool,
}

fn default_node_refractory() -> f64 {
    250.0
}

impl NodeSpec {
    pub fn new(id: &str, position: [f64; 3]) -> Self {
        Self {
            id: id.to_string(),
            position: Vector3::from(position),
            rate_bpm: 0.0,
            refractory_ms: default_node_refractory(),
            automatic: false,
        }
    }

    pub fn with_automaticity(mut self, rate_bpm: f64) -> Self {
        self.rate_bpm = rate_bpm;
        self.automatic = true;
        self
    }

    pub fn with_refractory(mut self, refractory_ms: f64) -> Self {
        self.refractory_ms = refractory_ms;
        self
    }
}

/// Path entry in an anatomy table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSpec {
    pub id: String,
    pub from: String,
    pub to: String,
    pub delay_ms: f64,
    pub jitter_ms: f64,
    pub refractory_ms: f64,
    pub blocked: bool,
    pub probability: Option<f64>,
    /// Id of the mirrored edge forming a bidirectional tract
    pub reverse: Option<String>,
    pub amplitude: f64,
    pub polarity: f64,
    pub apd_ms: f64,
    pub decremental_step_ms: f64,
    pub wenckebach: bool,
}

impl Default for PathSpec {
    fn default() -> Self {
        Self {
            id: String::new(),
            from: String::new(),
            to: String::new(),
            delay_ms: 50.0,
            jitter_ms: 0.0,
            refractory_ms: 250.0,
            blocked: false,
            probability: None,
            reverse: None,
            amplitude: 1.0,
            polarity: 1.0,
            apd_ms: 250.0,
            decremental_step_ms: 0.0,
            wenckebach: false,
        }
    }
}

impl PathSpec {
    pub fn new(id: &str, from: &str, to: &str) -> Self {
        Self {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay_ms: f64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_refractory(mut self, refractory_ms: f64) -> Self {
        self.refractory_ms = refractory_ms;
        self
    }

    pub fn with_waveform(mut self, amplitude: f64, apd_ms: f64) -> Self {
        self.amplitude = amplitude;
        self.apd_ms = apd_ms;
        self
    }

    pub fn with_reverse(mut self, reverse: &str) -> Self {
        self.reverse = Some(reverse.to_string());
        self
    }

    pub fn blocked(mut self) -> Self {
        self.blocked = true;
        self
    }
}

/// A complete heart description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnatomyTable {
    pub nodes: Vec<NodeSpec>,
    pub paths: Vec<PathSpec>,

    /// Nodes whose joint activation counts as one ventricular beat
    #[serde(default)]
    pub ventricular: Vec<String>,
}

impl AnatomyTable {
    /// Empty table, for building small graphs in code.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, spec: NodeSpec) -> Self {
        self.nodes.push(spec);
        self
    }

    pub fn path(mut self, spec: PathSpec) -> Self {
        self.paths.push(spec);
        self
    }

    pub fn ventricular(mut self, ids: &[&str]) -> Self {
        self.ventricular = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    /// The default heart.
    ///
    /// ```text
    ///   SA ──► RA ──► AV ──► His ──┬─► LBB ──► LV ◄─┐
    ///    │      ▲                  └─► RBB ──► RV ◄─┘ (LV↔RV septal tract)
    ///    └─► LA  └──── accessory RA↔RV (blocked) ──┘
    /// ```
    pub fn standard() -> Self {
        Self::new()
            .node(NodeSpec::new("sa", [-3.0, -5.0, 1.0]).with_automaticity(72.0).with_refractory(250.0))
            .node(NodeSpec::new("ra", [-3.0, -2.0, 1.0]).with_refractory(200.0))
            .node(NodeSpec::new("la", [2.0, -4.0, -2.0]).with_refractory(200.0))
            .node(NodeSpec::new("av", [-1.0, 0.0, 0.0]).with_automaticity(45.0).with_refractory(350.0))
            .node(NodeSpec::new("his", [0.0, 1.0, 0.0]).with_refractory(300.0))
            .node(NodeSpec::new("lbb", [1.0, 2.0, -1.0]).with_refractory(300.0))
            .node(NodeSpec::new("rbb", [-1.0, 2.0, 1.0]).with_refractory(300.0))
            .node(NodeSpec::new("lv", [4.0, 5.0, -1.0]).with_automaticity(30.0).with_refractory(300.0))
            .node(NodeSpec::new("rv", [-1.0, 4.0, 3.0]).with_refractory(300.0))
            .path(PathSpec::new("sa_ra", "sa", "ra").with_delay(30.0).with_refractory(200.0).with_waveform(0.15, 120.0))
            .path(PathSpec::new("sa_la", "sa", "la").with_delay(50.0).with_refractory(200.0).with_waveform(0.10, 120.0))
            .path(PathSpec::new("ra_av", "ra", "av").with_delay(40.0).with_refractory(250.0).with_waveform(0.02, 80.0))
            .path(PathSpec::new("av_his", "av", "his").with_delay(90.0).with_refractory(350.0).with_waveform(0.01, 80.0))
            .path(PathSpec::new("his_lbb", "his", "lbb").with_delay(10.0).with_refractory(300.0).with_waveform(0.05, 60.0))
            .path(PathSpec::new("his_rbb", "his", "rbb").with_delay(10.0).with_refractory(300.0).with_waveform(0.05, 60.0))
            .path(PathSpec::new("lbb_lv", "lbb", "lv").with_delay(25.0).with_refractory(300.0).with_waveform(1.2, 280.0))
            .path(PathSpec::new("rbb_rv", "rbb", "rv").with_delay(25.0).with_refractory(300.0).with_waveform(0.6, 280.0))
            .path(
                PathSpec::new("lv_rv", "lv", "rv")
                    .with_delay(60.0)
                    .with_refractory(300.0)
                    .with_waveform(0.4, 280.0)
                    .with_reverse("rv_lv"),
            )
            .path(PathSpec::new("rv_lv", "rv", "lv").with_delay(60.0).with_refractory(300.0).with_waveform(0.4, 280.0))
            .path(
                PathSpec::new("ra_rv_acc", "ra", "rv")
                    .with_delay(20.0)
                    .with_refractory(280.0)
                    .with_waveform(0.5, 280.0)
                    .with_reverse("rv_ra_acc")
                    .blocked(),
            )
            .path(
                PathSpec::new("rv_ra_acc", "rv", "ra")
                    .with_delay(20.0)
                    .with_refractory(280.0)
                    .with_waveform(0.1, 120.0)
                    .blocked(),
            )
            .ventricular(&["lv", "rv"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_shape() {
        let table = AnatomyTable::standard();
        assert_eq!(table.nodes.len(), 9);
        assert_eq!(table.paths.len(), 12);
        assert_eq!(table.ventricular, vec!["lv".to_string(), "rv".to_string()]);
    }

    #[test]
    fn test_path_spec_defaults_from_json() {
        let spec: PathSpec = serde_json::from_str(r#"{"id":"x","from":"a","to":"b","delay_ms":12.0}"#).unwrap();
        assert_eq!(spec.delay_ms, 12.0);
        assert_eq!(spec.refractory_ms, 250.0);
        assert_eq!(spec.probability, None);
        assert!(!spec.blocked);
    }

    #[test]
    fn test_table_json_round_trip() {
        let table = AnatomyTable::standard();
        let json = serde_json::to_string(&table).unwrap();
        let back: AnatomyTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
