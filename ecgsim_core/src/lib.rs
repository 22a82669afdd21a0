//! ecgsim Core - cardiac conduction network and twelve-lead signal synthesis
//!
//! The heart is modelled as a fixed directed graph:
//! 1. **Nodes**: pacemaker and conduction-system sites with automaticity and refractoriness
//! 2. **Paths**: conduction edges with delay, gating (block, probability,
//!    reverse pairing, Wenckebach) and a closed-form voltage shape
//! 3. **Leads**: each path projects its dipole onto twelve leads through
//!    weights computed once from anatomy
//!
//! A [`RhythmStepper`] ticks the [`ConductionGraph`] at a fixed simulated step,
//! renders one sample per lead and estimates heart rate from ventricular
//! activation. [`MonitorRuntime`] paces the stepper from an environment clock.

pub mod anatomy;
pub mod conduction_graph;
pub mod conduction_node;
pub mod conduction_path;
pub mod config;
pub mod heart_rate;
pub mod lead_projection;
pub mod monitor_runtime;
pub mod params;
pub mod rhythm_stepper;
pub mod sample_stream;

// Re-export key types for convenience
pub use anatomy::{AnatomyTable, NodeSpec, PathSpec};
pub use conduction_graph::{ConductionGraph, GraphError, ScheduledConduction, TickReport};
pub use conduction_node::{Node, NodeIndex};
pub use conduction_path::{Gate, Path, PathIndex, REVERSE_RECOVERY_FACTOR};
pub use config::{ConfigError, MonitorConfig};
pub use heart_rate::{HeartRateEstimator, VentricularDetector};
pub use lead_projection::{Lead, LeadVector, LEAD_COUNT};
pub use monitor_runtime::MonitorRuntime;
pub use params::{load_param_changes, NodeField, ParamChange, PathField};
pub use rhythm_stepper::RhythmStepper;
pub use sample_stream::{LeadStreams, SampleStream};
