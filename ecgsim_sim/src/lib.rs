//! ecgsim Deterministic Simulation Harness
//!
//! This crate runs the conduction engine in a fully controlled environment
//! where every run is reproducible from a single seed.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted:
//! - **Time**: a virtual clock advanced frame by frame
//! - **Randomness**: jitter and probability draws come from seeded ChaCha8 streams
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimContext (virtual clock + seeded entropy)          │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                            │                                │
//! │  ┌─────────────────────────▼────────────────────────────┐   │
//! │  │ RhythmStepper → ConductionGraph → twelve lead streams│   │
//! │  └─────────────────────────┬────────────────────────────┘   │
//! │                            │ every TickReport               │
//! │  ┌─────────────────────────▼────────────────────────────┐   │
//! │  │ ActivationLedger (ground-truth history + invariants) │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use ecgsim_sim::{SimConfig, SimWorld};
//!
//! let mut world = SimWorld::standard(SimConfig::default(), &[])?;
//! world.run();
//! assert!(world.ledger().is_clean());
//! ```

mod context;
mod exporter;
mod ledger;
mod runner;
mod world;
pub mod scenarios;

pub use context::SimContext;
pub use exporter::{LeadStrip, StripExport};
pub use ledger::{Activation, ActivationLedger};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{SimConfig, SimWorld, GRAPH_ENTROPY_STREAM};
