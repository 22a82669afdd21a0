//! ecgsim Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the rhythm engine
//! to run against a **wall clock** (tokio) or a **virtual clock** (simulation).
//!
//! # Core Concept
//!
//! The conduction engine is a pure state machine; everything around it is
//! intercepted here:
//! - Time (`now()`, `sleep()`)
//! - Randomness (`derive_entropy()` for jitter and probability gates)
//! - Collaborators (vitals source, rate/beat listener)
//!
//! By deriving all entropy from a single 64-bit seed, any arrhythmia run
//! becomes reproducible via its seed number.
//!
//! # Example
//!
//! ```ignore
//! use ecgsim_env::MonitorContext;
//!
//! async fn drive<Ctx: MonitorContext>(ctx: &Ctx, stepper: &mut RhythmStepper) {
//!     loop {
//!         ctx.sleep(Duration::from_millis(16)).await;
//!         stepper.advance(ctx.now().as_secs_f64() * 1000.0);
//!     }
//! }
//! ```

mod context;
mod entropy;
mod listener;
mod types;
mod tokio_impl;

pub use context::MonitorContext;
pub use entropy::{EntropySource, OsEntropy, ScriptedEntropy, SeededEntropy};
pub use listener::{RecordingListener, RhythmListener, StaticVitals, VitalsSource};
pub use types::Vitals;
pub use tokio_impl::TokioContext;
