//! Monitor Runtime - drives a [`RhythmStepper`] from an environment clock.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                MonitorRuntime                │
//! │  ┌────────────────────────────────────────┐  │
//! │  │        Context: MonitorContext         │  │
//! │  │  • sleep(frame) → paces the loop       │  │
//! │  │  • now()        → target sim time      │  │
//! │  └────────────────────────────────────────┘  │
//! │                      │                       │
//! │              RhythmStepper::advance          │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The same loop runs against a wall clock (`TokioContext`) or a virtual
//! clock whose `sleep` simply advances time.

use crate::rhythm_stepper::RhythmStepper;
use ecgsim_env::MonitorContext;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct MonitorRuntime<Ctx: MonitorContext> {
    context: Arc<Ctx>,
    stepper: RhythmStepper,
    frame: Duration,
    frame_count: u64,
}

impl<Ctx: MonitorContext> MonitorRuntime<Ctx> {
    /// Frame interval is taken from the stepper's config.
    pub fn new(context: Arc<Ctx>, stepper: RhythmStepper) -> Self {
        let frame = Duration::from_millis(stepper.config().frame_interval_ms.max(1));
        Self {
            context,
            stepper,
            frame,
            frame_count: 0,
        }
    }

    /// Context clock in ms.
    pub fn now_ms(&self) -> f64 {
        self.context.now().as_secs_f64() * 1000.0
    }

    /// Sleeps one frame, then brings the stepper up to the context clock.
    /// Returns the number of steps taken.
    pub async fn run_frame(&mut self) -> usize {
        self.context.sleep(self.frame).await;
        self.frame_count += 1;
        let steps = self.stepper.advance(self.now_ms());
        debug!(frame = self.frame_count, steps, "frame advanced");
        steps
    }

    /// Runs frames until `duration` of context time has elapsed.
    pub async fn run_for(&mut self, duration: Duration) -> usize {
        let end = self.context.now() + duration;
        let mut steps = 0;
        while self.context.now() < end {
            steps += self.run_frame().await;
        }
        steps
    }

    pub fn stepper(&self) -> &RhythmStepper {
        &self.stepper
    }

    pub fn stepper_mut(&mut self) -> &mut RhythmStepper {
        &mut self.stepper
    }

    pub fn context(&self) -> &Arc<Ctx> {
        &self.context
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn into_stepper(self) -> RhythmStepper {
        self.stepper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anatomy::AnatomyTable;
    use crate::config::MonitorConfig;
    use crate::conduction_graph::ConductionGraph;
    use ecgsim_env::{ScriptedEntropy, TokioContext};

    #[tokio::test]
    async fn test_runtime_follows_wall_clock() {
        let graph = ConductionGraph::new(&AnatomyTable::standard(), Box::new(ScriptedEntropy::constant(0.5))).unwrap();
        let stepper = RhythmStepper::new(graph, MonitorConfig::default());
        let mut runtime = MonitorRuntime::new(TokioContext::shared(), stepper);

        let steps = runtime.run_for(Duration::from_millis(60)).await;

        assert!(runtime.frame_count() >= 1);
        assert!(steps >= 10);
        assert_eq!(runtime.stepper().step_count() as usize, steps);
    }
}
