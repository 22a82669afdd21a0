//! SimWorld - the simulation harness container.

use crate::context::SimContext;
use crate::ledger::ActivationLedger;

use ecgsim_core::{
    AnatomyTable, ConductionGraph, GraphError, MonitorConfig, MonitorRuntime, ParamChange, RhythmStepper,
};
use ecgsim_env::MonitorContext;
use std::sync::Arc;
use std::time::Duration;

/// Entropy stream feeding the conduction graph.
pub const GRAPH_ENTROPY_STREAM: u64 = 1;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Simulated duration in seconds
    pub duration_secs: f64,

    /// Stepper configuration
    pub monitor: MonitorConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            duration_secs: 10.0,
            monitor: MonitorConfig::default(),
        }
    }
}

/// The SimWorld - a stepper on a virtual clock plus the ledger watching it.
pub struct SimWorld {
    pub config: SimConfig,
    context: Arc<SimContext>,
    runtime: MonitorRuntime<SimContext>,
    ledger: ActivationLedger,
    frame: Duration,
}

impl SimWorld {
    /// Builds a world around `table`, with graph entropy derived from the seed.
    pub fn new(config: SimConfig, table: &AnatomyTable) -> Result<Self, GraphError> {
        let context = SimContext::shared(config.seed);
        let graph = ConductionGraph::new(table, context.derive_entropy(GRAPH_ENTROPY_STREAM))?;
        let ledger = ActivationLedger::new(&graph);
        let stepper = RhythmStepper::new(graph, config.monitor.clone());
        let frame = Duration::from_millis(config.monitor.frame_interval_ms.max(1));

        Ok(Self {
            runtime: MonitorRuntime::new(Arc::clone(&context), stepper),
            context,
            ledger,
            frame,
            config,
        })
    }

    /// Standard heart with `changes` applied.
    pub fn standard(config: SimConfig, changes: &[ParamChange]) -> Result<Self, GraphError> {
        let mut world = Self::new(config, &AnatomyTable::standard())?;
        world.apply_changes(changes);
        Ok(world)
    }

    pub fn apply_changes(&mut self, changes: &[ParamChange]) -> usize {
        self.graph_mut().apply_changes(changes)
    }

    /// Advances the virtual clock by one frame and steps up to it.
    pub fn tick(&mut self) -> usize {
        self.context.advance_time(self.frame);
        self.catch_up()
    }

    /// Advances the virtual clock by `duration`, one frame at a time.
    pub fn run_for(&mut self, duration: Duration) -> usize {
        let end = self.context.now() + duration;
        let mut steps = 0;
        while self.context.now() < end {
            let remaining = end - self.context.now();
            self.context.advance_time(remaining.min(self.frame));
            steps += self.catch_up();
        }
        steps
    }

    /// Runs the configured duration.
    pub fn run(&mut self) -> usize {
        self.run_for(Duration::from_secs_f64(self.config.duration_secs.max(0.0)))
    }

    fn catch_up(&mut self) -> usize {
        let now_ms = self.context.now_ms();
        let ledger = &mut self.ledger;
        self.runtime
            .stepper_mut()
            .advance_observed(now_ms, |tick_ms, graph, report| ledger.record(tick_ms, graph, report))
    }

    pub fn stepper(&self) -> &RhythmStepper {
        self.runtime.stepper()
    }

    pub fn graph(&self) -> &ConductionGraph {
        self.runtime.stepper().graph()
    }

    pub fn graph_mut(&mut self) -> &mut ConductionGraph {
        self.runtime.stepper_mut().graph_mut()
    }

    pub fn ledger(&self) -> &ActivationLedger {
        &self.ledger
    }

    pub fn context(&self) -> &Arc<SimContext> {
        &self.context
    }

    /// Current simulation time in ms.
    pub fn time_ms(&self) -> f64 {
        self.context.now_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecgsim_core::{NodeField, PathField};

    #[test]
    fn test_sim_world_tick() {
        let mut world = SimWorld::standard(SimConfig::default(), &[]).unwrap();
        assert_eq!(world.time_ms(), 0.0);

        // 16 ms frame on a 5 ms step: steps at 0, 5, 10, 15
        assert_eq!(world.tick(), 4);
        assert_eq!(world.time_ms(), 16.0);
        assert_eq!(world.stepper().step_count(), 4);
    }

    #[test]
    fn test_sim_world_standard_heart() {
        let mut world = SimWorld::standard(SimConfig::default(), &[]).unwrap();
        world.run();

        assert_eq!(world.time_ms(), 10_000.0);
        assert_eq!(world.stepper().heart_rate(), Some(72));
        assert!(world.ledger().is_clean());
        assert!(world.ledger().fires("lv").len() >= 10);
    }

    #[test]
    fn test_sim_world_determinism() {
        let changes = vec![
            ParamChange::path("ra_av", PathField::Jitter(20.0)),
            ParamChange::path("ra_av", PathField::Probability(Some(0.8))),
            ParamChange::path("av_his", PathField::Jitter(15.0)),
        ];
        let config = SimConfig {
            seed: 1234,
            duration_secs: 8.0,
            ..SimConfig::default()
        };

        let mut w1 = SimWorld::standard(config.clone(), &changes).unwrap();
        let mut w2 = SimWorld::standard(config, &changes).unwrap();
        w1.run();
        w2.run();

        assert_eq!(w1.ledger(), w2.ledger());
        assert_eq!(w1.stepper().heart_rate(), w2.stepper().heart_rate());
    }

    #[test]
    fn test_unknown_changes_are_skipped() {
        let changes = vec![
            ParamChange::node("sa", NodeField::Rate(90.0)),
            ParamChange::node("nowhere", NodeField::ForceNext),
        ];
        let world = SimWorld::standard(SimConfig::default(), &changes).unwrap();
        assert_eq!(world.graph().node("sa").unwrap().rate_bpm, 90.0);
    }

    #[tokio::test]
    async fn test_runtime_on_virtual_clock() {
        let ctx = SimContext::shared(3);
        let graph = ConductionGraph::new(&AnatomyTable::standard(), ctx.derive_entropy(GRAPH_ENTROPY_STREAM)).unwrap();
        let stepper = RhythmStepper::new(graph, MonitorConfig::default());
        let mut runtime = MonitorRuntime::new(Arc::clone(&ctx), stepper);

        runtime.run_for(Duration::from_secs(5)).await;

        // 313 frames of 16 ms reach 5008 ms
        assert_eq!(runtime.frame_count(), 313);
        assert_eq!(runtime.stepper().step_count(), 1002);
        assert!(runtime.stepper().heart_rate().is_some());
    }
}
