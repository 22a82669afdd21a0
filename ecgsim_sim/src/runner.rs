//! Scenario runner - executes verification scenarios against the engine.

use crate::ledger::ActivationLedger;
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld};

use ecgsim_core::{AnatomyTable, Lead, MonitorConfig, NodeSpec, ParamChange, PathField, PathSpec};
use tracing::{debug, info};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total simulation steps executed
    pub total_steps: u64,

    /// Final simulation time in ms
    pub final_time_ms: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    /// Node activations recorded
    pub nodes_fired: usize,

    /// Path conductions recorded
    pub paths_conducted: usize,

    /// Ventricular beats detected
    pub beats: u64,

    /// Final rate estimate
    pub heart_rate: Option<u32>,

    /// Ledger invariant violations
    pub violations: usize,
}

/// Runs verification scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Simulated duration in seconds
    duration_secs: f64,

    /// Stepper configuration
    monitor: MonitorConfig,
}

impl ScenarioRunner {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            duration_secs: 10.0,
            monitor: MonitorConfig::default(),
        }
    }

    /// Sets the simulated duration. Scenarios that need a minimum number of
    /// beats extend it as required.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn with_config(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        debug!("  {}", scenario.description());

        let outcome = match scenario {
            ScenarioId::SinusAutomaticity => self.run_sinus_automaticity(),
            ScenarioId::RefractoryExclusion => self.run_refractory_exclusion(),
            ScenarioId::Collision => self.run_collision(),
            ScenarioId::ReverseExclusion => self.run_reverse_exclusion(),
            ScenarioId::Wenckebach => self.run_wenckebach(),
            ScenarioId::JitterDeterminism => self.run_jitter_determinism(),
            ScenarioId::FullHeartSinus => self.run_full_heart_sinus(),
            ScenarioId::CompleteHeartBlock => self.run_complete_heart_block(),
        };

        match outcome {
            Ok((world, failures)) => self.finish(scenario, &world, failures),
            Err(reason) => ScenarioResult {
                scenario,
                seed: self.seed,
                passed: false,
                total_steps: 0,
                final_time_ms: 0.0,
                failure_reason: Some(reason),
                metrics: ScenarioMetrics::default(),
            },
        }
    }

    fn config(&self, min_secs: f64) -> SimConfig {
        SimConfig {
            seed: self.seed,
            duration_secs: self.duration_secs.max(min_secs),
            monitor: self.monitor.clone(),
        }
    }

    fn world(&self, min_secs: f64, table: &AnatomyTable) -> Result<SimWorld, String> {
        let mut world = SimWorld::new(self.config(min_secs), table).map_err(|e| e.to_string())?;
        world.run();
        Ok(world)
    }

    fn standard_world(&self, min_secs: f64, changes: &[ParamChange]) -> Result<SimWorld, String> {
        let mut world = SimWorld::standard(self.config(min_secs), changes).map_err(|e| e.to_string())?;
        world.run();
        Ok(world)
    }

    fn finish(&self, scenario: ScenarioId, world: &SimWorld, mut failures: Vec<String>) -> ScenarioResult {
        let ledger = world.ledger();
        failures.extend(ledger.violations().iter().cloned());

        let metrics = ScenarioMetrics {
            nodes_fired: ledger.total_fires(),
            paths_conducted: ledger.total_conductions(),
            beats: world.stepper().beat_count(),
            heart_rate: world.stepper().heart_rate(),
            violations: ledger.violations().len(),
        };

        info!(
            "✓ {} complete: {} activations, {} conductions, {} beats",
            scenario.name(),
            metrics.nodes_fired,
            metrics.paths_conducted,
            metrics.beats
        );

        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: failures.is_empty(),
            total_steps: world.stepper().step_count(),
            final_time_ms: world.time_ms(),
            failure_reason: (!failures.is_empty()).then(|| failures.join("; ")),
            metrics,
        }
    }

    /// ECG-001: SA at 80 bpm, refractory 200; one path, delay 20, refractory 250.
    ///
    /// **Assertion**: SA fires at every multiple of 750 ms, the path conducts
    /// 20 ms later, and each conduction is reported by the tick at its time.
    fn run_sinus_automaticity(&self) -> Result<(SimWorld, Vec<String>), String> {
        let table = AnatomyTable::new()
            .node(NodeSpec::new("sa", [0.0, 0.0, 0.0]).with_automaticity(80.0).with_refractory(200.0))
            .node(NodeSpec::new("a", [1.0, 1.0, 0.0]).with_refractory(200.0))
            .path(PathSpec::new("sa_a", "sa", "a").with_delay(20.0).with_refractory(250.0))
            .ventricular(&["a"]);
        let world = self.world(3.0, &table)?;
        let ledger = world.ledger();
        let mut failures = Vec::new();

        for (k, fire) in ledger.fires("sa").iter().enumerate() {
            let expected = k as f64 * 750.0;
            if fire.at != expected {
                failures.push(format!("sa firing #{} at {} ms, expected {}", k, fire.at, expected));
                break;
            }
        }
        let conductions = ledger.conductions("sa_a");
        let completed = completed_fires(ledger, "sa", 20.0, world.time_ms()).len();
        if conductions.len() != completed {
            failures.push(format!("{} sa firings but {} conductions", completed, conductions.len()));
        }
        for (k, c) in conductions.iter().enumerate() {
            let expected = k as f64 * 750.0 + 20.0;
            if c.at != expected || c.tick_ms != c.at {
                failures.push(format!(
                    "conduction #{} at {} ms reported at {} ms, expected {}",
                    k, c.at, c.tick_ms, expected
                ));
                break;
            }
        }

        Ok((world, failures))
    }

    /// ECG-002: sinus at 180 bpm into an AV node with 350 ms refractory.
    ///
    /// **Assertion**: no node fires inside its refractory window; AV follows
    /// fewer than every sinus beat; ventricles settle near 90 bpm.
    fn run_refractory_exclusion(&self) -> Result<(SimWorld, Vec<String>), String> {
        let changes = [ParamChange::node("sa", ecgsim_core::NodeField::Rate(180.0))];
        let world = self.standard_world(5.0, &changes)?;
        let ledger = world.ledger();
        let mut failures = Vec::new();

        let sa = ledger.fires("sa").len();
        let av = ledger.fires("av").len();
        if av >= sa {
            failures.push(format!("AV fired {} times for {} sinus beats", av, sa));
        }
        match world.stepper().heart_rate() {
            Some(bpm) if (85..=95).contains(&bpm) => {}
            other => failures.push(format!("expected 2:1 ventricular rate near 90, got {:?}", other)),
        }

        Ok((world, failures))
    }

    /// ECG-003: fast (15 ms) and slow (40 ms) paths into one target.
    ///
    /// **Assertion**: target fires once per source beat, 15 ms after it, and
    /// the slow path never conducts.
    fn run_collision(&self) -> Result<(SimWorld, Vec<String>), String> {
        let table = AnatomyTable::new()
            .node(NodeSpec::new("src", [0.0, 0.0, 0.0]).with_automaticity(60.0))
            .node(NodeSpec::new("target", [2.0, 1.0, 0.0]).with_refractory(100.0))
            .path(PathSpec::new("slow", "src", "target").with_delay(40.0))
            .path(PathSpec::new("fast", "src", "target").with_delay(15.0))
            .ventricular(&["target"]);
        let world = self.world(3.0, &table)?;
        let ledger = world.ledger();
        let mut failures = Vec::new();

        let target: Vec<f64> = ledger.fires("target").iter().map(|a| a.at).collect();
        let expected: Vec<f64> = completed_fires(ledger, "src", 15.0, world.time_ms())
            .iter()
            .map(|t| t + 15.0)
            .collect();
        if target != expected {
            failures.push(format!("target fired at {:?}, expected {:?}", target, expected));
        }
        if !ledger.conductions("slow").is_empty() {
            failures.push(format!("slow path conducted {} times", ledger.conductions("slow").len()));
        }

        Ok((world, failures))
    }

    /// ECG-004: a ↔ b tract, a paced at 60 bpm.
    ///
    /// **Assertion**: forward edge conducts every beat; reverse never does.
    fn run_reverse_exclusion(&self) -> Result<(SimWorld, Vec<String>), String> {
        let table = AnatomyTable::new()
            .node(NodeSpec::new("a", [0.0, 0.0, 0.0]).with_automaticity(60.0).with_refractory(50.0))
            .node(NodeSpec::new("b", [3.0, 2.0, 0.0]).with_refractory(50.0))
            .path(
                PathSpec::new("a_b", "a", "b")
                    .with_delay(20.0)
                    .with_refractory(200.0)
                    .with_reverse("b_a"),
            )
            .path(PathSpec::new("b_a", "b", "a").with_delay(20.0).with_refractory(200.0))
            .ventricular(&["b"]);
        let world = self.world(3.0, &table)?;
        let ledger = world.ledger();
        let mut failures = Vec::new();

        let beats = completed_fires(ledger, "a", 20.0, world.time_ms()).len();
        if ledger.conductions("a_b").len() != beats {
            failures.push(format!(
                "forward edge conducted {} of {} beats",
                ledger.conductions("a_b").len(),
                beats
            ));
        }
        if !ledger.conductions("b_a").is_empty() {
            failures.push(format!("reverse edge echoed {} times", ledger.conductions("b_a").len()));
        }

        Ok((world, failures))
    }

    /// ECG-005: delay 100, step 40, refractory 250, source at 60 bpm.
    ///
    /// **Assertion**: conduction pattern repeats 3 conducted, 1 dropped.
    fn run_wenckebach(&self) -> Result<(SimWorld, Vec<String>), String> {
        let mut decremental = PathSpec::new("av_his", "av", "his")
            .with_delay(100.0)
            .with_refractory(250.0);
        decremental.wenckebach = true;
        decremental.decremental_step_ms = 40.0;

        let table = AnatomyTable::new()
            .node(NodeSpec::new("av", [0.0, 0.0, 0.0]).with_automaticity(60.0).with_refractory(200.0))
            .node(NodeSpec::new("his", [0.0, 1.0, 0.0]).with_refractory(200.0))
            .path(decremental)
            .ventricular(&["his"]);
        let world = self.world(8.0, &table)?;
        let ledger = world.ledger();

        let pattern = conduction_pattern(ledger, "av", "av_his", 1000.0, world.time_ms());
        let expected: Vec<bool> = (0..pattern.len()).map(|i| i % 4 != 3).collect();
        let failures = if pattern == expected {
            Vec::new()
        } else {
            vec![format!("conduction pattern {:?}, expected 3:1 drop cycle", pattern)]
        };

        Ok((world, failures))
    }

    /// ECG-006: jittered, probabilistic AV conduction.
    ///
    /// **Assertion**: two runs from the same seed produce identical ledgers.
    fn run_jitter_determinism(&self) -> Result<(SimWorld, Vec<String>), String> {
        let changes = [
            ParamChange::path("sa_ra", PathField::Jitter(10.0)),
            ParamChange::path("ra_av", PathField::Jitter(20.0)),
            ParamChange::path("ra_av", PathField::Probability(Some(0.85))),
            ParamChange::path("av_his", PathField::Jitter(25.0)),
        ];
        let first = self.standard_world(5.0, &changes)?;
        let second = self.standard_world(5.0, &changes)?;

        let failures = if first.ledger() == second.ledger() {
            Vec::new()
        } else {
            vec!["same seed produced different activation histories".to_string()]
        };

        Ok((first, failures))
    }

    /// ECG-007: standard heart, untouched.
    ///
    /// **Assertion**: 72 bpm, RR 835 ms on the 5 ms grid, visible signal on lead II.
    fn run_full_heart_sinus(&self) -> Result<(SimWorld, Vec<String>), String> {
        let world = self.standard_world(5.0, &[])?;
        let stepper = world.stepper();
        let mut failures = Vec::new();

        if stepper.heart_rate() != Some(72) {
            failures.push(format!("heart rate {:?}, expected 72", stepper.heart_rate()));
        }
        if stepper.current_rr_ms() != 835.0 {
            failures.push(format!("RR {} ms, expected 835", stepper.current_rr_ms()));
        }
        let peak = stepper
            .streams()
            .stream(Lead::II)
            .snapshot()
            .iter()
            .fold(0.0_f64, |m, v| m.max(v.abs()));
        if peak < 0.05 {
            failures.push(format!("lead II peak {:.4} mV, expected a visible complex", peak));
        }

        Ok((world, failures))
    }

    /// ECG-008: AV-His blocked.
    ///
    /// **Assertion**: atria keep sinus rate, ventricles escape at 30 bpm.
    fn run_complete_heart_block(&self) -> Result<(SimWorld, Vec<String>), String> {
        let changes = [ParamChange::path("av_his", PathField::Blocked(true))];
        let world = self.standard_world(7.0, &changes)?;
        let mut failures = Vec::new();

        if !world.ledger().conductions("av_his").is_empty() {
            failures.push("blocked AV-His path conducted".to_string());
        }
        if world.stepper().heart_rate() != Some(30) {
            failures.push(format!(
                "ventricular rate {:?}, expected escape at 30",
                world.stepper().heart_rate()
            ));
        }

        Ok((world, failures))
    }
}

/// Firing times of `node` whose consequences (`lag_ms` later) fall inside
/// the simulated run.
fn completed_fires(ledger: &ActivationLedger, node: &str, lag_ms: f64, end_ms: f64) -> Vec<f64> {
    ledger
        .fires(node)
        .iter()
        .map(|a| a.at)
        .filter(|at| at + lag_ms <= end_ms)
        .collect()
}

/// For each completed firing of `source`, whether `path` conducted within
/// the following `window_ms`.
fn conduction_pattern(ledger: &ActivationLedger, source: &str, path: &str, window_ms: f64, end_ms: f64) -> Vec<bool> {
    let conductions = ledger.conductions(path);
    completed_fires(ledger, source, window_ms, end_ms)
        .into_iter()
        .map(|fire| {
            conductions
                .iter()
                .any(|c| c.at > fire && c.at < fire + window_ms)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scenarios_pass() {
        let runner = ScenarioRunner::new(42);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(
                result.passed,
                "{} failed: {:?}",
                scenario.name(),
                result.failure_reason
            );
        }
    }

    #[test]
    fn test_short_duration_is_extended() {
        let result = ScenarioRunner::new(7)
            .with_duration(1.0)
            .run(ScenarioId::CompleteHeartBlock);
        assert!(result.final_time_ms >= 7000.0);
        assert_eq!(result.metrics.heart_rate, Some(30));
    }

    #[test]
    fn test_metrics_collected() {
        let result = ScenarioRunner::new(1).run(ScenarioId::SinusAutomaticity);
        assert!(result.passed);
        assert_eq!(result.metrics.violations, 0);
        assert!(result.metrics.nodes_fired > 0);
        assert_eq!(result.total_steps, 2001);
    }
}
