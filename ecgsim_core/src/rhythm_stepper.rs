//! Rhythm Stepper - drives the conduction graph at a fixed simulated step.
//!
//! Each step:
//! 1. `graph.tick(now)` resolves firing and conduction
//! 2. the ventricular detector watches the report for a completed beat,
//!    which feeds the rate estimator and the listeners
//! 3. one sample per lead is rendered at `now - render_delay` and appended
//!    to the output streams
//!
//! Simulated time is derived from the step counter (`step_index * step_ms`)
//! so it never drifts, however `advance` is called.

use crate::conduction_graph::{ConductionGraph, TickReport};
use crate::config::MonitorConfig;
use crate::heart_rate::{HeartRateEstimator, VentricularDetector};
use crate::lead_projection::LeadVector;
use crate::sample_stream::LeadStreams;
use ecgsim_env::{RhythmListener, StaticVitals, Vitals, VitalsSource};
use tracing::{debug, info, warn};

pub struct RhythmStepper {
    graph: ConductionGraph,
    config: MonitorConfig,
    step_index: u64,
    streams: LeadStreams,
    detector: VentricularDetector,
    estimator: HeartRateEstimator,
    current_rr_ms: f64,
    heart_rate: Option<u32>,
    last_beat_ms: Option<f64>,
    beat_count: u64,
    listeners: Vec<Box<dyn RhythmListener>>,
    vitals: Box<dyn VitalsSource>,
}

impl RhythmStepper {
    /// Creates a stepper at simulated time zero.
    ///
    /// A config that fails [`MonitorConfig::validate`] is replaced by the
    /// defaults.
    pub fn new(graph: ConductionGraph, config: MonitorConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                warn!(error = %e, "invalid monitor config, using defaults");
                MonitorConfig::default()
            }
        };
        let detector = VentricularDetector::new(graph.ventricular_nodes(), config.ventricular_window_ms);
        Self {
            streams: LeadStreams::new(config.stream_capacity),
            estimator: HeartRateEstimator::new(config.rate_intervals),
            current_rr_ms: config.default_rr_ms,
            detector,
            graph,
            config,
            step_index: 0,
            heart_rate: None,
            last_beat_ms: None,
            beat_count: 0,
            listeners: Vec::new(),
            vitals: Box::new(StaticVitals(Vitals::default())),
        }
    }

    pub fn with_vitals(mut self, vitals: Box<dyn VitalsSource>) -> Self {
        self.vitals = vitals;
        self
    }

    pub fn add_listener(&mut self, listener: Box<dyn RhythmListener>) {
        self.listeners.push(listener);
    }

    /// Simulated time of the next step (ms).
    pub fn next_step_ms(&self) -> f64 {
        self.step_index as f64 * self.config.step_ms
    }

    /// Steps until simulated time has caught up with `until_ms`.
    ///
    /// At most `max_catch_up_steps` steps run per call; a larger backlog is
    /// skipped rather than replayed. Returns the number of steps taken.
    pub fn advance(&mut self, until_ms: f64) -> usize {
        self.advance_observed(until_ms, |_, _, _| {})
    }

    /// [`advance`](Self::advance), handing every step's time and report to
    /// `observe` as it happens.
    pub fn advance_observed<F>(&mut self, until_ms: f64, mut observe: F) -> usize
    where
        F: FnMut(f64, &ConductionGraph, &TickReport),
    {
        let mut steps = 0;
        while self.next_step_ms() <= until_ms {
            if steps >= self.config.max_catch_up_steps {
                let resume = ((until_ms / self.config.step_ms).floor() as u64).saturating_add(1);
                warn!(
                    from_ms = self.next_step_ms(),
                    to_ms = resume as f64 * self.config.step_ms,
                    "catch-up limit reached, skipping simulated time"
                );
                self.step_index = resume;
                break;
            }
            let now = self.next_step_ms();
            let report = self.step();
            observe(now, &self.graph, &report);
            steps += 1;
        }
        steps
    }

    /// Runs exactly one step and returns what fired.
    pub fn step(&mut self) -> TickReport {
        let now = self.next_step_ms();
        let report = self.graph.tick(now);

        match self.detector.observe(&report, now) {
            Some(beat) => self.record_beat(beat),
            None => self.check_asystole(now),
        }

        let frame = self.graph.lead_sample(now - self.config.render_delay_ms, self.current_rr_ms);
        self.streams.push_frame(&frame);
        self.step_index += 1;
        report
    }

    fn record_beat(&mut self, at: f64) {
        self.last_beat_ms = Some(at);
        self.beat_count += 1;

        let spo2 = self.vitals.vitals().spo2;
        for listener in self.listeners.iter_mut() {
            listener.on_ventricular_beat(spo2);
        }

        let estimate = self.estimator.push_beat(at);
        if let Some(rr) = self.estimator.latest_interval() {
            self.current_rr_ms = rr;
        }
        debug!(at, rr_ms = self.current_rr_ms, ?estimate, "ventricular beat");

        if let Some(bpm) = estimate {
            self.heart_rate = Some(bpm);
            for listener in self.listeners.iter_mut() {
                listener.on_heart_rate_update(bpm);
            }
        }
    }

    /// Reports a rate of zero once when no beat has completed within the
    /// ventricular window.
    fn check_asystole(&mut self, now: f64) {
        if self.heart_rate == Some(0) {
            return;
        }
        let silent_since = self.last_beat_ms.unwrap_or(0.0);
        if now - silent_since <= self.detector.window_ms() {
            return;
        }

        info!(now, silent_since, "no ventricular activity, reporting asystole");
        self.heart_rate = Some(0);
        self.estimator.clear();
        for listener in self.listeners.iter_mut() {
            listener.on_heart_rate_update(0);
        }
    }

    pub fn graph(&self) -> &ConductionGraph {
        &self.graph
    }

    /// Mutable graph access for the parameterization API.
    pub fn graph_mut(&mut self) -> &mut ConductionGraph {
        &mut self.graph
    }

    pub fn streams(&self) -> &LeadStreams {
        &self.streams
    }

    /// Latest rate estimate; `None` before two beats.
    pub fn heart_rate(&self) -> Option<u32> {
        self.heart_rate
    }

    pub fn current_rr_ms(&self) -> f64 {
        self.current_rr_ms
    }

    pub fn beat_count(&self) -> u64 {
        self.beat_count
    }

    pub fn step_count(&self) -> u64 {
        self.step_index
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Most recently rendered frame.
    pub fn latest_frame(&self) -> Option<LeadVector> {
        let mut frame = LeadVector::zeros();
        for (slot, lead) in frame.0.iter_mut().zip(crate::lead_projection::Lead::ALL) {
            *slot = self.streams.stream(lead).latest()?;
        }
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anatomy::{AnatomyTable, NodeSpec, PathSpec};
    use crate::lead_projection::Lead;
    use ecgsim_env::{RecordingListener, ScriptedEntropy};
    use std::sync::{Arc, Mutex};

    struct SharedListener(Arc<Mutex<RecordingListener>>);

    impl RhythmListener for SharedListener {
        fn on_heart_rate_update(&mut self, bpm: u32) {
            self.0.lock().unwrap().on_heart_rate_update(bpm);
        }

        fn on_ventricular_beat(&mut self, spo2: f64) {
            self.0.lock().unwrap().on_ventricular_beat(spo2);
        }
    }

    fn stepper(table: &AnatomyTable, config: MonitorConfig) -> (RhythmStepper, Arc<Mutex<RecordingListener>>) {
        let graph = ConductionGraph::new(table, Box::new(ScriptedEntropy::constant(0.5))).unwrap();
        let mut stepper = RhythmStepper::new(graph, config);
        let log = Arc::new(Mutex::new(RecordingListener::default()));
        stepper.add_listener(Box::new(SharedListener(Arc::clone(&log))));
        (stepper, log)
    }

    #[test]
    fn test_standard_heart_sinus_rate() {
        let (mut stepper, log) = stepper(&AnatomyTable::standard(), MonitorConfig::default());

        for second in 1..=10 {
            stepper.advance(second as f64 * 1000.0);
        }
        assert_eq!(stepper.step_count(), 2001);

        // 72 bpm on a 5 ms grid gives an 835 ms RR
        assert_eq!(stepper.heart_rate(), Some(72));
        assert_eq!(stepper.current_rr_ms(), 835.0);

        let log = log.lock().unwrap();
        assert_eq!(log.beats.len() as u64, stepper.beat_count());
        assert!(log.beats.iter().all(|&spo2| spo2 == Vitals::default().spo2));
        assert_eq!(log.rates.last(), Some(&72));
    }

    #[test]
    fn test_streams_fill_to_capacity() {
        let config = MonitorConfig {
            stream_capacity: 100,
            ..MonitorConfig::default()
        };
        let (mut stepper, _) = stepper(&AnatomyTable::standard(), config);
        stepper.advance(2000.0);

        assert_eq!(stepper.streams().len(), 100);
        assert_eq!(stepper.streams().stream(Lead::II).len(), 100);
        assert!(stepper.latest_frame().is_some());
    }

    #[test]
    fn test_signal_appears_after_render_delay() {
        let (mut stepper, _) = stepper(&AnatomyTable::standard(), MonitorConfig::default());
        stepper.advance(115.0);
        let early = stepper.streams().stream(Lead::II).snapshot();
        assert_eq!(early.len(), 24);
        assert!(early.iter().all(|&v| v == 0.0));

        stepper.advance(1500.0);
        let later = stepper.streams().stream(Lead::II).snapshot();
        assert!(later.iter().any(|v| v.abs() > 0.01));
    }

    #[test]
    fn test_asystole_reported_once() {
        let table = AnatomyTable::new()
            .node(NodeSpec::new("sa", [0.0, 0.0, 0.0]).with_automaticity(60.0))
            .node(NodeSpec::new("lv", [1.0, 1.0, 0.0]))
            .path(PathSpec::new("sa_lv", "sa", "lv").blocked())
            .ventricular(&["lv"]);
        let (mut stepper, log) = stepper(&table, MonitorConfig::default());

        stepper.advance(4000.0);
        assert_eq!(stepper.heart_rate(), None);

        stepper.advance(12_000.0);
        assert_eq!(stepper.heart_rate(), Some(0));
        assert_eq!(log.lock().unwrap().rates, vec![0]);
    }

    #[test]
    fn test_catch_up_is_capped() {
        let config = MonitorConfig {
            max_catch_up_steps: 10,
            ..MonitorConfig::default()
        };
        let (mut stepper, _) = stepper(&AnatomyTable::standard(), config);

        assert_eq!(stepper.advance(1000.0), 10);
        assert_eq!(stepper.next_step_ms(), 1005.0);
        assert_eq!(stepper.advance(1004.0), 0);
        assert_eq!(stepper.advance(1005.0), 1);
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let config = MonitorConfig {
            step_ms: 0.0,
            ..MonitorConfig::default()
        };
        let (mut stepper, _) = stepper(&AnatomyTable::standard(), config);

        assert_eq!(stepper.config(), &MonitorConfig::default());
        assert_eq!(stepper.advance(100.0), 21);
        assert_eq!(stepper.next_step_ms(), 105.0);
    }

    #[test]
    fn test_parameter_change_through_stepper() {
        let (mut stepper, _) = stepper(&AnatomyTable::standard(), MonitorConfig::default());
        stepper.advance(3000.0);

        stepper
            .graph_mut()
            .set_path_field("av_his", crate::params::PathField::Blocked(true));
        let beats = stepper.beat_count();
        stepper.advance(4500.0);

        // The ventricular escape rhythm is too slow to fire within 1.5 s
        assert_eq!(stepper.beat_count(), beats);
    }
}
