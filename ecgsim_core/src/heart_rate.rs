//! Beat detection and heart-rate estimation.

use crate::conduction_node::NodeIndex;
use crate::conduction_graph::TickReport;
use std::collections::VecDeque;

/// Default number of RR intervals the estimator keeps.
pub const DEFAULT_RATE_INTERVALS: usize = 6;

/// Default window within which all ventricular nodes must fire (ms).
pub const DEFAULT_VENTRICULAR_WINDOW_MS: f64 = 5000.0;

/// Median of a set of intervals. For even counts the upper-middle element is
/// used. Returns `None` when empty.
pub fn median_interval(intervals: &[f64]) -> Option<f64> {
    if intervals.is_empty() {
        return None;
    }
    let mut sorted = intervals.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(sorted[sorted.len() / 2])
}

/// Median-filtered heart rate over a rolling window of beat timestamps.
#[derive(Debug, Clone)]
pub struct HeartRateEstimator {
    max_intervals: usize,
    beats: VecDeque<f64>,
}

impl Default for HeartRateEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_INTERVALS)
    }
}

impl HeartRateEstimator {
    /// Keeps at most `max_intervals` intervals (`max_intervals + 1` beats).
    pub fn new(max_intervals: usize) -> Self {
        let max_intervals = max_intervals.max(1);
        Self {
            max_intervals,
            beats: VecDeque::with_capacity(max_intervals + 1),
        }
    }

    /// Records a beat timestamp (ms). Returns the updated rate estimate.
    pub fn push_beat(&mut self, at: f64) -> Option<u32> {
        self.beats.push_back(at);
        while self.beats.len() > self.max_intervals + 1 {
            self.beats.pop_front();
        }
        self.bpm()
    }

    /// Consecutive beat-to-beat intervals, oldest first.
    pub fn intervals(&self) -> Vec<f64> {
        self.beats
            .iter()
            .zip(self.beats.iter().skip(1))
            .map(|(a, b)| b - a)
            .collect()
    }

    /// Most recent RR interval.
    pub fn latest_interval(&self) -> Option<f64> {
        let n = self.beats.len();
        (n >= 2).then(|| self.beats[n - 1] - self.beats[n - 2])
    }

    /// `round(60000 / median RR)`; `None` until two beats are recorded.
    pub fn bpm(&self) -> Option<u32> {
        let median = median_interval(&self.intervals())?;
        if median <= 0.0 {
            return None;
        }
        Some((60_000.0 / median).round() as u32)
    }

    pub fn beat_count(&self) -> usize {
        self.beats.len()
    }

    pub fn clear(&mut self) {
        self.beats.clear();
    }
}

/// Declares a ventricular beat once every designated node has fired within
/// the coincidence window.
#[derive(Debug, Clone)]
pub struct VentricularDetector {
    members: Vec<NodeIndex>,
    seen: Vec<Option<f64>>,
    window_ms: f64,
}

impl VentricularDetector {
    pub fn new(members: &[NodeIndex], window_ms: f64) -> Self {
        Self {
            members: members.to_vec(),
            seen: vec![None; members.len()],
            window_ms,
        }
    }

    /// Feeds a tick report observed at `now`. Returns the beat timestamp
    /// (latest member firing) when the set completes.
    pub fn observe(&mut self, report: &TickReport, now: f64) -> Option<f64> {
        if self.members.is_empty() {
            return None;
        }

        for fired in &report.fired_nodes {
            if let Some(slot) = self.members.iter().position(|m| *m == fired.node) {
                self.seen[slot] = Some(fired.at);
            }
        }

        for slot in self.seen.iter_mut() {
            if slot.is_some_and(|at| now - at > self.window_ms) {
                *slot = None;
            }
        }

        if self.seen.iter().all(Option::is_some) {
            let beat = self.seen.iter().flatten().copied().fold(f64::NEG_INFINITY, f64::max);
            self.reset();
            return Some(beat);
        }
        None
    }

    pub fn reset(&mut self) {
        self.seen.iter_mut().for_each(|s| *s = None);
    }

    pub fn window_ms(&self) -> f64 {
        self.window_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conduction_graph::FiredNode;

    fn fired(nodes: &[(usize, f64)]) -> TickReport {
        TickReport {
            fired_nodes: nodes
                .iter()
                .map(|&(n, at)| FiredNode { node: NodeIndex(n), at })
                .collect(),
            conducted_paths: Vec::new(),
        }
    }

    #[test]
    fn test_median_upper_middle() {
        assert_eq!(median_interval(&[]), None);
        assert_eq!(median_interval(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median_interval(&[4.0, 1.0, 3.0, 2.0]), Some(3.0));
    }

    #[test]
    fn test_estimator_rounds_median_rate() {
        let mut estimator = HeartRateEstimator::default();
        let mut rate = None;
        for at in [0.0, 800.0, 1580.0, 2400.0, 3190.0, 4000.0, 4800.0] {
            rate = estimator.push_beat(at);
        }
        // Intervals 800,780,820,790,810,800 -> median 800
        assert_eq!(rate, Some(75));
        assert_eq!(estimator.intervals().len(), 6);
    }

    #[test]
    fn test_estimator_needs_two_beats() {
        let mut estimator = HeartRateEstimator::default();
        assert_eq!(estimator.push_beat(100.0), None);
        assert_eq!(estimator.push_beat(1100.0), Some(60));
        assert_eq!(estimator.latest_interval(), Some(1000.0));
    }

    #[test]
    fn test_estimator_window_slides() {
        let mut estimator = HeartRateEstimator::new(2);
        for at in [0.0, 400.0, 800.0, 1800.0, 2800.0] {
            estimator.push_beat(at);
        }
        assert_eq!(estimator.beat_count(), 3);
        assert_eq!(estimator.bpm(), Some(60));
    }

    #[test]
    fn test_detector_requires_all_members() {
        let mut detector = VentricularDetector::new(&[NodeIndex(7), NodeIndex(8)], 5000.0);

        assert_eq!(detector.observe(&fired(&[(7, 195.0)]), 195.0), None);
        assert_eq!(detector.observe(&fired(&[(3, 200.0)]), 200.0), None);
        assert_eq!(detector.observe(&fired(&[(8, 230.0)]), 230.0), Some(230.0));

        // Set resets after a beat
        assert_eq!(detector.observe(&fired(&[(8, 300.0)]), 300.0), None);
    }

    #[test]
    fn test_detector_drops_stale_members() {
        let mut detector = VentricularDetector::new(&[NodeIndex(0), NodeIndex(1)], 5000.0);

        detector.observe(&fired(&[(0, 0.0)]), 0.0);
        assert_eq!(detector.observe(&fired(&[(1, 6000.0)]), 6000.0), None);
        assert_eq!(detector.observe(&fired(&[(0, 6100.0)]), 6100.0), Some(6100.0));
    }
}
