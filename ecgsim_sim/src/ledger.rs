//! Activation ledger - the ground-truth record of a simulation run.
//!
//! The ledger watches every tick report and keeps the complete firing and
//! conduction history per entity, checking as it goes that no node was
//! re-activated inside its refractory window and that every activation was
//! reported by the tick it belongs to.

use ecgsim_core::{ConductionGraph, NodeIndex, PathIndex, TickReport};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// An activation as recorded by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Activation {
    /// Simulated activation time (ms)
    pub at: f64,

    /// Time of the tick that reported it (ms)
    pub tick_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivationLedger {
    node_ids: Vec<String>,
    path_ids: Vec<String>,
    node_fires: Vec<Vec<Activation>>,
    path_conductions: Vec<Vec<Activation>>,
    violations: Vec<String>,
}

impl ActivationLedger {
    pub fn new(graph: &ConductionGraph) -> Self {
        Self {
            node_ids: graph.nodes().iter().map(|n| n.id.clone()).collect(),
            path_ids: graph.paths().iter().map(|p| p.id.clone()).collect(),
            node_fires: vec![Vec::new(); graph.nodes().len()],
            path_conductions: vec![Vec::new(); graph.paths().len()],
            violations: Vec::new(),
        }
    }

    /// Records one tick. `tick_ms` is the time the tick was run at.
    pub fn record(&mut self, tick_ms: f64, graph: &ConductionGraph, report: &TickReport) {
        for fired in &report.fired_nodes {
            let node = graph.node_at(fired.node);
            let history = &mut self.node_fires[fired.node.0];

            if let Some(prev) = history.last() {
                if fired.at - prev.at < node.refractory_ms {
                    let msg = format!(
                        "{} fired at {} only {} ms after {} (refractory {})",
                        node.id,
                        fired.at,
                        fired.at - prev.at,
                        prev.at,
                        node.refractory_ms
                    );
                    warn!("{}", msg);
                    self.violations.push(msg);
                }
            }
            if fired.at > tick_ms {
                self.violations
                    .push(format!("{} fired at {} in the tick at {}", node.id, fired.at, tick_ms));
            }
            history.push(Activation { at: fired.at, tick_ms });
        }

        for conducted in &report.conducted_paths {
            self.path_conductions[conducted.path.0].push(Activation {
                at: conducted.at,
                tick_ms,
            });
        }
    }

    /// Firing history of a node, by id.
    pub fn fires(&self, node: &str) -> &[Activation] {
        self.node_ids
            .iter()
            .position(|id| id == node)
            .map(|i| self.node_fires[i].as_slice())
            .unwrap_or(&[])
    }

    /// Conduction history of a path, by id.
    pub fn conductions(&self, path: &str) -> &[Activation] {
        self.path_ids
            .iter()
            .position(|id| id == path)
            .map(|i| self.path_conductions[i].as_slice())
            .unwrap_or(&[])
    }

    pub fn fires_at(&self, node: NodeIndex) -> &[Activation] {
        self.node_fires.get(node.0).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn conductions_at(&self, path: PathIndex) -> &[Activation] {
        self.path_conductions.get(path.0).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Fire counts per node id.
    pub fn fire_counts(&self) -> BTreeMap<String, usize> {
        self.node_ids
            .iter()
            .cloned()
            .zip(self.node_fires.iter().map(Vec::len))
            .collect()
    }

    /// Conduction counts per path id.
    pub fn conduction_counts(&self) -> BTreeMap<String, usize> {
        self.path_ids
            .iter()
            .cloned()
            .zip(self.path_conductions.iter().map(Vec::len))
            .collect()
    }

    pub fn total_fires(&self) -> usize {
        self.node_fires.iter().map(Vec::len).sum()
    }

    pub fn total_conductions(&self) -> usize {
        self.path_conductions.iter().map(Vec::len).sum()
    }

    /// Invariant violations seen so far.
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}
