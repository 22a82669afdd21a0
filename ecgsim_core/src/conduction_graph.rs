//! The conduction graph - node/path arena plus the tick scheduler.
//!
//! Nodes and paths live in flat vectors addressed by [`NodeIndex`] and
//! [`PathIndex`]. The relationships that would otherwise be back-references
//! (outgoing paths per node, paired reverse paths) are index tables built
//! once at construction.
//!
//! # One tick
//!
//! ```text
//!  tick(now)
//!   ├─ 1. automatic / forced nodes that are due fire at `now`
//!   │      └─ each outgoing path passing its gates schedules (target, now + delay)
//!   ├─ 2. pending events collapse to the earliest arrival per target
//!   ├─ 3. earliest due event (fire_at <= now) resolves:
//!   │      ├─ target refractory  → dropped
//!   │      └─ otherwise          → target fires at fire_at, path conducts,
//!   │                              target's outgoing paths schedule  (repeat 2-3)
//!   └─ 4. events with fire_at > now stay pending
//! ```
//!
//! All stochastic decisions draw from the injected [`EntropySource`].

use crate::anatomy::AnatomyTable;
use crate::conduction_node::{Node, NodeIndex};
use crate::conduction_path::{Gate, Path, PathIndex, REVERSE_RECOVERY_FACTOR};
use crate::lead_projection::{self, LeadVector};
use crate::params::{NodeField, ParamChange, PathField};
use ecgsim_env::EntropySource;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, warn};

/// Upper bound on events resolved within a single tick.
///
/// Only reachable with zero-delay, zero-refractory loops; the remaining
/// events are left pending for the next tick.
pub const MAX_EVENTS_PER_TICK: usize = 10_000;

/// Structurally impossible graph configuration.
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Duplicate path id: {0}")]
    DuplicatePath(String),

    #[error("Path {path} references unknown node {node}")]
    UnknownNode { path: String, node: String },

    #[error("Path {path} references unknown reverse path {reverse}")]
    UnknownReverse { path: String, reverse: String },

    #[error("Path {path} cannot pair with {reverse}: endpoints are not mirrored or already paired")]
    ReverseMismatch { path: String, reverse: String },

    #[error("Unknown ventricular node: {0}")]
    UnknownVentricular(String),
}

/// A conduction in flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledConduction {
    /// Node the impulse will activate
    pub target: NodeIndex,

    /// Path carrying the impulse
    pub path: PathIndex,

    /// Absolute arrival time (ms)
    pub fire_at: f64,

    /// Delay drawn when the impulse was scheduled (ms)
    pub delay_ms: f64,

    /// In-flight marker the path carried before this impulse
    pub prior_marker: Option<f64>,
}

/// A node firing observed during a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiredNode {
    pub node: NodeIndex,
    pub at: f64,
}

/// A path conduction observed during a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConductedPath {
    pub path: PathIndex,
    pub at: f64,
}

/// Everything that fired or conducted during one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub fired_nodes: Vec<FiredNode>,
    pub conducted_paths: Vec<ConductedPath>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.fired_nodes.is_empty() && self.conducted_paths.is_empty()
    }

    pub fn node_fired(&self, node: NodeIndex) -> bool {
        self.fired_nodes.iter().any(|f| f.node == node)
    }

    pub fn path_conducted(&self, path: PathIndex) -> bool {
        self.conducted_paths.iter().any(|c| c.path == path)
    }

    /// Ids of every node and path in the report, nodes first.
    pub fn entity_ids<'g>(&self, graph: &'g ConductionGraph) -> Vec<&'g str> {
        let nodes = self.fired_nodes.iter().map(|f| graph.node_at(f.node).id.as_str());
        let paths = self.conducted_paths.iter().map(|c| graph.path_at(c.path).id.as_str());
        nodes.chain(paths).collect()
    }
}

/// Owns every node and path and advances them one simulated instant at a time.
pub struct ConductionGraph {
    nodes: Vec<Node>,
    paths: Vec<Path>,
    node_lookup: HashMap<String, NodeIndex>,
    path_lookup: HashMap<String, PathIndex>,
    outgoing: Vec<Vec<PathIndex>>,
    ventricular: Vec<NodeIndex>,
    pending: Vec<ScheduledConduction>,
    entropy: Box<dyn EntropySource>,
    reverse_recovery_factor: f64,
}

impl ConductionGraph {
    /// Builds a graph from an anatomy table.
    ///
    /// Fails fast on anything structurally impossible: duplicate ids, paths
    /// that reference unknown nodes, reverse references to unknown or
    /// non-mirrored paths, unknown ventricular nodes.
    pub fn new(table: &AnatomyTable, entropy: Box<dyn EntropySource>) -> Result<Self, GraphError> {
        let mut nodes = Vec::with_capacity(table.nodes.len());
        let mut node_lookup = HashMap::new();

        for spec in &table.nodes {
            let index = NodeIndex(nodes.len());
            if node_lookup.insert(spec.id.clone(), index).is_some() {
                return Err(GraphError::DuplicateNode(spec.id.clone()));
            }
            let mut node = Node::new(spec.id.clone(), spec.position).with_refractory(spec.refractory_ms);
            node.rate_bpm = spec.rate_bpm;
            node.automatic = spec.automatic;
            nodes.push(node);
        }

        let resolve = |path: &str, node: &str| -> Result<NodeIndex, GraphError> {
            node_lookup.get(node).copied().ok_or_else(|| GraphError::UnknownNode {
                path: path.to_string(),
                node: node.to_string(),
            })
        };

        let mut paths: Vec<Path> = Vec::with_capacity(table.paths.len());
        let mut path_lookup = HashMap::new();
        let mut outgoing = vec![Vec::new(); nodes.len()];

        for spec in &table.paths {
            let from = resolve(&spec.id, &spec.from)?;
            let to = resolve(&spec.id, &spec.to)?;
            let index = PathIndex(paths.len());
            if path_lookup.insert(spec.id.clone(), index).is_some() {
                return Err(GraphError::DuplicatePath(spec.id.clone()));
            }

            let weights = lead_projection::project(&nodes[from.0].position, &nodes[to.0].position);
            let mut path = Path::new(spec.id.clone(), from, to, weights);
            path.delay_ms = spec.delay_ms;
            path.jitter_ms = spec.jitter_ms;
            path.refractory_ms = spec.refractory_ms;
            path.blocked = spec.blocked;
            path.probability = spec.probability;
            path.amplitude = spec.amplitude;
            path.polarity = spec.polarity;
            path.apd_ms = spec.apd_ms;
            path.decremental_step_ms = spec.decremental_step_ms;
            path.wenckebach = spec.wenckebach;

            outgoing[from.0].push(index);
            paths.push(path);
        }

        for spec in &table.paths {
            let Some(reverse_id) = &spec.reverse else {
                continue;
            };
            let index = path_lookup[&spec.id];
            let reverse = path_lookup.get(reverse_id).copied().ok_or_else(|| GraphError::UnknownReverse {
                path: spec.id.clone(),
                reverse: reverse_id.clone(),
            })?;

            let mismatch = || GraphError::ReverseMismatch {
                path: spec.id.clone(),
                reverse: reverse_id.clone(),
            };
            let (a, b) = (&paths[index.0], &paths[reverse.0]);
            if index == reverse || a.from != b.to || a.to != b.from {
                return Err(mismatch());
            }
            if a.reverse().is_some_and(|r| r != reverse) || b.reverse().is_some_and(|r| r != index) {
                return Err(mismatch());
            }

            paths[index.0].set_reverse(reverse);
            paths[reverse.0].set_reverse(index);
        }

        let ventricular = table
            .ventricular
            .iter()
            .map(|id| {
                node_lookup
                    .get(id)
                    .copied()
                    .ok_or_else(|| GraphError::UnknownVentricular(id.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            nodes,
            paths,
            node_lookup,
            path_lookup,
            outgoing,
            ventricular,
            pending: Vec::new(),
            entropy,
            reverse_recovery_factor: REVERSE_RECOVERY_FACTOR,
        })
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index(id).map(|i| &self.nodes[i.0])
    }

    pub fn path(&self, id: &str) -> Option<&Path> {
        self.path_index(id).map(|i| &self.paths[i.0])
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.node_lookup.get(id).copied()
    }

    pub fn path_index(&self, id: &str) -> Option<PathIndex> {
        self.path_lookup.get(id).copied()
    }

    /// Node by index. Indices come from this graph, so they are always valid.
    pub fn node_at(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.0]
    }

    /// Path by index.
    pub fn path_at(&self, index: PathIndex) -> &Path {
        &self.paths[index.0]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    /// Paths leaving `node`, in table order.
    pub fn outgoing_paths(&self, node: NodeIndex) -> &[PathIndex] {
        self.outgoing.get(node.0).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// The paired reverse edge of `path`, if any.
    pub fn reverse_path_of(&self, path: PathIndex) -> Option<PathIndex> {
        self.paths.get(path.0).and_then(|p| p.reverse())
    }

    /// The designated ventricular node set.
    pub fn ventricular_nodes(&self) -> &[NodeIndex] {
        &self.ventricular
    }

    /// Conductions currently in flight.
    pub fn pending(&self) -> &[ScheduledConduction] {
        &self.pending
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Replaces the entropy source (e.g. to pin draws in a test).
    pub fn set_entropy(&mut self, entropy: Box<dyn EntropySource>) {
        self.entropy = entropy;
    }

    /// Overrides [`REVERSE_RECOVERY_FACTOR`] for this graph.
    pub fn set_reverse_recovery_factor(&mut self, factor: f64) {
        self.reverse_recovery_factor = factor.max(0.0);
    }

    pub fn reverse_recovery_factor(&self) -> f64 {
        self.reverse_recovery_factor
    }

    // ------------------------------------------------------------------
    // Parameterization API
    // ------------------------------------------------------------------

    /// Applies one typed node setter. Unknown ids are logged and ignored.
    pub fn set_node_field(&mut self, id: &str, field: NodeField) -> bool {
        match self.node_lookup.get(id) {
            Some(index) => {
                field.apply(&mut self.nodes[index.0]);
                debug!(node = id, ?field, "node parameter updated");
                true
            }
            None => {
                warn!(node = id, ?field, "ignoring update for unknown node");
                false
            }
        }
    }

    /// Applies one typed path setter. Unknown ids are logged and ignored.
    pub fn set_path_field(&mut self, id: &str, field: PathField) -> bool {
        match self.path_lookup.get(id) {
            Some(index) => {
                field.apply(&mut self.paths[index.0]);
                debug!(path = id, ?field, "path parameter updated");
                true
            }
            None => {
                warn!(path = id, ?field, "ignoring update for unknown path");
                false
            }
        }
    }

    /// Applies a batch of changes and returns how many took effect.
    pub fn apply_changes(&mut self, changes: &[ParamChange]) -> usize {
        changes
            .iter()
            .filter(|change| match change {
                ParamChange::Node { id, set } => self.set_node_field(id, *set),
                ParamChange::Path { id, set } => self.set_path_field(id, *set),
            })
            .count()
    }

    // ------------------------------------------------------------------
    // Scheduler
    // ------------------------------------------------------------------

    /// Resolves every firing and conduction at simulated time `now` (ms).
    pub fn tick(&mut self, now: f64) -> TickReport {
        let mut report = TickReport::default();

        for i in 0..self.nodes.len() {
            let node = &self.nodes[i];
            if !(node.automatic || node.force_next) || !node.due_to_fire(now) {
                continue;
            }
            self.nodes[i].fire(now);
            report.fired_nodes.push(FiredNode { node: NodeIndex(i), at: now });
            self.schedule_outgoing(NodeIndex(i), now);
        }

        self.resolve_pending(now, &mut report);
        report
    }

    /// Schedules conduction along every open outgoing path of `node`,
    /// departing at `at`.
    fn schedule_outgoing(&mut self, node: NodeIndex, at: f64) {
        let Some(outgoing) = self.outgoing.get(node.0) else {
            return;
        };

        for &index in outgoing {
            let reverse = self.paths[index.0]
                .reverse()
                .map(|r| self.paths[r.0].recovery_window());
            let path = &mut self.paths[index.0];

            match path.gate(at, reverse, self.reverse_recovery_factor, self.entropy.as_mut()) {
                Gate::Open => {
                    let delay_ms = path.current_delay(self.entropy.as_mut());
                    let prior_marker = path.mark_scheduled(at);
                    self.pending.push(ScheduledConduction {
                        target: path.to,
                        path: index,
                        fire_at: at + delay_ms,
                        delay_ms,
                        prior_marker,
                    });
                }
                Gate::Decremental => {
                    debug!(path = %path.id, at, "decremental block, beat dropped");
                }
                gate => {
                    debug!(path = %path.id, at, ?gate, "conduction gated");
                }
            }
        }
    }

    /// Keeps only the earliest pending arrival per target node.
    ///
    /// Ties keep the event scheduled first. A discarded impulse leaves no
    /// trace on its path.
    fn collapse_pending(&mut self) {
        if self.pending.len() < 2 {
            return;
        }

        let mut earliest: BTreeMap<NodeIndex, ScheduledConduction> = BTreeMap::new();
        for event in self.pending.drain(..) {
            match earliest.get_mut(&event.target) {
                Some(kept) if event.fire_at < kept.fire_at => {
                    debug!(node = %event.target, superseded = %kept.path, by = %event.path, "collision resolved");
                    let loser = std::mem::replace(kept, event);
                    self.paths[loser.path.0].cancel_scheduled(loser.prior_marker);
                }
                Some(kept) => {
                    debug!(node = %event.target, superseded = %event.path, by = %kept.path, "collision resolved");
                    self.paths[event.path.0].cancel_scheduled(event.prior_marker);
                }
                None => {
                    earliest.insert(event.target, event);
                }
            }
        }
        self.pending = earliest.into_values().collect();
    }

    /// Resolves due events one at a time in arrival order. Each activation
    /// may schedule further events that are also due within this tick.
    fn resolve_pending(&mut self, now: f64, report: &mut TickReport) {
        for _ in 0..MAX_EVENTS_PER_TICK {
            self.collapse_pending();

            let next = self
                .pending
                .iter()
                .enumerate()
                .filter(|(_, e)| e.fire_at <= now)
                .min_by(|(_, a), (_, b)| {
                    a.fire_at
                        .total_cmp(&b.fire_at)
                        .then(a.path.cmp(&b.path))
                })
                .map(|(i, _)| i);

            let Some(slot) = next else {
                return;
            };
            let event = self.pending.swap_remove(slot);

            let Some(target) = self.nodes.get_mut(event.target.0) else {
                debug!(node = %event.target, "dropping event for unknown node");
                continue;
            };
            if target.is_refractory(event.fire_at) {
                debug!(node = %target.id, at = event.fire_at, "target refractory, impulse dropped");
                continue;
            }

            target.fire(event.fire_at);
            self.paths[event.path.0].conduct(event.fire_at, event.delay_ms);
            report.fired_nodes.push(FiredNode {
                node: event.target,
                at: event.fire_at,
            });
            report.conducted_paths.push(ConductedPath {
                path: event.path,
                at: event.fire_at,
            });

            self.schedule_outgoing(event.target, event.fire_at);
        }

        warn!(now, pending = self.pending.len(), "event budget exhausted for tick");
    }

    // ------------------------------------------------------------------
    // Signal
    // ------------------------------------------------------------------

    /// Sums every path's instantaneous voltage at `t` onto the twelve leads.
    pub fn lead_sample(&self, t: f64, rr_ms: f64) -> LeadVector {
        let mut frame = LeadVector::zeros();
        for path in &self.paths {
            let v = path.instantaneous_voltage(t, rr_ms);
            if v != 0.0 {
                frame.add_scaled(path.lead_weights(), v);
            }
        }
        frame
    }
}
