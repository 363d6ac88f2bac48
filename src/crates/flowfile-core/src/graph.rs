//! The flow graph: source of truth for pipeline structure
//!
//! A [`FlowGraph`] owns its nodes and edges in an id-indexed arena. Nodes
//! never hold references to each other; every relation goes through the
//! graph, which keeps mutation, serialization, and cloning straightforward.
//!
//! # Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    FlowGraph                         │
//! │                                                      │
//! │  nodes: { 1 → source, 2 → formula, 3 → filter,      │
//! │           4 → group_by, 5 → sort }                   │
//! │                                                      │
//! │  1 ──main──▶ 2 ──main──▶ 3 ──main──▶ 4 ──main──▶ 5  │
//! │                                                      │
//! │  invariants: acyclic; each (node, slot) wired once   │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Failure semantics
//!
//! Structural errors (`Cycle`, `SlotTaken`, `UnknownNode`, `ArityMismatch`)
//! are synchronous and atomic: a failed operation leaves the graph exactly
//! as it was. Successful mutations eagerly re-run schema propagation and
//! reset execution state downstream of the change.
//!
//! # Determinism
//!
//! [`FlowGraph::topological_order`] is Kahn's algorithm with an
//! ascending-node-id tiebreak, so identical graphs produce byte-identical
//! orders. [`FlowGraph::content_hash`] digests `(kind, canonical settings,
//! ordered upstream hashes)` and is therefore stable across equivalent edit
//! histories.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::fmt;

use crate::error::{FlowError, Result};
use crate::node::FlowNode;
use crate::schema;
use crate::settings::{FlowId, InputShape, NodePayload, NodeSettings};

/// Node identifier, unique within a graph
pub type NodeId = u64;

/// A named input position on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InputSlot {
    /// The single input of unary kinds
    Main,
    /// Left side of a binary kind
    Left,
    /// Right side of a binary kind
    Right,
    /// The i-th input of a variadic kind
    MainAt(usize),
}

impl InputSlot {
    /// Parse the document rendering (`main`, `left`, `right`, `main[i]`)
    pub fn parse(s: &str) -> Option<InputSlot> {
        match s {
            "main" => Some(Self::Main),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            other => other
                .strip_prefix("main[")
                .and_then(|rest| rest.strip_suffix(']'))
                .and_then(|idx| idx.parse().ok())
                .map(Self::MainAt),
        }
    }
}

impl fmt::Display for InputSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
            Self::MainAt(i) => write!(f, "main[{}]", i),
        }
    }
}

impl Serialize for InputSlot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InputSlot {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        InputSlot::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid input slot '{}'", s)))
    }
}

/// A directed connection into a destination slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub slot: InputSlot,
}

/// Execution strategy selected on the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Eager push with bounded sample caching
    Development,
    /// Lazy pull with one collect per sink
    Performance,
}

/// Where plans are collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionLocation {
    Local,
    /// Offload collects through the worker channel
    Remote,
    /// Remote when a worker is configured, local otherwise
    Auto,
}

/// Graph-level settings carried by the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSettings {
    pub execution_mode: ExecutionMode,
    #[serde(default = "default_location")]
    pub execution_location: ExecutionLocation,
    #[serde(default)]
    pub auto_save: bool,
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

fn default_location() -> ExecutionLocation {
    ExecutionLocation::Auto
}

fn default_true() -> bool {
    true
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            execution_mode: ExecutionMode::Development,
            execution_location: ExecutionLocation::Auto,
            auto_save: false,
            show_progress: true,
        }
    }
}

/// The in-memory DAG of nodes and edges
#[derive(Debug, Clone)]
pub struct FlowGraph {
    pub graph_id: FlowId,
    pub name: String,
    pub settings: GraphSettings,
    nodes: HashMap<NodeId, FlowNode>,
    edges: Vec<Edge>,
    next_id: NodeId,
}

impl FlowGraph {
    pub fn new(graph_id: FlowId, name: impl Into<String>) -> Self {
        Self {
            graph_id,
            name: name.into(),
            settings: GraphSettings::default(),
            nodes: HashMap::new(),
            edges: Vec::new(),
            next_id: 1,
        }
    }

    /// Add a node from a per-kind payload, allocating a fresh id
    pub fn add_node(&mut self, payload: NodePayload) -> Result<NodeId> {
        let id = self.next_id;
        let settings = NodeSettings::new(self.graph_id, id, payload)?;
        self.next_id += 1;
        self.nodes.insert(id, FlowNode::new(id, settings));
        schema::propagate(self);
        Ok(id)
    }

    /// Insert a node with an explicit id (document loading). Fails if the
    /// id is taken; advances the allocator past it.
    pub fn insert_node(&mut self, id: NodeId, mut settings: NodeSettings) -> Result<()> {
        if self.nodes.contains_key(&id) {
            return Err(FlowError::invalid_settings(
                "node_id",
                format!("node id {} already exists", id),
            ));
        }
        settings.validate()?;
        settings.node_id = id;
        settings.flow_id = self.graph_id;
        self.next_id = self.next_id.max(id + 1);
        self.nodes.insert(id, FlowNode::new(id, settings));
        schema::propagate(self);
        Ok(())
    }

    /// Connect `from` into `(to, slot)`.
    ///
    /// Fails with `Cycle` if the edge would close a cycle, `SlotTaken` if
    /// the destination slot is occupied, and `ArityMismatch` if the slot
    /// does not exist on the destination kind. The graph is unchanged on
    /// failure.
    pub fn connect(&mut self, from: NodeId, to: NodeId, slot: InputSlot) -> Result<()> {
        if !self.nodes.contains_key(&from) {
            return Err(FlowError::UnknownNode(from));
        }
        let to_node = self.nodes.get(&to).ok_or(FlowError::UnknownNode(to))?;
        if from == to {
            return Err(FlowError::Cycle { from, to });
        }

        let shape = to_node.kind().input_shape();
        let slot_ok = match (shape, slot) {
            (InputShape::Single, InputSlot::Main) => true,
            (InputShape::Binary, InputSlot::Left | InputSlot::Right) => true,
            (InputShape::Variadic, InputSlot::MainAt(_)) => true,
            _ => false,
        };
        if !slot_ok {
            return Err(FlowError::ArityMismatch {
                node: to,
                kind: to_node.kind().to_string(),
                expected: describe_shape(shape),
                found: self.inputs_of(to).len(),
            });
        }

        if self.edges.iter().any(|e| e.to == to && e.slot == slot) {
            return Err(FlowError::SlotTaken {
                node: to,
                slot: slot.to_string(),
            });
        }

        // DFS from `to`: if `from` is reachable the new edge closes a cycle.
        if self.reaches(to, from) {
            return Err(FlowError::Cycle { from, to });
        }

        self.edges.push(Edge { from, to, slot });
        self.invalidate_from(to);
        schema::propagate(self);
        Ok(())
    }

    /// Remove one edge; downstream becomes stale and may become unrunnable
    pub fn disconnect(&mut self, from: NodeId, to: NodeId, slot: InputSlot) -> Result<()> {
        let before = self.edges.len();
        self.edges
            .retain(|e| !(e.from == from && e.to == to && e.slot == slot));
        if self.edges.len() == before {
            return Err(FlowError::UnknownNode(to));
        }
        self.invalidate_from(to);
        schema::propagate(self);
        Ok(())
    }

    /// Replace a node's per-kind payload.
    ///
    /// The record is validated first, and a kind change must stay
    /// compatible with the node's already-connected inputs. When the
    /// replacement changes the content hash, everything downstream loses
    /// cached results and predicted schemas; an equivalent record is a
    /// no-op for execution state.
    pub fn update_settings(&mut self, node_id: NodeId, payload: NodePayload) -> Result<()> {
        payload.validate()?;
        if !self.nodes.contains_key(&node_id) {
            return Err(FlowError::UnknownNode(node_id));
        }

        let new_shape = payload.kind().input_shape();
        let connected = self.inputs_of(node_id);
        let compatible = connected.iter().all(|(slot, _)| match (new_shape, slot) {
            (InputShape::Single, InputSlot::Main) => true,
            (InputShape::Binary, InputSlot::Left | InputSlot::Right) => true,
            (InputShape::Variadic, InputSlot::MainAt(_)) => true,
            _ => false,
        });
        if !compatible {
            return Err(FlowError::ArityMismatch {
                node: node_id,
                kind: payload.kind().to_string(),
                expected: describe_shape(new_shape),
                found: connected.len(),
            });
        }

        let before = self.content_hash(node_id)?;
        let node = self.nodes.get_mut(&node_id).expect("checked above");
        node.settings.payload = payload;
        if self.content_hash(node_id)? != before {
            self.invalidate_from(node_id);
        }
        schema::propagate(self);
        Ok(())
    }

    /// Update presentation fields without invalidating execution state
    pub fn update_presentation(
        &mut self,
        node_id: NodeId,
        description: Option<String>,
        pos: Option<(f64, f64)>,
        cache_results: Option<bool>,
    ) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(FlowError::UnknownNode(node_id))?;
        if let Some(d) = description {
            node.settings.description = d;
        }
        if let Some((x, y)) = pos {
            node.settings.pos_x = x;
            node.settings.pos_y = y;
        }
        if let Some(c) = cache_results {
            node.settings.cache_results = c;
        }
        Ok(())
    }

    /// Remove a node and its incident edges
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<()> {
        if !self.nodes.contains_key(&node_id) {
            return Err(FlowError::UnknownNode(node_id));
        }
        let downstream: Vec<NodeId> = self
            .edges
            .iter()
            .filter(|e| e.from == node_id)
            .map(|e| e.to)
            .collect();
        self.edges.retain(|e| e.from != node_id && e.to != node_id);
        self.nodes.remove(&node_id);
        for id in downstream {
            self.invalidate_from(id);
        }
        schema::propagate(self);
        Ok(())
    }

    /// Deterministic topological order: Kahn's algorithm, ties broken by
    /// ascending node id. Fails with `Cycle` if the invariant was violated.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        let mut in_degree: HashMap<NodeId, usize> =
            self.nodes.keys().map(|&id| (id, 0)).collect();
        for edge in &self.edges {
            *in_degree.entry(edge.to).or_insert(0) += 1;
        }

        let mut ready: BinaryHeap<Reverse<NodeId>> = in_degree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(&id, _)| Reverse(id))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            for edge in self.edges.iter().filter(|e| e.from == id) {
                let d = in_degree.get_mut(&edge.to).expect("edge to known node");
                *d -= 1;
                if *d == 0 {
                    ready.push(Reverse(edge.to));
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck = in_degree
                .iter()
                .filter(|(_, &d)| d > 0)
                .map(|(&id, _)| id)
                .min()
                .unwrap_or(0);
            return Err(FlowError::Cycle {
                from: stuck,
                to: stuck,
            });
        }
        Ok(order)
    }

    /// Nodes requiring zero inputs (no incoming edges), ascending by id
    pub fn start_nodes(&self) -> Vec<NodeId> {
        let targets: HashSet<NodeId> = self.edges.iter().map(|e| e.to).collect();
        let mut starts: Vec<NodeId> = self
            .nodes
            .keys()
            .copied()
            .filter(|id| !targets.contains(id))
            .collect();
        starts.sort_unstable();
        starts
    }

    /// Sinks: nodes with no outgoing edges, ascending by id
    pub fn sink_nodes(&self) -> Vec<NodeId> {
        let sources: HashSet<NodeId> = self.edges.iter().map(|e| e.from).collect();
        let mut sinks: Vec<NodeId> = self
            .nodes
            .keys()
            .copied()
            .filter(|id| !sources.contains(id))
            .collect();
        sinks.sort_unstable();
        sinks
    }

    pub fn get_node(&self, node_id: NodeId) -> Result<&FlowNode> {
        self.nodes.get(&node_id).ok_or(FlowError::UnknownNode(node_id))
    }

    pub(crate) fn get_node_mut(&mut self, node_id: NodeId) -> Result<&mut FlowNode> {
        self.nodes
            .get_mut(&node_id)
            .ok_or(FlowError::UnknownNode(node_id))
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// All node ids, ascending
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Read-only view of all nodes in ascending id order
    pub fn nodes(&self) -> Vec<&FlowNode> {
        let mut nodes: Vec<&FlowNode> = self.nodes.values().collect();
        nodes.sort_by_key(|n| n.id);
        nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Inputs of a node as `(slot, upstream)`, in slot order
    /// (`main` / `left` / `right` / `main[0..n]`)
    pub fn inputs_of(&self, node_id: NodeId) -> Vec<(InputSlot, NodeId)> {
        let mut inputs: Vec<(InputSlot, NodeId)> = self
            .edges
            .iter()
            .filter(|e| e.to == node_id)
            .map(|e| (e.slot, e.from))
            .collect();
        inputs.sort_by_key(|(slot, _)| *slot);
        inputs
    }

    /// Nodes directly fed by `node_id`, ascending and deduplicated
    pub fn leads_to(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .edges
            .iter()
            .filter(|e| e.from == node_id)
            .map(|e| e.to)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Check that a node's connected inputs satisfy its declared arity
    pub fn check_arity(&self, node_id: NodeId) -> Result<()> {
        let node = self.get_node(node_id)?;
        let inputs = self.inputs_of(node_id);
        let shape = node.kind().input_shape();
        let ok = match shape {
            InputShape::Source => inputs.is_empty(),
            InputShape::Single => inputs.len() == 1,
            InputShape::Binary => {
                inputs.len() == 2
                    && inputs.iter().any(|(s, _)| *s == InputSlot::Left)
                    && inputs.iter().any(|(s, _)| *s == InputSlot::Right)
            }
            InputShape::Variadic => !inputs.is_empty(),
        };
        if ok {
            Ok(())
        } else {
            Err(FlowError::ArityMismatch {
                node: node_id,
                kind: node.kind().to_string(),
                expected: describe_shape(shape),
                found: inputs.len(),
            })
        }
    }

    /// Deterministic fingerprint of a node's effective definition:
    /// SHA-256 over `(kind, canonical settings payload, upstream hashes in
    /// slot order)`. Presentation fields are excluded.
    pub fn content_hash(&self, node_id: NodeId) -> Result<String> {
        let mut memo = HashMap::new();
        self.hash_with_memo(node_id, &mut memo)
    }

    /// Content hashes for every node, keyed by id
    pub fn content_hashes(&self) -> Result<HashMap<NodeId, String>> {
        let mut memo = HashMap::new();
        for &id in self.nodes.keys() {
            self.hash_with_memo(id, &mut memo)?;
        }
        Ok(memo)
    }

    fn hash_with_memo(
        &self,
        node_id: NodeId,
        memo: &mut HashMap<NodeId, String>,
    ) -> Result<String> {
        if let Some(h) = memo.get(&node_id) {
            return Ok(h.clone());
        }
        let node = self.get_node(node_id)?;

        let mut hasher = Sha256::new();
        hasher.update(node.kind().as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(node.settings.canonical_json()?.as_bytes());
        for (slot, upstream) in self.inputs_of(node_id) {
            hasher.update([0u8]);
            hasher.update(slot.to_string().as_bytes());
            hasher.update([0u8]);
            hasher.update(self.hash_with_memo(upstream, memo)?.as_bytes());
        }

        let hash = format!("{:x}", hasher.finalize());
        memo.insert(node_id, hash.clone());
        Ok(hash)
    }

    /// Whether `target` is reachable from `start` following edges forward
    fn reaches(&self, start: NodeId, target: NodeId) -> bool {
        let mut stack = vec![start];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            for edge in self.edges.iter().filter(|e| e.from == id) {
                stack.push(edge.to);
            }
        }
        false
    }

    /// Reset execution state of `start` and everything downstream (BFS)
    pub(crate) fn invalidate_from(&mut self, start: NodeId) {
        let mut queue = VecDeque::from([start]);
        let mut seen = HashSet::new();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get_mut(&id) {
                node.invalidate();
            }
            for edge in self.edges.iter().filter(|e| e.from == id) {
                queue.push_back(edge.to);
            }
        }
    }

    /// Nodes strictly downstream of `start`, unordered
    pub fn downstream_of(&self, start: NodeId) -> HashSet<NodeId> {
        let mut out = HashSet::new();
        let mut queue: VecDeque<NodeId> = self.leads_to(start).into();
        while let Some(id) = queue.pop_front() {
            if !out.insert(id) {
                continue;
            }
            for next in self.leads_to(id) {
                queue.push_back(next);
            }
        }
        out
    }
}

fn describe_shape(shape: InputShape) -> String {
    match shape {
        InputShape::Source => "no inputs".to_string(),
        InputShape::Single => "exactly one main input".to_string(),
        InputShape::Binary => "a left and a right input".to_string(),
        InputShape::Variadic => "one or more main[i] inputs".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{
        FilterMode, FilterSettings, ManualInputSettings, NodePayload, SampleSettings,
        SortSettings, UnionMode, UnionSettings,
    };
    use crate::types::{Field, LogicalType};
    use serde_json::json;

    fn manual_source() -> NodePayload {
        NodePayload::ManualInput(ManualInputSettings {
            columns: vec![Field::new("a", LogicalType::Int64)],
            rows: vec![vec![json!(1)], vec![json!(2)]],
        })
    }

    fn sample(n: i64) -> NodePayload {
        NodePayload::Sample(SampleSettings { n })
    }

    fn chain_of_three(graph: &mut FlowGraph) -> (NodeId, NodeId, NodeId) {
        let a = graph.add_node(manual_source()).unwrap();
        let b = graph.add_node(sample(10)).unwrap();
        let c = graph.add_node(sample(5)).unwrap();
        graph.connect(a, b, InputSlot::Main).unwrap();
        graph.connect(b, c, InputSlot::Main).unwrap();
        (a, b, c)
    }

    #[test]
    fn test_connect_rejects_cycle_and_leaves_graph_unchanged() {
        let mut graph = FlowGraph::new(1, "cycles");
        let (a, _b, c) = chain_of_three(&mut graph);
        let edges_before = graph.edges().to_vec();

        // Scenario: 1 -> 2 -> 3, then connect(3 -> 1) must fail.
        let err = graph.connect(c, a, InputSlot::Main).unwrap_err();
        assert!(matches!(err, FlowError::Cycle { .. }));
        assert_eq!(graph.edges(), edges_before.as_slice());
    }

    #[test]
    fn test_self_edge_is_a_cycle() {
        let mut graph = FlowGraph::new(1, "self");
        let a = graph.add_node(sample(1)).unwrap();
        assert!(matches!(
            graph.connect(a, a, InputSlot::Main),
            Err(FlowError::Cycle { .. })
        ));
    }

    #[test]
    fn test_slot_taken() {
        let mut graph = FlowGraph::new(1, "slots");
        let a = graph.add_node(manual_source()).unwrap();
        let b = graph.add_node(manual_source()).unwrap();
        let c = graph.add_node(sample(10)).unwrap();
        graph.connect(a, c, InputSlot::Main).unwrap();

        let err = graph.connect(b, c, InputSlot::Main).unwrap_err();
        assert!(matches!(err, FlowError::SlotTaken { .. }));
        assert_eq!(graph.edges().len(), 1);
    }

    #[test]
    fn test_slot_shape_enforced_on_connect() {
        let mut graph = FlowGraph::new(1, "shape");
        let a = graph.add_node(manual_source()).unwrap();
        let b = graph.add_node(sample(10)).unwrap();

        // A single-input node has no `left` slot.
        assert!(matches!(
            graph.connect(a, b, InputSlot::Left),
            Err(FlowError::ArityMismatch { .. })
        ));
        // A source node has no slots at all.
        assert!(matches!(
            graph.connect(b, a, InputSlot::Main),
            Err(FlowError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn test_topological_order_is_deterministic() {
        let mut graph = FlowGraph::new(1, "topo");
        let a = graph.add_node(manual_source()).unwrap();
        let b = graph.add_node(manual_source()).unwrap();
        let u = graph
            .add_node(NodePayload::Union(UnionSettings {
                how: UnionMode::Vertical,
            }))
            .unwrap();
        graph.connect(a, u, InputSlot::MainAt(0)).unwrap();
        graph.connect(b, u, InputSlot::MainAt(1)).unwrap();

        // Both sources are ready at once; ascending id breaks the tie.
        assert_eq!(graph.topological_order().unwrap(), vec![a, b, u]);
        assert_eq!(graph.topological_order().unwrap(), vec![a, b, u]);
    }

    #[test]
    fn test_start_and_sink_nodes() {
        let mut graph = FlowGraph::new(1, "ends");
        let (a, _b, c) = chain_of_three(&mut graph);
        assert_eq!(graph.start_nodes(), vec![a]);
        assert_eq!(graph.sink_nodes(), vec![c]);
    }

    #[test]
    fn test_remove_node_drops_incident_edges() {
        let mut graph = FlowGraph::new(1, "remove");
        let (_a, b, c) = chain_of_three(&mut graph);
        graph.remove_node(b).unwrap();
        assert!(graph.edges().is_empty());
        assert!(graph.get_node(b).is_err());
        assert!(graph.get_node(c).is_ok());
    }

    #[test]
    fn test_content_hash_stable_across_edit_order() {
        let build = |description: &str| {
            let mut graph = FlowGraph::new(1, "hash");
            let a = graph.add_node(manual_source()).unwrap();
            let b = graph.add_node(sample(10)).unwrap();
            graph.connect(a, b, InputSlot::Main).unwrap();
            graph
                .update_presentation(b, Some(description.to_string()), Some((50.0, 80.0)), None)
                .unwrap();
            graph.content_hash(b).unwrap()
        };

        // Presentation edits do not change the effective definition.
        assert_eq!(build("one"), build("two"));
    }

    #[test]
    fn test_content_hash_tracks_settings_and_upstream() {
        let mut graph = FlowGraph::new(1, "hash2");
        let a = graph.add_node(manual_source()).unwrap();
        let b = graph.add_node(sample(10)).unwrap();
        graph.connect(a, b, InputSlot::Main).unwrap();

        let h1 = graph.content_hash(b).unwrap();
        graph.update_settings(b, sample(20)).unwrap();
        let h2 = graph.content_hash(b).unwrap();
        assert_ne!(h1, h2);

        // Editing the upstream changes the downstream hash too.
        graph.update_settings(b, sample(10)).unwrap();
        assert_eq!(graph.content_hash(b).unwrap(), h1);
        graph
            .update_settings(
                a,
                NodePayload::ManualInput(ManualInputSettings {
                    columns: vec![Field::new("a", LogicalType::Int64)],
                    rows: vec![vec![json!(99)]],
                }),
            )
            .unwrap();
        assert_ne!(graph.content_hash(b).unwrap(), h1);
    }

    #[test]
    fn test_update_settings_invalidates_downstream_only() {
        let mut graph = FlowGraph::new(1, "staleness");
        let (a, b, c) = chain_of_three(&mut graph);
        for id in [a, b, c] {
            graph.get_node_mut(id).unwrap().run_state = crate::node::RunState::Ok;
        }

        graph.update_settings(b, sample(3)).unwrap();
        assert_eq!(graph.get_node(a).unwrap().run_state, crate::node::RunState::Ok);
        assert_eq!(graph.get_node(b).unwrap().run_state, crate::node::RunState::Unset);
        assert_eq!(graph.get_node(c).unwrap().run_state, crate::node::RunState::Unset);
    }

    #[test]
    fn test_equivalent_update_keeps_execution_state() {
        let mut graph = FlowGraph::new(1, "noop");
        let (_a, b, c) = chain_of_three(&mut graph);
        graph.get_node_mut(c).unwrap().run_state = crate::node::RunState::Ok;

        // Re-submitting the identical record leaves downstream untouched.
        graph.update_settings(b, sample(10)).unwrap();
        assert_eq!(graph.get_node(c).unwrap().run_state, crate::node::RunState::Ok);
    }

    #[test]
    fn test_kind_change_must_fit_connected_inputs() {
        let mut graph = FlowGraph::new(1, "kinds");
        let (_a, b, _c) = chain_of_three(&mut graph);

        // A connected `main` input rules out switching to a source kind.
        let err = graph.update_settings(b, manual_source()).unwrap_err();
        assert!(matches!(err, FlowError::ArityMismatch { .. }));
        assert_eq!(graph.get_node(b).unwrap().kind(), crate::settings::NodeKind::Sample);
    }

    #[test]
    fn test_invalid_settings_rejected_before_mutation() {
        let mut graph = FlowGraph::new(1, "atomic");
        let a = graph.add_node(sample(5)).unwrap();
        let err = graph
            .update_settings(
                a,
                NodePayload::Filter(FilterSettings {
                    mode: FilterMode::Basic,
                    basic: None,
                    advanced: None,
                }),
            )
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidSettings { .. }));
        assert_eq!(graph.get_node(a).unwrap().kind(), crate::settings::NodeKind::Sample);
    }

    #[test]
    fn test_sort_payload_roundtrip_through_graph() {
        let mut graph = FlowGraph::new(1, "sort");
        let id = graph
            .add_node(NodePayload::Sort(SortSettings { columns: vec![] }))
            .unwrap();
        // Empty sort list is a valid pass-through.
        assert!(graph.get_node(id).is_ok());
    }

    #[test]
    fn test_input_slot_rendering() {
        for slot in [
            InputSlot::Main,
            InputSlot::Left,
            InputSlot::Right,
            InputSlot::MainAt(3),
        ] {
            assert_eq!(InputSlot::parse(&slot.to_string()), Some(slot));
        }
        assert_eq!(InputSlot::parse("main[x]"), None);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Any sequence of connect attempts leaves the graph acyclic:
            /// each either succeeds or fails (leaving the edge set intact),
            /// and the topological order stays a valid linearization.
            #[test]
            fn connects_never_create_cycles(
                attempts in proptest::collection::vec((0u64..8, 0u64..8), 0..40)
            ) {
                let mut graph = FlowGraph::new(1, "prop");
                let mut ids = Vec::new();
                ids.push(graph.add_node(manual_source()).unwrap());
                for _ in 1..8 {
                    ids.push(graph.add_node(NodePayload::Union(UnionSettings {
                        how: UnionMode::Vertical,
                    })).unwrap());
                }

                for (i, (from, to)) in attempts.into_iter().enumerate() {
                    let edges_before = graph.edges().to_vec();
                    let result = graph.connect(
                        ids[from as usize],
                        ids[to as usize],
                        InputSlot::MainAt(i),
                    );
                    if result.is_err() {
                        prop_assert_eq!(graph.edges(), edges_before.as_slice());
                    }

                    let order = graph.topological_order().unwrap();
                    prop_assert_eq!(order.len(), ids.len());
                    for edge in graph.edges() {
                        let from_pos = order.iter().position(|&n| n == edge.from).unwrap();
                        let to_pos = order.iter().position(|&n| n == edge.to).unwrap();
                        prop_assert!(from_pos < to_pos);
                    }
                }
            }

            /// Identical graphs produce byte-identical topological orders.
            #[test]
            fn topological_order_is_deterministic(seed in 0u64..1000) {
                let build = || {
                    let mut graph = FlowGraph::new(1, "det");
                    let a = graph.add_node(manual_source()).unwrap();
                    let b = graph.add_node(manual_source()).unwrap();
                    let u = graph.add_node(NodePayload::Union(UnionSettings {
                        how: UnionMode::Vertical,
                    })).unwrap();
                    if seed % 2 == 0 {
                        graph.connect(a, u, InputSlot::MainAt(0)).unwrap();
                        graph.connect(b, u, InputSlot::MainAt(1)).unwrap();
                    } else {
                        graph.connect(b, u, InputSlot::MainAt(1)).unwrap();
                        graph.connect(a, u, InputSlot::MainAt(0)).unwrap();
                    }
                    graph.topological_order().unwrap()
                };
                prop_assert_eq!(build(), build());
            }
        }
    }
}
