//! Road network graph and management.
//!
//! This module holds the transportation network of the city: road nodes
//! placed on the grid and the undirected road segments (edges) that join
//! them. Nodes connect themselves to their aligned neighbours on insert, so
//! laying down a line of road cells produces a connected street without any
//! manual wiring. Edges also carry the live traffic load written by the
//! traffic simulator.
//!
//! Nodes and edges live in arenas indexed by their ids. Removing a node
//! leaves a tombstone behind; ids are never handed out twice until the graph
//! is explicitly [`reset`](RoadGraph::reset).

mod pathfinding;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::grid::GridPosition;

/// Nodes further apart than this (in grid units) are never auto-connected.
pub const MAX_CONNECTION_DISTANCE: f64 = 2.0;

/// Identifier of a road node, displayed as `node_N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

/// Identifier of a road segment, displayed as `edge_N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge_{}", self.0)
    }
}

/// Road tier, ordered from lowest to highest capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoadClass {
    #[default]
    Street,
    Avenue,
    Highway,
}

impl RoadClass {
    /// Vehicles per cycle the segment carries before it counts as congested.
    pub fn capacity(self) -> f64 {
        match self {
            RoadClass::Street => 100.0,
            RoadClass::Avenue => 300.0,
            RoadClass::Highway => 800.0,
        }
    }

    /// Free-flow speed in grid units per hour.
    pub fn speed_limit(self) -> f64 {
        match self {
            RoadClass::Street => 25.0,
            RoadClass::Avenue => 35.0,
            RoadClass::Highway => 65.0,
        }
    }
}

/// An intersection or road cell in the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadNode {
    pub id: NodeId,
    /// Grid placement; conceptually a 1x1 cell.
    pub position: GridPosition,
    /// Ids of directly connected neighbours, in connection order.
    pub connections: Vec<NodeId>,
    pub class: RoadClass,
}

/// An undirected road segment between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadEdge {
    pub id: EdgeId,
    pub start: NodeId,
    pub end: NodeId,
    /// Euclidean distance between the endpoints, in grid units.
    pub length: f64,
    pub capacity: f64,
    /// Current load. May exceed `capacity`; that is congestion, not an error.
    pub current_traffic: f64,
    pub class: RoadClass,
    pub speed_limit: f64,
}

impl RoadEdge {
    /// Load relative to capacity. Not clamped: overload reads above 1.0.
    pub fn density(&self) -> f64 {
        self.current_traffic / self.capacity
    }

    /// Slowdown applied to the speed limit, saturating at 2x.
    pub fn congestion_factor(&self) -> f64 {
        (1.0 + self.density()).min(2.0)
    }

    /// Minutes needed to traverse the segment at the current load.
    pub fn travel_minutes(&self) -> f64 {
        let speed = self.speed_limit / self.congestion_factor();
        self.length / speed * 60.0
    }

    /// The endpoint opposite `node`, if `node` is an endpoint at all.
    pub fn other_end(&self, node: NodeId) -> Option<NodeId> {
        if node == self.start {
            Some(self.end)
        } else if node == self.end {
            Some(self.start)
        } else {
            None
        }
    }
}

/// A path through the network.
///
/// `estimated_time` is derived from the edges of an already chosen path; the
/// path itself is the geometrically shortest one, not the fastest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
    pub total_distance: f64,
    /// Travel time in minutes.
    pub estimated_time: f64,
}

/// Aggregate view of the network used by dashboards and the traffic system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatistics {
    pub node_count: usize,
    pub edge_count: usize,
    pub total_capacity: f64,
    pub total_traffic: f64,
    /// Mean of per-edge density, 0 when there are no edges.
    pub average_density: f64,
}

/// The road network graph.
///
/// Contains all nodes and road segments plus a pair index so the segment
/// between two neighbours is found without scanning.
#[derive(Debug, Clone, Default)]
pub struct RoadGraph {
    /// Node arena; slot `i` holds `NodeId(i + 1)`.
    nodes: Vec<Option<RoadNode>>,
    /// Edge arena; slot `i` holds `EdgeId(i + 1)`.
    edges: Vec<Option<RoadEdge>>,
    /// Unordered node pair -> segment joining them.
    pair_index: HashMap<(NodeId, NodeId), EdgeId>,
    live_nodes: usize,
    live_edges: usize,
}

fn pair_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn can_auto_connect(a: &GridPosition, b: &GridPosition) -> bool {
    let dx = (i64::from(a.x) - i64::from(b.x)).abs();
    let dy = (i64::from(a.y) - i64::from(b.y)).abs();
    dx == 0 || dy == 0 || dx == dy
}

impl RoadGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a road node and connects it to every aligned node in range.
    ///
    /// A candidate is linked when it sits within [`MAX_CONNECTION_DISTANCE`]
    /// of the new node and lies on the same row, the same column or a 45°
    /// diagonal. The resulting segment takes the higher class of its two
    /// endpoints.
    ///
    /// # Examples
    ///
    /// ```
    /// use city_common::map::{RoadClass, RoadGraph};
    /// use city_common::GridPosition;
    ///
    /// let mut graph = RoadGraph::new();
    /// graph.add_node(GridPosition::cell(0, 0), RoadClass::Street);
    /// graph.add_node(GridPosition::cell(2, 0), RoadClass::Street);
    /// assert_eq!(graph.statistics().edge_count, 1);
    /// ```
    pub fn add_node(&mut self, position: GridPosition, class: RoadClass) -> NodeId {
        let id = NodeId(self.nodes.len() as u32 + 1);
        self.nodes.push(Some(RoadNode {
            id,
            position,
            connections: Vec::new(),
            class,
        }));
        self.live_nodes += 1;

        let candidates: Vec<NodeId> = self
            .nodes()
            .filter(|other| other.id != id)
            .filter(|other| {
                position.origin_distance_to(&other.position) <= MAX_CONNECTION_DISTANCE
                    && can_auto_connect(&position, &other.position)
            })
            .map(|other| other.id)
            .collect();

        let connected = candidates
            .into_iter()
            .filter_map(|other| self.connect_nodes(id, other))
            .count();

        tracing::debug!(node = %id, x = position.x, y = position.y, connected, "road node added");
        id
    }

    /// Adds a [`RoadClass::Street`] node.
    pub fn add_street(&mut self, position: GridPosition) -> NodeId {
        self.add_node(position, RoadClass::Street)
    }

    /// Joins two nodes with a new segment.
    ///
    /// Returns `None` when either node is unknown, both ids are the same
    /// node, or the pair is already connected.
    pub fn connect_nodes(&mut self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        if a == b || self.pair_index.contains_key(&pair_key(a, b)) {
            return None;
        }
        let (pos_a, class_a) = self.node(a).map(|n| (n.position, n.class))?;
        let (pos_b, class_b) = self.node(b).map(|n| (n.position, n.class))?;

        let id = EdgeId(self.edges.len() as u32 + 1);
        let class = class_a.max(class_b);
        self.edges.push(Some(RoadEdge {
            id,
            start: a,
            end: b,
            length: pos_a.origin_distance_to(&pos_b),
            capacity: class.capacity(),
            current_traffic: 0.0,
            class,
            speed_limit: class.speed_limit(),
        }));
        self.live_edges += 1;
        self.pair_index.insert(pair_key(a, b), id);

        if let Some(node) = self.node_mut(a) {
            node.connections.push(b);
        }
        if let Some(node) = self.node_mut(b) {
            node.connections.push(a);
        }
        Some(id)
    }

    /// Removes a node together with every segment touching it.
    ///
    /// Returns `false` if the node does not exist.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let Some(node) = self.slot_mut(id).and_then(Option::take) else {
            return false;
        };
        self.live_nodes -= 1;

        for neighbour in &node.connections {
            if let Some(edge_id) = self.pair_index.remove(&pair_key(id, *neighbour)) {
                if let Some(slot) = self.edges.get_mut(edge_id.0 as usize - 1) {
                    if slot.take().is_some() {
                        self.live_edges -= 1;
                    }
                }
            }
            if let Some(other) = self.node_mut(*neighbour) {
                other.connections.retain(|n| *n != id);
            }
        }

        tracing::debug!(node = %id, removed_edges = node.connections.len(), "road node removed");
        true
    }

    pub fn node(&self, id: NodeId) -> Option<&RoadNode> {
        let index = (id.0 as usize).checked_sub(1)?;
        self.nodes.get(index)?.as_ref()
    }

    pub fn edge(&self, id: EdgeId) -> Option<&RoadEdge> {
        let index = (id.0 as usize).checked_sub(1)?;
        self.edges.get(index)?.as_ref()
    }

    /// The segment joining two neighbouring nodes, in either direction.
    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<&RoadEdge> {
        self.pair_index
            .get(&pair_key(a, b))
            .and_then(|id| self.edge(*id))
    }

    /// Live nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &RoadNode> + '_ {
        self.nodes.iter().flatten()
    }

    /// Live segments in ascending id order.
    pub fn edges(&self) -> impl Iterator<Item = &RoadEdge> + '_ {
        self.edges.iter().flatten()
    }

    pub fn node_count(&self) -> usize {
        self.live_nodes
    }

    pub fn edge_count(&self) -> usize {
        self.live_edges
    }

    /// Node whose grid corner is closest to `position`'s corner.
    ///
    /// Linear scan; on equal distance the lowest id wins.
    pub fn nearest_node(&self, position: &GridPosition) -> Option<NodeId> {
        let mut best: Option<(NodeId, f64)> = None;
        for node in self.nodes() {
            let distance = position.origin_distance_to(&node.position);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((node.id, distance));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Adds `delta` to a segment's load, flooring the result at zero.
    /// Unknown ids are ignored.
    pub fn update_traffic(&mut self, id: EdgeId, delta: f64) {
        if let Some(edge) = self.edge_mut(id) {
            edge.current_traffic = (edge.current_traffic + delta).max(0.0);
        }
    }

    /// Load relative to capacity, 0 for an unknown segment.
    pub fn traffic_density(&self, id: EdgeId) -> f64 {
        self.edge(id).map_or(0.0, RoadEdge::density)
    }

    /// Zeroes the load on every segment.
    pub fn clear_traffic(&mut self) {
        for edge in self.edges.iter_mut().flatten() {
            edge.current_traffic = 0.0;
        }
    }

    pub fn statistics(&self) -> NetworkStatistics {
        let mut stats = NetworkStatistics {
            node_count: self.live_nodes,
            edge_count: self.live_edges,
            ..NetworkStatistics::default()
        };
        let mut density_sum = 0.0;
        for edge in self.edges() {
            stats.total_capacity += edge.capacity;
            stats.total_traffic += edge.current_traffic;
            density_sum += edge.density();
        }
        if stats.edge_count > 0 {
            stats.average_density = density_sum / stats.edge_count as f64;
        }
        stats
    }

    /// Drops every node and edge and restarts id allocation at 1.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut Option<RoadNode>> {
        let index = (id.0 as usize).checked_sub(1)?;
        self.nodes.get_mut(index)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut RoadNode> {
        self.slot_mut(id)?.as_mut()
    }

    fn edge_mut(&mut self, id: EdgeId) -> Option<&mut RoadEdge> {
        let index = (id.0 as usize).checked_sub(1)?;
        self.edges.get_mut(index)?.as_mut()
    }
}
