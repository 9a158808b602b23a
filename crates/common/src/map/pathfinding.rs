//! Shortest-distance routing over the road graph.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use super::{EdgeId, NodeId, RoadGraph, Route};

/// Entry in the Dijkstra frontier.
#[derive(Debug, Clone, Copy)]
struct Frontier {
    distance: f64,
    node: NodeId,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; equal distances pop the lowest node id first
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl RoadGraph {
    /// Finds the geometrically shortest route between two nodes.
    ///
    /// Dijkstra over segment length. Ties on tentative distance are broken
    /// by ascending node id, so identical graphs always yield identical
    /// routes. The route's `estimated_time` is computed afterwards from the
    /// current load on the chosen segments; a less loaded but longer detour
    /// is never preferred.
    ///
    /// Returns `None` when either node is unknown or the two nodes sit in
    /// different connected components.
    pub fn find_path(&self, start: NodeId, end: NodeId) -> Option<Route> {
        self.node(start)?;
        self.node(end)?;

        let mut distances: HashMap<NodeId, f64> = HashMap::new();
        let mut previous: HashMap<NodeId, NodeId> = HashMap::new();
        let mut settled: HashSet<NodeId> = HashSet::new();
        let mut frontier = BinaryHeap::new();

        distances.insert(start, 0.0);
        frontier.push(Frontier { distance: 0.0, node: start });

        while let Some(Frontier { distance, node }) = frontier.pop() {
            if !settled.insert(node) {
                continue;
            }
            if node == end {
                break;
            }
            let Some(current) = self.node(node) else {
                continue;
            };

            for &neighbour in &current.connections {
                if settled.contains(&neighbour) {
                    continue;
                }
                let Some(edge) = self.edge_between(node, neighbour) else {
                    continue;
                };
                let candidate = distance + edge.length;
                let known = distances.get(&neighbour).copied().unwrap_or(f64::INFINITY);
                if candidate < known {
                    distances.insert(neighbour, candidate);
                    previous.insert(neighbour, node);
                    frontier.push(Frontier { distance: candidate, node: neighbour });
                }
            }
        }

        if !settled.contains(&end) {
            return None;
        }

        let mut nodes = vec![end];
        let mut current = end;
        while let Some(&prev) = previous.get(&current) {
            nodes.push(prev);
            current = prev;
        }
        nodes.reverse();

        let mut edges = Vec::with_capacity(nodes.len().saturating_sub(1));
        let mut total_distance = 0.0;
        for pair in nodes.windows(2) {
            if let Some(edge) = self.edge_between(pair[0], pair[1]) {
                edges.push(edge.id);
                total_distance += edge.length;
            }
        }

        let estimated_time = self.travel_time(&edges);
        Some(Route {
            nodes,
            edges,
            total_distance,
            estimated_time,
        })
    }

    /// Minutes to drive the given segments at their current load.
    /// Unknown ids contribute nothing.
    pub fn travel_time(&self, edges: &[EdgeId]) -> f64 {
        edges
            .iter()
            .filter_map(|id| self.edge(*id))
            .map(|edge| edge.travel_minutes())
            .sum()
    }
}
