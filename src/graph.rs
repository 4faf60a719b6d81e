//! Graph store for temporal-network simulation.
//!
//! An undirected simple graph over a fixed number of nodes `0..n_nodes`,
//! stored as one ordered neighbor set per node. Ordered sets keep every
//! traversal deterministic, which the seeded engines rely on.

use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// Node identifier.
pub type NodeId = usize;

/// Undirected edge, stored with the smaller node id first.
pub type Edge = (NodeId, NodeId);

/// Canonical representation of the edge between `u` and `v`.
#[inline]
pub fn ordered(u: NodeId, v: NodeId) -> Edge {
    if u <= v {
        (u, v)
    } else {
        (v, u)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    neighbors: Vec<BTreeSet<NodeId>>,
}

impl Graph {
    /// Empty graph on `n_nodes` nodes.
    pub fn new(n_nodes: usize) -> Self {
        Self {
            neighbors: vec![BTreeSet::new(); n_nodes],
        }
    }

    /// Build a graph from an edge list.
    ///
    /// Duplicate edges collapse. Self-loops and out-of-range nodes are
    /// rejected.
    pub fn from_edge_list(n_nodes: usize, edges: &[Edge]) -> Result<Self> {
        let mut graph = Self::new(n_nodes);
        graph.rebuild(edges)?;
        Ok(graph)
    }

    /// Replace the whole edge set, keeping the node count.
    pub fn rebuild(&mut self, edges: &[Edge]) -> Result<()> {
        for &(u, v) in edges {
            self.check_edge(u, v)?;
        }
        for set in &mut self.neighbors {
            set.clear();
        }
        for &(u, v) in edges {
            self.neighbors[u].insert(v);
            self.neighbors[v].insert(u);
        }
        Ok(())
    }

    fn check_node(&self, node: NodeId) -> Result<()> {
        if node >= self.neighbors.len() {
            return Err(Error::NodeOutOfRange {
                node,
                n_nodes: self.neighbors.len(),
            });
        }
        Ok(())
    }

    fn check_edge(&self, u: NodeId, v: NodeId) -> Result<()> {
        self.check_node(u)?;
        self.check_node(v)?;
        if u == v {
            return Err(Error::config(format!("self-loop on node {}", u)));
        }
        Ok(())
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.neighbors.len()
    }

    /// Neighbor set of `node`. Panics if `node` is out of range.
    #[inline]
    pub fn neighbors(&self, node: NodeId) -> &BTreeSet<NodeId> {
        &self.neighbors[node]
    }

    #[inline]
    pub fn degree(&self, node: NodeId) -> usize {
        self.neighbors[node].len()
    }

    pub fn has_edge(&self, u: NodeId, v: NodeId) -> bool {
        self.neighbors.get(u).map_or(false, |set| set.contains(&v))
    }

    /// Insert the edge `(u, v)`. Returns false if it already existed.
    pub fn insert_edge(&mut self, u: NodeId, v: NodeId) -> Result<bool> {
        self.check_edge(u, v)?;
        let inserted = self.neighbors[u].insert(v);
        self.neighbors[v].insert(u);
        Ok(inserted)
    }

    /// Remove the edge `(u, v)`. Returns false if it was absent.
    pub fn remove_edge(&mut self, u: NodeId, v: NodeId) -> Result<bool> {
        self.check_edge(u, v)?;
        let removed = self.neighbors[u].remove(&v);
        self.neighbors[v].remove(&u);
        Ok(removed)
    }

    /// Remove every edge of `node`, returning the removed edges in
    /// ascending neighbor order.
    pub fn isolate(&mut self, node: NodeId) -> Result<Vec<Edge>> {
        self.check_node(node)?;
        let old = std::mem::take(&mut self.neighbors[node]);
        let mut removed = Vec::with_capacity(old.len());
        for neighbor in old {
            self.neighbors[neighbor].remove(&node);
            removed.push(ordered(node, neighbor));
        }
        Ok(removed)
    }

    /// Apply one change record: removals first, then insertions.
    ///
    /// Removing an absent edge or adding a present one is an error, since it
    /// means the record does not belong to this graph.
    pub fn apply_changes(&mut self, edges_out: &[Edge], edges_in: &[Edge]) -> Result<()> {
        for &(u, v) in edges_out {
            if !self.remove_edge(u, v)? {
                return Err(Error::invariant(format!(
                    "removing edge ({}, {}) which is not in the graph",
                    u, v
                )));
            }
        }
        for &(u, v) in edges_in {
            if !self.insert_edge(u, v)? {
                return Err(Error::invariant(format!(
                    "adding edge ({}, {}) which is already in the graph",
                    u, v
                )));
            }
        }
        Ok(())
    }

    pub fn n_edges(&self) -> usize {
        self.neighbors.iter().map(|set| set.len()).sum::<usize>() / 2
    }

    /// Mean degree `2m / N` (zero for an empty node set).
    pub fn mean_degree(&self) -> f64 {
        if self.neighbors.is_empty() {
            return 0.0;
        }
        let twice_edges: usize = self.neighbors.iter().map(|set| set.len()).sum();
        twice_edges as f64 / self.neighbors.len() as f64
    }

    /// All edges, canonical and sorted.
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges = Vec::with_capacity(self.n_edges());
        for (u, set) in self.neighbors.iter().enumerate() {
            for &v in set.range(u + 1..) {
                edges.push((u, v));
            }
        }
        edges
    }

    /// Nodes reachable from `node`, including itself.
    pub fn component_of(&self, node: NodeId) -> Result<BTreeSet<NodeId>> {
        self.check_node(node)?;
        let mut component = BTreeSet::new();
        let mut stack = vec![node];
        component.insert(node);

        while let Some(current) = stack.pop() {
            for &neighbor in &self.neighbors[current] {
                if component.insert(neighbor) {
                    stack.push(neighbor);
                }
            }
        }
        Ok(component)
    }

    /// Symmetric, loop-free adjacency. Holds for every graph built through
    /// this API; exposed for trajectory checks.
    pub fn is_consistent(&self) -> bool {
        self.neighbors.iter().enumerate().all(|(u, set)| {
            set.iter().all(|&v| {
                v != u && v < self.neighbors.len() && self.neighbors[v].contains(&u)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_from_edge_list() {
        let graph = Graph::from_edge_list(4, &[(0, 1), (2, 1), (1, 0)]).unwrap();
        assert_eq!(graph.n_nodes(), 4);
        assert_eq!(graph.n_edges(), 2);
        assert!(graph.has_edge(1, 2));
        assert!(graph.has_edge(2, 1));
        assert_eq!(graph.edges(), vec![(0, 1), (1, 2)]);
        assert!(graph.is_consistent());
    }

    #[test]
    fn test_rejects_self_loop_and_unknown_node() {
        assert!(matches!(
            Graph::from_edge_list(3, &[(1, 1)]),
            Err(Error::InvalidConfig(_))
        ));
        assert_eq!(
            Graph::from_edge_list(3, &[(0, 3)]),
            Err(Error::NodeOutOfRange { node: 3, n_nodes: 3 })
        );
    }

    #[test]
    fn test_isolate() {
        let mut graph = Graph::from_edge_list(4, &[(0, 1), (1, 2), (3, 1)]).unwrap();
        let removed = graph.isolate(1).unwrap();
        assert_eq!(removed, vec![(0, 1), (1, 2), (1, 3)]);
        assert_eq!(graph.n_edges(), 0);
        assert!(graph.isolate(1).unwrap().is_empty());
    }

    #[test]
    fn test_apply_changes() {
        let mut graph = Graph::from_edge_list(3, &[(0, 1)]).unwrap();
        graph.apply_changes(&[(0, 1)], &[(1, 2)]).unwrap();
        assert_eq!(graph.edges(), vec![(1, 2)]);

        let err = graph.apply_changes(&[(0, 1)], &[]).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_mean_degree() {
        let graph = Graph::from_edge_list(4, &[(0, 1), (1, 2)]).unwrap();
        assert_eq!(graph.mean_degree(), 1.0);
        assert_eq!(Graph::new(0).mean_degree(), 0.0);
    }

    #[test]
    fn test_component_of() {
        let graph = Graph::from_edge_list(6, &[(0, 1), (1, 2), (3, 4)]).unwrap();
        let component: Vec<_> = graph.component_of(2).unwrap().into_iter().collect();
        assert_eq!(component, vec![0, 1, 2]);
        let lonely: Vec<_> = graph.component_of(5).unwrap().into_iter().collect();
        assert_eq!(lonely, vec![5]);
    }
}
