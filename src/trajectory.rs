//! Temporal-network trajectories.
//!
//! Two interchangeable representations:
//! - `EdgeChanges`: initial edge list plus timestamped removal/addition records
//! - `EdgeLists`: a full edge list per timestamp
//!
//! Both replay into a `Graph` at any recorded time and can be checked for
//! structural problems before they are fed to an epidemic process.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::{ordered, Edge, Graph};

/// Change-record trajectory, as produced by the rewiring engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeChanges {
    pub n_nodes: usize,
    /// Start time; `edges_initial` is the network at `t0`.
    pub t0: f64,
    /// End of the observation window.
    pub tmax: f64,
    pub edges_initial: Vec<Edge>,
    /// Timestamp of each change record.
    pub t: Vec<f64>,
    pub edges_out: Vec<Vec<Edge>>,
    pub edges_in: Vec<Vec<Edge>>,
}

/// Snapshot trajectory: `edges[k]` is the network on `[t[k], t[k+1])`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeLists {
    pub n_nodes: usize,
    pub tmax: f64,
    pub t: Vec<f64>,
    pub edges: Vec<Vec<Edge>>,
}

/// A structural problem found while checking a trajectory.
#[derive(Clone, Debug, PartialEq)]
pub enum TrajectoryIssue {
    LengthMismatch { what: &'static str, expected: usize, found: usize },
    NodeOutOfRange { step: Option<usize>, node: usize },
    SelfLoop { step: Option<usize>, node: usize },
    DuplicateEdge { step: Option<usize>, edge: Edge },
    TimeNotIncreasing { step: usize },
    ChangeBeforeStart { step: usize },
    TmaxBeforeLastTime { tmax: f64, last: f64 },
    EdgeRemovedAndAdded { step: usize, edge: Edge },
    RemovingAbsentEdge { step: usize, edge: Edge },
    AddingPresentEdge { step: usize, edge: Edge },
}

impl fmt::Display for TrajectoryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = |step: &Option<usize>| match step {
            Some(k) => format!("step {}", k),
            None => "initial edges".to_string(),
        };
        match self {
            TrajectoryIssue::LengthMismatch { what, expected, found } => {
                write!(f, "{} has length {}, expected {}", what, found, expected)
            }
            TrajectoryIssue::NodeOutOfRange { step, node } => {
                write!(f, "{}: node {} out of range", at(step), node)
            }
            TrajectoryIssue::SelfLoop { step, node } => {
                write!(f, "{}: self-loop on node {}", at(step), node)
            }
            TrajectoryIssue::DuplicateEdge { step, edge } => {
                write!(f, "{}: duplicate edge {:?}", at(step), edge)
            }
            TrajectoryIssue::TimeNotIncreasing { step } => {
                write!(f, "step {}: time is not larger than the previous time", step)
            }
            TrajectoryIssue::ChangeBeforeStart { step } => {
                write!(f, "step {}: change happens at or before t0", step)
            }
            TrajectoryIssue::TmaxBeforeLastTime { tmax, last } => {
                write!(f, "tmax {} is smaller than the last time {}", tmax, last)
            }
            TrajectoryIssue::EdgeRemovedAndAdded { step, edge } => {
                write!(f, "step {}: edge {:?} is both removed and added", step, edge)
            }
            TrajectoryIssue::RemovingAbsentEdge { step, edge } => {
                write!(f, "step {}: removing absent edge {:?}", step, edge)
            }
            TrajectoryIssue::AddingPresentEdge { step, edge } => {
                write!(f, "step {}: adding present edge {:?}", step, edge)
            }
        }
    }
}

/// Check an edge list for range, loop and duplicate problems.
///
/// Returns the canonical edges that passed, in input order.
fn check_edges(
    edges: &[Edge],
    n_nodes: usize,
    step: Option<usize>,
    issues: &mut Vec<TrajectoryIssue>,
) -> Vec<Edge> {
    let mut seen = BTreeSet::new();
    let mut valid = Vec::with_capacity(edges.len());
    for &(u, v) in edges {
        if u >= n_nodes || v >= n_nodes {
            issues.push(TrajectoryIssue::NodeOutOfRange { step, node: u.max(v) });
            continue;
        }
        if u == v {
            issues.push(TrajectoryIssue::SelfLoop { step, node: u });
            continue;
        }
        let edge = ordered(u, v);
        if !seen.insert(edge) {
            issues.push(TrajectoryIssue::DuplicateEdge { step, edge });
            continue;
        }
        valid.push(edge);
    }
    valid
}

fn check_times(t: &[f64], tmax: f64, issues: &mut Vec<TrajectoryIssue>) {
    for (k, pair) in t.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            issues.push(TrajectoryIssue::TimeNotIncreasing { step: k + 1 });
        }
    }
    if let Some(&last) = t.last() {
        if tmax < last {
            issues.push(TrajectoryIssue::TmaxBeforeLastTime { tmax, last });
        }
    }
}

fn first_issue(issues: Vec<TrajectoryIssue>) -> Result<()> {
    match issues.into_iter().next() {
        None => Ok(()),
        Some(issue) => Err(Error::config(format!("invalid trajectory: {}", issue))),
    }
}

impl EdgeChanges {
    /// Number of change records.
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// List every structural problem of this trajectory.
    ///
    /// Replays the records against the initial graph, so removal of absent
    /// edges and addition of present ones are detected too.
    pub fn verify(&self) -> Vec<TrajectoryIssue> {
        let mut issues = Vec::new();

        let lengths = [
            ("edges_out", self.edges_out.len()),
            ("edges_in", self.edges_in.len()),
        ];
        for (what, found) in lengths {
            if found != self.t.len() {
                issues.push(TrajectoryIssue::LengthMismatch {
                    what,
                    expected: self.t.len(),
                    found,
                });
            }
        }
        check_times(&self.t, self.tmax, &mut issues);
        if let Some(&first) = self.t.first() {
            if first <= self.t0 {
                issues.push(TrajectoryIssue::ChangeBeforeStart { step: 0 });
            }
        }

        let initial = check_edges(&self.edges_initial, self.n_nodes, None, &mut issues);
        let mut present: BTreeSet<Edge> = initial.into_iter().collect();

        let n_records = self.edges_out.len().min(self.edges_in.len());
        for step in 0..n_records {
            let removed = check_edges(&self.edges_out[step], self.n_nodes, Some(step), &mut issues);
            let added = check_edges(&self.edges_in[step], self.n_nodes, Some(step), &mut issues);

            let removed_set: BTreeSet<Edge> = removed.iter().copied().collect();
            for edge in &added {
                if removed_set.contains(edge) {
                    issues.push(TrajectoryIssue::EdgeRemovedAndAdded { step, edge: *edge });
                }
            }
            for edge in removed {
                if !present.remove(&edge) {
                    issues.push(TrajectoryIssue::RemovingAbsentEdge { step, edge });
                }
            }
            for edge in added {
                if !present.insert(edge) {
                    issues.push(TrajectoryIssue::AddingPresentEdge { step, edge });
                }
            }
        }

        issues
    }

    /// Reject a trajectory with any structural problem.
    pub fn validate(&self) -> Result<()> {
        first_issue(self.verify())
    }

    /// Graph before any change record is applied.
    pub fn initial_graph(&self) -> Result<Graph> {
        Graph::from_edge_list(self.n_nodes, &self.edges_initial)
    }

    /// Network at time `time`: the initial graph with every record whose
    /// timestamp is `<= time` applied in order.
    pub fn graph_at(&self, time: f64) -> Result<Graph> {
        let mut graph = self.initial_graph()?;
        for (k, &t) in self.t.iter().enumerate() {
            if t > time {
                break;
            }
            graph.apply_changes(&self.edges_out[k], &self.edges_in[k])?;
        }
        Ok(graph)
    }
}

impl EdgeLists {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// List every structural problem of this trajectory.
    pub fn verify(&self) -> Vec<TrajectoryIssue> {
        let mut issues = Vec::new();
        if self.edges.len() != self.t.len() {
            issues.push(TrajectoryIssue::LengthMismatch {
                what: "edges",
                expected: self.t.len(),
                found: self.edges.len(),
            });
        }
        check_times(&self.t, self.tmax, &mut issues);
        for (step, edges) in self.edges.iter().enumerate() {
            check_edges(edges, self.n_nodes, Some(step), &mut issues);
        }
        issues
    }

    pub fn validate(&self) -> Result<()> {
        if self.t.is_empty() {
            return Err(Error::config("snapshot trajectory without any time point"));
        }
        first_issue(self.verify())
    }

    /// Network at time `time`, i.e. the last snapshot taken at or before it.
    /// Before the first snapshot the network is empty.
    pub fn graph_at(&self, time: f64) -> Result<Graph> {
        let index = self.t.partition_point(|&t| t <= time);
        match index {
            0 => Ok(Graph::new(self.n_nodes)),
            k => Graph::from_edge_list(self.n_nodes, &self.edges[k - 1]),
        }
    }
}
