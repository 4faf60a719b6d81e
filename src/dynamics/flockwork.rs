//! Flockwork-P rewiring engine.
//!
//! On every event an acting node drops all of its edges. On a reconnection
//! event it then links to one other node, drawn uniformly or from the node's
//! neighbor-affinity weights; on a disconnection event it stays alone.
//! The reconnection probability P is encoded by the relative propensities of
//! the reconnection and disconnection channels.
//!
//! The three model variants are one engine with two policies:
//! - node selection: uniform node on a shared channel, or decoded from a
//!   per-node channel
//! - target selection: uniform other node, or affinity-weighted candidate

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::equilibrium::equilibrium_configuration;
use super::rates::{AggregatedRates, RewiringRates};
use super::sampler::{choose_channel, RateSampler};
use crate::error::{Error, Result};
use crate::graph::{ordered, Edge, Graph, NodeId};
use crate::trajectory::EdgeChanges;

/// The two Flockwork transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RewiringEvent {
    /// Drop all edges, then link to one other node.
    Reconnect,
    /// Drop all edges.
    Disconnect,
}

/// How the acting node is derived from a sampled channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeSelection {
    /// Channel 1 reconnects, channel 2 disconnects; node drawn uniformly.
    Uniform,
    /// Channel `c` in `1..=2N`: node `(c-1) % N`, reconnect iff `(c-1) / N == 0`.
    PerNodeChannel,
}

impl NodeSelection {
    /// Decode `channel` into the acting node and its transition.
    pub fn decode<R: Rng + ?Sized>(
        &self,
        channel: usize,
        n_nodes: usize,
        rng: &mut R,
    ) -> Result<(NodeId, RewiringEvent)> {
        match self {
            NodeSelection::Uniform => {
                let event = match channel {
                    1 => RewiringEvent::Reconnect,
                    2 => RewiringEvent::Disconnect,
                    _ => {
                        return Err(Error::ChannelOutOfRange {
                            channel,
                            n_channels: 3,
                        })
                    }
                };
                Ok((rng.gen_range(0..n_nodes), event))
            }
            NodeSelection::PerNodeChannel => {
                if channel == 0 || channel > 2 * n_nodes {
                    return Err(Error::ChannelOutOfRange {
                        channel,
                        n_channels: 2 * n_nodes + 1,
                    });
                }
                let node = (channel - 1) % n_nodes;
                let event = if (channel - 1) / n_nodes == 0 {
                    RewiringEvent::Reconnect
                } else {
                    RewiringEvent::Disconnect
                };
                Ok((node, event))
            }
        }
    }
}

/// Weighted reconnection candidates of one node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NeighborAffinity {
    pub candidates: Vec<NodeId>,
    pub weights: Vec<f64>,
}

impl NeighborAffinity {
    pub fn new(candidates: Vec<NodeId>, weights: Vec<f64>) -> Self {
        Self { candidates, weights }
    }

    fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    fn validate(&self, node: NodeId, n_nodes: usize) -> Result<()> {
        if self.candidates.len() != self.weights.len() {
            return Err(Error::config(format!(
                "node {} has {} affinity candidates but {} weights",
                node,
                self.candidates.len(),
                self.weights.len()
            )));
        }
        for &candidate in &self.candidates {
            if candidate >= n_nodes {
                return Err(Error::NodeOutOfRange { node: candidate, n_nodes });
            }
            if candidate == node {
                return Err(Error::config(format!(
                    "node {} lists itself as an affinity candidate",
                    node
                )));
            }
        }
        if let Some(w) = self.weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(Error::config(format!(
                "node {} has invalid affinity weight {}",
                node, w
            )));
        }
        Ok(())
    }
}

/// How the new neighbor of a reconnecting node is drawn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum TargetSelection {
    /// Uniformly among all other nodes.
    #[default]
    Uniform,
    /// From per-node weighted candidate lists, indexed by node.
    Affinity(Vec<NeighborAffinity>),
}

impl TargetSelection {
    fn validate(&self, n_nodes: usize) -> Result<()> {
        if let TargetSelection::Affinity(affinities) = self {
            if affinities.len() != n_nodes {
                return Err(Error::config(format!(
                    "{} neighbor affinity lists for {} nodes",
                    affinities.len(),
                    n_nodes
                )));
            }
            for (node, affinity) in affinities.iter().enumerate() {
                affinity.validate(node, n_nodes)?;
            }
        }
        Ok(())
    }

    /// New neighbor for `node`, or `None` if it has no candidate.
    fn draw<R: Rng + ?Sized>(
        &self,
        node: NodeId,
        n_nodes: usize,
        rng: &mut R,
    ) -> Result<Option<NodeId>> {
        match self {
            TargetSelection::Uniform => {
                if n_nodes < 2 {
                    return Ok(None);
                }
                let mut target = rng.gen_range(0..n_nodes - 1);
                if target >= node {
                    target += 1;
                }
                Ok(Some(target))
            }
            TargetSelection::Affinity(affinities) => {
                let affinity = &affinities[node];
                let total = affinity.total_weight();
                if total <= 0.0 {
                    return Ok(None);
                }
                let index = choose_channel(affinity.weights.iter().copied(), total, rng)?;
                Ok(Some(affinity.candidates[index]))
            }
        }
    }
}

/// Edges removed and added by one rewiring step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeChange {
    pub removed: Vec<Edge>,
    pub added: Vec<Edge>,
}

impl EdgeChange {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Configuration of a Flockwork-P run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlockworkConfig {
    pub n_nodes: usize,
    pub initial_edges: Vec<Edge>,
    pub rates: RewiringRates,
    #[serde(default)]
    pub targets: TargetSelection,
    /// Total run time; events at or after it are discarded.
    pub t_run_total: f64,
    /// No events are scheduled beyond this time.
    pub horizon: f64,
    pub seed: u64,
}

impl Default for FlockworkConfig {
    fn default() -> Self {
        Self {
            n_nodes: 100,
            initial_edges: Vec::new(),
            rates: RewiringRates::constant(0.0, 0.5, 0.5),
            targets: TargetSelection::Uniform,
            t_run_total: 100.0,
            horizon: 100.0,
            seed: 0,
        }
    }
}

impl FlockworkConfig {
    /// Constant-rate Flockwork-P with rewiring rate `gamma` per node and
    /// reconnection probability `p`, started from a sampled equilibrium
    /// configuration (seeded with `seed`). Needs more than 2 nodes.
    pub fn flockwork_p(
        n_nodes: usize,
        p: f64,
        gamma: f64,
        t_run_total: f64,
        seed: u64,
    ) -> Result<Self> {
        let rates = RewiringRates::from_rewiring_rate_and_probability(&[(0.0, gamma)], &[p])?;
        let mut rng = StdRng::seed_from_u64(seed);
        let initial_edges = equilibrium_configuration(n_nodes, p, true, &mut rng)?;
        Ok(Self {
            n_nodes,
            initial_edges,
            rates,
            t_run_total,
            horizon: t_run_total,
            seed,
            ..Self::default()
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_nodes < 2 {
            return Err(Error::config(format!(
                "Flockwork needs at least 2 nodes, got {}",
                self.n_nodes
            )));
        }
        let t0 = self
            .rates
            .times()
            .first()
            .copied()
            .ok_or_else(|| Error::config("rate schedule has no checkpoints"))?;
        if !(self.t_run_total > t0) {
            return Err(Error::config(format!(
                "run end {} is not after the schedule start {}",
                self.t_run_total, t0
            )));
        }
        if !(self.horizon > t0) {
            return Err(Error::config(format!(
                "horizon {} is not after the schedule start {}",
                self.horizon, t0
            )));
        }
        self.targets.validate(self.n_nodes)?;
        Ok(())
    }

    fn node_selection(&self) -> NodeSelection {
        if self.rates.is_per_node() {
            NodeSelection::PerNodeChannel
        } else {
            NodeSelection::Uniform
        }
    }
}

/// Flockwork-P engine owning the graph of one run.
pub struct FlockworkEngine {
    graph: Graph,
    rates: AggregatedRates,
    nodes: NodeSelection,
    targets: TargetSelection,
    rng: StdRng,
}

impl FlockworkEngine {
    pub fn new(config: &FlockworkConfig) -> Result<Self> {
        config.validate()?;
        let graph = Graph::from_edge_list(config.n_nodes, &config.initial_edges)?;
        let rates = config.rates.aggregate(config.n_nodes)?;
        Ok(Self {
            graph,
            rates,
            nodes: config.node_selection(),
            targets: config.targets.clone(),
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn rates(&self) -> &AggregatedRates {
        &self.rates
    }

    /// Apply `event` to `node` and report the resulting edge change.
    ///
    /// A reconnection to a node that already was a neighbor keeps that edge,
    /// so it shows up in neither list.
    pub fn rewire(&mut self, node: NodeId, event: RewiringEvent) -> Result<EdgeChange> {
        let mut removed = self.graph.isolate(node)?;
        let mut added = Vec::new();

        if event == RewiringEvent::Reconnect {
            if let Some(target) = self.targets.draw(node, self.graph.n_nodes(), &mut self.rng)? {
                let edge = ordered(node, target);
                match removed.iter().position(|e| *e == edge) {
                    Some(i) => {
                        removed.remove(i);
                    }
                    None => added.push(edge),
                }
                self.graph.insert_edge(node, target)?;
            }
        }

        Ok(EdgeChange { removed, added })
    }

    /// Decode a sampled channel and apply it.
    pub fn apply_channel(&mut self, channel: usize) -> Result<(NodeId, EdgeChange)> {
        let (node, event) = self
            .nodes
            .decode(channel, self.graph.n_nodes(), &mut self.rng)?;
        let change = self.rewire(node, event)?;
        Ok((node, change))
    }

    /// Run from the schedule start until `t_run_total` (or the horizon) and
    /// return the recorded trajectory. Consumes the engine.
    pub fn run(mut self, t_run_total: f64, horizon: f64) -> Result<EdgeChanges> {
        let t0 = self.rates.start_time();
        let edges_initial = self.graph.edges();
        let mut t = t0;
        let mut time = Vec::new();
        let mut edges_out = Vec::new();
        let mut edges_in = Vec::new();
        let mut n_events = 0usize;

        let rates = self.rates.clone();
        let mut sampler = RateSampler::new(&rates, horizon);

        debug!(
            n_nodes = self.graph.n_nodes(),
            n_edges = edges_initial.len(),
            t0,
            t_run_total,
            horizon,
            "flockwork run started"
        );

        while t < t_run_total {
            let Some(event) = sampler.next_event(t, &mut self.rng)? else {
                break;
            };
            t = event.time;
            if t >= t_run_total {
                break;
            }
            n_events += 1;

            let (node, change) = self.apply_channel(event.channel)?;
            trace!(
                t,
                node,
                channel = event.channel,
                removed = change.removed.len(),
                added = change.added.len(),
                "rewiring event"
            );

            if !change.is_empty() {
                time.push(t);
                edges_out.push(change.removed);
                edges_in.push(change.added);
            }
        }

        debug!(n_events, n_records = time.len(), "flockwork run finished");

        Ok(EdgeChanges {
            n_nodes: self.graph.n_nodes(),
            t0,
            tmax: t_run_total,
            edges_initial,
            t: time,
            edges_out,
            edges_in,
        })
    }
}

/// Simulate one Flockwork-P trajectory.
pub fn simulate_flockwork(config: &FlockworkConfig) -> Result<EdgeChanges> {
    FlockworkEngine::new(config)?.run(config.t_run_total, config.horizon)
}

/// Simulate independent trajectories in parallel.
///
/// Trajectory `i` uses seed `config.seed + i`, so each one can be
/// reproduced on its own with `simulate_flockwork`.
pub fn simulate_flockwork_parallel(
    config: &FlockworkConfig,
    n_samples: usize,
) -> Result<Vec<EdgeChanges>> {
    config.validate()?;
    (0..n_samples)
        .into_par_iter()
        .map(|i| {
            let config = FlockworkConfig {
                seed: config.seed.wrapping_add(i as u64),
                ..config.clone()
            };
            simulate_flockwork(&config)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn per_node_config(n: usize, alpha: f64, beta: f64) -> FlockworkConfig {
        FlockworkConfig {
            n_nodes: n,
            initial_edges: vec![(0, 1), (1, 2)],
            rates: RewiringRates::PerNode {
                times: vec![0.0],
                reconnection: vec![vec![alpha; n]],
                disconnection: vec![vec![beta; n]],
            },
            targets: TargetSelection::Uniform,
            t_run_total: 10.0,
            horizon: 10.0,
            seed: 42,
        }
    }

    #[test]
    fn test_decode_per_node_channels() {
        let mut rng = StdRng::seed_from_u64(0);
        let sel = NodeSelection::PerNodeChannel;
        assert_eq!(sel.decode(1, 4, &mut rng).unwrap(), (0, RewiringEvent::Reconnect));
        assert_eq!(sel.decode(4, 4, &mut rng).unwrap(), (3, RewiringEvent::Reconnect));
        assert_eq!(sel.decode(5, 4, &mut rng).unwrap(), (0, RewiringEvent::Disconnect));
        assert_eq!(sel.decode(8, 4, &mut rng).unwrap(), (3, RewiringEvent::Disconnect));
        assert!(sel.decode(0, 4, &mut rng).unwrap_err().is_invariant_violation());
        assert!(sel.decode(9, 4, &mut rng).unwrap_err().is_invariant_violation());
    }

    #[test]
    fn test_decode_global_channels() {
        let mut rng = StdRng::seed_from_u64(0);
        let sel = NodeSelection::Uniform;
        assert_eq!(sel.decode(1, 4, &mut rng).unwrap().1, RewiringEvent::Reconnect);
        assert_eq!(sel.decode(2, 4, &mut rng).unwrap().1, RewiringEvent::Disconnect);
        assert!(sel.decode(0, 4, &mut rng).is_err());
        assert!(sel.decode(3, 4, &mut rng).is_err());
    }

    #[test]
    fn test_single_disconnect_event_leaves_at_most_one_edge() {
        // N = 4, edges (0,1), (1,2), pure disconnection: whichever node acts,
        // it loses all its edges.
        for seed in 0..20 {
            let mut config = per_node_config(4, 0.0, 1.0);
            config.seed = seed;
            let mut engine = FlockworkEngine::new(&config).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            let event = RateSampler::new(engine.rates(), 10.0)
                .next_event(0.0, &mut rng)
                .unwrap()
                .unwrap();
            let (node, change) = engine.apply_channel(event.channel).unwrap();

            assert!(change.added.is_empty());
            assert!(engine.graph().n_edges() <= 1);
            assert_eq!(engine.graph().degree(node), 0);
            match node {
                1 => assert_eq!(change.removed, vec![(0, 1), (1, 2)]),
                0 => assert_eq!(change.removed, vec![(0, 1)]),
                2 => assert_eq!(change.removed, vec![(1, 2)]),
                _ => assert!(change.is_empty()),
            }
        }
    }

    #[test]
    fn test_global_disconnect_event_leaves_at_most_one_edge() {
        // N = 4, edges (0,1), (1,2), global reconnection 0 and disconnection
        // 1: the single event isolates a uniformly drawn node.
        let mut seen = [false; 4];
        for seed in 0..40 {
            let config = FlockworkConfig {
                n_nodes: 4,
                initial_edges: vec![(0, 1), (1, 2)],
                rates: RewiringRates::constant(0.0, 0.0, 1.0),
                t_run_total: 10.0,
                horizon: 10.0,
                seed,
                ..FlockworkConfig::default()
            };
            let mut engine = FlockworkEngine::new(&config).unwrap();
            assert_eq!(engine.rates().n_channels(), 3);

            let mut rng = StdRng::seed_from_u64(seed);
            let event = RateSampler::new(engine.rates(), 10.0)
                .next_event(0.0, &mut rng)
                .unwrap()
                .unwrap();
            assert_eq!(event.channel, 2);

            let (node, change) = engine.apply_channel(event.channel).unwrap();
            seen[node] = true;
            assert!(change.added.is_empty());
            assert!(engine.graph().n_edges() <= 1);
            assert_eq!(engine.graph().degree(node), 0);
            match node {
                0 => assert_eq!(change.removed, vec![(0, 1)]),
                1 => assert_eq!(change.removed, vec![(0, 1), (1, 2)]),
                2 => assert_eq!(change.removed, vec![(1, 2)]),
                _ => assert!(change.is_empty()),
            }
        }
        // every node gets drawn for some seed
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_global_rates_with_affinity_run() {
        let n = 6;
        let affinities: Vec<_> = (0..n)
            .map(|i| NeighborAffinity::new(vec![(i + 1) % n, (i + 2) % n], vec![1.0, 2.0]))
            .collect();
        let config = FlockworkConfig {
            n_nodes: n,
            initial_edges: vec![],
            rates: RewiringRates::constant(0.0, 0.8, 0.2),
            targets: TargetSelection::Affinity(affinities.clone()),
            t_run_total: 20.0,
            horizon: 20.0,
            seed: 5,
        };
        let changes = simulate_flockwork(&config).unwrap();
        assert!(!changes.is_empty());
        assert!(changes.verify().is_empty());

        let is_candidate = |u: NodeId, v: NodeId| affinities[u].candidates.contains(&v);
        let added: Vec<Edge> = changes.edges_in.iter().flatten().copied().collect();
        assert!(!added.is_empty());
        for (u, v) in added {
            assert!(is_candidate(u, v) || is_candidate(v, u), "edge ({}, {})", u, v);
        }
    }

    #[test]
    fn test_flockwork_p_starts_in_equilibrium() {
        let config = FlockworkConfig::flockwork_p(30, 0.7, 1.0, 5.0, 11).unwrap();
        assert!(!config.initial_edges.is_empty());
        let graph = Graph::from_edge_list(30, &config.initial_edges).unwrap();
        for node in 0..30 {
            let group = graph.component_of(node).unwrap();
            assert_eq!(graph.degree(node), group.len() - 1);
        }

        let again = FlockworkConfig::flockwork_p(30, 0.7, 1.0, 5.0, 11).unwrap();
        assert_eq!(config.initial_edges, again.initial_edges);
        assert!(FlockworkConfig::flockwork_p(2, 0.7, 1.0, 5.0, 11).is_err());
    }

    #[test]
    fn test_reconnect_to_existing_neighbor_is_empty() {
        let config = FlockworkConfig {
            n_nodes: 2,
            initial_edges: vec![(0, 1)],
            ..per_node_config(2, 1.0, 0.0)
        };
        let mut engine = FlockworkEngine::new(&config).unwrap();
        let change = engine.rewire(0, RewiringEvent::Reconnect).unwrap();
        assert!(change.is_empty());
        assert!(engine.graph().has_edge(0, 1));
    }

    #[test]
    fn test_reconnect_adds_exactly_one_edge() {
        let mut engine = FlockworkEngine::new(&per_node_config(6, 1.0, 0.0)).unwrap();
        for _ in 0..50 {
            let node = 1;
            let before: Vec<_> = engine.graph().neighbors(node).iter().copied().collect();
            let change = engine.rewire(node, RewiringEvent::Reconnect).unwrap();
            assert_eq!(engine.graph().degree(node), 1);
            assert!(change.added.len() <= 1);
            // A kept neighbor is neither removed nor added.
            assert_eq!(
                change.removed.len() + usize::from(change.added.is_empty()),
                before.len()
            );
            assert!(change.added.iter().all(|e| !change.removed.contains(e)));
        }
    }

    #[test]
    fn test_affinity_targets() {
        let affinities = vec![
            NeighborAffinity::new(vec![2], vec![1.0]),
            NeighborAffinity::new(vec![], vec![]),
            NeighborAffinity::new(vec![0, 1], vec![0.0, 2.0]),
        ];
        let config = FlockworkConfig {
            n_nodes: 3,
            initial_edges: vec![],
            targets: TargetSelection::Affinity(affinities),
            ..per_node_config(3, 1.0, 0.0)
        };
        let mut engine = FlockworkEngine::new(&config).unwrap();

        let change = engine.rewire(0, RewiringEvent::Reconnect).unwrap();
        assert_eq!(change.added, vec![(0, 2)]);

        let change = engine.rewire(2, RewiringEvent::Reconnect).unwrap();
        assert_eq!(change.removed, vec![(0, 2)]);
        assert_eq!(change.added, vec![(1, 2)]);

        let change = engine.rewire(1, RewiringEvent::Reconnect).unwrap();
        assert_eq!(change.removed, vec![(1, 2)]);
        assert!(change.added.is_empty());
    }

    #[test]
    fn test_invalid_affinity_rejected() {
        let config = FlockworkConfig {
            targets: TargetSelection::Affinity(vec![NeighborAffinity::new(vec![0], vec![1.0])]),
            ..per_node_config(1, 1.0, 0.0)
        };
        assert!(FlockworkEngine::new(&config).is_err());

        let config = FlockworkConfig {
            targets: TargetSelection::Affinity(vec![
                NeighborAffinity::new(vec![1], vec![1.0]),
                NeighborAffinity::new(vec![0], vec![1.0]),
            ]),
            ..per_node_config(3, 1.0, 0.0)
        };
        assert!(matches!(FlockworkEngine::new(&config), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_run_records_increasing_times_within_window() {
        let changes = simulate_flockwork(&per_node_config(10, 0.7, 0.3)).unwrap();
        assert!(!changes.is_empty());
        assert!(changes.t.windows(2).all(|w| w[0] < w[1]));
        assert!(changes.t.iter().all(|&t| t > 0.0 && t < 10.0));
        assert!(changes.verify().is_empty());
        assert_eq!(changes.edges_initial, vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn test_global_rates_run() {
        let config = FlockworkConfig::flockwork_p(20, 0.5, 1.0, 20.0, 3).unwrap();
        let changes = simulate_flockwork(&config).unwrap();
        assert!(!changes.is_empty());
        assert!(changes.verify().is_empty());
        assert_eq!(changes.tmax, 20.0);
    }

    #[test]
    fn test_horizon_stops_events() {
        let mut config = per_node_config(10, 0.7, 0.3);
        config.horizon = 2.0;
        let changes = simulate_flockwork(&config).unwrap();
        assert!(changes.t.iter().all(|&t| t < 2.0));
        assert_eq!(changes.tmax, 10.0);
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let config = FlockworkConfig::flockwork_p(15, 0.6, 1.0, 10.0, 99).unwrap();
        assert_eq!(simulate_flockwork(&config).unwrap(), simulate_flockwork(&config).unwrap());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let config = FlockworkConfig::flockwork_p(10, 0.5, 1.0, 5.0, 7).unwrap();
        let runs = simulate_flockwork_parallel(&config, 4).unwrap();
        assert_eq!(runs.len(), 4);
        let third = FlockworkConfig { seed: 9, ..config };
        assert_eq!(runs[2], simulate_flockwork(&third).unwrap());
    }

    #[test]
    fn test_rejects_bad_windows() {
        let mut config = per_node_config(4, 1.0, 1.0);
        config.t_run_total = 0.0;
        assert!(matches!(simulate_flockwork(&config), Err(Error::InvalidConfig(_))));

        let mut config = per_node_config(4, 1.0, 1.0);
        config.initial_edges = vec![(2, 2)];
        assert!(simulate_flockwork(&config).is_err());
    }
}
