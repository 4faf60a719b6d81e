//! SIRS epidemic process on a changing network.
//!
//! Three event channels:
//! - 0: infection along an SI edge, propensity `eta * |SI|`
//! - 1: recovery, propensity `rho * |I|`
//! - 2: loss of immunity, propensity `omega * |R|`
//!
//! The process never owns the network. It is told about every network change
//! and keeps the SI frontier (the `(infected, susceptible)` pairs joined by an
//! edge) exactly in sync with it, either by a full rescan or by an
//! incremental diff of the changed edges.

use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};
use crate::graph::{ordered, Edge, Graph, NodeId};

/// Disease state of one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeStatus {
    Susceptible,
    Infected,
    Recovered,
}

/// SIRS transitions, indexed by their event channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SirsEvent {
    Infection,
    Recovery,
    ImmunityLoss,
}

impl SirsEvent {
    pub fn from_channel(channel: usize) -> Result<Self> {
        match channel {
            0 => Ok(SirsEvent::Infection),
            1 => Ok(SirsEvent::Recovery),
            2 => Ok(SirsEvent::ImmunityLoss),
            _ => Err(Error::ChannelOutOfRange {
                channel,
                n_channels: 3,
            }),
        }
    }
}

/// A compartmental process that reacts to network changes.
///
/// The driver owns the network and the random stream; the process only
/// reads the graph it is handed.
pub trait EpidemicProcess {
    /// Number of nodes the process tracks; every graph handed to it must
    /// have exactly this many.
    fn n_nodes(&self) -> usize;

    /// Resynchronize with a graph that was replaced wholesale.
    fn update_network(&mut self, graph: &Graph, t: f64) -> Result<()>;

    /// Resynchronize after the listed edges changed. `graph` already
    /// reflects the change.
    fn update_network_with_changes(
        &mut self,
        graph: &Graph,
        edges_in: &[Edge],
        edges_out: &[Edge],
        t: f64,
    ) -> Result<()>;

    /// Channel propensities and their total.
    fn rates(&self) -> (Vec<f64>, f64);

    /// Execute the transition of `channel` at time `t`.
    fn make_event<R: Rng + ?Sized>(
        &mut self,
        graph: &Graph,
        channel: usize,
        t: f64,
        rng: &mut R,
    ) -> Result<()>;

    /// True once no further event can ever happen.
    fn simulation_ended(&self) -> bool {
        false
    }
}

/// SIRS rate constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SirsConfig {
    /// Per SI edge.
    pub infection_rate: f64,
    /// Per infected node.
    pub recovery_rate: f64,
    /// Per recovered node.
    pub waning_immunity_rate: f64,
}

impl Default for SirsConfig {
    fn default() -> Self {
        Self {
            infection_rate: 1.0,
            recovery_rate: 0.1,
            waning_immunity_rate: 0.01,
        }
    }
}

impl SirsConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, rate) in [
            ("infection", self.infection_rate),
            ("recovery", self.recovery_rate),
            ("waning immunity", self.waning_immunity_rate),
        ] {
            if !rate.is_finite() || rate < 0.0 {
                return Err(Error::config(format!("{} rate {} is invalid", name, rate)));
            }
        }
        Ok(())
    }

    /// Reproduction-number estimate `eta * <k> / rho`.
    pub fn r0(&self, mean_degree: f64) -> f64 {
        self.infection_rate * mean_degree / self.recovery_rate
    }
}

/// Observables recorded after every event and every network update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Observables {
    pub time: Vec<f64>,
    pub susceptible: Vec<usize>,
    pub infected: Vec<usize>,
    pub recovered: Vec<usize>,
    pub si: Vec<usize>,
    pub r0: Vec<f64>,
}

impl Observables {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// SIRS process state.
#[derive(Clone, Debug)]
pub struct Sirs {
    config: SirsConfig,
    status: Vec<NodeStatus>,
    infected: Vec<NodeId>,
    recovered: Vec<NodeId>,
    si_edges: Vec<(NodeId, NodeId)>,
    mean_degree: f64,
    observables: Observables,
}

impl Sirs {
    /// Process with explicitly given initial states.
    ///
    /// The frontier is empty until the first `update_network` call.
    pub fn new(config: SirsConfig, status: Vec<NodeStatus>) -> Result<Self> {
        config.validate()?;
        let infected = status
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == NodeStatus::Infected)
            .map(|(node, _)| node)
            .collect();
        let recovered = status
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == NodeStatus::Recovered)
            .map(|(node, _)| node)
            .collect();
        Ok(Self {
            config,
            status,
            infected,
            recovered,
            si_edges: Vec::new(),
            mean_degree: 0.0,
            observables: Observables::default(),
        })
    }

    /// Process with `n_infected` infected and `n_recovered` recovered nodes
    /// chosen at random; everyone else is susceptible.
    pub fn with_random_seeding<R: Rng + ?Sized>(
        config: SirsConfig,
        n_nodes: usize,
        n_infected: usize,
        n_recovered: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if n_infected + n_recovered > n_nodes {
            return Err(Error::config(format!(
                "{} infected and {} recovered nodes exceed the {} nodes",
                n_infected, n_recovered, n_nodes
            )));
        }
        let mut nodes: Vec<NodeId> = (0..n_nodes).collect();
        nodes.shuffle(rng);

        let mut status = vec![NodeStatus::Susceptible; n_nodes];
        for &node in &nodes[..n_infected] {
            status[node] = NodeStatus::Infected;
        }
        for &node in &nodes[n_infected..n_infected + n_recovered] {
            status[node] = NodeStatus::Recovered;
        }
        Self::new(config, status)
    }

    pub fn config(&self) -> &SirsConfig {
        &self.config
    }

    pub fn status(&self) -> &[NodeStatus] {
        &self.status
    }

    pub fn n_infected(&self) -> usize {
        self.infected.len()
    }

    pub fn n_recovered(&self) -> usize {
        self.recovered.len()
    }

    pub fn n_susceptible(&self) -> usize {
        self.status.len() - self.infected.len() - self.recovered.len()
    }

    /// Current SI frontier in internal order.
    pub fn si_edges(&self) -> &[(NodeId, NodeId)] {
        &self.si_edges
    }

    /// Current SI frontier, sorted.
    pub fn si_edge_set(&self) -> Vec<(NodeId, NodeId)> {
        let mut edges = self.si_edges.clone();
        edges.sort_unstable();
        edges
    }

    pub fn observables(&self) -> &Observables {
        &self.observables
    }

    pub fn into_observables(self) -> Observables {
        self.observables
    }

    fn check_graph(&self, graph: &Graph) -> Result<()> {
        if graph.n_nodes() != self.status.len() {
            return Err(Error::config(format!(
                "network has {} nodes but the epidemic tracks {}",
                graph.n_nodes(),
                self.status.len()
            )));
        }
        Ok(())
    }

    fn infection_event<R: Rng + ?Sized>(&mut self, graph: &Graph, rng: &mut R) -> Result<()> {
        if self.si_edges.is_empty() {
            return Err(Error::invariant("infection event without any SI edge"));
        }
        let index = rng.gen_range(0..self.si_edges.len());
        let newly_infected = self.si_edges[index].1;

        self.infected.push(newly_infected);
        self.status[newly_infected] = NodeStatus::Infected;

        self.si_edges.retain(|&(_, s)| s != newly_infected);
        for &neighbor in graph.neighbors(newly_infected) {
            if self.status[neighbor] == NodeStatus::Susceptible {
                self.si_edges.push((newly_infected, neighbor));
            }
        }
        Ok(())
    }

    fn recovery_event<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        if self.infected.is_empty() {
            return Err(Error::invariant("recovery event without any infected node"));
        }
        let index = rng.gen_range(0..self.infected.len());
        let node = self.infected.swap_remove(index);

        self.recovered.push(node);
        self.status[node] = NodeStatus::Recovered;
        self.si_edges.retain(|&(i, _)| i != node);
        Ok(())
    }

    fn immunity_loss_event<R: Rng + ?Sized>(&mut self, graph: &Graph, rng: &mut R) -> Result<()> {
        if self.recovered.is_empty() {
            return Err(Error::invariant(
                "immunity loss event without any recovered node",
            ));
        }
        let index = rng.gen_range(0..self.recovered.len());
        let node = self.recovered.swap_remove(index);

        self.status[node] = NodeStatus::Susceptible;
        for &neighbor in graph.neighbors(node) {
            if self.status[neighbor] == NodeStatus::Infected {
                self.si_edges.push((neighbor, node));
            }
        }
        Ok(())
    }

    fn record(&mut self, t: f64) {
        let obs = &mut self.observables;
        obs.time.push(t);
        obs.susceptible
            .push(self.status.len() - self.infected.len() - self.recovered.len());
        obs.infected.push(self.infected.len());
        obs.recovered.push(self.recovered.len());
        obs.si.push(self.si_edges.len());
        obs.r0.push(self.config.r0(self.mean_degree));
    }
}

impl EpidemicProcess for Sirs {
    fn n_nodes(&self) -> usize {
        self.status.len()
    }

    fn update_network(&mut self, graph: &Graph, t: f64) -> Result<()> {
        self.check_graph(graph)?;
        self.mean_degree = graph.mean_degree();

        self.si_edges.clear();
        for &inf in &self.infected {
            for &neighbor in graph.neighbors(inf) {
                if self.status[neighbor] == NodeStatus::Susceptible {
                    self.si_edges.push((inf, neighbor));
                }
            }
        }

        self.record(t);
        Ok(())
    }

    fn update_network_with_changes(
        &mut self,
        graph: &Graph,
        edges_in: &[Edge],
        edges_out: &[Edge],
        t: f64,
    ) -> Result<()> {
        self.check_graph(graph)?;
        self.mean_degree = graph.mean_degree();

        if !edges_out.is_empty() {
            let leaving: BTreeSet<Edge> =
                edges_out.iter().map(|&(u, v)| ordered(u, v)).collect();
            self.si_edges
                .retain(|&(i, s)| !leaving.contains(&ordered(i, s)));
        }

        for &(u, v) in edges_in {
            match (self.status[u], self.status[v]) {
                (NodeStatus::Susceptible, NodeStatus::Infected) => self.si_edges.push((v, u)),
                (NodeStatus::Infected, NodeStatus::Susceptible) => self.si_edges.push((u, v)),
                _ => {}
            }
        }

        self.record(t);
        Ok(())
    }

    fn rates(&self) -> (Vec<f64>, f64) {
        let rates = vec![
            self.config.infection_rate * self.si_edges.len() as f64,
            self.config.recovery_rate * self.infected.len() as f64,
            self.config.waning_immunity_rate * self.recovered.len() as f64,
        ];
        let total = rates.iter().sum();
        (rates, total)
    }

    fn make_event<R: Rng + ?Sized>(
        &mut self,
        graph: &Graph,
        channel: usize,
        t: f64,
        rng: &mut R,
    ) -> Result<()> {
        self.check_graph(graph)?;
        let event = SirsEvent::from_channel(channel)?;
        match event {
            SirsEvent::Infection => self.infection_event(graph, rng)?,
            SirsEvent::Recovery => self.recovery_event(rng)?,
            SirsEvent::ImmunityLoss => self.immunity_loss_event(graph, rng)?,
        }
        trace!(
            t,
            ?event,
            infected = self.infected.len(),
            si = self.si_edges.len(),
            "sirs event"
        );
        self.record(t);
        Ok(())
    }
}
