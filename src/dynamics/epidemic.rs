//! Drivers that run an epidemic process on a temporal network.
//!
//! Between two network changes the process's propensities are constant, so
//! plain Gillespie steps are drawn from them. A draw that would land at or
//! past the next change is discarded and the clock jumps to the change;
//! memorylessness makes this exact.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use super::sampler::{choose_channel, waiting_time};
use super::sirs::{EpidemicProcess, Observables, Sirs, SirsConfig};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::trajectory::{EdgeChanges, EdgeLists};

/// Draw events from `process` on the fixed `graph` from `t` until `until`.
///
/// Returns the number of events executed.
fn advance<P, R>(
    process: &mut P,
    graph: &Graph,
    mut t: f64,
    until: f64,
    rng: &mut R,
) -> Result<usize>
where
    P: EpidemicProcess,
    R: Rng + ?Sized,
{
    let mut n_events = 0;
    while t < until && !process.simulation_ended() {
        let (rates, total) = process.rates();
        if total <= 0.0 {
            break;
        }
        let next = t + waiting_time(total, rng);
        if next >= until {
            break;
        }
        t = next;
        let channel = choose_channel(rates, total, rng)?;
        process.make_event(graph, channel, t, rng)?;
        n_events += 1;
    }
    Ok(n_events)
}

/// Reject a process sized for a different network.
fn check_node_count<P: EpidemicProcess>(process: &P, n_nodes: usize) -> Result<()> {
    if process.n_nodes() != n_nodes {
        return Err(Error::config(format!(
            "trajectory has {} nodes but the epidemic tracks {}",
            n_nodes,
            process.n_nodes()
        )));
    }
    Ok(())
}

/// Run `process` on a change-record trajectory until `changes.tmax`.
///
/// The process is synchronized with the initial network at `t0`, then with
/// every change record through the incremental update.
pub fn simulate_on_edge_changes<P, R>(
    changes: &EdgeChanges,
    process: &mut P,
    rng: &mut R,
) -> Result<()>
where
    P: EpidemicProcess,
    R: Rng + ?Sized,
{
    changes.validate()?;
    check_node_count(process, changes.n_nodes)?;

    let mut graph = changes.initial_graph()?;
    let mut t = changes.t0;
    let mut n_events = 0;
    process.update_network(&graph, t)?;

    debug!(
        n_nodes = changes.n_nodes,
        n_records = changes.len(),
        t0 = changes.t0,
        tmax = changes.tmax,
        "epidemic on edge changes started"
    );

    for (k, &t_change) in changes.t.iter().enumerate() {
        n_events += advance(process, &graph, t, t_change, rng)?;
        t = t_change;

        let (edges_out, edges_in) = (&changes.edges_out[k], &changes.edges_in[k]);
        graph.apply_changes(edges_out, edges_in)?;
        process.update_network_with_changes(&graph, edges_in, edges_out, t)?;
    }

    n_events += advance(process, &graph, t, changes.tmax, rng)?;

    debug!(n_events, t = changes.tmax, "epidemic on edge changes finished");
    Ok(())
}

/// Run `process` on a snapshot trajectory until `lists.tmax`.
///
/// The network is rebuilt at every snapshot and the process fully rescans
/// it. Nothing happens before the first snapshot.
pub fn simulate_on_edge_lists<P, R>(lists: &EdgeLists, process: &mut P, rng: &mut R) -> Result<()>
where
    P: EpidemicProcess,
    R: Rng + ?Sized,
{
    lists.validate()?;
    check_node_count(process, lists.n_nodes)?;

    let mut graph = Graph::new(lists.n_nodes);
    let mut n_events = 0;

    debug!(
        n_nodes = lists.n_nodes,
        n_snapshots = lists.len(),
        tmax = lists.tmax,
        "epidemic on edge lists started"
    );

    for (k, (&t, edges)) in lists.t.iter().zip(&lists.edges).enumerate() {
        graph.rebuild(edges)?;
        process.update_network(&graph, t)?;

        let until = lists.t.get(k + 1).copied().unwrap_or(lists.tmax);
        n_events += advance(process, &graph, t, until, rng)?;
    }

    debug!(n_events, t = lists.tmax, "epidemic on edge lists finished");
    Ok(())
}

/// Run independent SIRS realizations on the same trajectory in parallel.
///
/// Realization `i` draws its initial infected and recovered nodes and all
/// of its events from `StdRng::seed_from_u64(seed + i)`.
pub fn simulate_sirs_parallel(
    changes: &EdgeChanges,
    config: &SirsConfig,
    n_infected: usize,
    n_recovered: usize,
    n_samples: usize,
    seed: u64,
) -> Result<Vec<Observables>> {
    config.validate()?;
    changes.validate()?;
    if n_infected + n_recovered > changes.n_nodes {
        return Err(Error::config(format!(
            "{} infected and {} recovered nodes exceed the {} nodes",
            n_infected, n_recovered, changes.n_nodes
        )));
    }

    (0..n_samples)
        .into_par_iter()
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let mut process = Sirs::with_random_seeding(
                config.clone(),
                changes.n_nodes,
                n_infected,
                n_recovered,
                &mut rng,
            )?;
            simulate_on_edge_changes(changes, &mut process, &mut rng)?;
            Ok(process.into_observables())
        })
        .collect()
}
