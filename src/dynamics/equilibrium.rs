//! Equilibrium state of the Flockwork-P model.
//!
//! In equilibrium the network is a disjoint union of fully connected groups.
//! The expected number of groups of each size has a closed form in `N` and
//! `P`; a configuration is sampled by drawing group counts from Poisson
//! distributions with those means.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Poisson};

use crate::error::{Error, Result};
use crate::graph::{ordered, Edge};

/// Expected number of groups of size `m` for `m = 0..=N` (entry 0 is zero).
///
/// Requires `N > 2` and `0 <= P <= 1`.
pub fn equilibrium_group_size_distribution(n_nodes: usize, p: f64) -> Result<Vec<f64>> {
    if n_nodes <= 2 {
        return Err(Error::config(format!(
            "equilibrium distribution needs more than 2 nodes, got {}",
            n_nodes
        )));
    }
    if !(0.0..=1.0).contains(&p) {
        return Err(Error::config(format!(
            "reconnection probability {} outside [0, 1]",
            p
        )));
    }

    let n = n_nodes as f64;
    let mut dist = vec![0.0; n_nodes + 1];

    if p == 0.0 {
        dist[1] = n;
        return Ok(dist);
    }
    if p == 1.0 {
        dist[n_nodes] = 1.0;
        return Ok(dist);
    }

    let sign = |m: usize| if m % 2 == 0 { 1.0 } else { -1.0 };

    dist[1] = n * (1.0 - p);

    // prod_{j=1}^{m-1} (N - j) / (P j - N + 1)
    let mut cumulative = 1.0;
    for m in 2..n_nodes {
        let j = (m - 1) as f64;
        cumulative *= (n - j) / (p * j - n + 1.0);
        dist[m] = sign(m) * n / m as f64 * (p - 1.0) * cumulative * p.powi(m as i32 - 1);
    }

    let mut value = sign(n_nodes) * p;
    for j in 1..n_nodes - 1 {
        value *= (n - j as f64 - 1.0) / ((p - n + 1.0) / p + (j as f64 - 1.0));
    }
    dist[n_nodes] = value;

    Ok(dist)
}

/// Sample an equilibrium edge list.
///
/// Nodes are shuffled first when `shuffle_nodes` is set, then dealt into
/// fully connected groups, largest sizes first.
pub fn equilibrium_configuration<R: Rng + ?Sized>(
    n_nodes: usize,
    p: f64,
    shuffle_nodes: bool,
    rng: &mut R,
) -> Result<Vec<Edge>> {
    let dist = equilibrium_group_size_distribution(n_nodes, p)?;

    let mut node_ids: Vec<usize> = (0..n_nodes).collect();
    if shuffle_nodes {
        node_ids.shuffle(rng);
    }

    let mut samplers = Vec::with_capacity(n_nodes + 1);
    for &mean in &dist {
        samplers.push(if mean > 0.0 {
            Some(Poisson::new(mean).map_err(|e| Error::config(e.to_string()))?)
        } else {
            None
        });
    }

    let mut edges = Vec::new();
    let mut group_counts = vec![0usize; n_nodes + 1];
    let mut nodes_left = n_nodes;

    while nodes_left > 0 {
        for m in (1..=nodes_left).rev() {
            if nodes_left < m {
                continue;
            }
            let Some(poisson) = &samplers[m] else {
                continue;
            };

            let drawn = poisson.sample(rng) as usize;
            let new_groups = if drawn > group_counts[m] {
                drawn - group_counts[m]
            } else if nodes_left == 1 && m == 1 {
                1
            } else {
                0
            };

            for _ in 0..new_groups {
                if nodes_left < m {
                    break;
                }
                let group = &node_ids[nodes_left - m..nodes_left];
                for (i, &u) in group.iter().enumerate() {
                    for &v in &group[i + 1..] {
                        edges.push(ordered(u, v));
                    }
                }
                nodes_left -= m;
                group_counts[m] += 1;
            }
        }
    }

    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_distribution_accounts_for_every_node() {
        for &p in &[0.0, 0.1, 0.5, 0.9, 1.0] {
            let dist = equilibrium_group_size_distribution(10, p).unwrap();
            assert_eq!(dist.len(), 11);
            let nodes: f64 = dist.iter().enumerate().map(|(m, h)| m as f64 * h).sum();
            assert!((nodes - 10.0).abs() < 1e-8, "P = {}: {}", p, nodes);
        }
    }

    #[test]
    fn test_distribution_limits() {
        let loners = equilibrium_group_size_distribution(5, 0.0).unwrap();
        assert_eq!(loners, vec![0.0, 5.0, 0.0, 0.0, 0.0, 0.0]);
        let one_group = equilibrium_group_size_distribution(5, 1.0).unwrap();
        assert_eq!(one_group, vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        assert!(equilibrium_group_size_distribution(2, 0.5).is_err());
        assert!(equilibrium_group_size_distribution(5, 1.5).is_err());
    }

    #[test]
    fn test_configuration_is_union_of_cliques() {
        let mut rng = StdRng::seed_from_u64(21);
        let edges = equilibrium_configuration(30, 0.6, true, &mut rng).unwrap();
        let graph = Graph::from_edge_list(30, &edges).unwrap();
        for node in 0..30 {
            let component = graph.component_of(node).unwrap();
            assert_eq!(graph.degree(node), component.len() - 1);
        }
    }

    #[test]
    fn test_configuration_extremes() {
        let mut rng = StdRng::seed_from_u64(2);
        assert!(equilibrium_configuration(8, 0.0, false, &mut rng).unwrap().is_empty());
        let full = equilibrium_configuration(6, 1.0, false, &mut rng).unwrap();
        assert_eq!(full.len(), 15);
    }
}
