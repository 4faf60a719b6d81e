//! Rate schedules and their per-checkpoint aggregation.
//!
//! Rates are piecewise constant between checkpoints. The aggregated form
//! holds, for every checkpoint, the propensity of each event channel and
//! their total; channel 0 is reserved and always carries zero propensity.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Rewiring rates of a Flockwork-P run.
///
/// All rates are per node: under `Global` every node reconnects with rate
/// `reconnection[k]` and disconnects with rate `disconnection[k]` during
/// checkpoint interval `k`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RewiringRates {
    Global {
        times: Vec<f64>,
        reconnection: Vec<f64>,
        disconnection: Vec<f64>,
    },
    PerNode {
        times: Vec<f64>,
        reconnection: Vec<Vec<f64>>,
        disconnection: Vec<Vec<f64>>,
    },
}

impl RewiringRates {
    /// Constant global rates starting at `t0`.
    pub fn constant(t0: f64, reconnection: f64, disconnection: f64) -> Self {
        RewiringRates::Global {
            times: vec![t0],
            reconnection: vec![reconnection],
            disconnection: vec![disconnection],
        }
    }

    /// Global rates from a rewiring rate `gamma(t)` and a reconnection
    /// probability `P(t)`: reconnection `gamma*P`, disconnection `gamma*(1-P)`.
    pub fn from_rewiring_rate_and_probability(
        rewiring_rate: &[(f64, f64)],
        probability: &[f64],
    ) -> Result<Self> {
        if rewiring_rate.len() != probability.len() {
            return Err(Error::config(format!(
                "{} rewiring rate checkpoints but {} reconnection probabilities",
                rewiring_rate.len(),
                probability.len()
            )));
        }
        if let Some(p) = probability.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(Error::config(format!(
                "reconnection probability {} outside [0, 1]",
                p
            )));
        }
        let times = rewiring_rate.iter().map(|&(t, _)| t).collect();
        let reconnection = rewiring_rate
            .iter()
            .zip(probability)
            .map(|(&(_, gamma), &p)| gamma * p)
            .collect();
        let disconnection = rewiring_rate
            .iter()
            .zip(probability)
            .map(|(&(_, gamma), &p)| gamma * (1.0 - p))
            .collect();
        Ok(RewiringRates::Global {
            times,
            reconnection,
            disconnection,
        })
    }

    pub fn times(&self) -> &[f64] {
        match self {
            RewiringRates::Global { times, .. } | RewiringRates::PerNode { times, .. } => times,
        }
    }

    pub fn is_per_node(&self) -> bool {
        matches!(self, RewiringRates::PerNode { .. })
    }

    /// Number of sampler channels, reserved channel 0 included.
    pub fn n_channels(&self, n_nodes: usize) -> usize {
        match self {
            RewiringRates::Global { .. } => 3,
            RewiringRates::PerNode { .. } => 2 * n_nodes + 1,
        }
    }

    /// Aggregate into per-checkpoint channel propensities for `n_nodes`.
    ///
    /// Global: channel 1 reconnects (`N * alpha`), channel 2 disconnects
    /// (`N * beta`). Per node: channel `1 + i` reconnects node `i`, channel
    /// `1 + N + i` disconnects it.
    pub fn aggregate(&self, n_nodes: usize) -> Result<AggregatedRates> {
        match self {
            RewiringRates::Global {
                times,
                reconnection,
                disconnection,
            } => {
                if reconnection.len() != times.len() || disconnection.len() != times.len() {
                    return Err(Error::config(format!(
                        "rate schedule lengths differ: {} times, {} reconnection, {} disconnection",
                        times.len(),
                        reconnection.len(),
                        disconnection.len()
                    )));
                }
                let n = n_nodes as f64;
                let rows: Vec<Vec<f64>> = reconnection
                    .iter()
                    .zip(disconnection)
                    .map(|(&alpha, &beta)| vec![0.0, alpha * n, beta * n])
                    .collect();
                AggregatedRates::new(times.clone(), rows)
            }
            RewiringRates::PerNode {
                times,
                reconnection,
                disconnection,
            } => {
                if reconnection.len() != times.len() || disconnection.len() != times.len() {
                    return Err(Error::config(format!(
                        "rate schedule lengths differ: {} times, {} reconnection, {} disconnection",
                        times.len(),
                        reconnection.len(),
                        disconnection.len()
                    )));
                }
                let mut rows = Vec::with_capacity(times.len());
                for (k, (alphas, betas)) in reconnection.iter().zip(disconnection).enumerate() {
                    if alphas.len() != n_nodes || betas.len() != n_nodes {
                        return Err(Error::config(format!(
                            "checkpoint {} has {} reconnection and {} disconnection rates for {} nodes",
                            k,
                            alphas.len(),
                            betas.len(),
                            n_nodes
                        )));
                    }
                    let mut row = Vec::with_capacity(2 * n_nodes + 1);
                    row.push(0.0);
                    row.extend_from_slice(alphas);
                    row.extend_from_slice(betas);
                    rows.push(row);
                }
                AggregatedRates::new(times.clone(), rows)
            }
        }
    }
}

/// Channel propensities and totals at every checkpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregatedRates {
    times: Vec<f64>,
    totals: Vec<f64>,
    /// `n_checkpoints × n_channels`
    channels: Array2<f64>,
}

impl AggregatedRates {
    /// Build from one channel vector per checkpoint.
    ///
    /// Times must be finite and strictly increasing, rows of equal length,
    /// rates finite and non-negative.
    pub fn new(times: Vec<f64>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if times.is_empty() {
            return Err(Error::config("rate schedule has no checkpoints"));
        }
        if rows.len() != times.len() {
            return Err(Error::config(format!(
                "{} checkpoint times but {} rate vectors",
                times.len(),
                rows.len()
            )));
        }
        if times.iter().any(|t| !t.is_finite()) {
            return Err(Error::config("checkpoint times must be finite"));
        }
        if let Some(k) = times.windows(2).position(|w| w[1] <= w[0]) {
            return Err(Error::config(format!(
                "checkpoint times not strictly increasing at index {}",
                k + 1
            )));
        }

        let n_channels = rows[0].len();
        if n_channels == 0 {
            return Err(Error::config("rate vectors are empty"));
        }
        let mut flat = Vec::with_capacity(times.len() * n_channels);
        let mut totals: Vec<f64> = Vec::with_capacity(times.len());
        for (k, row) in rows.iter().enumerate() {
            if row.len() != n_channels {
                return Err(Error::config(format!(
                    "checkpoint {} has {} channels, expected {}",
                    k,
                    row.len(),
                    n_channels
                )));
            }
            if let Some(rate) = row.iter().find(|r| !r.is_finite() || **r < 0.0) {
                return Err(Error::config(format!(
                    "checkpoint {} has invalid rate {}",
                    k, rate
                )));
            }
            // Sequential sum, the same order the roulette accumulates in.
            totals.push(row.iter().sum::<f64>());
            flat.extend_from_slice(row);
        }

        let channels = Array2::from_shape_vec((times.len(), n_channels), flat)
            .map_err(|e| Error::config(e.to_string()))?;

        Ok(Self {
            times,
            totals,
            channels,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.channels.ncols()
    }

    /// Time of the first checkpoint, the simulation start.
    #[inline]
    pub fn start_time(&self) -> f64 {
        self.times[0]
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Total propensity during checkpoint interval `k`.
    #[inline]
    pub fn total(&self, k: usize) -> f64 {
        self.totals[k]
    }

    /// Channel propensities during checkpoint interval `k`.
    pub fn channel_rates(&self, k: usize) -> impl Iterator<Item = f64> + '_ {
        self.channels.row(k).into_iter().copied()
    }
}
