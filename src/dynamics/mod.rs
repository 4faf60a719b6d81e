//! Stochastic dynamics on temporal networks.
//!
//! This module provides:
//! - RewiringRates / AggregatedRates: piecewise-constant rate schedules
//! - RateSampler: Gillespie sampling across rate checkpoints
//! - FlockworkEngine: Flockwork-P rewiring with pluggable node and target selection
//! - Sirs: SIRS epidemic state kept in sync with a changing network
//! - simulate_on_edge_changes / simulate_on_edge_lists: epidemic drivers
//! - equilibrium helpers for the Flockwork-P stationary state

pub mod rates;
pub mod sampler;
pub mod flockwork;
pub mod equilibrium;
pub mod sirs;
pub mod epidemic;

pub use rates::{AggregatedRates, RewiringRates};
pub use sampler::{choose_channel, waiting_time, RateSampler, ScheduledEvent};
pub use flockwork::{
    EdgeChange,
    FlockworkConfig,
    FlockworkEngine,
    NeighborAffinity,
    NodeSelection,
    RewiringEvent,
    TargetSelection,
    simulate_flockwork,
    simulate_flockwork_parallel,
};
pub use equilibrium::{equilibrium_configuration, equilibrium_group_size_distribution};
pub use sirs::{EpidemicProcess, NodeStatus, Observables, Sirs, SirsConfig, SirsEvent};
pub use epidemic::{simulate_on_edge_changes, simulate_on_edge_lists, simulate_sirs_parallel};
