//! Gillespie co-simulation of temporal networks and epidemics.
//!
//! A Flockwork-P rewiring process produces a temporal network as a list of
//! timestamped edge changes. A SIRS epidemic is then run on that trajectory
//! (or on a snapshot trajectory from elsewhere), keeping its SI frontier in
//! sync with every network change.
//!
//! All randomness flows from one seeded `StdRng` per run, so identical seeds
//! and inputs reproduce identical output. Ensembles run independent
//! realizations in parallel with Rayon.
//!
//! ```no_run
//! use flockwork_epi::{simulate_flockwork, simulate_sirs_parallel, FlockworkConfig, SirsConfig};
//!
//! # fn main() -> flockwork_epi::Result<()> {
//! let network = FlockworkConfig::flockwork_p(200, 0.7, 1.0, 50.0, 42)?;
//! let changes = simulate_flockwork(&network)?;
//! let runs = simulate_sirs_parallel(&changes, &SirsConfig::default(), 5, 0, 16, 7)?;
//! assert_eq!(runs.len(), 16);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod graph;
pub mod trajectory;
pub mod dynamics;

pub use error::{Error, Result};
pub use graph::{ordered, Edge, Graph, NodeId};
pub use trajectory::{EdgeChanges, EdgeLists, TrajectoryIssue};
pub use dynamics::{
    AggregatedRates,
    EpidemicProcess,
    FlockworkConfig,
    FlockworkEngine,
    NeighborAffinity,
    NodeSelection,
    NodeStatus,
    Observables,
    RateSampler,
    RewiringRates,
    Sirs,
    SirsConfig,
    TargetSelection,
    equilibrium_configuration,
    equilibrium_group_size_distribution,
    simulate_flockwork,
    simulate_flockwork_parallel,
    simulate_on_edge_changes,
    simulate_on_edge_lists,
    simulate_sirs_parallel,
};
