//! Error types shared by the graph store, the samplers and the engines.

use thiserror::Error;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by simulations.
///
/// Configuration errors are detected before a run starts. The remaining
/// variants mean the engine reached a state it must never reach; the run is
/// aborted and no partial result is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("node {node} out of range for a network of {n_nodes} nodes")]
    NodeOutOfRange { node: usize, n_nodes: usize },

    #[error("event channel {channel} outside of the {n_channels} declared channels")]
    ChannelOutOfRange { channel: usize, n_channels: usize },

    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        Error::InvariantViolation(msg.into())
    }

    /// True for errors that indicate corrupted simulation state rather than
    /// rejected input.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Error::ChannelOutOfRange { .. } | Error::InvariantViolation(_)
        )
    }
}
