//! Error types for inter-partition communication.

/// Errors raised by a [`Communicator`](crate::Communicator).
#[derive(Debug, thiserror::Error)]
pub enum CommError {
    /// A peer partition hung up before contributing to a reduction.
    #[error("partition {peer} disconnected during a global reduction on rank {rank}")]
    Disconnected {
        /// Rank that observed the failure.
        rank: usize,
        /// Rank that went away.
        peer: usize,
    },
}
