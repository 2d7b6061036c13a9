//! Fatal errors of the time loop.

use vofcap_checkpoint::CheckpointError;
use vofcap_core::CommError;
use vofcap_mesh::MeshError;

use crate::config::ConfigError;

/// An error that aborts the run.
///
/// Recoverable numerical problems (non-converged or singular linear
/// solves, phase fractions out of bounds) never appear here; they are
/// logged and counted in [`StepMetrics`](crate::StepMetrics).
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The mesh engine could not move or re-connect the mesh.
    #[error("mesh engine failure: {0}")]
    Mesh(#[from] MeshError),
    /// A partition left the communicator group.
    #[error("communication failure: {0}")]
    Comm(#[from] CommError),
    /// Reading or writing a checkpoint failed.
    #[error("checkpoint failure: {0}")]
    Checkpoint(#[from] CheckpointError),
    /// A stability measure is not finite or too large to act on.
    #[error("numerical instability: {quantity} = {value}")]
    Unstable {
        /// Which measure blew up.
        quantity: &'static str,
        /// Its value.
        value: f64,
    },
}
