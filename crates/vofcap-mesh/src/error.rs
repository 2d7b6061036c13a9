//! Error types for mesh construction and mesh-engine updates.

/// Errors raised while building a mesh or advancing a mesh engine.
///
/// Every variant is fatal for a run: the orchestrator aborts without
/// writing a checkpoint when a mesh engine reports one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    /// Mesh geometry or addressing is inconsistent.
    #[error("invalid mesh geometry: {reason}")]
    InvalidGeometry {
        /// What went wrong.
        reason: String,
    },
    /// The motion solver could not move the mesh.
    #[error("mesh motion failed at time index {time_index}: {reason}")]
    MotionFailed {
        /// Step at which motion failed.
        time_index: u64,
        /// What went wrong.
        reason: String,
    },
    /// The topology or overset classification could not be rebuilt.
    #[error("topology change failed at time index {time_index}: {reason}")]
    TopologyFailed {
        /// Step at which the change failed.
        time_index: u64,
        /// What went wrong.
        reason: String,
    },
}
