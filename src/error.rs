use crate::{PipelineConfigError, PolyMeshBuildError, RegionBuildError};

/// The error type returned by [`crate::generate_polygon_mesh`], aggregating
/// the fatal failure of whichever stage raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NavMeshGenError {
    /// The pipeline configuration was invalid.
    #[error(transparent)]
    Config(#[from] PipelineConfigError),
    /// The region builder failed.
    #[error(transparent)]
    Region(#[from] RegionBuildError),
    /// The poly mesh builder failed.
    #[error(transparent)]
    PolyMesh(#[from] PolyMeshBuildError),
}
