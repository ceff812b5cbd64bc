//! Region, contour and polygon mesh generation for navigation meshes.
//!
//! Converts a [`CompactHeightfield`] of walkable voxel spans into a
//! [`PolygonMesh`] suitable for pathfinding, through three sequential
//! stages: region labeling ([`CompactHeightfield::build_layer_regions`]),
//! contour tracing ([`CompactHeightfield::build_contours`]) and polygon mesh
//! building ([`ContourSet::into_polygon_mesh`]). Building the heightfield
//! itself from raw triangle geometry is out of scope for this crate.

mod area;
mod compact_cell;
mod compact_heightfield;
mod compact_span;
pub mod config;
pub mod contour;
mod error;
pub(crate) mod math;
pub mod pool;
mod poly_mesh;
mod region;
mod region_id;

pub use area::AreaType;
pub use compact_cell::CompactCell;
pub use compact_heightfield::{CompactHeightfield, ConvexVolume};
pub use compact_span::{CompactSpan, CompactSpanKey, NOT_CONNECTED};
pub use config::{PipelineConfig, PipelineConfigError};
pub use contour::{BuildContoursFlags, Contour, ContourSet, RegionVertexId};
pub use error::NavMeshGenError;
pub use math::{Aabb2d, Aabb3d};
pub use pool::{ContourHandle, ContourPool};
pub use poly_mesh::{MESH_NULL_IDX, PolyMeshBuildError, PolygonMesh};
pub use region::RegionBuildError;
pub use region_id::RegionId;

/// Runs the full pipeline: region labeling, contour tracing and polygon mesh
/// building, in one call.
///
/// `heightfield` is mutated in place by the region builder; the returned
/// mesh borrows nothing from it afterwards.
pub fn generate_polygon_mesh(
    heightfield: &mut CompactHeightfield,
    config: &PipelineConfig,
) -> Result<PolygonMesh, NavMeshGenError> {
    heightfield.build_layer_regions(config.border_size, config.min_region_area)?;
    let contours = heightfield.build_contours(
        config.max_simplification_error,
        config.max_edge_len,
        config.contour_tess_flags,
    );
    let mesh = contours.into_polygon_mesh(config.max_vertices_per_polygon)?;
    Ok(mesh)
}
