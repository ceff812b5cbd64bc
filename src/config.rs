use crate::BuildContoursFlags;

/// Per-run parameters shared by the region, contour and poly mesh builders.
///
/// Validated eagerly in [`PipelineConfig::new`] rather than deep inside the
/// poly mesh builder, so a misconfigured pipeline fails before any work is
/// done.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    /// Width of the unusable border padding, in cells. Regions touching it
    /// are exempt from the minimum region area filter.
    pub border_size: u16,
    /// Regions smaller than this, in cells, are discarded unless they touch
    /// the border.
    pub min_region_area: u32,
    /// Maximum distance a simplified contour vertex may deviate from the
    /// raw boundary, in cell units.
    pub max_simplification_error: f32,
    /// Long contour edges are tessellated so no segment exceeds this length,
    /// in cell units. `0` disables tessellation.
    pub max_edge_len: u32,
    /// Maximum number of vertices per output polygon. Must be in `3..=12`.
    pub max_vertices_per_polygon: u8,
    /// Which contour edges get tessellated.
    pub contour_tess_flags: BuildContoursFlags,
}

/// Returned by [`PipelineConfig::new`] when a parameter is out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PipelineConfigError {
    /// `max_vertices_per_polygon` was outside `3..=12`.
    #[error("max_vertices_per_polygon must be between 3 and 12, got {0}")]
    InvalidMaxVerticesPerPolygon(u8),
}

impl PipelineConfig {
    /// Builds a config, validating `max_vertices_per_polygon` up front.
    pub fn new(
        border_size: u16,
        min_region_area: u32,
        max_simplification_error: f32,
        max_edge_len: u32,
        max_vertices_per_polygon: u8,
        contour_tess_flags: BuildContoursFlags,
    ) -> Result<Self, PipelineConfigError> {
        if !(3..=12).contains(&max_vertices_per_polygon) {
            return Err(PipelineConfigError::InvalidMaxVerticesPerPolygon(
                max_vertices_per_polygon,
            ));
        }
        Ok(Self {
            border_size,
            min_region_area,
            max_simplification_error,
            max_edge_len,
            max_vertices_per_polygon,
            contour_tess_flags,
        })
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(0, 8, 1.3, 12, 6, BuildContoursFlags::DEFAULT).expect("default config is valid")
    }
}
