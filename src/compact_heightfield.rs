use glam::{IVec3, Vec3A};

use crate::{AreaType, CompactCell, CompactSpan, RegionId, math::Aabb3d};

/// A volumetric grid of walkable voxel spans, produced upstream by a
/// rasterizer and consumed read-only by the region, contour and poly mesh
/// builders.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CompactHeightfield {
    /// Grid width, in cells, along the x-axis.
    pub width: u16,
    /// Grid height, in cells, along the z-axis.
    pub height: u16,
    /// The width of the unusable border padding around the grid, in cells.
    pub border_size: u16,
    /// Minimum walkable height above a span, in voxels.
    pub walkable_height: u16,
    /// Maximum ledge height a span may climb over, in voxels.
    pub walkable_climb: u16,
    /// The highest region id a region builder is allowed to assign.
    pub max_region: RegionId,
    /// The world-space bounding box of the grid.
    pub aabb: Aabb3d,
    /// The size of a cell on the xz-plane, in world units.
    pub cell_size: f32,
    /// The height of a voxel, in world units.
    pub cell_height: f32,
    /// One entry per `(x, z)` column, indexing into `spans`.
    pub cells: Vec<CompactCell>,
    /// All spans, grouped contiguously per column.
    pub spans: Vec<CompactSpan>,
    /// Per-span distance-to-border field, indexed in parallel with `spans`.
    pub dist: Vec<u16>,
    /// Per-span area label, indexed in parallel with `spans`.
    pub areas: Vec<AreaType>,
}

impl CompactHeightfield {
    /// The linear cell index for grid coordinates `(x, z)`.
    pub fn column_index(&self, x: u16, z: u16) -> usize {
        x as usize + z as usize * self.width as usize
    }

    /// The cell at grid coordinates `(x, z)`.
    pub fn get_cell_at(&self, x: u16, z: u16) -> &CompactCell {
        &self.cells[self.column_index(x, z)]
    }

    /// The cell at grid coordinates `(x, z)`.
    pub fn get_cell_at_mut(&mut self, x: u16, z: u16) -> &mut CompactCell {
        let index = self.column_index(x, z);
        &mut self.cells[index]
    }

    /// Returns the span and area slice for column `(x, z)`.
    pub fn spans_at(&self, x: u16, z: u16) -> &[CompactSpan] {
        let cell = self.get_cell_at(x, z);
        let start = cell.index() as usize;
        let end = start + cell.count() as usize;
        &self.spans[start..end]
    }

    /// The neighbouring span index reachable from `span_index` in
    /// `direction`, computed from the span's own connection field together
    /// with its column's neighbour cell.
    pub fn neighbour_span_index(&self, x: u16, z: u16, span_index: usize, direction: u8) -> Option<usize> {
        let span = &self.spans[span_index];
        let con = span.con(direction)?;
        let nx = x as i32 + crate::math::dir_offset_x(direction);
        let nz = z as i32 + crate::math::dir_offset_z(direction);
        if nx < 0 || nz < 0 || nx >= self.width as i32 || nz >= self.height as i32 {
            return None;
        }
        let neighbour_cell = self.get_cell_at(nx as u16, nz as u16);
        Some(neighbour_cell.index() as usize + con as usize)
    }
}

/// A convex volume used to relabel the area of the spans it encloses.
///
/// Mirrors the upstream rasterizer's pre-pipeline area-tagging step: callers
/// build a `ConvexVolume` to mark, for example, a road or water surface
/// before the region builder ever sees the heightfield.
#[derive(Debug, Clone)]
pub struct ConvexVolume {
    /// The vertices of the convex polygon footprint, in world space.
    pub vertices: Vec<Vec3A>,
    /// The minimum y extent of the volume.
    pub min_y: f32,
    /// The maximum y extent of the volume.
    pub max_y: f32,
    /// The area label to apply to spans inside the volume.
    pub area: AreaType,
}

impl CompactHeightfield {
    /// Relabels the area of every span inside `volume` to `volume.area`.
    pub fn mark_convex_poly_area(&mut self, volume: ConvexVolume) {
        let Some(mut aabb) = Aabb3d::from_verts(&volume.vertices) else {
            return;
        };
        aabb.min.y = volume.min_y;
        aabb.max.y = volume.max_y;

        let mut min = aabb.min - self.aabb.min;
        min.x /= self.cell_size;
        min.y /= self.cell_height;
        min.z /= self.cell_size;
        let mut max = aabb.max - self.aabb.min;
        max.x /= self.cell_size;
        max.y /= self.cell_height;
        max.z /= self.cell_size;
        let mut min = IVec3::new(min.x as i32, min.y as i32, min.z as i32);
        let mut max = IVec3::new(max.x as i32, max.y as i32, max.z as i32);

        if max.x < 0 || min.x >= self.width as i32 || max.z < 0 || min.z >= self.height as i32 {
            return;
        }

        min.x = min.x.max(0);
        max.x = max.x.min(self.width as i32 - 1);
        min.z = min.z.max(0);
        max.z = max.z.min(self.height as i32 - 1);

        for z in min.z..=max.z {
            for x in min.x..=max.x {
                let cell_index = (x + z * self.width as i32) as usize;
                let cell = &self.cells[cell_index];
                let start = cell.index() as usize;
                let end = start + cell.count() as usize;
                for i in start..end {
                    if !self.areas[i].is_walkable() {
                        continue;
                    }
                    let span = &self.spans[i];
                    if (span.y as i32) < min.y || (span.y as i32) > max.y {
                        continue;
                    }
                    let point = Vec3A::new(
                        self.aabb.min.x + (x as f32 + 0.5) * self.cell_size,
                        0.0,
                        self.aabb.min.z + (z as f32 + 0.5) * self.cell_size,
                    );
                    if point_in_poly(&point, &volume.vertices) {
                        self.areas[i] = volume.area;
                    }
                }
            }
        }
    }
}

fn point_in_poly(point: &Vec3A, vertices: &[Vec3A]) -> bool {
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let xi = vertices[i].x;
        let yi = vertices[i].z;
        let xj = vertices[j].x;
        let yj = vertices[j].z;
        if ((yi > point.z) != (yj > point.z)) && (point.x < (xj - xi) * (point.z - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}
