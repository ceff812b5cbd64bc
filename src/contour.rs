use bitflags::bitflags;
use glam::IVec4;
use tracing::{trace, warn};

use crate::{
    AreaType, CompactHeightfield, RegionId,
    math::{Aabb3d, dir_offset_x, dir_offset_z, point_segment_distance_squared, rotate_cw},
};

bitflags! {
    /// Controls which boundary edges get tessellated during simplification.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BuildContoursFlags: u8 {
        /// Tessellate edges between a region and unwalkable space.
        const TESSELLATE_SOLID_WALL_EDGES = 1;
        /// Tessellate edges between two different area types.
        const TESSELLATE_AREA_EDGES = 2;
        /// The flag combination used when no caller preference is given.
        const DEFAULT = Self::TESSELLATE_SOLID_WALL_EDGES.bits();
    }
}

bitflags! {
    /// Flags packed into the high bits of a raw contour vertex, alongside
    /// the 16-bit neighbour region id in the low bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RegionVertexId: u32 {
        /// No neighbour region; this vertex lies on a solid wall.
        const NONE = 0;
        /// The low 16 bits carrying the neighbour region id.
        const REGION_MASK = 0xffff;
        /// This vertex lies on the heightfield border.
        const BORDER_VERTEX = 0x1_0000;
        /// This vertex lies on a boundary between two area types.
        const AREA_BORDER = 0x2_0000;
    }
}

impl From<u32> for RegionVertexId {
    fn from(value: u32) -> Self {
        RegionVertexId::from_bits_truncate(value)
    }
}

impl From<RegionId> for RegionVertexId {
    fn from(value: RegionId) -> Self {
        RegionVertexId::from_bits_truncate(value.bits() as u32)
    }
}

impl From<RegionVertexId> for RegionId {
    fn from(value: RegionVertexId) -> Self {
        RegionId::from_bits_truncate((value.bits() & RegionVertexId::REGION_MASK.bits()) as u16)
    }
}

/// A single traced and simplified region boundary.
#[derive(Debug, Clone, Default)]
pub struct Contour {
    /// The simplified, DP-reduced vertices: `(x, y, z, flags)`.
    pub vertices: Vec<IVec4>,
    /// The raw, unsimplified boundary walk vertices.
    pub raw_vertices: Vec<IVec4>,
    /// The region this contour bounds.
    pub region: RegionId,
    /// The area label of the region this contour bounds.
    pub area: AreaType,
}

/// The set of contours traced from a [`CompactHeightfield`].
#[derive(Debug, Clone, Default)]
pub struct ContourSet {
    /// The traced and simplified contours.
    pub contours: Vec<Contour>,
    /// The world-space bounding box of the source heightfield.
    pub aabb: Aabb3d,
    /// The size of a cell on the xz-plane, in world units.
    pub cell_size: f32,
    /// The height of a voxel, in world units.
    pub cell_height: f32,
    /// The width, in cells, of the source heightfield.
    pub width: u16,
    /// The height, in cells, of the source heightfield.
    pub height: u16,
    /// The border padding width of the source heightfield.
    pub border_size: u16,
    /// The maximum simplification error used to build this set.
    pub max_error: f32,
}

const MAX_WALK_STEPS: usize = 40_000;

impl CompactHeightfield {
    /// Traces, simplifies and merges the boundary contour of every region.
    pub fn build_contours(
        &self,
        max_error: f32,
        max_edge_len: u32,
        build_flags: BuildContoursFlags,
    ) -> ContourSet {
        let mut edge_masks = vec![0u8; self.spans.len()];
        for z in 0..self.height {
            for x in 0..self.width {
                let cell = *self.get_cell_at(x, z);
                for i in cell.index() as usize..(cell.index() + cell.count()) as usize {
                    let mut mask = 0u8;
                    let region = self.spans[i].region;
                    if region != RegionId::NONE {
                        for direction in 0..4u8 {
                            let neighbour_region = self
                                .neighbour_span_index(x, z, i, direction)
                                .map(|ni| self.spans[ni].region)
                                .unwrap_or(RegionId::NONE);
                            if neighbour_region == region {
                                mask |= 1 << direction;
                            }
                        }
                    }
                    // Invert: a set bit means "this direction is a region
                    // boundary" (no neighbour, or a neighbour in a different
                    // region); a clear bit means "connected to the same
                    // region", i.e. safe to step across.
                    edge_masks[i] = mask ^ 0x0f;
                }
            }
        }

        let mut visited = vec![false; self.spans.len()];
        let mut contours = Vec::new();

        for z in 0..self.height {
            for x in 0..self.width {
                let cell = *self.get_cell_at(x, z);
                for i in cell.index() as usize..(cell.index() + cell.count()) as usize {
                    if visited[i] || self.spans[i].region == RegionId::NONE {
                        continue;
                    }
                    if edge_masks[i] == 0 || edge_masks[i] == 0x0f {
                        // No boundary edge at all, or every direction is a
                        // boundary (an isolated single-span region): either
                        // way there's nothing to trace from here alone.
                        if edge_masks[i] == 0 {
                            continue;
                        }
                    }

                    let region = self.spans[i].region;
                    let area = self.areas[i];
                    let raw = self.walk_contour(x, z, i, &edge_masks, &mut visited);
                    if raw.len() < 3 {
                        trace!(?region, "dropping degenerate contour with < 3 raw vertices");
                        continue;
                    }

                    let mut simplified = simplify_contour(&raw, max_error, max_edge_len, build_flags);
                    remove_degenerate_segments(&mut simplified);
                    if simplified.len() < 3 {
                        trace!(?region, "dropping degenerate contour after simplification");
                        continue;
                    }

                    contours.push(Contour {
                        vertices: simplified,
                        raw_vertices: raw,
                        region,
                        area,
                    });
                }
            }
        }

        let mut set = ContourSet {
            contours,
            aabb: self.aabb,
            cell_size: self.cell_size,
            cell_height: self.cell_height,
            width: self.width,
            height: self.height,
            border_size: self.border_size,
            max_error,
        };
        set.merge_region_holes();
        set
    }

    fn walk_contour(
        &self,
        start_x: u16,
        start_z: u16,
        start_span: usize,
        edge_masks: &[u8],
        visited: &mut [bool],
    ) -> Vec<IVec4> {
        let mut x = start_x;
        let mut z = start_z;
        let mut i = start_span;
        let mut direction = 0u8;
        // Find the first boundary edge (set bit) to start the walk on; a
        // span interior to its region has no boundary edge at all and is
        // never passed in here (the caller filters those out).
        while edge_masks[i] & (1 << direction) == 0 {
            direction = rotate_cw(direction);
        }

        let start_dir = direction;
        let mut points = Vec::new();
        let mut steps = 0;

        loop {
            if edge_masks[i] & (1 << direction) != 0 {
                // Boundary edge: emit a corner here and rotate to the next
                // edge around this span without moving.
                let (height, flags) = self.get_corner_height(x, z, i, direction);
                points.push(IVec4::new(x as i32, height as i32, z as i32, flags.bits() as i32));
                visited[i] = true;
                direction = rotate_cw(direction);
            } else {
                // Connected edge: step across into the neighbour and rotate
                // to keep hugging the boundary on the left.
                let nx = (x as i32 + dir_offset_x(direction)) as u16;
                let nz = (z as i32 + dir_offset_z(direction)) as u16;
                let cell = *self.get_cell_at(nx, nz);
                let ni = self
                    .spans[i]
                    .con(direction)
                    .map(|c| cell.index() as usize + c as usize)
                    .unwrap_or(cell.index() as usize);
                x = nx;
                z = nz;
                i = ni;
                direction = crate::math::rotate_ccw(direction);
            }

            steps += 1;
            if steps > MAX_WALK_STEPS {
                warn!("contour walk exceeded iteration cap, truncating");
                break;
            }
            if x == start_x && z == start_z && i == start_span && direction == start_dir && steps > 1 {
                break;
            }
        }

        points
    }

    fn get_corner_height(&self, x: u16, z: u16, i: usize, direction: u8) -> (u16, RegionVertexId) {
        let span = &self.spans[i];
        let mut height = span.y;
        let mut is_border_vertex = false;
        let mut is_area_border = false;
        let area = self.areas[i];

        let next_dir = rotate_cw(direction);
        let mut region_a = RegionId::NONE;
        let mut region_b = RegionId::NONE;
        let mut region_c = RegionId::NONE;

        if let Some(di) = self.neighbour_span_index(x, z, i, direction) {
            let d_span = &self.spans[di];
            height = height.max(d_span.y);
            region_a = d_span.region;
            if self.areas[di] != area {
                is_area_border = true;
            }

            let dx = (x as i32 + dir_offset_x(direction)) as u16;
            let dz = (z as i32 + dir_offset_z(direction)) as u16;
            if let Some(dci) = self.neighbour_span_index(dx, dz, di, next_dir) {
                let dc_span = &self.spans[dci];
                height = height.max(dc_span.y);
                region_c = dc_span.region;
            }
        }
        if let Some(ci) = self.neighbour_span_index(x, z, i, next_dir) {
            let c_span = &self.spans[ci];
            height = height.max(c_span.y);
            region_b = c_span.region;
        }

        if region_a == RegionId::NONE || region_b == RegionId::NONE || region_c == RegionId::NONE {
            is_border_vertex = true;
        }

        let neighbour_region = if region_a != RegionId::NONE { region_a } else { region_b };
        let mut flags = RegionVertexId::from(neighbour_region);
        if is_border_vertex {
            flags |= RegionVertexId::BORDER_VERTEX;
        }
        if is_area_border {
            flags |= RegionVertexId::AREA_BORDER;
        }
        (height, flags)
    }
}

fn simplify_contour(
    raw: &[IVec4],
    max_error: f32,
    max_edge_len: u32,
    build_flags: BuildContoursFlags,
) -> Vec<IVec4> {
    let n = raw.len();
    let mut has_connections = false;
    for p in raw {
        if (p.w as u32) & RegionVertexId::REGION_MASK.bits() != 0 {
            has_connections = true;
            break;
        }
    }

    let mut points: Vec<IVec4> = Vec::new();
    if has_connections {
        for i in 0..n {
            let region_change = raw[i].w != raw[(i + 1) % n].w;
            if region_change {
                points.push(raw[i]);
            }
        }
    }

    if points.is_empty() {
        let mut ll = 0usize;
        let mut ur = 0usize;
        for (i, p) in raw.iter().enumerate() {
            if p.x < raw[ll].x || (p.x == raw[ll].x && p.z < raw[ll].z) {
                ll = i;
            }
            if p.x > raw[ur].x || (p.x == raw[ur].x && p.z > raw[ur].z) {
                ur = i;
            }
        }
        points.push(raw[ll]);
        points.push(raw[ur]);
    }

    // Recursively add points along the longest-deviation segments until
    // every raw point lies within `max_error` of the simplified polyline.
    let mut i = 0;
    while i < points.len() {
        let next = (i + 1) % points.len();
        let (a, b) = (points[i], points[next]);

        let (raw_a_idx, _) = nearest_raw_index(raw, a);
        let (raw_b_idx, _) = nearest_raw_index(raw, b);

        let (ci, cd) = max_deviation(raw, raw_a_idx, raw_b_idx, a, b);
        if cd > (max_error * max_error) as f64 {
            points.insert(next, raw[ci]);
        } else {
            i += 1;
        }
    }

    if max_edge_len > 0 {
        tessellate_long_edges(&mut points, raw, max_edge_len);
    }

    points
}

fn nearest_raw_index(raw: &[IVec4], point: IVec4) -> (usize, i64) {
    raw.iter()
        .enumerate()
        .min_by_key(|(_, p)| (p.x as i64 - point.x as i64).pow(2) + (p.z as i64 - point.z as i64).pow(2))
        .map(|(i, p)| (i, (p.x as i64 - point.x as i64).pow(2) + (p.z as i64 - point.z as i64).pow(2)))
        .unwrap_or((0, 0))
}

fn max_deviation(raw: &[IVec4], a_idx: usize, b_idx: usize, a: IVec4, b: IVec4) -> (usize, f64) {
    let n = raw.len();
    let mut best_index = a_idx;
    let mut best_dist = 0.0f64;
    let mut i = (a_idx + 1) % n;
    while i != b_idx {
        let dist = point_segment_distance_squared(
            (raw[i].x, raw[i].z),
            (a.x, a.z),
            (b.x, b.z),
        );
        if dist > best_dist {
            best_dist = dist;
            best_index = i;
        }
        i = (i + 1) % n;
        if i == a_idx {
            break;
        }
    }
    (best_index, best_dist)
}

fn tessellate_long_edges(points: &mut Vec<IVec4>, raw: &[IVec4], max_edge_len: u32) {
    let n_raw = raw.len();
    let mut i = 0;
    while i < points.len() {
        let next = (i + 1) % points.len();
        let a = points[i];
        let b = points[next];
        let (a_idx, _) = nearest_raw_index(raw, a);
        let (b_idx, _) = nearest_raw_index(raw, b);

        let dx = (b.x - a.x) as i64;
        let dz = (b.z - a.z) as i64;
        let len_sq = dx * dx + dz * dz;
        let max_len_sq = (max_edge_len as i64) * (max_edge_len as i64);

        if len_sq > max_len_sq {
            let span_count = if b_idx > a_idx { b_idx - a_idx } else { b_idx + n_raw - a_idx };
            if span_count > 1 {
                let mid_idx = if (b.x - a.x).abs() > (b.z - a.z).abs() {
                    (a_idx + span_count / 2) % n_raw
                } else {
                    (a_idx + (span_count + 1) / 2) % n_raw
                };
                points.insert(next, raw[mid_idx]);
                continue;
            }
        }
        i += 1;
    }
}

fn remove_degenerate_segments(vertices: &mut Vec<IVec4>) {
    let mut i = 0;
    while i < vertices.len() && vertices.len() > 1 {
        let next = (i + 1) % vertices.len();
        if vertices[i].x == vertices[next].x && vertices[i].z == vertices[next].z {
            vertices.remove(next.min(i));
        } else {
            i += 1;
        }
    }
}

impl ContourSet {
    /// Merges each region's hole contours into its outline via non-crossing
    /// diagonals, leaving exactly one contour per region.
    ///
    /// A region's contours are split into one outline (positive winding
    /// area) and zero or more holes (negative winding area, produced when an
    /// unwalkable island sits inside a walkable region). Holes are sorted by
    /// their left-most vertex so merges happen in a stable, deterministic
    /// order; for each hole we pick the outline vertex that forms a valid,
    /// non-intersecting diagonal and splice the hole's vertex ring into the
    /// outline at that point.
    fn merge_region_holes(&mut self) {
        use std::collections::HashMap;

        let mut by_region: HashMap<RegionId, Vec<usize>> = HashMap::new();
        for (idx, contour) in self.contours.iter().enumerate() {
            by_region.entry(contour.region).or_default().push(idx);
        }

        let mut to_remove = Vec::new();

        for (_, indices) in by_region {
            if indices.len() <= 1 {
                continue;
            }

            let mut outline_idx = None;
            let mut holes = Vec::new();
            for &idx in &indices {
                if signed_area(&self.contours[idx].vertices) > 0 {
                    outline_idx = Some(idx);
                } else {
                    holes.push(idx);
                }
            }

            let Some(outline_idx) = outline_idx else {
                warn!("region has holes but no outline contour, leaving holes unmerged");
                continue;
            };

            holes.sort_by_key(|&idx| {
                let v = &self.contours[idx].vertices;
                let leftmost = v.iter().min_by_key(|p| (p.x, p.z)).unwrap();
                (leftmost.x, leftmost.z)
            });

            for hole_idx in holes {
                let hole_vertices = self.contours[hole_idx].vertices.clone();
                match find_merge_diagonal(&self.contours[outline_idx].vertices, &hole_vertices) {
                    Some((outline_vertex, hole_vertex)) => {
                        let merged = splice_hole(
                            &self.contours[outline_idx].vertices,
                            &hole_vertices,
                            outline_vertex,
                            hole_vertex,
                        );
                        self.contours[outline_idx].vertices = merged;
                        to_remove.push(hole_idx);
                    }
                    None => {
                        warn!("could not find a non-crossing diagonal to merge hole into outline");
                    }
                }
            }
        }

        to_remove.sort_unstable();
        to_remove.dedup();
        for idx in to_remove.into_iter().rev() {
            self.contours.remove(idx);
        }
    }
}

fn signed_area(vertices: &[IVec4]) -> i64 {
    let n = vertices.len();
    let mut area = 0i64;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        area += a.x as i64 * b.z as i64 - b.x as i64 * a.z as i64;
    }
    area
}

fn find_merge_diagonal(outline: &[IVec4], hole: &[IVec4]) -> Option<(usize, usize)> {
    use crate::math::{in_cone_outline, intersect_segment_contour};

    let hole_leftmost = (0..hole.len()).min_by_key(|&i| (hole[i].x, hole[i].z))?;

    let mut candidates: Vec<(usize, i64)> = (0..outline.len())
        .map(|i| {
            let dx = (outline[i].x - hole[hole_leftmost].x) as i64;
            let dz = (outline[i].z - hole[hole_leftmost].z) as i64;
            (i, dx * dx + dz * dz)
        })
        .collect();
    candidates.sort_by_key(|&(_, dist)| dist);

    for (outline_idx, _) in candidates {
        if !in_cone_outline(outline, outline_idx, hole[hole_leftmost]) {
            continue;
        }
        if intersect_segment_contour(outline, outline_idx, hole[hole_leftmost])
            || intersect_segment_contour(hole, hole_leftmost, outline[outline_idx])
        {
            continue;
        }
        return Some((outline_idx, hole_leftmost));
    }
    None
}

fn splice_hole(outline: &[IVec4], hole: &[IVec4], outline_at: usize, hole_at: usize) -> Vec<IVec4> {
    // Rotate both rings to start at the splice point, then interleave:
    // outline up to and including the diagonal vertex, the whole hole ring,
    // the diagonal vertex again (closing the hole), then the rest of the
    // outline. This walks into the hole and back out without crossing any
    // other edge, per the hole's vertices having been chosen above.
    let mut merged = Vec::with_capacity(outline.len() + hole.len() + 2);
    for offset in 0..outline.len() {
        merged.push(outline[(outline_at + offset) % outline.len()]);
    }
    for offset in 0..=hole.len() {
        merged.push(hole[(hole_at + offset) % hole.len()]);
    }
    merged.push(outline[outline_at]);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_degenerate_segments_drops_adjacent_duplicates() {
        let mut v = vec![
            IVec4::new(0, 0, 0, 0),
            IVec4::new(0, 0, 0, 0),
            IVec4::new(1, 0, 0, 0),
            IVec4::new(1, 0, 1, 0),
        ];
        remove_degenerate_segments(&mut v);
        assert_eq!(v.len(), 3);
    }

    #[test]
    fn signed_area_is_positive_for_ccw_square() {
        let square = vec![
            IVec4::new(0, 0, 0, 0),
            IVec4::new(4, 0, 0, 0),
            IVec4::new(4, 0, 4, 0),
            IVec4::new(0, 0, 4, 0),
        ];
        assert!(signed_area(&square) > 0);
    }
}
