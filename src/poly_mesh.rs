use glam::U16Vec3;
use tracing::{debug, trace, warn};

use crate::{
    AreaType, RegionId,
    contour::{ContourSet, RegionVertexId},
    math::{Aabb3d, intersect, left, left_on},
};

/// No vertex/polygon slot is filled here.
pub const MESH_NULL_IDX: u16 = 0xffff;

/// Number of spatial hash buckets used to deduplicate mesh vertices.
const VERTEX_BUCKET_COUNT: usize = 1 << 12;

/// The y-axis tolerance, in voxel units, within which two raw vertices are
/// considered the same mesh vertex.
const VERTEX_Y_SLACK: i32 = 2;

/// The polygon mesh produced by triangulating, merging and adjacency-
/// resolving a [`ContourSet`].
#[derive(Debug, Clone, Default)]
pub struct PolygonMesh {
    /// Deduplicated mesh vertices, in voxel grid coordinates.
    pub vertices: Vec<U16Vec3>,
    /// Flattened per-polygon data: for each polygon, `max_vertices_per_polygon`
    /// vertex indices followed by `max_vertices_per_polygon` adjacency
    /// entries, padded with [`MESH_NULL_IDX`].
    pub polygons: Vec<u16>,
    /// The region id of each polygon.
    pub regions: Vec<RegionId>,
    /// Caller-assigned per-polygon flags, all zero until set by the caller.
    pub flags: Vec<u16>,
    /// The area label of each polygon.
    pub areas: Vec<AreaType>,
    /// The maximum number of vertices any polygon may have.
    pub max_vertices_per_polygon: usize,
    /// The world-space bounding box of the source heightfield.
    pub aabb: Aabb3d,
    /// The size of a cell on the xz-plane, in world units.
    pub cell_size: f32,
    /// The height of a voxel, in world units.
    pub cell_height: f32,
    /// The border padding width of the source heightfield.
    pub border_size: u16,
    /// The max simplification error the source contours were built with.
    pub max_edge_error: f32,
    /// The grid width, in cells, of the source heightfield.
    pub grid_width: u16,
    /// The grid height, in cells, of the source heightfield.
    pub grid_height: u16,
    /// Per-vertex `BORDER_VERTEX` flag carried over from contour building;
    /// parallel to `vertices`. Only these vertices are candidates for
    /// removal in [`Self::remove_edge_vertices`].
    border_vertices: Vec<bool>,
}

/// Fatal failures of [`ContourSet::into_polygon_mesh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PolyMeshBuildError {
    /// More than [`MESH_NULL_IDX`] distinct vertices would be required.
    #[error("too many mesh vertices: {0}")]
    TooManyVertices(usize),
    /// More polygons were produced than the `u16` polygon index space allows.
    #[error("too many mesh polygons: {0}")]
    TooManyPolygons(usize),
}

impl PolygonMesh {
    /// The number of polygons currently stored.
    pub fn polygon_count(&self) -> usize {
        if self.max_vertices_per_polygon == 0 {
            0
        } else {
            self.polygons.len() / (2 * self.max_vertices_per_polygon)
        }
    }

    fn polygon(&self, index: usize) -> &[u16] {
        let nvp = self.max_vertices_per_polygon;
        &self.polygons[index * 2 * nvp..index * 2 * nvp + nvp]
    }

    fn polygon_mut(&mut self, index: usize) -> &mut [u16] {
        let nvp = self.max_vertices_per_polygon;
        &mut self.polygons[index * 2 * nvp..index * 2 * nvp + nvp]
    }

    fn adjacency(&self, index: usize) -> &[u16] {
        let nvp = self.max_vertices_per_polygon;
        &self.polygons[index * 2 * nvp + nvp..(index + 1) * 2 * nvp]
    }

    fn adjacency_mut(&mut self, index: usize) -> &mut [u16] {
        let nvp = self.max_vertices_per_polygon;
        &mut self.polygons[index * 2 * nvp + nvp..(index + 1) * 2 * nvp]
    }
}

impl ContourSet {
    /// Builds a polygon mesh from these contours: triangulates each one,
    /// merges triangles into convex polygons up to `max_vertices_per_polygon`,
    /// removes flagged border-artefact vertices, then resolves adjacency and
    /// tags portal edges.
    pub fn into_polygon_mesh(self, max_vertices_per_polygon: u8) -> Result<PolygonMesh, PolyMeshBuildError> {
        let nvp = max_vertices_per_polygon as usize;
        let mut vertices: Vec<U16Vec3> = Vec::new();
        let mut border_vertices: Vec<bool> = Vec::new();
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); VERTEX_BUCKET_COUNT];
        let mut polygons: Vec<Vec<u16>> = Vec::new();
        let mut regions: Vec<RegionId> = Vec::new();
        let mut areas: Vec<AreaType> = Vec::new();

        for contour in &self.contours {
            if contour.vertices.len() < 3 {
                continue;
            }

            let local_points: Vec<(i32, i32, i32)> = contour
                .vertices
                .iter()
                .map(|v| (v.x, v.y, v.z))
                .collect();
            let global_indices: Vec<u16> = contour
                .vertices
                .iter()
                .zip(local_points.iter())
                .map(|(v, &p)| {
                    let is_border = (v.w as u32 & RegionVertexId::BORDER_VERTEX.bits()) != 0;
                    add_vertex(&mut vertices, &mut buckets, &mut border_vertices, p, is_border)
                })
                .collect::<Result<Vec<_>, _>>()?;

            let triangles = triangulate(&local_points);
            if triangles.is_empty() {
                warn!(region = ?contour.region, "failed to triangulate contour, skipping");
                continue;
            }

            for tri in triangles.chunks(3) {
                let mut poly = vec![MESH_NULL_IDX; nvp];
                poly[0] = global_indices[tri[0]];
                poly[1] = global_indices[tri[1]];
                poly[2] = global_indices[tri[2]];
                polygons.push(poly);
                regions.push(contour.region);
                areas.push(contour.area);
            }
        }

        merge_polygons(&mut polygons, &mut regions, &mut areas, &vertices, nvp);

        if vertices.len() >= MESH_NULL_IDX as usize {
            return Err(PolyMeshBuildError::TooManyVertices(vertices.len()));
        }
        if polygons.len() >= MESH_NULL_IDX as usize {
            return Err(PolyMeshBuildError::TooManyPolygons(polygons.len()));
        }

        let mut flat_polygons = vec![MESH_NULL_IDX; polygons.len() * 2 * nvp];
        for (i, poly) in polygons.iter().enumerate() {
            flat_polygons[i * 2 * nvp..i * 2 * nvp + nvp].copy_from_slice(poly);
        }

        let mut mesh = PolygonMesh {
            vertices,
            polygons: flat_polygons,
            regions,
            flags: vec![0; polygons.len()],
            areas,
            max_vertices_per_polygon: nvp,
            aabb: self.aabb,
            cell_size: self.cell_size,
            cell_height: self.cell_height,
            border_size: self.border_size,
            max_edge_error: self.max_error,
            grid_width: self.width,
            grid_height: self.height,
            border_vertices,
        };

        mesh.remove_edge_vertices();
        mesh.build_adjacency();
        mesh.tag_portal_edges();

        debug!(
            vertices = mesh.vertices.len(),
            polygons = mesh.polygon_count(),
            "built polygon mesh"
        );
        Ok(mesh)
    }
}

fn vertex_hash(p: (i32, i32, i32)) -> usize {
    let h = (p.0 as u32).wrapping_mul(0x8da6b343) ^ (p.2 as u32).wrapping_mul(0xd8163841);
    (h as usize) & (VERTEX_BUCKET_COUNT - 1)
}

fn add_vertex(
    vertices: &mut Vec<U16Vec3>,
    buckets: &mut [Vec<usize>],
    border_vertices: &mut Vec<bool>,
    p: (i32, i32, i32),
    is_border: bool,
) -> Result<u16, PolyMeshBuildError> {
    let bucket = vertex_hash(p);
    for &i in &buckets[bucket] {
        let v = vertices[i];
        if v.x as i32 == p.0 && (v.y as i32 - p.1).abs() <= VERTEX_Y_SLACK && v.z as i32 == p.2 {
            if is_border {
                border_vertices[i] = true;
            }
            return Ok(i as u16);
        }
    }
    let index = vertices.len();
    if index >= MESH_NULL_IDX as usize {
        return Err(PolyMeshBuildError::TooManyVertices(index + 1));
    }
    vertices.push(U16Vec3::new(p.0 as u16, p.1 as u16, p.2 as u16));
    border_vertices.push(is_border);
    buckets[bucket].push(index);
    Ok(index as u16)
}

// --- Triangulation -----------------------------------------------------

fn to_ivec2(p: (i32, i32, i32)) -> glam::IVec2 {
    glam::IVec2::new(p.0, p.2)
}

fn diagonalie(points: &[(i32, i32, i32)], i: usize, j: usize, indices: &[u32]) -> bool {
    let n = indices.len();
    let d0 = points[(indices[i] & 0x7fff_ffff) as usize];
    let d1 = points[(indices[j] & 0x7fff_ffff) as usize];
    for k in 0..n {
        let k1 = (k + 1) % n;
        if k == i || k1 == i || k == j || k1 == j {
            continue;
        }
        let p0 = points[(indices[k] & 0x7fff_ffff) as usize];
        let p1 = points[(indices[k1] & 0x7fff_ffff) as usize];
        if p0 == d0 || p0 == d1 || p1 == d0 || p1 == d1 {
            continue;
        }
        if intersect(to_ivec2(d0), to_ivec2(d1), to_ivec2(p0), to_ivec2(p1)) {
            return false;
        }
    }
    true
}

fn in_cone(points: &[(i32, i32, i32)], i: usize, j: usize, indices: &[u32]) -> bool {
    let n = indices.len();
    let pi = points[(indices[i] & 0x7fff_ffff) as usize];
    let pj = points[(indices[j] & 0x7fff_ffff) as usize];
    let p_prev = points[(indices[(i + n - 1) % n] & 0x7fff_ffff) as usize];
    let p_next = points[(indices[(i + 1) % n] & 0x7fff_ffff) as usize];

    if left_on(to_ivec2(p_prev), to_ivec2(pi), to_ivec2(p_next)) {
        return left(to_ivec2(pi), to_ivec2(pj), to_ivec2(p_prev))
            && left(to_ivec2(pj), to_ivec2(pi), to_ivec2(p_next));
    }
    !(left_on(to_ivec2(pi), to_ivec2(pj), to_ivec2(p_next)) && left_on(to_ivec2(pj), to_ivec2(pi), to_ivec2(p_prev)))
}

fn diagonal(points: &[(i32, i32, i32)], i: usize, j: usize, indices: &[u32]) -> bool {
    in_cone(points, i, j, indices) && diagonalie(points, i, j, indices)
}

/// Ear-clipping triangulation, removing the shortest available diagonal
/// first so slivers form early rather than being left for last.
fn triangulate(points: &[(i32, i32, i32)]) -> Vec<usize> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }
    let mut indices: Vec<u32> = (0..n as u32).collect();

    for i in 0..n {
        let i1 = (i + 1) % n;
        let i2 = (i + 2) % n;
        if diagonal(points, i, i2, &indices) {
            indices[i1] |= 0x8000_0000;
        }
    }

    let mut triangles = Vec::new();
    let mut remaining = n;
    let mut indices = indices;

    while remaining > 3 {
        let mut min_len = i64::MAX;
        let mut min_index: Option<usize> = None;

        for i in 0..remaining {
            let i1 = (i + 1) % remaining;
            if indices[i1] & 0x8000_0000 != 0 {
                let p0 = points[(indices[i] & 0x7fff_ffff) as usize];
                let p2 = points[(indices[(i + 2) % remaining] & 0x7fff_ffff) as usize];
                let dx = (p2.0 - p0.0) as i64;
                let dz = (p2.2 - p0.2) as i64;
                let len = dx * dx + dz * dz;
                if len < min_len {
                    min_len = len;
                    min_index = Some(i);
                }
            }
        }

        let Some(i) = min_index else {
            return loose_triangulate(points, &indices[..remaining]);
        };

        let i1 = (i + 1) % remaining;
        let i2 = (i + 2) % remaining;
        triangles.push((indices[i] & 0x7fff_ffff) as usize);
        triangles.push((indices[i1] & 0x7fff_ffff) as usize);
        triangles.push((indices[i2] & 0x7fff_ffff) as usize);

        indices.remove(i1);
        remaining -= 1;

        let i = if i == 0 { remaining - 1 } else { i - 1 };
        let i1 = (i + 1) % remaining;
        let i2 = (i + 2) % remaining;
        let prev = if i == 0 { remaining - 1 } else { i - 1 };
        if diagonal(points, prev, i1, &indices[..remaining]) {
            indices[i] |= 0x8000_0000;
        } else {
            indices[i] &= 0x7fff_ffff;
        }
        if diagonal(points, i, i2, &indices[..remaining]) {
            indices[i1] |= 0x8000_0000;
        } else {
            indices[i1] &= 0x7fff_ffff;
        }
    }

    triangles.push((indices[0] & 0x7fff_ffff) as usize);
    triangles.push((indices[1] & 0x7fff_ffff) as usize);
    triangles.push((indices[2] & 0x7fff_ffff) as usize);
    triangles
}

fn diagonalie_loose(points: &[(i32, i32, i32)], i: usize, j: usize, indices: &[u32]) -> bool {
    let n = indices.len();
    let d0 = points[(indices[i] & 0x7fff_ffff) as usize];
    let d1 = points[(indices[j] & 0x7fff_ffff) as usize];
    for k in 0..n {
        let k1 = (k + 1) % n;
        if k == i || k1 == i || k == j || k1 == j {
            continue;
        }
        let p0 = points[(indices[k] & 0x7fff_ffff) as usize];
        let p1 = points[(indices[k1] & 0x7fff_ffff) as usize];
        if p0 == d0 || p0 == d1 || p1 == d0 || p1 == d1 {
            continue;
        }
        if crate::math::intersect_prop(to_ivec2(d0), to_ivec2(d1), to_ivec2(p0), to_ivec2(p1)) {
            return false;
        }
    }
    true
}

fn diagonal_loose(points: &[(i32, i32, i32)], i: usize, j: usize, indices: &[u32]) -> bool {
    in_cone(points, i, j, indices) && diagonalie_loose(points, i, j, indices)
}

/// Fallback triangulation used when no strict ear can be found, e.g. due to
/// near-degenerate collinear vertices; tolerates improper diagonals.
fn loose_triangulate(points: &[(i32, i32, i32)], indices: &[u32]) -> Vec<usize> {
    let mut indices: Vec<u32> = indices.to_vec();
    let mut triangles = Vec::new();
    let mut remaining = indices.len();

    while remaining > 3 {
        let mut found = false;
        for i in 0..remaining {
            let i1 = (i + 1) % remaining;
            let i2 = (i + 2) % remaining;
            if diagonal_loose(points, i, i2, &indices[..remaining]) {
                triangles.push((indices[i] & 0x7fff_ffff) as usize);
                triangles.push((indices[i1] & 0x7fff_ffff) as usize);
                triangles.push((indices[i2] & 0x7fff_ffff) as usize);
                indices.remove(i1);
                remaining -= 1;
                found = true;
                break;
            }
        }
        if !found {
            // Total triangulation failure: bail out with whatever fan we can
            // salvage so the caller at least gets a contiguous area.
            warn!("loose triangulation could not find any valid diagonal, using a fan");
            for i in 1..remaining - 1 {
                triangles.push((indices[0] & 0x7fff_ffff) as usize);
                triangles.push((indices[i] & 0x7fff_ffff) as usize);
                triangles.push((indices[i + 1] & 0x7fff_ffff) as usize);
            }
            return triangles;
        }
    }

    triangles.push((indices[0] & 0x7fff_ffff) as usize);
    triangles.push((indices[1] & 0x7fff_ffff) as usize);
    triangles.push((indices[2] & 0x7fff_ffff) as usize);
    triangles
}

// --- Convex polygon merging ---------------------------------------------

fn poly_vertex_count(poly: &[u16]) -> usize {
    poly.iter().take_while(|&&v| v != MESH_NULL_IDX).count()
}

fn shared_edge(a: &[u16], b: &[u16]) -> Option<(usize, usize)> {
    let na = poly_vertex_count(a);
    let nb = poly_vertex_count(b);
    for i in 0..na {
        let (a0, a1) = (a[i], a[(i + 1) % na]);
        for j in 0..nb {
            let (b0, b1) = (b[j], b[(j + 1) % nb]);
            if a0 == b1 && a1 == b0 {
                return Some((i, j));
            }
        }
    }
    None
}

fn poly_vertex_at(poly: &[u16], idx: usize, n: usize, vertices: &[U16Vec3]) -> glam::IVec2 {
    let v = vertices[poly[idx % n] as usize];
    glam::IVec2::new(v.x as i32, v.z as i32)
}

/// Whether merging `a` and `b` across their shared edge keeps the result
/// convex: the two vertices where the shared edge meets the rest of each
/// polygon must still turn the same way once the edge is gone.
fn merge_keeps_convex(a: &[u16], b: &[u16], edge: (usize, usize), vertices: &[U16Vec3]) -> bool {
    let na = poly_vertex_count(a);
    let nb = poly_vertex_count(b);
    let (ea, eb) = edge;

    let p_prev = poly_vertex_at(a, ea + na - 1, na, vertices);
    let p_ea = poly_vertex_at(a, ea, na, vertices);
    let q_next2 = poly_vertex_at(b, eb + 2, nb, vertices);

    let q_prev = poly_vertex_at(b, eb + nb - 1, nb, vertices);
    let q_eb = poly_vertex_at(b, eb, nb, vertices);
    let p_next2 = poly_vertex_at(a, ea + 2, na, vertices);

    left(p_prev, p_ea, q_next2) && left(q_prev, q_eb, p_next2)
}

fn merge_at_edge(
    a: &[u16],
    b: &[u16],
    edge: (usize, usize),
    nvp: usize,
    vertices: &[U16Vec3],
) -> Option<Vec<u16>> {
    let na = poly_vertex_count(a);
    let nb = poly_vertex_count(b);
    let merged_count = na + nb - 2;
    if merged_count > nvp {
        return None;
    }
    if !merge_keeps_convex(a, b, edge, vertices) {
        return None;
    }
    let (ea, eb) = edge;
    // `a` contributes the full ring starting right after the shared edge
    // (ending at the edge's other endpoint); `b` contributes its own ring
    // with the two shared-edge vertices dropped, since `a` already supplies
    // them.
    let mut merged = Vec::with_capacity(nvp);
    for offset in 0..na {
        merged.push(a[(ea + 1 + offset) % na]);
    }
    for offset in 0..nb - 2 {
        merged.push(b[(eb + 2 + offset) % nb]);
    }
    while merged.len() < nvp {
        merged.push(MESH_NULL_IDX);
    }
    merged.truncate(nvp);
    Some(merged)
}

fn merge_polygons(
    polygons: &mut Vec<Vec<u16>>,
    regions: &mut Vec<RegionId>,
    areas: &mut Vec<AreaType>,
    vertices: &[U16Vec3],
    nvp: usize,
) {
    if nvp <= 3 {
        return;
    }

    loop {
        let mut best: Option<(usize, usize, Vec<u16>, i64)> = None;

        for i in 0..polygons.len() {
            for j in (i + 1)..polygons.len() {
                if regions[i] != regions[j] || areas[i] != areas[j] {
                    continue;
                }
                let Some(edge) = shared_edge(&polygons[i], &polygons[j]) else {
                    continue;
                };
                let Some(merged) = merge_at_edge(&polygons[i], &polygons[j], edge, nvp, vertices) else {
                    continue;
                };
                let (v0, v1) = (
                    vertices[polygons[i][edge.0] as usize],
                    vertices[polygons[i][(edge.0 + 1) % poly_vertex_count(&polygons[i])] as usize],
                );
                let dx = v1.x as i64 - v0.x as i64;
                let dz = v1.z as i64 - v0.z as i64;
                let len = dx * dx + dz * dz;
                if best.as_ref().map(|(_, _, _, best_len)| len > *best_len).unwrap_or(true) {
                    best = Some((i, j, merged, len));
                }
            }
        }

        let Some((i, j, merged, _)) = best else { break };
        polygons[i] = merged;
        polygons.remove(j);
        regions.remove(j);
        areas.remove(j);
    }
}

// --- Edge vertex removal -------------------------------------------------

impl PolygonMesh {
    /// Removes vertices introduced purely as border/contour artefacts that
    /// are no longer needed once polygons have been merged, re-triangulating
    /// the hole left behind by each removal.
    ///
    /// Mirrors the guard in the source algorithm: a vertex is only removed
    /// if every polygon using it can be safely re-triangulated without
    /// changing the mesh's outer boundary, which `can_remove_vertex` checks
    /// before `remove_vertex` does the work.
    fn remove_edge_vertices(&mut self) {
        let mut vertex = 0usize;
        while vertex < self.vertices.len() {
            if !self.border_vertices.get(vertex).copied().unwrap_or(false) {
                vertex += 1;
                continue;
            }
            if !self.can_remove_vertex(vertex as u16) {
                vertex += 1;
                continue;
            }
            if self.remove_vertex(vertex as u16) {
                trace!(vertex, "removed border-artefact vertex");
                // Don't advance: the vertex that used to follow has been
                // shifted down into this slot.
            } else {
                vertex += 1;
            }
        }
    }

    /// Checks the two predicates that guard edge vertex removal: enough
    /// polygon edges must remain once the vertex is gone, and the edges
    /// touching it must not belong to two disconnected polygon fans.
    fn can_remove_vertex(&self, vertex: u16) -> bool {
        let mut touching = Vec::new();
        for i in 0..self.polygon_count() {
            let poly = self.polygon(i);
            if poly.iter().take(poly_vertex_count(poly)).any(|&v| v == vertex) {
                touching.push(i);
            }
        }
        if touching.is_empty() {
            return false;
        }

        let mut num_remaining_edges = 0usize;
        let mut touching_edges: Vec<(u16, u16)> = Vec::new();
        for &poly_index in &touching {
            let poly = self.polygon(poly_index);
            let n = poly_vertex_count(poly);
            let removed_here = poly[..n].iter().filter(|&&v| v == vertex).count();
            num_remaining_edges += n - removed_here;

            for k in 0..n {
                if poly[k] == vertex || poly[(k + 1) % n] == vertex {
                    touching_edges.push((poly[k], poly[(k + 1) % n]));
                }
            }
        }

        if num_remaining_edges <= 2 {
            return false;
        }

        let mut open_edges = 0usize;
        for (idx, &(a, b)) in touching_edges.iter().enumerate() {
            let shared_count = touching_edges
                .iter()
                .enumerate()
                .filter(|&(j, &(c, d))| idx != j && ((a == c && b == d) || (a == d && b == c)))
                .count();
            if shared_count == 0 {
                open_edges += 1;
            }
        }
        open_edges <= 2
    }

    fn remove_vertex(&mut self, vertex: u16) -> bool {
        let nvp = self.max_vertices_per_polygon;
        let mut touching = Vec::new();
        for i in 0..self.polygon_count() {
            let poly = self.polygon(i);
            if poly.iter().take(poly_vertex_count(poly)).any(|&v| v == vertex) {
                touching.push(i);
            }
        }
        if touching.is_empty() {
            return false;
        }

        // Collect the ring of boundary vertices left behind once every
        // touching polygon is removed, then re-triangulate that ring as a
        // fan anchored at its first vertex and re-merge it like any other
        // freshly triangulated contour.
        let mut hole_region = RegionId::NONE;
        let mut hole_area = AreaType::NOT_WALKABLE;
        let mut ring: Vec<u16> = Vec::new();
        for &poly_index in &touching {
            hole_region = self.regions[poly_index];
            hole_area = self.areas[poly_index];
            let poly = self.polygon(poly_index).to_vec();
            let n = poly_vertex_count(&poly);
            for k in 0..n {
                if poly[k] == vertex {
                    continue;
                }
                if !ring.contains(&poly[k]) {
                    ring.push(poly[k]);
                }
            }
        }

        if ring.len() < 3 {
            return false;
        }

        let points: Vec<(i32, i32, i32)> = ring
            .iter()
            .map(|&v| {
                let p = self.vertices[v as usize];
                (p.x as i32, p.y as i32, p.z as i32)
            })
            .collect();
        let triangles = triangulate(&points);
        if triangles.is_empty() {
            return false;
        }

        for &poly_index in touching.iter().rev() {
            self.remove_polygon(poly_index);
        }

        for tri in triangles.chunks(3) {
            let mut poly = vec![MESH_NULL_IDX; nvp];
            poly[0] = ring[tri[0]];
            poly[1] = ring[tri[1]];
            poly[2] = ring[tri[2]];
            self.push_polygon(poly, hole_region, hole_area);
        }

        self.vertices.remove(vertex as usize);
        self.border_vertices.remove(vertex as usize);
        for poly in self.polygons.chunks_mut(2 * nvp) {
            for slot in poly[..nvp].iter_mut() {
                if *slot != MESH_NULL_IDX && *slot > vertex {
                    *slot -= 1;
                }
            }
        }
        true
    }

    fn remove_polygon(&mut self, index: usize) {
        let nvp = self.max_vertices_per_polygon;
        let start = index * 2 * nvp;
        self.polygons.drain(start..start + 2 * nvp);
        self.regions.remove(index);
        self.areas.remove(index);
        self.flags.remove(index);
    }

    fn push_polygon(&mut self, poly: Vec<u16>, region: RegionId, area: AreaType) {
        let nvp = self.max_vertices_per_polygon;
        let mut entry = vec![MESH_NULL_IDX; 2 * nvp];
        entry[..nvp].copy_from_slice(&poly);
        self.polygons.extend(entry);
        self.regions.push(region);
        self.areas.push(area);
        self.flags.push(0);
    }
}

// --- Adjacency -----------------------------------------------------------

struct Edge {
    vertices: [u16; 2],
    edge_in_polygon: [usize; 2],
    polygon: [usize; 2],
}

impl PolygonMesh {
    /// Resolves polygon adjacency using a parallel-array edge hash: each
    /// edge is inserted keyed by its lower vertex index, then matched
    /// against the reverse-direction edge inserted by its neighbour. This
    /// avoids an O(polygons^2) comparison.
    fn build_adjacency(&mut self) {
        let nvp = self.max_vertices_per_polygon;
        let vertex_count = self.vertices.len();
        let mut first_edge: Vec<Option<usize>> = vec![None; vertex_count];
        let mut next_edge: Vec<usize> = Vec::new();
        let mut edges: Vec<Edge> = Vec::new();

        for p in 0..self.polygon_count() {
            let poly = self.polygon(p).to_vec();
            let n = poly_vertex_count(&poly);
            for k in 0..n {
                let v0 = poly[k];
                let v1 = poly[(k + 1) % n];
                if v0 < v1 {
                    let edge = Edge {
                        vertices: [v0, v1],
                        edge_in_polygon: [k, 0],
                        polygon: [p, p],
                    };
                    next_edge.push(first_edge[v0 as usize].unwrap_or(usize::MAX));
                    first_edge[v0 as usize] = Some(edges.len());
                    edges.push(edge);
                }
            }
        }

        for p in 0..self.polygon_count() {
            let poly = self.polygon(p).to_vec();
            let n = poly_vertex_count(&poly);
            for k in 0..n {
                let v0 = poly[k];
                let v1 = poly[(k + 1) % n];
                if v0 >= v1 {
                    let mut e = first_edge[v1 as usize];
                    while let Some(edge_index) = e {
                        let edge = &mut edges[edge_index];
                        if edge.vertices[1] == v0 && edge.polygon[0] != p {
                            edge.polygon[1] = p;
                            edge.edge_in_polygon[1] = k;
                            break;
                        }
                        e = next_edge.get(edge_index).copied().filter(|&i| i != usize::MAX);
                    }
                }
            }
        }

        for edge in &edges {
            if edge.polygon[0] != edge.polygon[1] {
                let k0 = edge.edge_in_polygon[0];
                let k1 = edge.edge_in_polygon[1];
                self.adjacency_mut(edge.polygon[0])[k0] = edge.polygon[1] as u16;
                self.adjacency_mut(edge.polygon[1])[k1] = edge.polygon[0] as u16;
            }
        }
    }

    /// Tags every remaining unmatched edge that lies on the heightfield's
    /// usable-area border as a portal edge: `0x8000 | side`, where `side` is
    /// the direction (0=-x, 1=+z, 2=+x, 3=-z) the edge faces.
    fn tag_portal_edges(&mut self) {
        for p in 0..self.polygon_count() {
            let poly = self.polygon(p).to_vec();
            let n = poly_vertex_count(&poly);
            for k in 0..n {
                if self.adjacency(p)[k] != MESH_NULL_IDX {
                    continue;
                }
                let v0 = self.vertices[poly[k] as usize];
                let v1 = self.vertices[poly[(k + 1) % n] as usize];
                if let Some(side) = self.border_side(v0, v1) {
                    self.adjacency_mut(p)[k] = 0x8000 | side as u16;
                }
            }
        }
    }

    fn border_side(&self, a: U16Vec3, b: U16Vec3) -> Option<u8> {
        let x_max = self.grid_width.saturating_sub(1);
        let z_max = self.grid_height.saturating_sub(1);
        if a.x == 0 && b.x == 0 {
            Some(0)
        } else if a.z == z_max && b.z == z_max {
            Some(1)
        } else if a.x == x_max && b.x == x_max {
            Some(2)
        } else if a.z == 0 && b.z == 0 {
            Some(3)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangulate_square_produces_two_triangles() {
        let square = vec![(0, 0, 0), (4, 0, 0), (4, 0, 4), (0, 0, 4)];
        let triangles = triangulate(&square);
        assert_eq!(triangles.len(), 6);
    }

    #[test]
    fn poly_vertex_count_stops_at_null() {
        let poly = [0u16, 1, 2, MESH_NULL_IDX, MESH_NULL_IDX, MESH_NULL_IDX];
        assert_eq!(poly_vertex_count(&poly), 3);
    }
}
