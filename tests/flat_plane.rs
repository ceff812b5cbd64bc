use glam::Vec3A;
use navmesh_gen::{
    Aabb3d, AreaType, BuildContoursFlags, CompactCell, CompactHeightfield, CompactSpan,
    PipelineConfig, RegionId, generate_polygon_mesh,
};

const DIR_OFFSET_X: [i32; 4] = [-1, 0, 1, 0];
const DIR_OFFSET_Z: [i32; 4] = [0, 1, 0, -1];

/// Builds a `size x size` heightfield with a single walkable floor span per
/// column and a one-cell unwalkable border, all spans fully connected to
/// their four neighbours.
fn flat_plane(size: u16) -> CompactHeightfield {
    let mut cells = Vec::with_capacity(size as usize * size as usize);
    let mut spans = Vec::new();
    let mut areas = Vec::new();

    for z in 0..size {
        for x in 0..size {
            let walkable = x > 0 && z > 0 && x < size - 1 && z < size - 1;
            let index = spans.len() as u32;
            spans.push(CompactSpan::new(0, 0xff));
            areas.push(if walkable {
                AreaType(1)
            } else {
                AreaType::NOT_WALKABLE
            });
            cells.push(CompactCell::new(index, 1));
        }
    }

    let mut heightfield = CompactHeightfield {
        width: size,
        height: size,
        border_size: 1,
        walkable_height: 2,
        walkable_climb: 1,
        max_region: RegionId::NONE,
        aabb: Aabb3d {
            min: Vec3A::ZERO,
            max: Vec3A::new(size as f32, 2.0, size as f32),
        },
        cell_size: 1.0,
        cell_height: 1.0,
        cells,
        spans,
        dist: vec![0; (size as usize) * (size as usize)],
        areas,
    };

    // Since there's exactly one span per column, a neighbour connection is
    // always to span index 0 within the neighbour's column.
    for z in 0..size {
        for x in 0..size {
            let span_index = heightfield.get_cell_at(x, z).index() as usize;
            if !heightfield.areas[span_index].is_walkable() {
                continue;
            }
            for direction in 0..4u8 {
                let dx = x as i32 + DIR_OFFSET_X[direction as usize];
                let dz = z as i32 + DIR_OFFSET_Z[direction as usize];
                if dx < 0 || dz < 0 || dx >= size as i32 || dz >= size as i32 {
                    continue;
                }
                let neighbour_index = heightfield.get_cell_at(dx as u16, dz as u16).index() as usize;
                if heightfield.areas[neighbour_index].is_walkable() {
                    heightfield.spans[span_index].set_con(direction, 0u8);
                }
            }
        }
    }

    heightfield
}

#[test]
fn single_square_region_produces_one_quad() {
    // Matches the documented scenario 1: a 10x10 span grid with a one-cell
    // unwalkable rim (baked into the area labels by `flat_plane`) and no
    // heightfield border padding. The walkable interior is a single 8x8
    // square region, which should simplify to a 4-vertex contour and merge
    // into exactly one quad with no adjacency (nothing to merge with).
    let mut heightfield = flat_plane(10);
    let config = PipelineConfig::new(0, 1, 1.0, 0, 6, BuildContoursFlags::DEFAULT).unwrap();

    let mesh = generate_polygon_mesh(&mut heightfield, &config).expect("pipeline should succeed");

    assert_eq!(mesh.vertices.len(), 4, "expected a single 4-vertex contour");
    assert_eq!(mesh.polygon_count(), 1, "expected exactly one polygon");

    let nvp = mesh.max_vertices_per_polygon;
    let poly = &mesh.polygons[0..nvp];
    let adjacency = &mesh.polygons[nvp..2 * nvp];
    let vertex_count = poly.iter().take_while(|&&v| v != navmesh_gen::MESH_NULL_IDX).count();
    assert_eq!(vertex_count, 4, "expected a quad");
    assert!(
        adjacency.iter().all(|&a| a == navmesh_gen::MESH_NULL_IDX),
        "a single isolated polygon should have no adjacency entries"
    );

    assert_eq!(mesh.regions.len(), 1);
    assert_ne!(mesh.regions[0], RegionId::NONE);
}

#[test]
fn flat_plane_produces_a_mesh_covering_the_walkable_area() {
    let mut heightfield = flat_plane(8);
    let config = PipelineConfig::new(1, 4, 1.3, 12, 6, BuildContoursFlags::DEFAULT).unwrap();

    let mesh = generate_polygon_mesh(&mut heightfield, &config).expect("pipeline should succeed");

    assert!(!mesh.vertices.is_empty());
    assert!(mesh.polygon_count() > 0);
    for region in &mesh.regions {
        assert_ne!(*region, RegionId::NONE);
    }
}

#[test]
fn undersized_isolated_region_without_min_area_is_kept() {
    // A 5x5 plane with border_size 1 leaves a 3x3 walkable island, well
    // under most min_region_area thresholds; with a permissive threshold it
    // must still produce a mesh rather than an empty one.
    let mut heightfield = flat_plane(5);
    let config = PipelineConfig::new(1, 1, 1.3, 12, 6, BuildContoursFlags::DEFAULT).unwrap();

    let mesh = generate_polygon_mesh(&mut heightfield, &config).expect("pipeline should succeed");
    assert!(!mesh.vertices.is_empty());
}
