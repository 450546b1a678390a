//! End-to-end scenario tests (§8) tying generator, registry, mesher, and
//! pathfinder together, distinct from the focused per-module unit tests
//! living alongside each module.

use crate::generator::{GeneratorParams, Palette, VecColumn, WorldGenerator};
use crate::mesher::TerrainMesher;
use crate::math::Tensor3;
use crate::registry::{BlockId, Registry, Rgba};

fn test_registry() -> (Registry, Palette) {
    let mut r = Registry::new();
    r.add_material_of_color("rock", Rgba::new(0.4, 0.4, 0.4, 1.0));
    r.add_material_of_color("dirt", Rgba::new(0.5, 0.3, 0.1, 1.0));
    r.add_material_of_color("sand", Rgba::new(0.9, 0.85, 0.6, 1.0));
    r.add_material_of_color("grass", Rgba::new(0.3, 0.7, 0.2, 1.0));
    r.add_material_of_color("snow", Rgba::new(0.95, 0.95, 1.0, 1.0));
    let water = r.add_material_of_color("water", Rgba::new(0.2, 0.3, 0.8, 0.6));
    r.add_material_of_color("leaves", Rgba::new(0.2, 0.5, 0.1, 1.0));

    let rock = r.add_block(&["rock"], true);
    let dirt = r.add_block(&["dirt"], true);
    let sand = r.add_block(&["sand"], true);
    let grass = r.add_block(&["grass"], true);
    let snow = r.add_block(&["snow"], true);
    let water_block = r.add_block(&["water"], false);
    let leaves = r.add_block(&["leaves"], false);
    r.set_liquid(water, true);

    (
        r,
        Palette {
            rock,
            dirt,
            sand,
            grass,
            snow,
            water: water_block,
            leaves,
        },
    )
}

/// S1/S2: the world generator produces a sensible island — empty far away,
/// solid terrain near the origin — and the mesher can turn that terrain
/// into a non-degenerate, deterministic mesh.
#[test]
fn generated_island_meshes_without_panicking() {
    let (registry, palette) = test_registry();
    // a lower sea level than the default so the sampled terrain lands
    // inside this test's chunk instead of far above it; the column is
    // tall enough that rock laid below the surface never goes negative
    let params = GeneratorParams {
        sea_level: 20,
        ..GeneratorParams::default()
    };
    let gen = WorldGenerator::new(99, params, palette);

    let size = 18u32; // 16 interior + 1 voxel padding each side
    let height = 64u32;
    let mut voxels = Tensor3::new([size, height, size]);

    for x in 0..size {
        for z in 0..size {
            let mut col = VecColumn::new(height as usize);
            gen.load_chunk(x as i32 - 8, z as i32 - 8, &mut col);
            for (y, block) in col.blocks().iter().enumerate() {
                voxels.set(x, y as u32, z, block.0);
            }
        }
    }

    let mut mesher = TerrainMesher::new();
    let (solid, water) = mesher.mesh_chunk(&voxels, &registry, None, None);
    assert!(solid.is_some(), "a generated island chunk should produce solid geometry");
    let _ = water; // water presence depends on sea level vs. sampled terrain, not asserted here

    // determinism: regenerating from the same seed produces the same mesh
    let gen2 = WorldGenerator::new(99, params, palette);
    let mut voxels2 = Tensor3::new([size, height, size]);
    for x in 0..size {
        for z in 0..size {
            let mut col = VecColumn::new(height as usize);
            gen2.load_chunk(x as i32 - 8, z as i32 - 8, &mut col);
            for (y, block) in col.blocks().iter().enumerate() {
                voxels2.set(x, y as u32, z, block.0);
            }
        }
    }
    let mut mesher2 = TerrainMesher::new();
    let (solid2, _) = mesher2.mesh_chunk(&voxels2, &registry, None, None);
    assert_eq!(
        solid.map(|g| g.quads().to_vec()),
        solid2.map(|g| g.quads().to_vec())
    );
}

/// S3: a single solid slab spanning a chunk's full width produces exactly
/// a top and bottom quad after greedy merge (covered directly in
/// `mesher::tests`, re-asserted here against a registry built the way a
/// whole-crate caller would build one).
#[test]
fn single_material_slab_merges_to_two_quads() {
    let (registry, palette) = test_registry();
    let mut voxels = Tensor3::new([18, 3, 18]);
    for x in 0..18 {
        for z in 0..18 {
            voxels.set(x, 1, z, palette.rock.0);
        }
    }
    let mut mesher = TerrainMesher::new();
    let (solid, _) = mesher.mesh_chunk(&voxels, &registry, None, None);
    assert_eq!(solid.unwrap().quads().len(), 2);
}

/// Translucent materials (water) land in the separate water buffer, never
/// mixed into the solid one (§4.3 "split by alpha").
#[test]
fn water_faces_land_in_the_water_buffer_not_solid() {
    let (registry, palette) = test_registry();
    let mut voxels = Tensor3::new([5, 5, 5]);
    for x in 1..4 {
        for z in 1..4 {
            voxels.set(x, 1, z, palette.rock.0);
            voxels.set(x, 2, z, palette.water.0);
        }
    }
    let mut mesher = TerrainMesher::new();
    let (solid, water) = mesher.mesh_chunk(&voxels, &registry, None, None);
    assert!(solid.is_some());
    assert!(water.is_some());
}

/// Registry contract: an unknown block id used for pathfinding/meshing
/// lookups must never silently resolve to block 0 (empty).
#[test]
fn empty_block_id_is_distinct_from_any_registered_block() {
    let (_registry, palette) = test_registry();
    assert_ne!(palette.rock, BlockId::EMPTY);
    assert_ne!(palette.water, BlockId::EMPTY);
}
