//! Procedural world generator: layered coherent-noise composers assembled
//! into per-column terrain, deterministically keyed on world coordinates
//! (§4.4).

use serde::Deserialize;

use crate::noise_field::{Fractal, Ridge, SeedCounter};
use crate::registry::BlockId;

/// Tunable constants named in spec.md §4.4/§4.4.1. Exposed as a struct (not
/// bare consts) so `config::EngineConfig` can override them without
/// recompiling (§7c).
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorParams {
    pub island_radius: f64,
    pub sea_level: i32,
    pub cave_radius: f64,
    pub cave_cutoff: f64,
    pub cave_delta_y: i32,
    pub cave_wave_radius: f64,
    pub cave_wave_height: f64,
    pub cave_height: f64,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            island_radius: 1024.0,
            sea_level: 64,
            cave_radius: 64.0,
            cave_cutoff: 0.6,
            cave_delta_y: 24,
            cave_wave_radius: 48.0,
            cave_wave_height: 6.0,
            cave_height: 10.0,
        }
    }
}

const CAVE_LEVELS: usize = 3;

/// Block ids used by the generator. A host registers these with
/// [`crate::registry::Registry`] in the same order before generation.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub rock: BlockId,
    pub dirt: BlockId,
    pub sand: BlockId,
    pub grass: BlockId,
    pub snow: BlockId,
    pub water: BlockId,
    pub leaves: BlockId,
}

/// Write-only per-world-column sink (§6). `push` appends a run ending at
/// `top_height`, which must be non-decreasing across calls; `overwrite`
/// sets a single `y` slot, used only by the cave carver.
pub trait Column {
    /// Appends `block` from the column's current height up to and
    /// including `top_height`. Contract violation (non-decreasing height)
    /// is fatal at the call site (§7).
    fn push(&mut self, block: BlockId, top_height: i32);

    /// Sets a single absolute-height slot to `block`, regardless of the
    /// current push cursor.
    fn overwrite(&mut self, block: BlockId, y: i32);
}

/// A `Column` backed by a flat `Vec<BlockId>`, indexed from `y = 0`.
#[derive(Debug, Clone)]
pub struct VecColumn {
    blocks: Vec<BlockId>,
    cursor: i32,
}

impl VecColumn {
    pub fn new(height: usize) -> Self {
        Self {
            blocks: vec![BlockId::EMPTY; height],
            cursor: -1,
        }
    }

    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }
}

impl Column for VecColumn {
    fn push(&mut self, block: BlockId, top_height: i32) {
        assert!(
            top_height >= self.cursor,
            "Column::push: top_height {top_height} is not non-decreasing (cursor {})",
            self.cursor
        );
        let from = (self.cursor + 1).max(0);
        for y in from..=top_height {
            if (y as usize) < self.blocks.len() {
                self.blocks[y as usize] = block;
            }
        }
        self.cursor = top_height;
    }

    fn overwrite(&mut self, block: BlockId, y: i32) {
        if y >= 0 && (y as usize) < self.blocks.len() {
            self.blocks[y as usize] = block;
        }
    }
}

pub struct WorldGenerator {
    params: GeneratorParams,
    palette: Palette,
    cliff_select: Fractal,
    mountain_select: Fractal,
    height_ground: Fractal,
    height_cliff: Fractal,
    height_ridge: Ridge,
    cave_carver: [Fractal; CAVE_LEVELS],
    cave_wave: [Fractal; CAVE_LEVELS],
}

impl WorldGenerator {
    pub fn new(seed: u32, params: GeneratorParams, palette: Palette) -> Self {
        let mut seeds = SeedCounter::from_seed(seed);
        let cliff_select = Fractal::new(&mut seeds, 0.0, 1.0, 256.0, 4, 0.5, 2.0);
        let mountain_select = Fractal::new(&mut seeds, 0.0, 1.0, 512.0, 4, 0.5, 2.0);
        let height_ground = Fractal::new(&mut seeds, 0.0, 32.0, 200.0, 5, 0.5, 2.0);
        let height_cliff = Fractal::new(&mut seeds, 0.0, 48.0, 120.0, 5, 0.55, 2.1);
        let height_ridge = Ridge::new(&mut seeds, 4, 0.5, 1.0 / 300.0);
        let cave_carver = std::array::from_fn(|_| Fractal::new(&mut seeds, 0.0, 1.0, 1.0, 3, 0.5, 2.0));
        let cave_wave = std::array::from_fn(|_| Fractal::new(&mut seeds, 0.0, 1.0, 1.0, 2, 0.5, 2.0));

        Self {
            params,
            palette,
            cliff_select,
            mountain_select,
            height_ground,
            height_cliff,
            height_ridge,
            cave_carver,
            cave_wave,
        }
    }

    /// Selects a surface height and tile id for world `(x, z)` by blending
    /// ground/cliff/mountain candidates (§4.4 "Heightmap composition").
    /// Returns `(truncated_height, surface_block, snow_or_dirt_depth)`.
    fn height_and_surface(&self, x: f64, z: f64) -> (i32, BlockId, i32) {
        let cliff_select = self.cliff_select.sample(x, z);
        let mountain_select = self.mountain_select.sample(x, z);

        let cliff_x = (16.0 * cliff_select.abs() - 4.0).clamp(0.0, 1.0);
        let mountain_x = (8.0 * mountain_select).max(0.0).sqrt();
        let cliff = cliff_x - mountain_x;
        let mountain = -cliff;

        let height_ground = self.height_ground.sample(x, z);
        let height_cliff = if cliff > 0.0 {
            self.height_cliff.sample(x, z)
        } else {
            f64::MIN
        };
        let ridge = self.height_ridge.sample(x, z);
        let height_mountain = if mountain > 0.0 {
            height_ground + 64.0 * (ridge - 1.25).max(0.0).powf(1.5)
        } else {
            f64::MIN
        };

        let (height, branch) = if height_mountain > height_ground {
            (height_mountain, Branch::Mountain(mountain))
        } else if height_cliff > height_ground {
            (height_cliff, Branch::Cliff)
        } else {
            (height_ground, Branch::Ground)
        };

        let truncated = height.floor() as i32;

        let (surface, depth) = match branch {
            _ if truncated < -1 => (self.palette.dirt, 0),
            Branch::Mountain(m) => {
                let snow_depth = height - (72.0 - 8.0 * m);
                if snow_depth > 0.0 {
                    (self.palette.snow, snow_depth.floor() as i32)
                } else {
                    (self.palette.rock, 0)
                }
            }
            Branch::Cliff => (self.palette.dirt, 0),
            Branch::Ground => {
                if truncated < 1 {
                    (self.palette.sand, 0)
                } else {
                    (self.palette.grass, 0)
                }
            }
        };

        (truncated, surface, depth)
    }

    /// `has_tree(x, z)`: FNV-like 32-bit hash over a 30-bit packed key,
    /// declaring "tree" iff the low 6 bits are <= 3 (~6.25% density). The
    /// key packs only the low 15 bits of each axis (§4.4, §9 "Open question
    /// — leaves hash"): tree placement therefore repeats with period 2^15
    /// on each horizontal axis. Preserved as observed, not corrected.
    pub fn has_tree(x: i32, z: i32) -> bool {
        let key = (((x & 0x7fff) as u32) << 15) | ((z & 0x7fff) as u32);
        const FNV_OFFSET: u32 = 0x811c_9dc5;
        const FNV_PRIME: u32 = 0x0100_0193;
        let mut hash = FNV_OFFSET;
        for byte in key.to_le_bytes() {
            hash ^= byte as u32;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        (hash & 0x3f) <= 3
    }

    /// Emits the full column for world `(x, z)` (§4.4 "Column fill order").
    /// Empty iff the island falloff swallows it.
    pub fn load_chunk(&self, x: i32, z: i32, column: &mut impl Column) {
        let _span = tracing::debug_span!("load_chunk", x, z).entered();
        let base = ((x * x + z * z) as f64).sqrt() / self.params.island_radius;
        let falloff = 16.0 * base * base;
        if falloff >= self.params.sea_level as f64 {
            return; // S1: empty column beyond the island radius
        }

        let (truncated_raw, surface, depth) = self.height_and_surface(x as f64, z as f64);
        let truncated = truncated_raw - falloff.floor() as i32;
        let height_abs = truncated + self.params.sea_level;

        let is_snow_or_rock_branch = surface == self.palette.snow || surface == self.palette.rock;

        // 1. under-surface rock layer
        column.push(self.palette.rock, height_abs - depth.max(1) - 1);

        // 2. dirt cap, except when surface is rock or snow
        if !is_snow_or_rock_branch {
            column.push(self.palette.dirt, height_abs - 1);
        } else {
            column.push(self.palette.rock, height_abs - 1);
        }

        // 3. surface tile (and snow/rock depth continuation)
        if surface == self.palette.snow || surface == self.palette.rock {
            column.push(surface, height_abs + depth.max(0));
        } else {
            column.push(surface, height_abs);
        }

        // 4. water up to sea level
        if height_abs < self.params.sea_level {
            column.push(self.palette.water, self.params.sea_level);
        }

        // 5. a leaves block above grass with a tree
        if surface == self.palette.grass && Self::has_tree(x, z) {
            column.push(self.palette.leaves, height_abs.max(self.params.sea_level) + 1);
        }

        // 6. cave carving
        self.carve_caves(x, z, column);
    }

    /// Cheaper variant for far-LOD frontier tiles (§4.4 "Frontier
    /// generation"): surface tile and water only, no dirt cap/trees/caves.
    pub fn load_frontier(&self, x: i32, z: i32) -> Option<(BlockId, i32)> {
        let base = ((x * x + z * z) as f64).sqrt() / self.params.island_radius;
        let falloff = 16.0 * base * base;
        if falloff >= self.params.sea_level as f64 {
            return None;
        }

        let (truncated_raw, surface, _depth) = self.height_and_surface(x as f64, z as f64);
        let truncated = truncated_raw - falloff.floor() as i32;
        let height_abs = truncated + self.params.sea_level;

        if height_abs < self.params.sea_level {
            Some((self.palette.water, self.params.sea_level))
        } else {
            Some((surface, height_abs))
        }
    }

    fn carve_caves(&self, x: i32, z: i32, column: &mut impl Column) {
        let p = &self.params;
        for i in 0..CAVE_LEVELS {
            let carver = self.cave_carver[i].sample(x as f64 / p.cave_radius, z as f64 / p.cave_radius);
            if carver <= p.cave_cutoff {
                continue;
            }

            let dy = p.sea_level as f64 - (p.cave_delta_y as f64) * ((CAVE_LEVELS - 1) as f64) / 2.0
                + (i as f64) * (p.cave_delta_y as f64);
            let wave = self.cave_wave[i].sample(x as f64 / p.cave_wave_radius, z as f64 / p.cave_wave_radius);
            let offset = (dy + p.cave_wave_height * wave).floor() as i32;

            let blocks = ((carver - p.cave_cutoff) * p.cave_height).floor() as i32;
            for y in (offset - blocks)..=(offset + blocks + 1) {
                column.overwrite(BlockId::EMPTY, y);
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Branch {
    Ground,
    Cliff,
    Mountain(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> Palette {
        Palette {
            rock: BlockId(1),
            dirt: BlockId(2),
            sand: BlockId(3),
            grass: BlockId(4),
            snow: BlockId(5),
            water: BlockId(6),
            leaves: BlockId(7),
        }
    }

    #[test]
    fn s1_empty_column_beyond_island_radius() {
        let gen = WorldGenerator::new(1, GeneratorParams::default(), palette());
        let mut col = VecColumn::new(256);
        gen.load_chunk(10_000, 10_000, &mut col);
        assert!(col.blocks().iter().all(|b| b.is_empty()));
    }

    #[test]
    fn s2_center_column_is_not_empty() {
        let gen = WorldGenerator::new(1, GeneratorParams::default(), palette());
        let mut col = VecColumn::new(256);
        gen.load_chunk(0, 0, &mut col);
        assert!(col.blocks().iter().any(|b| !b.is_empty()));
    }

    #[test]
    fn tree_hash_has_expected_density_order_of_magnitude() {
        let mut trees = 0;
        let samples = 100_000;
        for i in 0..samples {
            if WorldGenerator::has_tree(i * 7 - 12345, i * 13 + 42) {
                trees += 1;
            }
        }
        let density = trees as f64 / samples as f64;
        assert!(density > 0.03 && density < 0.10, "density = {density}");
    }

    #[test]
    fn generator_is_deterministic_for_fixed_seed() {
        let gen_a = WorldGenerator::new(77, GeneratorParams::default(), palette());
        let gen_b = WorldGenerator::new(77, GeneratorParams::default(), palette());
        let mut col_a = VecColumn::new(256);
        let mut col_b = VecColumn::new(256);
        gen_a.load_chunk(123, -456, &mut col_a);
        gen_b.load_chunk(123, -456, &mut col_b);
        assert_eq!(col_a.blocks(), col_b.blocks());
    }
}
