//! Engine configuration (§7c). Grounded on the teacher's `configuration.rs`
//! (a `VoxelWorldConfig` trait plus a default impl carrying named tuning
//! constants) and on `Jamster3000-stratum`'s use of RON for on-disk voxel
//! game configuration — `voxelcore` borrows that format rather than the
//! teacher's Bevy-resource style, since there is no ECS here to hang a
//! `Resource` off of.

use serde::Deserialize;

use crate::error::ConfigError;
use crate::generator::GeneratorParams;

/// Top-level, serializable tuning knobs. `Default` reproduces the named
/// constants spec.md calls out inline (island radius, sea level, the
/// leap-chain limits, camera zoom bounds, scheduler catch-up cap) so a
/// caller who never touches a config file still gets the documented
/// values.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub generator: GeneratorParams,
    pub flat_limit: i32,
    pub jump_limit: i32,
    pub pathfind_limit: u32,
    pub camera_zoom_min: f32,
    pub camera_zoom_max: f32,
    pub scheduler_update_limit: u32,
    pub scheduler_tick_hz: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorParams::default(),
            flat_limit: 4,
            jump_limit: 3,
            pathfind_limit: 256,
            camera_zoom_min: 0.0,
            camera_zoom_max: 10.0,
            scheduler_update_limit: 8,
            scheduler_tick_hz: 60.0,
        }
    }
}

impl EngineConfig {
    /// Loads and parses a RON configuration file. I/O and parse failures
    /// are both recoverable: the caller decides whether to fall back to
    /// `EngineConfig::default()` or abort.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        ron::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
