//! Voxel registry: stable integer ids for blocks and materials, their
//! solidity/opacity, and per-face material assignment.

use std::cell::Cell;
use hashbrown::HashMap;

/// `0` is the canonical empty block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockId(pub u8);

impl BlockId {
    pub const EMPTY: BlockId = BlockId(0);

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// `0` means "no material."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MaterialId(pub u16);

impl MaterialId {
    pub const NONE: MaterialId = MaterialId(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn is_translucent(&self) -> bool {
        self.a < 1.0
    }
}

/// Opaque handle to a renderer-owned texture (§6). The registry never
/// inspects its contents, only threads it through to the mesher/renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture {
    pub handle: TextureHandle,
    pub alpha_test: bool,
}

/// `texture_index == 0` means "unregistered with the renderer yet"; it is
/// lazily populated on first mesh emission (§9 "Lazy texture registration")
/// and cached here afterward. `Cell` gives the interior mutability that
/// laziness needs without forcing `&mut Material` through the mesher.
#[derive(Debug)]
pub struct Material {
    pub name: String,
    pub color: Rgba,
    pub liquid: bool,
    pub texture: Option<Texture>,
    texture_index: Cell<u32>,
}

impl Material {
    pub fn texture_index(&self) -> u32 {
        self.texture_index.get()
    }

    /// Populates the lazily-assigned renderer texture index on first mesh
    /// emission. A no-op once already cached.
    pub fn cache_texture_index(&self, index: u32) {
        if self.texture_index.get() == 0 {
            self.texture_index.set(index);
        }
    }

    pub fn alpha_test(&self) -> bool {
        self.texture.is_some_and(|t| t.alpha_test)
    }
}

/// Six faces, in the fixed order used by `faces[]` and the mesher's slab
/// scan: `[+x, -x, +y, -y, +z, -z]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Face {
    PosX = 0,
    NegX = 1,
    PosY = 2,
    NegY = 3,
    PosZ = 4,
    NegZ = 5,
}

pub const FACE_COUNT: usize = 6;
pub const ALL_FACES: [Face; FACE_COUNT] = [
    Face::PosX,
    Face::NegX,
    Face::PosY,
    Face::NegY,
    Face::PosZ,
    Face::NegZ,
];

/// Expands a 1/2/3/6-name face list into the canonical 6-slot order, per
/// `addBlock`'s contract in §4.1.
fn remap_face_names(names: &[&str], face: Face) -> usize {
    match names.len() {
        1 => 0,
        2 => match face {
            Face::PosY => 0,
            Face::NegY => 0,
            _ => 1,
        },
        3 => match face {
            Face::PosY => 0,
            Face::NegY => 1,
            _ => 2,
        },
        6 => face as usize,
        n => panic!("addBlock: names.len() must be 1, 2, 3, or 6, got {n}"),
    }
}

/// Assigns stable integer ids to blocks and materials in registration
/// order (§4.1). Parallel arrays `solid`/`opaque` are indexed by `BlockId`;
/// `faces` is a flat `6 * #blocks` array storing `materialId + 1` so that
/// `0` still means "no face material" after the offset.
pub struct Registry {
    materials: Vec<Material>,
    material_names: HashMap<String, MaterialId>,
    solid: Vec<bool>,
    opaque: Vec<bool>,
    faces: Vec<u16>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            materials: Vec::new(),
            material_names: HashMap::new(),
            solid: vec![false],
            opaque: vec![false],
            faces: Vec::new(),
        }
    }

    fn insert_material(&mut self, name: &str, color: Rgba, liquid: bool, texture: Option<Texture>) -> MaterialId {
        assert!(!name.is_empty(), "material name must not be empty");
        assert!(
            !self.material_names.contains_key(name),
            "duplicate material name: {name}"
        );

        let id = MaterialId((self.materials.len() + 1) as u16);
        self.materials.push(Material {
            name: name.to_string(),
            color,
            liquid,
            texture,
            texture_index: Cell::new(0),
        });
        self.material_names.insert(name.to_string(), id);
        id
    }

    pub fn add_material_of_color(&mut self, name: &str, color: Rgba) -> MaterialId {
        self.insert_material(name, color, false, None)
    }

    pub fn add_material_of_texture(&mut self, name: &str, texture: TextureHandle, alpha_test: bool) -> MaterialId {
        self.insert_material(
            name,
            Rgba::new(1.0, 1.0, 1.0, 1.0),
            false,
            Some(Texture {
                handle: texture,
                alpha_test,
            }),
        )
    }

    /// Flags a previously-registered material as a liquid. Split out of the
    /// `add_*` constructors because neither `addMaterialOfColor` nor
    /// `addMaterialOfTexture` takes a liquid parameter in their §4.1
    /// contract — liquids are ordinary materials the caller marks after
    /// registration.
    pub fn set_liquid(&mut self, id: MaterialId, liquid: bool) {
        assert!(id.0 != 0, "set_liquid: material id 0 is \"no material\"");
        self.materials[(id.0 - 1) as usize].liquid = liquid;
    }

    /// `names.len()` must be 1, 2, 3, or 6 (expanded per `remap_face_names`);
    /// every name must already be registered. Fatal contract violation
    /// otherwise (§7).
    pub fn add_block(&mut self, names: &[&str], solid: bool) -> BlockId {
        assert!(
            matches!(names.len(), 1 | 2 | 3 | 6),
            "addBlock: names.len() must be 1, 2, 3, or 6, got {}",
            names.len()
        );

        let mut resolved = [MaterialId::NONE; 6];
        for face in ALL_FACES {
            let slot = remap_face_names(names, face);
            let name = names[slot];
            let id = *self
                .material_names
                .get(name)
                .unwrap_or_else(|| panic!("addBlock: unknown material name {name:?}"));
            resolved[face as usize] = id;
        }

        let id = BlockId(self.solid.len() as u8);
        self.solid.push(solid);
        self.opaque.push(solid);
        for face in ALL_FACES {
            // stored as materialId + 1 so that 0 means "no face material"
            self.faces.push(resolved[face as usize].0 + 1);
        }
        id
    }

    pub fn is_solid(&self, id: BlockId) -> bool {
        self.solid[id.0 as usize]
    }

    pub fn is_opaque(&self, id: BlockId) -> bool {
        self.opaque[id.0 as usize]
    }

    pub fn get_block_face_material(&self, id: BlockId, face: Face) -> MaterialId {
        assert!(id.0 != 0, "getBlockFaceMaterial: block id 0 has no faces");
        // blocks are 1-indexed (id 0 is "empty" and owns no faces slot)
        let idx = (id.0 as usize - 1) * FACE_COUNT + face as usize;
        let stored = self.faces[idx];
        MaterialId(stored.saturating_sub(1))
    }

    pub fn get_material_data(&self, id: MaterialId) -> &Material {
        assert!(id.0 != 0, "getMaterialData: material id 0 is \"no material\"");
        &self.materials[(id.0 - 1) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registry() -> (Registry, [&'static str; 3]) {
        let mut r = Registry::new();
        let names = ["grass_top", "dirt", "grass_side"];
        r.add_material_of_color(names[0], Rgba::new(0.3, 0.8, 0.2, 1.0));
        r.add_material_of_color(names[1], Rgba::new(0.5, 0.3, 0.1, 1.0));
        r.add_material_of_color(names[2], Rgba::new(0.4, 0.6, 0.2, 1.0));
        (r, names)
    }

    #[test]
    fn add_block_rejects_unknown_name() {
        let (mut r, _) = sample_registry();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            r.add_block(&["does_not_exist"], true)
        }));
        assert!(result.is_err());
    }

    #[test]
    fn three_name_block_round_trips_faces() {
        let (mut r, names) = sample_registry();
        let id = r.add_block(&names, true);

        let top = r.get_block_face_material(id, Face::PosY);
        let bottom = r.get_block_face_material(id, Face::NegY);
        let side = r.get_block_face_material(id, Face::PosX);

        assert_eq!(r.get_material_data(top).name, names[0]);
        assert_eq!(r.get_material_data(bottom).name, names[1]);
        assert_eq!(r.get_material_data(side).name, names[2]);

        for face in [Face::NegX, Face::PosZ, Face::NegZ] {
            assert_eq!(r.get_material_data(r.get_block_face_material(id, face)).name, names[2]);
        }
    }

    #[test]
    fn one_name_block_applies_to_every_face() {
        let mut r = Registry::new();
        r.add_material_of_color("stone", Rgba::new(0.5, 0.5, 0.5, 1.0));
        let id = r.add_block(&["stone"], true);
        for face in ALL_FACES {
            assert_eq!(r.get_material_data(r.get_block_face_material(id, face)).name, "stone");
        }
    }

    #[test]
    fn lazy_texture_index_caches_once() {
        let mut r = Registry::new();
        let id = r.add_material_of_texture("leaves", TextureHandle(7), true);
        let mat = r.get_material_data(id);
        assert_eq!(mat.texture_index(), 0);
        mat.cache_texture_index(42);
        mat.cache_texture_index(99);
        assert_eq!(mat.texture_index(), 42);
    }
}
