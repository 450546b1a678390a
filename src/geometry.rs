//! The geometry buffer the mesher emits into and the renderer consumes
//! (§3, §6). Bit-exact field order and offsets are part of the external
//! contract with the GPU shader, so they are exported as stable constants
//! rather than left as `#[repr(C)]` implementation detail.

use bytemuck::{Pod, Zeroable};

/// One greedy-meshed quad, packed as ten 32-bit fields in declaration
/// order: `Pos[3], Size[2], Color[4], AOs, Dim, Dir, Mask, Wave, Texture,
/// Indices`. Every field is a 32-bit float or int, so the struct is
/// `#[repr(C)]` and `Pod`: a renderer can treat a `&[Quad]` as a raw vertex
/// buffer without repacking.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Quad {
    pub pos: [f32; 3],
    pub size: [f32; 2],
    pub color: [f32; 4],
    pub ao: u32,
    pub dim: u32,
    pub dir: u32,
    pub mask: u32,
    pub wave: u32,
    pub texture: u32,
    pub indices: u32,
}

impl Quad {
    pub const STRIDE: usize = std::mem::size_of::<Quad>();
}

pub const OFFSET_POS: usize = std::mem::offset_of!(Quad, pos);
pub const OFFSET_SIZE: usize = std::mem::offset_of!(Quad, size);
pub const OFFSET_COLOR: usize = std::mem::offset_of!(Quad, color);
pub const OFFSET_AOS: usize = std::mem::offset_of!(Quad, ao);
pub const OFFSET_DIM: usize = std::mem::offset_of!(Quad, dim);
pub const OFFSET_DIR: usize = std::mem::offset_of!(Quad, dir);
pub const OFFSET_MASK: usize = std::mem::offset_of!(Quad, mask);
pub const OFFSET_WAVE: usize = std::mem::offset_of!(Quad, wave);
pub const OFFSET_TEXTURE: usize = std::mem::offset_of!(Quad, texture);
pub const OFFSET_INDICES: usize = std::mem::offset_of!(Quad, indices);

/// The four fixed triangle-fan index permutations referenced by §4.3
/// "Triangle-fan choice". Each packs six vertex indices (two bits each,
/// corners `00, 10, 11, 01`) into the `Indices` field's low 12 bits.
/// `A`/`B` split along the `00-11` diagonal, `C`/`D` along `10-01`; the
/// pairs differ only in winding order.
pub mod fan {
    const fn pack(idx: [u32; 6]) -> u32 {
        idx[0] | (idx[1] << 2) | (idx[2] << 4) | (idx[3] << 6) | (idx[4] << 8) | (idx[5] << 10)
    }

    /// corners, in winding order, as 2-bit codes 00=0,10=1,11=2,01=3
    pub const A: u32 = pack([0, 1, 2, 0, 2, 3]);
    pub const B: u32 = pack([2, 3, 0, 2, 0, 1]);
    pub const C: u32 = pack([1, 2, 3, 1, 3, 0]);
    pub const D: u32 = pack([3, 0, 1, 3, 1, 2]);
}

/// A chunk's mesh output: one geometry buffer per translucency class
/// (§4.3 "split by `material.color.alpha < 1`").
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    quads: Vec<Quad>,
    /// Set whenever the buffer changes shape; the renderer consults this
    /// to decide whether to re-upload (§4.3 "Failure semantics").
    pub dirty: bool,
}

impl Geometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.quads.clear();
        self.dirty = true;
    }

    pub fn push(&mut self, quad: Quad) {
        self.quads.push(quad);
        self.dirty = true;
    }

    pub fn quads(&self) -> &[Quad] {
        &self.quads
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.quads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_stable_and_match_declaration_order() {
        assert_eq!(OFFSET_POS, 0);
        assert_eq!(OFFSET_SIZE, 12);
        assert_eq!(OFFSET_COLOR, 20);
        assert_eq!(OFFSET_AOS, 36);
        assert_eq!(OFFSET_DIM, 40);
        assert_eq!(OFFSET_DIR, 44);
        assert_eq!(OFFSET_MASK, 48);
        assert_eq!(OFFSET_WAVE, 52);
        assert_eq!(OFFSET_TEXTURE, 56);
        assert_eq!(OFFSET_INDICES, 60);
        assert_eq!(Quad::STRIDE, 64);
    }

    #[test]
    fn fan_permutations_are_distinct() {
        let all = [fan::A, fan::B, fan::C, fan::D];
        for (i, a) in all.iter().enumerate() {
            for (j, b) in all.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b);
                }
            }
        }
    }
}
