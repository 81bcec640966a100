//! Color primitives for the DS 3D framebuffer
//!
//! The 3D engine stores one `FragmentColor` per pixel: four bytes in
//! R, G, B, A order. Depending on the rendering format, the color channels
//! hold 6-bit (0..=63) or 8-bit values and alpha holds a 5-bit (0..=31)
//! value. Read as a little-endian `u32`, a pixel is `0xAABBGGRR`.

use bytemuck::{Pod, Zeroable};

/// One framebuffer pixel (R, G, B, A bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct FragmentColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl FragmentColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Pack into the little-endian word layout `0xAABBGGRR`
    #[inline]
    pub const fn to_word(self) -> u32 {
        u32::from_le_bytes([self.r, self.g, self.b, self.a])
    }

    #[inline]
    pub const fn from_word(word: u32) -> Self {
        let [r, g, b, a] = word.to_le_bytes();
        Self { r, g, b, a }
    }
}

const fn build_6bit_to_8bit() -> [u8; 64] {
    let mut table = [0u8; 64];
    let mut i = 0;
    while i < 64 {
        table[i] = ((i << 2) | (i >> 4)) as u8;
        i += 1;
    }
    table
}

const fn build_5bit_to_8bit() -> [u8; 32] {
    let mut table = [0u8; 32];
    let mut i = 0;
    while i < 32 {
        table[i] = ((i << 3) | (i >> 2)) as u8;
        i += 1;
    }
    table
}

/// 6-bit channel to 8-bit channel: `(x << 2) | (x >> 4)`
pub static MATERIAL_6BIT_TO_8BIT: [u8; 64] = build_6bit_to_8bit();

/// 5-bit alpha to 8-bit alpha: `(x << 3) | (x >> 2)`
pub static MATERIAL_5BIT_TO_8BIT: [u8; 32] = build_5bit_to_8bit();

/// Bit-depth conversions used by the framebuffer flush
pub struct ColorOps;

impl ColorOps {
    /// Expand a 6-bit channel to 8 bits; bits above the sixth are ignored
    #[inline]
    pub fn expand_6bit(value: u8) -> u8 {
        MATERIAL_6BIT_TO_8BIT[(value & 0x3F) as usize]
    }

    /// Expand a 5-bit alpha to 8 bits; bits above the fifth are ignored
    #[inline]
    pub fn expand_5bit(value: u8) -> u8 {
        MATERIAL_5BIT_TO_8BIT[(value & 0x1F) as usize]
    }

    /// RGBA6665 to RGBA8888
    #[inline]
    pub fn rgba6665_to_rgba8888(src: FragmentColor) -> FragmentColor {
        FragmentColor {
            r: Self::expand_6bit(src.r),
            g: Self::expand_6bit(src.g),
            b: Self::expand_6bit(src.b),
            a: Self::expand_5bit(src.a),
        }
    }

    /// RGBA8888 to RGBA6665, truncating
    #[inline]
    pub fn rgba8888_to_rgba6665(src: FragmentColor) -> FragmentColor {
        FragmentColor {
            r: src.r >> 2,
            g: src.g >> 2,
            b: src.b >> 2,
            a: src.a >> 3,
        }
    }

    /// Pack 6-bit channels into BGR555, keeping the top five bits of each
    #[inline]
    pub fn r6g6b6_to_rgb15(r: u8, g: u8, b: u8) -> u16 {
        let r = ((r >> 1) & 0x1F) as u16;
        let g = ((g >> 1) & 0x1F) as u16;
        let b = ((b >> 1) & 0x1F) as u16;
        r | (g << 5) | (b << 10)
    }

    /// RGBA6665 to RGBA5551; any nonzero alpha sets the alpha bit
    #[inline]
    pub fn rgba6665_to_rgba5551(src: FragmentColor) -> u16 {
        let alpha = if src.a == 0 { 0x0000 } else { 0x8000 };
        Self::r6g6b6_to_rgb15(src.r, src.g, src.b) | alpha
    }

    /// Unpack a BGR555 color word into 5-bit channels
    #[inline]
    pub fn rgb15_channels(color: u16) -> (u8, u8, u8) {
        (
            (color & 0x1F) as u8,
            ((color >> 5) & 0x1F) as u8,
            ((color >> 10) & 0x1F) as u8,
        )
    }
}
