//! Rear-plane clear
//!
//! Each frame starts from either constant values (CLEAR_COLOR, CLEAR_DEPTH)
//! or the clear image: a 256x256 color image and depth image in texture
//! slots 2 and 3, scrolled by CLRIMAGE_OFFSET and wrapping at the edges.
//!
//! Clear-image depths are 15-bit and expand to the 24-bit depth buffer
//! format as `d * 0x200 + ((d + 1) >> 15) * 0x1FF`, so 0x7FFF reaches the
//! far plane 0xFFFFFF exactly instead of stopping at 0xFFFE00.

use crate::memory::TEXTURE_SLOT_TEXELS;
use crate::render_state::RenderState;
use crate::{ensure_len, Render3DResult, NATIVE_HEIGHT, NATIVE_PIXELS, NATIVE_WIDTH};
use emu_core::graphics::{
    ColorOps, FragmentAttributes, FragmentColor, UNSET_TRANSLUCENT_POLY_ID,
};
use std::sync::OnceLock;

/// Texture slot holding the clear color image
pub const CLEAR_IMAGE_COLOR_SLOT: usize = 2;
/// Texture slot holding the clear depth image
pub const CLEAR_IMAGE_DEPTH_SLOT: usize = 3;

/// Samples processed per iteration of the unscrolled copy
const CLEAR_CHUNK: usize = 8;

/// Expand a 15-bit depth to 24 bits; bit 15 is ignored
#[inline]
pub const fn depth15_to_24(depth: u16) -> u32 {
    let d = (depth & 0x7FFF) as u32;
    d * 0x200 + ((d + 1) >> 15) * 0x1FF
}

/// 32768-entry table of `depth15_to_24`, built on first use
pub fn depth_lut() -> &'static [u32] {
    static LUT: OnceLock<Box<[u32]>> = OnceLock::new();
    LUT.get_or_init(|| (0..0x8000u16).map(depth15_to_24).collect())
}

/// Decode CLEAR_COLOR/CLEAR_DEPTH into the constant clear values
///
/// Color channels stay 5-bit; the backend scales them to its format.
pub fn clear_fragment(state: &RenderState) -> (FragmentColor, FragmentAttributes) {
    let c = state.clear_color;
    let (r, g, b) = ColorOps::rgb15_channels(c as u16);
    let color = FragmentColor {
        r,
        g,
        b,
        a: ((c >> 16) & 0x1F) as u8,
    };

    let attributes = FragmentAttributes {
        depth: state.clear_depth,
        opaque_poly_id: ((c >> 24) & 0x3F) as u8,
        translucent_poly_id: UNSET_TRANSLUCENT_POLY_ID,
        stencil: 0,
        is_fogged: (c >> 15) & 1 != 0,
        is_translucent_poly: false,
    };

    (color, attributes)
}

/// Native-resolution scratch holding the clear image for one frame
///
/// `Default` yields empty buffers; `new` allocates them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearImageBuffers {
    /// BGR555 colors, bit 15 = alpha
    pub color16: Vec<u16>,
    /// Depths expanded to 24 bits
    pub depth: Vec<u32>,
    /// 1 where the fog bit was set
    pub fog: Vec<u8>,
    /// Opaque polygon id from CLEAR_COLOR
    pub poly_id: Vec<u8>,
}

impl ClearImageBuffers {
    pub fn new() -> Self {
        Self {
            color16: vec![0; NATIVE_PIXELS],
            depth: vec![0; NATIVE_PIXELS],
            fog: vec![0; NATIVE_PIXELS],
            poly_id: vec![0; NATIVE_PIXELS],
        }
    }

    pub fn zero(&mut self) {
        self.color16.fill(0);
        self.depth.fill(0);
        self.fog.fill(0);
        self.poly_id.fill(0);
    }

    /// Populate all four buffers from the clear images
    ///
    /// Both images must hold a full 256x256 slot.
    pub fn fill(
        &mut self,
        color_image: &[u16],
        depth_image: &[u16],
        offset: u16,
        poly_id: u8,
    ) -> Render3DResult {
        ensure_len(color_image, TEXTURE_SLOT_TEXELS)?;
        ensure_len(depth_image, TEXTURE_SLOT_TEXELS)?;
        if self.depth.len() != NATIVE_PIXELS {
            *self = Self::new();
        }

        let x_scroll = (offset & 0xFF) as usize;
        let y_scroll = (offset >> 8) as usize;
        if x_scroll == 0 && y_scroll == 0 {
            self.fill_unscrolled(color_image, depth_image, poly_id);
        } else {
            self.fill_scrolled(color_image, depth_image, x_scroll, y_scroll, poly_id);
        }
        Ok(())
    }

    /// The visible window is the first 192 rows; copy it in chunks
    fn fill_unscrolled(&mut self, color_image: &[u16], depth_image: &[u16], poly_id: u8) {
        let lut = depth_lut();
        self.color16.copy_from_slice(&color_image[..NATIVE_PIXELS]);
        self.poly_id.fill(poly_id);

        let dst = self
            .depth
            .chunks_exact_mut(CLEAR_CHUNK)
            .zip(self.fog.chunks_exact_mut(CLEAR_CHUNK));
        for ((depth, fog), src) in dst.zip(depth_image[..NATIVE_PIXELS].chunks_exact(CLEAR_CHUNK)) {
            for i in 0..CLEAR_CHUNK {
                depth[i] = lut[(src[i] & 0x7FFF) as usize];
                fog[i] = (src[i] >> 15) as u8;
            }
        }
    }

    fn fill_scrolled(
        &mut self,
        color_image: &[u16],
        depth_image: &[u16],
        x_scroll: usize,
        y_scroll: usize,
        poly_id: u8,
    ) {
        let lut = depth_lut();
        let mut dst_index = 0;
        for iy in 0..NATIVE_HEIGHT {
            let y = ((iy + y_scroll) & 0xFF) << 8;
            for ix in 0..NATIVE_WIDTH {
                let src_index = y | ((ix + x_scroll) & 0xFF);
                let depth = depth_image[src_index];

                self.color16[dst_index] = color_image[src_index];
                self.depth[dst_index] = lut[(depth & 0x7FFF) as usize];
                self.fog[dst_index] = (depth >> 15) as u8;
                self.poly_id[dst_index] = poly_id;
                dst_index += 1;
            }
        }
    }
}
