//! Texture deposterize filter
//!
//! Softens banding in low-bit-depth textures before upscaling. Each opaque
//! texel is pulled toward neighbors whose channels lie within a small
//! threshold, then the eight neighbors are blended with fixed weights
//! (edges 7:1, corners 9:7, center 3:1). The filter runs twice; the second
//! pass reads the first pass's output.
//!
//! Texels are `0xAABBGGRR` words. Texels with zero alpha pass through
//! unchanged and never contribute to their neighbors.

use crate::render3d::MAX_TEXTURE_SIZE;
use crate::{Render3DError, Render3DResult};

/// Largest per-channel difference that still counts as banding
pub const TEXTURE_DEPOSTERIZE_THRESHOLD: u32 = 21;

const SCRATCH_TEXELS: usize = MAX_TEXTURE_SIZE * MAX_TEXTURE_SIZE;

/// Two-pass deposterize filter with its own scratch storage
///
/// The scratch holds two 1024x1024 planes: the first pass writes the
/// second plane, the final result lands in the first.
pub struct TextureDeposterizer {
    scratch: Vec<u32>,
}

impl TextureDeposterizer {
    pub fn new() -> Self {
        Self {
            scratch: vec![0; SCRATCH_TEXELS * 2],
        }
    }

    /// Filter a `width` x `height` texture, returning the filtered texels
    pub fn deposterize(&mut self, src: &[u32], width: usize, height: usize) -> Render3DResult<&[u32]> {
        if width > MAX_TEXTURE_SIZE || height > MAX_TEXTURE_SIZE {
            return Err(Render3DError::TextureTooLarge { width, height });
        }
        let count = width * height;
        if src.len() < count {
            return Err(Render3DError::BufferTooSmall {
                required: count,
                actual: src.len(),
            });
        }
        let src = &src[..count];

        let (result, intermediate) = self.scratch.split_at_mut(SCRATCH_TEXELS);
        let intermediate = &mut intermediate[..count];
        let result = &mut result[..count];

        filter_pass(src, src, intermediate, width, height);
        filter_pass(src, intermediate, result, width, height);

        Ok(&*result)
    }
}

impl Default for TextureDeposterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TextureDeposterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureDeposterizer")
            .field("scratch_texels", &self.scratch.len())
            .finish()
    }
}

/// One filter pass from `input` into `output`
///
/// `original` decides which texels are transparent; those are copied from it
/// verbatim in every pass.
fn filter_pass(original: &[u32], input: &[u32], output: &mut [u32], width: usize, height: usize) {
    let mut i = 0;
    for y in 0..height {
        for x in 0..width {
            if alpha(original[i]) == 0 {
                output[i] = original[i];
                i += 1;
                continue;
            }

            let center = input[i];
            let has_left = x > 0;
            let has_right = x + 1 < width;
            let has_up = y > 0;
            let has_down = y + 1 < height;
            let pick = |present: bool, index: usize| if present { input[index] } else { center };

            // 6 7 8
            // 5 0 1
            // 4 3 2
            let neighbors = [
                pick(has_right, i + 1),
                pick(has_right && has_down, i + width + 1),
                pick(has_down, i + width),
                pick(has_left && has_down, (i + width).wrapping_sub(1)),
                pick(has_left, i.wrapping_sub(1)),
                pick(has_left && has_up, i.wrapping_sub(width + 1)),
                pick(has_up, i.wrapping_sub(width)),
                pick(has_right && has_up, (i + 1).wrapping_sub(width)),
            ];
            let b = neighbors.map(|n| interp_lte(center, n, TEXTURE_DEPOSTERIZE_THRESHOLD));
            let [b1, b2, b3, b4, b5, b6, b7, b8] = b;

            let edges = blend(
                blend(blend(center, b5, 1, 7), blend(center, b1, 1, 7), 1, 1),
                blend(blend(center, b7, 1, 7), blend(center, b3, 1, 7), 1, 1),
                1,
                1,
            );
            let corners = blend(
                blend(blend(center, b6, 7, 9), blend(center, b2, 7, 9), 1, 1),
                blend(blend(center, b8, 7, 9), blend(center, b4, 7, 9), 1, 1),
                1,
                1,
            );
            output[i] = blend(edges, corners, 3, 1);
            i += 1;
        }
    }
}

#[inline(always)]
fn alpha(pixel: u32) -> u32 {
    pixel >> 24
}

/// Average each channel of `a` with `b` where they differ by at most
/// `threshold`; keep `a`'s channel otherwise
#[inline]
fn interp_lte(a: u32, b: u32, threshold: u32) -> u32 {
    if alpha(b) == 0 {
        return a;
    }

    let mut out = 0;
    for shift in [0, 8, 16, 24] {
        let ca = (a >> shift) & 0xFF;
        let cb = (b >> shift) & 0xFF;
        let c = if ca.abs_diff(cb) <= threshold {
            (ca + cb) >> 1
        } else {
            ca
        };
        out |= c << shift;
    }
    out
}

/// Weighted average of two texels, red and blue packed together
#[inline]
fn blend(a: u32, b: u32, weight_a: u32, weight_b: u32) -> u32 {
    let alpha_b = alpha(b);
    if alpha_b == 0 {
        return a;
    }

    let sum = weight_a + weight_b;
    let rb = (((a & 0x00FF_00FF) * weight_a + (b & 0x00FF_00FF) * weight_b) / sum) & 0x00FF_00FF;
    let g = (((a & 0x0000_FF00) * weight_a + (b & 0x0000_FF00) * weight_b) / sum) & 0x0000_FF00;
    let a = ((alpha(a) * weight_a + alpha_b * weight_b) / sum) << 24;
    rb | g | a
}
