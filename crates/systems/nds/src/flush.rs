//! Framebuffer flush: internal rendering format to output formats
//!
//! Backends render in either RGBA6665 or RGBA8888. On flush the frame is
//! converted to the display's requested format and, optionally, packed to
//! RGBA5551 for the 2D engine's compositor.
//!
//! On little-endian targets the conversion works on whole 32-bit pixels, four
//! at a time; the per-channel path handles the tail, unaligned buffers and
//! big-endian targets. Both produce identical output for every input.

use crate::{ensure_len, Render3DResult};
use emu_core::graphics::{ColorOps, FragmentColor};
use serde::{Deserialize, Serialize};

/// Pixel layouts of the 3D framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorFormat {
    /// 5 bits per channel, 1-bit alpha (legacy output only)
    Bgr555Rev,
    /// 6 bits per channel, 5-bit alpha
    Bgr666Rev,
    /// 8 bits per channel, alpha expanded to 8 bits
    Bgr888Rev,
}

impl Default for ColorFormat {
    fn default() -> Self {
        ColorFormat::Bgr666Rev
    }
}

/// Pixels per iteration of the word path
const FLUSH_CHUNK: usize = 4;

/// Whether pixels can be treated as `0xAABBGGRR` words
const WORD_PATH: bool = cfg!(target_endian = "little");

/// Convert `pixel_count` pixels of `src` into the requested destinations
///
/// `dst_main` receives `output` format, `dst_5551` the packed 16-bit form.
/// With no destination this is a no-op; `src` is never modified.
pub fn convert_framebuffer(
    src: &[FragmentColor],
    internal: ColorFormat,
    output: ColorFormat,
    pixel_count: usize,
    dst_main: Option<&mut [FragmentColor]>,
    dst_5551: Option<&mut [u16]>,
) -> Render3DResult {
    if dst_main.is_none() && dst_5551.is_none() {
        return Ok(());
    }
    ensure_len(src, pixel_count)?;
    let src = &src[..pixel_count];

    if let Some(dst) = dst_main {
        ensure_len(dst, pixel_count)?;
        let dst = &mut dst[..pixel_count];
        match (internal, output) {
            (ColorFormat::Bgr888Rev, ColorFormat::Bgr666Rev) => convert_8888_to_6665(src, dst),
            (ColorFormat::Bgr666Rev, ColorFormat::Bgr888Rev) => convert_6665_to_8888(src, dst),
            (a, b) if a == b => dst.copy_from_slice(src),
            // Legacy 15-bit output is never in effect; nothing to write
            _ => {}
        }
    }

    if let Some(dst) = dst_5551 {
        ensure_len(dst, pixel_count)?;
        convert_6665_to_5551(src, &mut dst[..pixel_count]);
    }

    Ok(())
}

/// Run `word_op` four pixels at a time where the source can be viewed as
/// aligned words, `pixel_op` on everything else
fn convert_pixels<D: Copy>(
    src: &[FragmentColor],
    dst: &mut [D],
    word_op: impl Fn(u32) -> D,
    pixel_op: impl Fn(FragmentColor) -> D,
) {
    let split = src.len() - src.len() % FLUSH_CHUNK;
    let words = if WORD_PATH {
        bytemuck::try_cast_slice::<FragmentColor, u32>(&src[..split]).ok()
    } else {
        None
    };

    let done = match words {
        Some(words) => {
            for (d, s) in dst
                .chunks_exact_mut(FLUSH_CHUNK)
                .zip(words.chunks_exact(FLUSH_CHUNK))
            {
                for i in 0..FLUSH_CHUNK {
                    d[i] = word_op(s[i]);
                }
            }
            split
        }
        None => 0,
    };

    for (d, s) in dst[done..].iter_mut().zip(&src[done..]) {
        *d = pixel_op(*s);
    }
}

fn convert_8888_to_6665(src: &[FragmentColor], dst: &mut [FragmentColor]) {
    convert_pixels(
        src,
        dst,
        |c| FragmentColor::from_word(word_8888_to_6665(c)),
        ColorOps::rgba8888_to_rgba6665,
    );
}

fn convert_6665_to_8888(src: &[FragmentColor], dst: &mut [FragmentColor]) {
    convert_pixels(
        src,
        dst,
        |c| FragmentColor::from_word(word_6665_to_8888(c)),
        ColorOps::rgba6665_to_rgba8888,
    );
}

fn convert_6665_to_5551(src: &[FragmentColor], dst: &mut [u16]) {
    convert_pixels(src, dst, word_6665_to_5551, ColorOps::rgba6665_to_rgba5551);
}

#[inline(always)]
fn word_8888_to_6665(c: u32) -> u32 {
    let a = (c & 0xF800_0000) >> 3;
    let rgb = (c & 0x00FC_FCFC) >> 2;
    rgb | a
}

#[inline(always)]
fn word_6665_to_8888(c: u32) -> u32 {
    // RGB: (x << 2) | (x >> 4), alpha: (x << 3) | (x >> 2), all bytes at once
    let rgb = ((c << 2) & 0xFCFC_FCFC) | ((c >> 4) & 0x0303_0303);
    let a = ((c << 3) & 0xF8F8_F8F8) | ((c >> 2) & 0x0707_0707);
    (rgb & 0x00FF_FFFF) | (a & 0xFF00_0000)
}

#[inline(always)]
fn word_6665_to_5551(c: u32) -> u16 {
    let r = (c & 0x0000_003E) >> 1;
    let g = (c & 0x0000_3E00) >> 4;
    let b = (c & 0x003E_0000) >> 7;
    let a = if c & 0xFF00_0000 == 0 { 0 } else { 0x8000 };
    (r | g | b | a) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pixels covering every byte value, including
    /// out-of-range channel bits
    fn noise(count: usize) -> Vec<FragmentColor> {
        let mut state = 0x1234_5678u32;
        (0..count)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                FragmentColor::from_word(state)
            })
            .collect()
    }

    #[test]
    fn test_word_path_matches_channel_path() {
        for word in noise(4096).into_iter().map(FragmentColor::to_word) {
            let pixel = FragmentColor::from_word(word);
            assert_eq!(
                FragmentColor::from_word(word_8888_to_6665(word)),
                ColorOps::rgba8888_to_rgba6665(pixel)
            );
            assert_eq!(
                FragmentColor::from_word(word_6665_to_8888(word)),
                ColorOps::rgba6665_to_rgba8888(pixel)
            );
            assert_eq!(word_6665_to_5551(word), ColorOps::rgba6665_to_rgba5551(pixel));
        }
    }

    #[test]
    fn test_no_destination_is_noop() {
        // Source is too short; the check must not even run
        let result = convert_framebuffer(
            &[],
            ColorFormat::Bgr666Rev,
            ColorFormat::Bgr888Rev,
            256 * 192,
            None,
            None,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_6665_to_8888_with_tail() {
        // 7 pixels: one word chunk plus a 3-pixel tail
        let src = vec![FragmentColor::new(63, 32, 1, 31); 7];
        let mut dst = vec![FragmentColor::default(); 7];
        convert_framebuffer(
            &src,
            ColorFormat::Bgr666Rev,
            ColorFormat::Bgr888Rev,
            7,
            Some(&mut dst),
            None,
        )
        .unwrap();
        assert!(dst.iter().all(|&p| p == FragmentColor::new(255, 0x82, 4, 255)));
    }

    #[test]
    fn test_8888_to_6665_truncates() {
        let src = vec![FragmentColor::new(255, 254, 3, 0xF7); 5];
        let mut dst = vec![FragmentColor::default(); 5];
        convert_framebuffer(
            &src,
            ColorFormat::Bgr888Rev,
            ColorFormat::Bgr666Rev,
            5,
            Some(&mut dst),
            None,
        )
        .unwrap();
        assert!(dst.iter().all(|&p| p == FragmentColor::new(63, 63, 0, 30)));
    }

    #[test]
    fn test_matching_formats_copy() {
        let src = noise(33);
        let mut dst = vec![FragmentColor::default(); 33];
        convert_framebuffer(
            &src,
            ColorFormat::Bgr888Rev,
            ColorFormat::Bgr888Rev,
            33,
            Some(&mut dst),
            None,
        )
        .unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn test_5551_output_alongside_main() {
        let src = vec![
            FragmentColor::new(63, 63, 63, 31),
            FragmentColor::new(2, 4, 8, 0),
            FragmentColor::new(1, 0, 0, 1),
        ];
        let mut main = vec![FragmentColor::default(); 3];
        let mut packed = vec![0u16; 3];
        convert_framebuffer(
            &src,
            ColorFormat::Bgr666Rev,
            ColorFormat::Bgr666Rev,
            3,
            Some(&mut main),
            Some(&mut packed),
        )
        .unwrap();
        assert_eq!(main, src);
        assert_eq!(packed, vec![0xFFFF, 1 | (2 << 5) | (4 << 10), 0x8000]);
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let src = noise(1000);
        let convert = || {
            let mut wide = vec![FragmentColor::default(); 1000];
            let mut narrow = vec![FragmentColor::default(); 1000];
            convert_framebuffer(
                &src,
                ColorFormat::Bgr666Rev,
                ColorFormat::Bgr888Rev,
                1000,
                Some(&mut wide),
                None,
            )
            .unwrap();
            convert_framebuffer(
                &wide,
                ColorFormat::Bgr888Rev,
                ColorFormat::Bgr666Rev,
                1000,
                Some(&mut narrow),
                None,
            )
            .unwrap();
            narrow
        };
        assert_eq!(convert(), convert());
    }

    #[test]
    fn test_short_destination_is_rejected() {
        let src = vec![FragmentColor::default(); 8];
        let mut dst = vec![0u16; 7];
        assert!(convert_framebuffer(
            &src,
            ColorFormat::Bgr666Rev,
            ColorFormat::Bgr666Rev,
            8,
            None,
            Some(&mut dst),
        )
        .is_err());
    }
}
