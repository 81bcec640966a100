//! Display-side ownership of the 3D framebuffer
//!
//! The 2D engine composites the 3D layer, so the display owns the 3D
//! framebuffer's storage. Renderers keep a handle and only change their
//! logical size; the storage is reallocated here when the output
//! resolution changes.

use crate::flush::ColorFormat;
use crate::{NATIVE_HEIGHT, NATIVE_WIDTH};
use emu_core::graphics::FragmentColor;
use std::sync::{Arc, Mutex, PoisonError};

/// 3D framebuffer storage shared between the display and the active renderer
pub type SharedFramebuffer = Arc<Mutex<Vec<FragmentColor>>>;

/// Output resolution, output color format and framebuffer storage
#[derive(Debug)]
pub struct DisplayInfo {
    width: usize,
    height: usize,
    color_format: ColorFormat,
    framebuffer: SharedFramebuffer,
}

impl DisplayInfo {
    /// Native resolution in RGBA6665
    pub fn new() -> Self {
        Self {
            width: NATIVE_WIDTH,
            height: NATIVE_HEIGHT,
            color_format: ColorFormat::Bgr666Rev,
            framebuffer: Arc::new(Mutex::new(vec![
                FragmentColor::default();
                NATIVE_WIDTH * NATIVE_HEIGHT
            ])),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn color_format(&self) -> ColorFormat {
        self.color_format
    }

    pub fn set_color_format(&mut self, format: ColorFormat) {
        self.color_format = format;
    }

    /// Change the output resolution
    ///
    /// Sizes below native are clamped up to native. The storage is
    /// reallocated in place so existing handles stay valid; its contents are
    /// zeroed.
    pub fn set_custom_size(&mut self, width: usize, height: usize) {
        self.width = width.max(NATIVE_WIDTH);
        self.height = height.max(NATIVE_HEIGHT);

        let mut pixels = self
            .framebuffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pixels.clear();
        pixels.resize(self.width * self.height, FragmentColor::default());
    }

    /// Handle to the framebuffer storage
    pub fn framebuffer(&self) -> SharedFramebuffer {
        Arc::clone(&self.framebuffer)
    }
}

impl Default for DisplayInfo {
    fn default() -> Self {
        Self::new()
    }
}
