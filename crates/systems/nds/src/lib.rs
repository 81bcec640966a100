//! Nintendo DS 3D renderer core
//!
//! The DS 3D engine is a fixed-function GPU whose output games depend on
//! pixel for pixel. This crate holds the parts of the 3D renderer that do
//! not depend on how polygons are rasterized:
//!
//! - `Render3D`: the contract every rendering backend implements, with the
//!   per-frame pipeline (begin, toon table, clear, geometry, edge marking,
//!   fog, end) provided on top of overridable stage hooks
//! - `RendererContext`: the backend table, the always-available null
//!   backend and the hot-swap protocol between backends
//! - `clear`: the rear-plane clear, from constant values or from the
//!   scrolling clear image in texture memory
//! - `flush`: framebuffer color-format conversion
//! - `deposterize`: the texture smoothing filter
//!
//! Rasterizing backends, the geometry engine, texture memory and the texture
//! cache are supplied by the embedding emulator through the traits in
//! `memory`, `texcache` and `render3d`.
//!
//! # Architecture
//!
//! ```text
//! Driver -> RendererContext -> Box<dyn Render3D> -> {NullRenderer, backends}
//!                                     |
//!                     clear / flush / deposterize helpers
//! ```

mod clear;
mod config;
mod deposterize;
mod display;
mod flush;
mod memory;
mod registry;
mod render3d;
mod render3d_null;
mod render_state;
mod texcache;

pub use clear::{
    clear_fragment, depth15_to_24, depth_lut, ClearImageBuffers, CLEAR_IMAGE_DEPTH_SLOT,
    CLEAR_IMAGE_COLOR_SLOT,
};
pub use config::{Render3DSettings, SettingsError};
pub use deposterize::{TextureDeposterizer, TEXTURE_DEPOSTERIZE_THRESHOLD};
pub use display::{DisplayInfo, SharedFramebuffer};
pub use flush::{convert_framebuffer, ColorFormat};
pub use memory::{TextureMemory, TextureSlots, REG_CLRIMAGE_OFFSET, TEXTURE_SLOT_TEXELS};
pub use registry::{BackendFactory, BackendInterface, RendererContext, RendererFactory};
pub use render3d::{
    Render3D, Render3DBase, RenderStage, RendererDescriptor, RendererId, TextureProcessingConfig,
    TextureUpscaler, MAX_TEXTURE_SIZE,
};
pub use render3d_null::NullRenderer;
pub use render_state::{Gfx3dFrame, IndexList, Poly, PolyList, RenderState};
pub use texcache::{SharedResources, TexCacheCounter, TextureCache, TextureCacheHandle};

use thiserror::Error;

/// Native width of the DS 3D framebuffer
pub const NATIVE_WIDTH: usize = 256;
/// Native height of the DS 3D framebuffer
pub const NATIVE_HEIGHT: usize = 192;
/// Native pixel count
pub const NATIVE_PIXELS: usize = NATIVE_WIDTH * NATIVE_HEIGHT;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Render3DError {
    #[error("No renderer registered for {0:?}")]
    UnknownRenderer(RendererId),
    #[error("Renderer {0:?} failed to initialize")]
    RendererInitFailed(RendererId),
    #[error("Buffer holds {actual} elements, {required} required")]
    BufferTooSmall { required: usize, actual: usize },
    #[error("Texture {width}x{height} exceeds the 1024x1024 maximum")]
    TextureTooLarge { width: usize, height: usize },
    #[error("Texture deposterize is not enabled")]
    DeposterizeDisabled,
    #[error("Renderer context is not initialized")]
    NotInitialized,
    #[error("Unsupported: {0}")]
    Unsupported(&'static str),
}

pub type Render3DResult<T = ()> = Result<T, Render3DError>;

/// Check that a buffer holds at least `required` elements
pub(crate) fn ensure_len<T>(buffer: &[T], required: usize) -> Render3DResult {
    if buffer.len() < required {
        Err(Render3DError::BufferTooSmall {
            required,
            actual: buffer.len(),
        })
    } else {
        Ok(())
    }
}
