//! Render3D - Abstraction for DS 3D rendering backends
//!
//! Every backend (the null renderer, a software rasterizer, a GPU renderer)
//! implements `Render3D`. Backends supply the stage hooks; the per-frame
//! pipeline, the rear-plane clear, framebuffer flushing and texture
//! pre-processing are provided here and shared by all of them.
//!
//! # Frame pipeline
//!
//! ```text
//! Begin -> UpdateToonTable -> Clear -> Geometry -> [EdgeMark] -> [Fog] -> End
//! ```
//!
//! Edge marking and fog only run when enabled in the frame's render state.
//! The first failing stage aborts the frame and its error is returned.
//! Hooks a backend does not implement succeed without doing anything.

use crate::clear::{clear_fragment, depth_lut, ClearImageBuffers};
use crate::clear::{CLEAR_IMAGE_COLOR_SLOT, CLEAR_IMAGE_DEPTH_SLOT};
use crate::deposterize::TextureDeposterizer;
use crate::display::SharedFramebuffer;
use crate::flush::{convert_framebuffer, ColorFormat};
use crate::memory::TextureMemory;
use crate::render_state::{Gfx3dFrame, IndexList, Poly, PolyList, RenderState};
use crate::texcache::{SharedResources, TextureCacheHandle};
use crate::{ensure_len, Render3DError, Render3DResult, NATIVE_HEIGHT, NATIVE_WIDTH};
use emu_core::graphics::{FragmentAttributes, FragmentColor};
use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError};

/// Largest texture dimension the DS supports
pub const MAX_TEXTURE_SIZE: usize = 1024;

/// Rendering backend identifiers
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum RendererId {
    /// Renders nothing; always available
    #[default]
    Null,
    SoftRasterizer,
    OpenGl,
}

/// Capabilities of a backend, fixed when it is constructed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RendererDescriptor {
    pub id: RendererId,
    pub name: String,
    pub supports_texturing: bool,
    pub supports_edge_mark: bool,
    pub supports_fog: bool,
    pub supports_texture_smoothing: bool,
    pub max_anisotropy: f32,
    pub max_samples: u32,
}

impl RendererDescriptor {
    /// Descriptor of a backend with no capabilities
    pub fn null() -> Self {
        Self {
            id: RendererId::Null,
            name: "None".to_string(),
            supports_texturing: false,
            supports_edge_mark: false,
            supports_fog: false,
            supports_texture_smoothing: false,
            max_anisotropy: 1.0,
            max_samples: 0,
        }
    }

    /// JSON form for frontends listing backend capabilities
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Texture pre-processing applied before textures enter the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureProcessingConfig {
    /// 1, 2 or 4
    pub scaling_factor: usize,
    pub deposterize: bool,
    pub smooth: bool,
}

impl Default for TextureProcessingConfig {
    fn default() -> Self {
        Self {
            scaling_factor: 1,
            deposterize: false,
            smooth: false,
        }
    }
}

/// Texture upscaling algorithm (xBRZ or similar)
pub trait TextureUpscaler: Send {
    /// Scale `src` (`width` x `height`, `0xAABBGGRR`) by `factor` into `dst`
    ///
    /// `dst` holds exactly `width * height * factor * factor` texels.
    fn scale(&self, factor: usize, src: &[u32], width: usize, height: usize, dst: &mut [u32]);
}

/// Stages of the frame pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderStage {
    Begin,
    UpdateToonTable,
    Clear,
    Geometry,
    EdgeMark,
    Fog,
    End,
}

/// State shared by every backend
///
/// Holds the logical framebuffer, color formats, pending-work flags, texture
/// processing buffers and the clear-image scratch. Backends embed one and
/// expose it through `Render3D::base`.
pub struct Render3DBase {
    descriptor: RendererDescriptor,

    framebuffer_width: usize,
    framebuffer_height: usize,
    framebuffer_size_bytes: usize,
    /// Bound display storage; `None` until `set_framebuffer_size` succeeds
    framebuffer: Option<SharedFramebuffer>,
    display_framebuffer: SharedFramebuffer,

    internal_format: ColorFormat,
    output_format: ColorFormat,

    render_needs_finish: bool,
    will_flush_rgba6665: bool,
    will_flush_rgba5551: bool,

    texture_processing: TextureProcessingConfig,
    deposterizer: Option<TextureDeposterizer>,
    upscale_buffer: Vec<u32>,
    upscaler: Option<Box<dyn TextureUpscaler>>,

    clear_image: ClearImageBuffers,
    texture_cache: TextureCacheHandle,
}

impl Render3DBase {
    pub fn new(descriptor: RendererDescriptor, resources: &SharedResources) -> Self {
        depth_lut();

        let mut base = Self {
            descriptor,
            framebuffer_width: NATIVE_WIDTH,
            framebuffer_height: NATIVE_HEIGHT,
            framebuffer_size_bytes: 0,
            framebuffer: None,
            display_framebuffer: Arc::clone(&resources.framebuffer),
            internal_format: ColorFormat::Bgr666Rev,
            output_format: ColorFormat::Bgr666Rev,
            render_needs_finish: false,
            will_flush_rgba6665: true,
            will_flush_rgba5551: true,
            texture_processing: TextureProcessingConfig::default(),
            deposterizer: None,
            upscale_buffer: Vec::new(),
            upscaler: None,
            clear_image: ClearImageBuffers::new(),
            texture_cache: resources.texture_cache.clone(),
        };
        base.reset();
        base
    }

    pub fn descriptor(&self) -> &RendererDescriptor {
        &self.descriptor
    }

    pub fn render_id(&self) -> RendererId {
        self.descriptor.id
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn framebuffer_width(&self) -> usize {
        self.framebuffer_width
    }

    pub fn framebuffer_height(&self) -> usize {
        self.framebuffer_height
    }

    /// Bytes of color data in the logical framebuffer; 0 while unbound
    pub fn framebuffer_size_bytes(&self) -> usize {
        self.framebuffer_size_bytes
    }

    pub fn is_framebuffer_native_size(&self) -> bool {
        self.framebuffer_width == NATIVE_WIDTH && self.framebuffer_height == NATIVE_HEIGHT
    }

    /// Handle to the bound framebuffer storage
    pub fn framebuffer(&self) -> Option<SharedFramebuffer> {
        self.framebuffer.clone()
    }

    /// Resize the logical framebuffer and bind the display's storage
    ///
    /// Sizes below native are ignored. The logical size may run ahead of the
    /// display's storage; `reset` only touches the pixels the storage holds.
    pub fn set_framebuffer_size(&mut self, width: usize, height: usize) -> Render3DResult {
        if width < NATIVE_WIDTH || height < NATIVE_HEIGHT {
            return Ok(());
        }

        self.framebuffer_width = width;
        self.framebuffer_height = height;
        self.framebuffer_size_bytes = width * height * std::mem::size_of::<FragmentColor>();
        self.framebuffer = Some(Arc::clone(&self.display_framebuffer));
        Ok(())
    }

    /// Format the backend renders in
    pub fn internal_format(&self) -> ColorFormat {
        self.internal_format
    }

    /// Backends rendering at 8 bits per channel switch this to `Bgr888Rev`
    pub fn set_internal_format(&mut self, format: ColorFormat) {
        self.internal_format = format;
    }

    /// Output format in effect
    pub fn color_format(&self) -> ColorFormat {
        self.output_format
    }

    /// Select the flush output format; 15-bit requests get 6-bit output
    pub fn request_color_format(&mut self, format: ColorFormat) -> ColorFormat {
        self.output_format = match format {
            ColorFormat::Bgr555Rev => ColorFormat::Bgr666Rev,
            other => other,
        };
        self.output_format
    }

    pub fn render_needs_finish(&self) -> bool {
        self.render_needs_finish
    }

    pub fn set_render_needs_finish(&mut self, needs_finish: bool) {
        self.render_needs_finish = needs_finish;
    }

    /// (RGBA6665 flush enabled, RGBA5551 flush enabled)
    pub fn framebuffer_flush_states(&self) -> (bool, bool) {
        (self.will_flush_rgba6665, self.will_flush_rgba5551)
    }

    pub fn set_framebuffer_flush_states(&mut self, rgba6665: bool, rgba5551: bool) {
        self.will_flush_rgba6665 = rgba6665;
        self.will_flush_rgba5551 = rgba5551;
    }

    pub fn texture_processing(&self) -> TextureProcessingConfig {
        self.texture_processing
    }

    /// Configure texture pre-processing
    ///
    /// Scaling factors other than 2 and 4 fall back to 1. Any effective
    /// change resets the texture cache so textures are processed again.
    pub fn set_texture_processing_properties(
        &mut self,
        scaling_factor: usize,
        deposterize: bool,
        smooth: bool,
    ) {
        let scaling_factor = match scaling_factor {
            1 | 2 | 4 => scaling_factor,
            other => {
                log(LogCategory::Render3D, LogLevel::Warn, || {
                    format!("Texture scaling factor {} unsupported, using 1", other)
                });
                1
            }
        };
        let mut needs_cache_reset = false;

        if deposterize != self.deposterizer.is_some() {
            self.deposterizer = deposterize.then(TextureDeposterizer::new);
            needs_cache_reset = true;
        }

        if scaling_factor != self.texture_processing.scaling_factor {
            let side = MAX_TEXTURE_SIZE * scaling_factor;
            self.upscale_buffer = if scaling_factor > 1 {
                vec![0; side * side]
            } else {
                Vec::new()
            };
            self.texture_processing.scaling_factor = scaling_factor;
            needs_cache_reset = true;
        }

        if smooth != self.texture_processing.smooth {
            self.texture_processing.smooth = smooth;
            needs_cache_reset = true;
        }

        self.texture_processing.deposterize = deposterize;

        if needs_cache_reset {
            self.texture_cache.reset();
        }
    }

    /// Install the algorithm used by `texture_upscale`
    pub fn set_texture_upscaler(&mut self, upscaler: Option<Box<dyn TextureUpscaler>>) {
        self.upscaler = upscaler;
    }

    /// Run the deposterize filter over a texture
    pub fn texture_deposterize(
        &mut self,
        src: &[u32],
        width: usize,
        height: usize,
    ) -> Render3DResult<&[u32]> {
        match self.deposterizer.as_mut() {
            Some(filter) => filter.deposterize(src, width, height),
            None => Err(Render3DError::DeposterizeDisabled),
        }
    }

    /// Upscale a texture into the upscale buffer, returning its new size
    ///
    /// Without an installed upscaler, or at factor 1, nothing is written and
    /// the input size is returned.
    pub fn texture_upscale(
        &mut self,
        src: &[u32],
        width: usize,
        height: usize,
    ) -> Render3DResult<(usize, usize)> {
        let factor = self.texture_processing.scaling_factor;
        if factor == 1 {
            return Ok((width, height));
        }
        let Some(upscaler) = self.upscaler.as_ref() else {
            log(LogCategory::Stubs, LogLevel::Debug, || {
                format!("No texture upscaler installed for {}x scaling", factor)
            });
            return Ok((width, height));
        };
        if width > MAX_TEXTURE_SIZE || height > MAX_TEXTURE_SIZE {
            return Err(Render3DError::TextureTooLarge { width, height });
        }
        let count = width * height;
        ensure_len(src, count)?;

        let dst = &mut self.upscale_buffer[..count * factor * factor];
        upscaler.scale(factor, &src[..count], width, height, dst);
        Ok((width * factor, height * factor))
    }

    /// Output of the last `texture_upscale`
    pub fn upscaled_texels(&self) -> &[u32] {
        &self.upscale_buffer
    }

    /// Clear-image scratch from the most recent image clear
    pub fn clear_image(&self) -> &ClearImageBuffers {
        &self.clear_image
    }

    pub fn texture_cache(&self) -> &TextureCacheHandle {
        &self.texture_cache
    }

    /// Zero the bound framebuffer and clear-image scratch, re-enable both
    /// flush paths and reset the texture cache
    pub fn reset(&mut self) {
        if let Some(framebuffer) = &self.framebuffer {
            let mut pixels = framebuffer.lock().unwrap_or_else(PoisonError::into_inner);
            let count = (self.framebuffer_size_bytes / std::mem::size_of::<FragmentColor>())
                .min(pixels.len());
            pixels[..count].fill(FragmentColor::default());
        }

        self.clear_image.zero();
        self.will_flush_rgba6665 = true;
        self.will_flush_rgba5551 = true;
        self.texture_cache.reset();
    }
}

impl std::fmt::Debug for Render3DBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Render3DBase")
            .field("descriptor", &self.descriptor)
            .field("framebuffer_width", &self.framebuffer_width)
            .field("framebuffer_height", &self.framebuffer_height)
            .field("bound", &self.framebuffer.is_some())
            .field("internal_format", &self.internal_format)
            .field("output_format", &self.output_format)
            .field("render_needs_finish", &self.render_needs_finish)
            .field("texture_processing", &self.texture_processing)
            .field("upscaler", &self.upscaler.is_some())
            .finish_non_exhaustive()
    }
}

/// Log a stage failure and pass the result through
fn check_stage(stage: RenderStage, result: Render3DResult) -> Render3DResult {
    if let Err(err) = &result {
        log(LogCategory::Render3D, LogLevel::Warn, || {
            format!("{:?} stage failed: {}", stage, err)
        });
    }
    result
}

/// Contract implemented by every 3D rendering backend
///
/// Only `base` and `base_mut` are required. Stage hooks default to doing
/// nothing successfully; the rest is provided on top of them.
pub trait Render3D: Send {
    fn base(&self) -> &Render3DBase;

    fn base_mut(&mut self) -> &mut Render3DBase;

    // Stage hooks

    fn begin_render(&mut self, _frame: &Gfx3dFrame) -> Render3DResult {
        Ok(())
    }

    fn update_toon_table(&mut self, _toon_table: &[u16; 32]) -> Render3DResult {
        Ok(())
    }

    fn render_geometry(
        &mut self,
        _state: &RenderState,
        _polys: &PolyList,
        _indices: &IndexList,
    ) -> Render3DResult {
        Ok(())
    }

    fn render_edge_marking(&mut self, _color_table: &[u16; 8], _antialias: bool) -> Render3DResult {
        Ok(())
    }

    fn render_fog(
        &mut self,
        _density_table: &[u8; 32],
        _color: u32,
        _offset: u32,
        _shift: u8,
        _alpha_only: bool,
    ) -> Render3DResult {
        Ok(())
    }

    fn end_render(&mut self, _frame_count: u64) -> Render3DResult {
        Ok(())
    }

    /// Clear from the clear image; an error falls back to the value clear
    fn clear_using_image(&mut self, _image: &ClearImageBuffers) -> Render3DResult {
        Ok(())
    }

    /// Clear to constant values; color channels are 5-bit
    fn clear_using_values(
        &mut self,
        _color: FragmentColor,
        _attributes: &FragmentAttributes,
    ) -> Render3DResult {
        Ok(())
    }

    fn setup_polygon(&mut self, _poly: &Poly) -> Render3DResult {
        Ok(())
    }

    fn setup_texture(&mut self, _poly: &Poly, _enable_texturing: bool) -> Render3DResult {
        Ok(())
    }

    fn setup_viewport(&mut self, _viewport: u32) -> Render3DResult {
        Ok(())
    }

    /// Wait for outstanding rendering work
    fn finish_render(&mut self) -> Render3DResult {
        Ok(())
    }

    // Provided

    /// Render one frame through the stage pipeline
    fn render(&mut self, frame: &Gfx3dFrame, vram: &dyn TextureMemory) -> Render3DResult {
        let state = &frame.render_state;

        check_stage(RenderStage::Begin, self.begin_render(frame))?;
        self.base_mut().set_render_needs_finish(true);

        check_stage(
            RenderStage::UpdateToonTable,
            self.update_toon_table(&state.toon_table),
        )?;
        check_stage(RenderStage::Clear, self.clear_framebuffer(state, vram))?;
        check_stage(
            RenderStage::Geometry,
            self.render_geometry(state, &frame.poly_list, &frame.index_list),
        )?;

        if state.enable_edge_marking {
            check_stage(
                RenderStage::EdgeMark,
                self.render_edge_marking(&state.edge_mark_color_table, state.enable_antialiasing),
            )?;
        }

        if state.enable_fog {
            check_stage(
                RenderStage::Fog,
                self.render_fog(
                    &state.fog_density_table,
                    state.fog_color,
                    state.fog_offset,
                    state.fog_shift,
                    state.enable_fog_alpha_only,
                ),
            )?;
        }

        check_stage(RenderStage::End, self.end_render(frame.frame_count))
    }

    /// Clear the rear plane from the clear image or from constant values
    fn clear_framebuffer(&mut self, state: &RenderState, vram: &dyn TextureMemory) -> Render3DResult {
        let (color, attributes) = clear_fragment(state);

        if state.enable_clear_image {
            let mut image = std::mem::take(&mut self.base_mut().clear_image);
            let result = image
                .fill(
                    vram.texture_slot(CLEAR_IMAGE_COLOR_SLOT),
                    vram.texture_slot(CLEAR_IMAGE_DEPTH_SLOT),
                    vram.clear_image_offset(),
                    attributes.opaque_poly_id,
                )
                .and_then(|()| self.clear_using_image(&image));
            self.base_mut().clear_image = image;

            match result {
                Ok(()) => return Ok(()),
                Err(err) => log(LogCategory::Render3D, LogLevel::Debug, || {
                    format!("Clear image unusable ({}), clearing with values", err)
                }),
            }
        }

        self.clear_using_values(color, &attributes)
    }

    /// Complete a pending render; no-op when nothing is pending
    fn render_finish(&mut self) -> Render3DResult {
        if !self.base().render_needs_finish() {
            return Ok(());
        }
        let result = self.finish_render();
        self.base_mut().set_render_needs_finish(false);
        result
    }

    /// Convert the rendered frame into the requested destinations
    fn flush_framebuffer(
        &self,
        src: &[FragmentColor],
        dst_main: Option<&mut [FragmentColor]>,
        dst_5551: Option<&mut [u16]>,
    ) -> Render3DResult {
        let base = self.base();
        convert_framebuffer(
            src,
            base.internal_format(),
            base.color_format(),
            base.framebuffer_width() * base.framebuffer_height(),
            dst_main,
            dst_5551,
        )
    }

    /// VRAM banks were remapped; cached textures may be stale
    fn vram_reconfigure_signal(&mut self) -> Render3DResult {
        self.base().texture_cache().invalidate();
        Ok(())
    }

    fn reset(&mut self) -> Render3DResult {
        self.base_mut().reset();
        Ok(())
    }

    fn set_framebuffer_size(&mut self, width: usize, height: usize) -> Render3DResult {
        self.base_mut().set_framebuffer_size(width, height)
    }

    fn framebuffer(&self) -> Option<SharedFramebuffer> {
        self.base().framebuffer()
    }

    fn request_color_format(&mut self, format: ColorFormat) -> ColorFormat {
        self.base_mut().request_color_format(format)
    }

    fn color_format(&self) -> ColorFormat {
        self.base().color_format()
    }

    fn render_needs_finish(&self) -> bool {
        self.base().render_needs_finish()
    }

    fn set_render_needs_finish(&mut self, needs_finish: bool) {
        self.base_mut().set_render_needs_finish(needs_finish);
    }

    fn set_texture_processing_properties(
        &mut self,
        scaling_factor: usize,
        deposterize: bool,
        smooth: bool,
    ) {
        self.base_mut()
            .set_texture_processing_properties(scaling_factor, deposterize, smooth);
    }

    fn descriptor(&self) -> &RendererDescriptor {
        self.base().descriptor()
    }

    fn render_id(&self) -> RendererId {
        self.base().render_id()
    }

    fn name(&self) -> &str {
        self.base().name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DisplayInfo;
    use crate::memory::TextureSlots;
    use crate::texcache::TexCacheCounter;
    use std::sync::Mutex;

    struct Fixture {
        display: DisplayInfo,
        cache: Arc<Mutex<TexCacheCounter>>,
        resources: SharedResources,
    }

    fn fixture() -> Fixture {
        let display = DisplayInfo::new();
        let cache = Arc::new(Mutex::new(TexCacheCounter::default()));
        let resources = SharedResources {
            framebuffer: display.framebuffer(),
            texture_cache: TextureCacheHandle::from_shared(cache.clone()),
        };
        Fixture {
            display,
            cache,
            resources,
        }
    }

    /// Records which hooks ran and in what order
    struct Recorder {
        base: Render3DBase,
        calls: Vec<&'static str>,
        fail_at: Option<&'static str>,
        image_clears: usize,
        value_clears: Vec<(FragmentColor, FragmentAttributes)>,
    }

    impl Recorder {
        fn new(resources: &SharedResources) -> Self {
            Self {
                base: Render3DBase::new(RendererDescriptor::null(), resources),
                calls: Vec::new(),
                fail_at: None,
                image_clears: 0,
                value_clears: Vec::new(),
            }
        }

        fn hit(&mut self, name: &'static str) -> Render3DResult {
            self.calls.push(name);
            if self.fail_at == Some(name) {
                Err(Render3DError::Unsupported(name))
            } else {
                Ok(())
            }
        }
    }

    impl Render3D for Recorder {
        fn base(&self) -> &Render3DBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut Render3DBase {
            &mut self.base
        }

        fn begin_render(&mut self, _frame: &Gfx3dFrame) -> Render3DResult {
            self.hit("begin")
        }

        fn update_toon_table(&mut self, _toon_table: &[u16; 32]) -> Render3DResult {
            self.hit("toon")
        }

        fn render_geometry(
            &mut self,
            _state: &RenderState,
            _polys: &PolyList,
            _indices: &IndexList,
        ) -> Render3DResult {
            self.hit("geometry")
        }

        fn render_edge_marking(&mut self, _table: &[u16; 8], _aa: bool) -> Render3DResult {
            self.hit("edge")
        }

        fn render_fog(
            &mut self,
            _table: &[u8; 32],
            _color: u32,
            _offset: u32,
            _shift: u8,
            _alpha_only: bool,
        ) -> Render3DResult {
            self.hit("fog")
        }

        fn end_render(&mut self, _frame_count: u64) -> Render3DResult {
            self.hit("end")
        }

        fn clear_using_image(&mut self, image: &ClearImageBuffers) -> Render3DResult {
            assert_eq!(image.depth.len(), crate::NATIVE_PIXELS);
            self.image_clears += 1;
            self.hit("clear_image")
        }

        fn clear_using_values(
            &mut self,
            color: FragmentColor,
            attributes: &FragmentAttributes,
        ) -> Render3DResult {
            self.value_clears.push((color, *attributes));
            self.hit("clear_values")
        }

        fn finish_render(&mut self) -> Render3DResult {
            self.hit("finish")
        }
    }

    #[test]
    fn test_pipeline_order_with_optional_stages() {
        let fx = fixture();
        let mut renderer = Recorder::new(&fx.resources);
        let mut frame = Gfx3dFrame::default();
        renderer.render(&frame, &TextureSlots::new()).unwrap();
        assert_eq!(renderer.calls, ["begin", "toon", "clear_values", "geometry", "end"]);

        renderer.calls.clear();
        frame.render_state.enable_edge_marking = true;
        frame.render_state.enable_fog = true;
        renderer.render(&frame, &TextureSlots::new()).unwrap();
        assert_eq!(
            renderer.calls,
            ["begin", "toon", "clear_values", "geometry", "edge", "fog", "end"]
        );
    }

    #[test]
    fn test_failed_begin_leaves_finish_flag_clear() {
        let fx = fixture();
        let mut renderer = Recorder::new(&fx.resources);
        renderer.fail_at = Some("begin");
        let result = renderer.render(&Gfx3dFrame::default(), &TextureSlots::new());
        assert_eq!(result, Err(Render3DError::Unsupported("begin")));
        assert_eq!(renderer.calls, ["begin"]);
        assert!(!renderer.render_needs_finish());
    }

    #[test]
    fn test_failed_geometry_skips_later_stages() {
        let fx = fixture();
        let mut renderer = Recorder::new(&fx.resources);
        renderer.fail_at = Some("geometry");
        let mut frame = Gfx3dFrame::default();
        frame.render_state.enable_fog = true;
        assert!(renderer.render(&frame, &TextureSlots::new()).is_err());
        assert_eq!(renderer.calls, ["begin", "toon", "clear_values", "geometry"]);
        assert!(renderer.render_needs_finish());
    }

    #[test]
    fn test_render_finish_drains_once() {
        let fx = fixture();
        let mut renderer = Recorder::new(&fx.resources);
        renderer.render(&Gfx3dFrame::default(), &TextureSlots::new()).unwrap();
        assert!(renderer.render_needs_finish());

        renderer.calls.clear();
        renderer.render_finish().unwrap();
        renderer.render_finish().unwrap();
        assert_eq!(renderer.calls, ["finish"]);
        assert!(!renderer.render_needs_finish());
    }

    #[test]
    fn test_clear_image_used_when_enabled() {
        let fx = fixture();
        let mut renderer = Recorder::new(&fx.resources);
        let mut vram = TextureSlots::new();
        vram.slot_mut(CLEAR_IMAGE_DEPTH_SLOT)[0] = 0xFFFF;
        vram.slot_mut(CLEAR_IMAGE_COLOR_SLOT)[0] = 0x7C00;

        let mut frame = Gfx3dFrame::default();
        frame.render_state.enable_clear_image = true;
        frame.render_state.clear_color = 0x0500_0000;
        renderer.render(&frame, &vram).unwrap();

        assert_eq!(renderer.image_clears, 1);
        assert!(renderer.value_clears.is_empty());
        let image = renderer.base().clear_image();
        assert_eq!(image.color16[0], 0x7C00);
        assert_eq!(image.depth[0], 0x00FF_FFFF);
        assert_eq!(image.fog[0], 1);
        assert_eq!(image.poly_id[0], 5);
    }

    #[test]
    fn test_clear_image_failure_falls_back_to_values() {
        let fx = fixture();
        let mut renderer = Recorder::new(&fx.resources);
        renderer.fail_at = Some("clear_image");
        let mut frame = Gfx3dFrame::default();
        frame.render_state.enable_clear_image = true;
        frame.render_state.clear_color = 0x3F1F_001F;

        renderer.render(&frame, &TextureSlots::new()).unwrap();
        assert_eq!(renderer.image_clears, 1);
        let (color, attributes) = renderer.value_clears[0];
        assert_eq!(color, FragmentColor::new(31, 0, 0, 31));
        assert_eq!(attributes.opaque_poly_id, 0x3F);
        assert_eq!(attributes.depth, frame.render_state.clear_depth);
    }

    #[test]
    fn test_framebuffer_size_rules() {
        let mut fx = fixture();
        let mut base = Render3DBase::new(RendererDescriptor::null(), &fx.resources);
        assert!(base.framebuffer().is_none());
        assert_eq!(base.framebuffer_size_bytes(), 0);

        // Below native: accepted, nothing changes
        base.set_framebuffer_size(128, 96).unwrap();
        assert!(base.framebuffer().is_none());

        base.set_framebuffer_size(256, 192).unwrap();
        assert!(base.is_framebuffer_native_size());
        assert_eq!(base.framebuffer_size_bytes(), 256 * 192 * 4);
        assert!(base.framebuffer().is_some());

        // Larger than the display's storage: the logical size still follows
        base.set_framebuffer_size(512, 384).unwrap();
        assert_eq!(base.framebuffer_width(), 512);
        assert_eq!(base.framebuffer_height(), 384);
        assert_eq!(base.framebuffer_size_bytes(), 512 * 384 * 4);
        assert!(!base.is_framebuffer_native_size());

        // Reset stays within the storage the display holds
        base.reset();
        assert_eq!(fx.display.framebuffer().lock().unwrap().len(), 256 * 192);

        fx.display.set_custom_size(1024, 768);
        base.set_framebuffer_size(1024, 768).unwrap();
        assert_eq!(base.framebuffer_size_bytes(), 1024 * 768 * 4);
        let last = 1024 * 768 - 1;
        fx.display.framebuffer().lock().unwrap()[last] = FragmentColor::new(1, 2, 3, 4);
        base.reset();
        assert_eq!(fx.display.framebuffer().lock().unwrap()[last], FragmentColor::default());
    }

    #[test]
    fn test_color_format_coercion() {
        let fx = fixture();
        let mut base = Render3DBase::new(RendererDescriptor::null(), &fx.resources);
        assert_eq!(base.request_color_format(ColorFormat::Bgr555Rev), ColorFormat::Bgr666Rev);
        assert_eq!(base.request_color_format(ColorFormat::Bgr888Rev), ColorFormat::Bgr888Rev);
        assert_eq!(base.color_format(), ColorFormat::Bgr888Rev);

        // Requesting the format in effect changes nothing
        assert_eq!(base.request_color_format(base.color_format()), base.color_format());
        assert_eq!(base.request_color_format(ColorFormat::Bgr555Rev), ColorFormat::Bgr666Rev);
        assert_eq!(base.request_color_format(base.color_format()), ColorFormat::Bgr666Rev);
    }

    #[test]
    fn test_reset_zeroes_bound_framebuffer() {
        let fx = fixture();
        let mut base = Render3DBase::new(RendererDescriptor::null(), &fx.resources);
        base.set_framebuffer_size(256, 192).unwrap();
        fx.display.framebuffer().lock().unwrap()[100] = FragmentColor::new(1, 2, 3, 4);
        base.set_framebuffer_flush_states(false, false);

        base.reset();
        assert_eq!(fx.display.framebuffer().lock().unwrap()[100], FragmentColor::default());
        assert_eq!(base.framebuffer_flush_states(), (true, true));
    }

    #[test]
    fn test_texture_processing_resets_cache_on_change() {
        let fx = fixture();
        let mut base = Render3DBase::new(RendererDescriptor::null(), &fx.resources);
        let resets = || fx.cache.lock().unwrap().resets;
        let initial = resets();

        base.set_texture_processing_properties(1, false, false);
        assert_eq!(resets(), initial);

        base.set_texture_processing_properties(3, false, false);
        assert_eq!(base.texture_processing().scaling_factor, 1);
        assert_eq!(resets(), initial);

        base.set_texture_processing_properties(2, true, true);
        assert_eq!(resets(), initial + 1);
        assert_eq!(
            base.texture_processing(),
            TextureProcessingConfig {
                scaling_factor: 2,
                deposterize: true,
                smooth: true,
            }
        );
        assert_eq!(base.upscaled_texels().len(), 2048 * 2048);

        base.set_texture_processing_properties(2, false, true);
        assert_eq!(resets(), initial + 2);
    }

    #[test]
    fn test_deposterize_requires_enable() {
        let fx = fixture();
        let mut base = Render3DBase::new(RendererDescriptor::null(), &fx.resources);
        assert_eq!(
            base.texture_deposterize(&[0; 4], 2, 2),
            Err(Render3DError::DeposterizeDisabled)
        );
        base.set_texture_processing_properties(1, true, false);
        assert_eq!(base.texture_deposterize(&[0; 4], 2, 2).unwrap(), &[0u32; 4]);
    }

    struct Nearest;

    impl TextureUpscaler for Nearest {
        fn scale(&self, factor: usize, src: &[u32], width: usize, _height: usize, dst: &mut [u32]) {
            let out_width = width * factor;
            for (i, texel) in dst.iter_mut().enumerate() {
                let (x, y) = (i % out_width / factor, i / out_width / factor);
                *texel = src[y * width + x];
            }
        }
    }

    #[test]
    fn test_texture_upscale() {
        let fx = fixture();
        let mut base = Render3DBase::new(RendererDescriptor::null(), &fx.resources);
        let src = [1u32, 2, 3, 4];

        // No upscaler installed
        base.set_texture_processing_properties(2, false, false);
        assert_eq!(base.texture_upscale(&src, 2, 2), Ok((2, 2)));

        base.set_texture_upscaler(Some(Box::new(Nearest)));
        assert_eq!(base.texture_upscale(&src, 2, 2), Ok((4, 4)));
        assert_eq!(&base.upscaled_texels()[..8], &[1u32, 1, 2, 2, 1, 1, 2, 2]);

        base.set_texture_processing_properties(1, false, false);
        assert_eq!(base.texture_upscale(&src, 2, 2), Ok((2, 2)));
    }

    #[test]
    fn test_vram_reconfigure_invalidates_cache() {
        let fx = fixture();
        let mut renderer = Recorder::new(&fx.resources);
        renderer.vram_reconfigure_signal().unwrap();
        assert_eq!(fx.cache.lock().unwrap().invalidations, 1);
    }

    #[test]
    fn test_flush_uses_logical_size() {
        let fx = fixture();
        let mut renderer = Recorder::new(&fx.resources);
        renderer.request_color_format(ColorFormat::Bgr888Rev);
        let src = vec![FragmentColor::new(63, 63, 63, 31); crate::NATIVE_PIXELS];
        let mut dst = vec![FragmentColor::default(); crate::NATIVE_PIXELS];
        renderer.flush_framebuffer(&src, Some(&mut dst), None).unwrap();
        assert!(dst.iter().all(|&p| p == FragmentColor::new(255, 255, 255, 255)));
    }

    #[test]
    fn test_descriptor_json() {
        let json = RendererDescriptor::null().to_json().unwrap();
        assert!(json.contains("\"id\":\"Null\""));
        assert!(json.contains("\"name\":\"None\""));
    }
}
