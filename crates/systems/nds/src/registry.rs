//! Renderer context: backend table, fallback renderer and hot swapping
//!
//! The context owns exactly one active backend at a time. The null renderer
//! is created on `init` and stays resident; it is active whenever no other
//! backend is, including after a failed switch.
//!
//! The texture cache and the display framebuffer are shared by all backends,
//! so a switch finishes and closes the outgoing backend before the incoming
//! one is constructed.

use crate::config::Render3DSettings;
use crate::display::DisplayInfo;
use crate::flush::ColorFormat;
use crate::memory::TextureMemory;
use crate::render3d::{Render3D, RendererId};
use crate::render3d_null::NullRenderer;
use crate::render_state::Gfx3dFrame;
use crate::texcache::{SharedResources, TextureCacheHandle};
use crate::{Render3DError, Render3DResult};
use emu_core::logging::{log, LogCategory, LogLevel};
use std::collections::HashMap;

/// Constructor of a backend; `None` when the backend cannot start
pub type RendererFactory = fn(&SharedResources) -> Option<Box<dyn Render3D>>;

/// How a registered backend is brought up
#[derive(Clone, Copy)]
pub enum BackendFactory {
    /// The resident null renderer
    Fallback,
    Create(RendererFactory),
}

impl std::fmt::Debug for BackendFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendFactory::Fallback => f.write_str("Fallback"),
            BackendFactory::Create(_) => f.write_str("Create(..)"),
        }
    }
}

/// Entry in the backend table
#[derive(Debug, Clone, Copy)]
pub struct BackendInterface {
    pub name: &'static str,
    pub factory: BackendFactory,
}

/// Owner of the active 3D renderer
pub struct RendererContext {
    backends: HashMap<RendererId, BackendInterface>,
    fallback: Option<NullRenderer>,
    /// Active backend other than the fallback
    current: Option<Box<dyn Render3D>>,
    current_id: RendererId,
    display: DisplayInfo,
    texture_cache: TextureCacheHandle,
}

impl RendererContext {
    /// Context with only the null backend registered; call `init` before use
    pub fn new(display: DisplayInfo, texture_cache: TextureCacheHandle) -> Self {
        let mut backends = HashMap::new();
        backends.insert(
            RendererId::Null,
            BackendInterface {
                name: "None",
                factory: BackendFactory::Fallback,
            },
        );

        Self {
            backends,
            fallback: None,
            current: None,
            current_id: RendererId::Null,
            display,
            texture_cache,
        }
    }

    /// Handles passed to backend constructors
    pub fn resources(&self) -> SharedResources {
        SharedResources {
            framebuffer: self.display.framebuffer(),
            texture_cache: self.texture_cache.clone(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.fallback.is_some()
    }

    /// Create the fallback renderer and make it active if nothing else is
    ///
    /// Calling this again is harmless.
    pub fn init(&mut self) {
        if self.fallback.is_none() {
            let mut fallback = NullRenderer::new(&self.resources());
            if let Err(err) = fit_to_display(&mut fallback, &self.display) {
                log(LogCategory::Registry, LogLevel::Warn, || {
                    format!("Null renderer could not bind the framebuffer: {}", err)
                });
            }
            self.fallback = Some(fallback);
        }

        if self.current.is_none() {
            self.current_id = RendererId::Null;
        }
    }

    /// Finish and close the active backend, then release the fallback
    ///
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(mut renderer) = self.current.take() {
            finish_logged(renderer.as_mut());
            log(LogCategory::Registry, LogLevel::Info, || {
                format!("Closed 3D renderer {}", renderer.name())
            });
        }

        if let Some(mut fallback) = self.fallback.take() {
            finish_logged(&mut fallback);
        }

        self.current_id = RendererId::Null;
    }

    /// Add or replace a backend, returning the previous entry
    pub fn register_backend(
        &mut self,
        id: RendererId,
        interface: BackendInterface,
    ) -> Option<BackendInterface> {
        self.backends.insert(id, interface)
    }

    /// Registered backends ordered by id
    pub fn backends(&self) -> Vec<(RendererId, &'static str)> {
        let mut list: Vec<_> = self
            .backends
            .iter()
            .map(|(&id, interface)| (id, interface.name))
            .collect();
        list.sort_by_key(|&(id, _)| id);
        list
    }

    /// Switch the active backend
    ///
    /// On any error after the outgoing backend has been closed, the null
    /// renderer is left active and the context remains usable.
    pub fn change_backend(&mut self, id: RendererId) -> Render3DResult {
        let Some(interface) = self.backends.get(&id).copied() else {
            log(LogCategory::Registry, LogLevel::Warn, || {
                format!("No 3D renderer registered for {:?}", id)
            });
            return Err(Render3DError::UnknownRenderer(id));
        };

        let resources = self.resources();
        let Some(fallback) = self.fallback.as_mut() else {
            return Err(Render3DError::NotInitialized);
        };

        // The outgoing backend must release the shared resources first
        let did_render_begin = match self.current.take() {
            Some(mut renderer) => {
                let pending = renderer.render_needs_finish();
                finish_logged(renderer.as_mut());
                log(LogCategory::Registry, LogLevel::Debug, || {
                    format!("Closed 3D renderer {}", renderer.name())
                });
                pending
            }
            None => {
                let pending = fallback.render_needs_finish();
                finish_logged(&mut *fallback);
                pending
            }
        };
        self.current_id = RendererId::Null;
        fallback.set_render_needs_finish(did_render_begin);

        match interface.factory {
            BackendFactory::Fallback => {
                fallback.reset()?;
                fit_to_display(&mut *fallback, &self.display)?;
            }
            BackendFactory::Create(create) => {
                let Some(mut renderer) = create(&resources) else {
                    log(LogCategory::Registry, LogLevel::Warn, || {
                        format!("3D renderer {} failed to start", interface.name)
                    });
                    return Err(Render3DError::RendererInitFailed(id));
                };

                if let Err(err) = fit_to_display(renderer.as_mut(), &self.display) {
                    log(LogCategory::Registry, LogLevel::Warn, || {
                        format!("3D renderer {} rejected the display: {}", interface.name, err)
                    });
                    return Err(err);
                }

                renderer.set_render_needs_finish(fallback.render_needs_finish());
                self.current = Some(renderer);
            }
        }

        self.current_id = id;
        log(LogCategory::Registry, LogLevel::Info, || {
            format!("3D renderer switched to {}", interface.name)
        });
        Ok(())
    }

    pub fn current_id(&self) -> RendererId {
        self.current_id
    }

    /// The active backend; `None` before `init` or after `shutdown`
    pub fn active(&self) -> Option<&dyn Render3D> {
        match &self.current {
            Some(renderer) => Some(renderer.as_ref()),
            None => self.fallback.as_ref().map(|r| r as &dyn Render3D),
        }
    }

    pub fn active_mut(&mut self) -> Option<&mut dyn Render3D> {
        match self.current.as_mut() {
            Some(renderer) => Some(renderer.as_mut()),
            None => self.fallback.as_mut().map(|r| r as &mut dyn Render3D),
        }
    }

    fn active_or_err(&mut self) -> Render3DResult<&mut dyn Render3D> {
        self.active_mut().ok_or(Render3DError::NotInitialized)
    }

    pub fn display(&self) -> &DisplayInfo {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut DisplayInfo {
        &mut self.display
    }

    /// Change the output resolution and resize the active backend to match
    pub fn set_output_size(&mut self, width: usize, height: usize) -> Render3DResult {
        self.display.set_custom_size(width, height);
        let (width, height) = (self.display.width(), self.display.height());
        self.active_or_err()?.set_framebuffer_size(width, height)
    }

    /// Change the output color format, returning the format in effect
    pub fn set_output_format(&mut self, format: ColorFormat) -> Render3DResult<ColorFormat> {
        self.display.set_color_format(format);
        Ok(self.active_or_err()?.request_color_format(format))
    }

    pub fn render(&mut self, frame: &Gfx3dFrame, vram: &dyn TextureMemory) -> Render3DResult {
        self.active_or_err()?.render(frame, vram)
    }

    pub fn render_finish(&mut self) -> Render3DResult {
        self.active_or_err()?.render_finish()
    }

    /// VRAM banks were remapped
    pub fn vram_reconfigure_signal(&mut self) -> Render3DResult {
        self.active_or_err()?.vram_reconfigure_signal()
    }

    /// Apply user settings: log level, output format, backend and texture
    /// processing
    ///
    /// Texture processing is applied to whichever backend ends up active,
    /// even when the backend switch fails.
    pub fn apply_settings(&mut self, settings: &Render3DSettings) -> Render3DResult {
        settings.apply_log_level();
        self.display.set_color_format(settings.color_format);

        let switched = if settings.renderer != self.current_id {
            self.change_backend(settings.renderer)
        } else {
            let display = &self.display;
            match self.current.as_mut() {
                Some(renderer) => fit_to_display(renderer.as_mut(), display),
                None => match self.fallback.as_mut() {
                    Some(fallback) => fit_to_display(fallback, display),
                    None => Err(Render3DError::NotInitialized),
                },
            }
        };

        if let Some(renderer) = self.active_mut() {
            renderer.set_texture_processing_properties(
                settings.texture_scaling_factor,
                settings.texture_deposterize,
                settings.texture_smooth,
            );
        }
        switched
    }
}

impl Drop for RendererContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RendererContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererContext")
            .field("backends", &self.backends())
            .field("current_id", &self.current_id)
            .field("initialized", &self.is_initialized())
            .field("display", &self.display)
            .finish_non_exhaustive()
    }
}

/// Match a backend's output format and framebuffer size to the display
fn fit_to_display(renderer: &mut dyn Render3D, display: &DisplayInfo) -> Render3DResult {
    renderer.request_color_format(display.color_format());
    renderer.set_framebuffer_size(display.width(), display.height())
}

fn finish_logged(renderer: &mut dyn Render3D) {
    if let Err(err) = renderer.render_finish() {
        log(LogCategory::Registry, LogLevel::Warn, || {
            format!("{} failed to finish rendering: {}", renderer.name(), err)
        });
    }
}
