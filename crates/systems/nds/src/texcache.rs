//! Texture cache seam and resources shared across backends
//!
//! The texture cache (decoded textures keyed by VRAM contents) and the
//! display's 3D framebuffer outlive any single backend. Each backend holds
//! handles to them; the registry's swap protocol guarantees only the active
//! backend touches them.

use crate::display::SharedFramebuffer;
use emu_core::logging::{log, LogCategory, LogLevel};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Texture cache operations the renderer triggers
pub trait TextureCache: Send {
    /// Drop all cached textures, keeping the allocation
    fn reset(&mut self);

    /// Mark cached textures stale so they are re-checked before use
    fn invalidate(&mut self);
}

/// Shared handle to the texture cache
#[derive(Clone)]
pub struct TextureCacheHandle(Arc<Mutex<dyn TextureCache>>);

impl TextureCacheHandle {
    pub fn new<C: TextureCache + 'static>(cache: C) -> Self {
        Self(Arc::new(Mutex::new(cache)))
    }

    /// Wrap a cache the caller keeps its own handle to
    pub fn from_shared<C: TextureCache + 'static>(cache: Arc<Mutex<C>>) -> Self {
        Self(cache)
    }

    fn lock(&self) -> MutexGuard<'_, dyn TextureCache + 'static> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reset(&self) {
        log(LogCategory::TexCache, LogLevel::Debug, || {
            "Texture cache reset".to_string()
        });
        self.lock().reset();
    }

    pub fn invalidate(&self) {
        log(LogCategory::TexCache, LogLevel::Debug, || {
            "Texture cache invalidated".to_string()
        });
        self.lock().invalidate();
    }
}

impl std::fmt::Debug for TextureCacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureCacheHandle").finish_non_exhaustive()
    }
}

/// Texture cache that only counts the requests it receives
///
/// Stands in for the real cache in headless runs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TexCacheCounter {
    pub resets: u64,
    pub invalidations: u64,
}

impl TextureCache for TexCacheCounter {
    fn reset(&mut self) {
        self.resets += 1;
    }

    fn invalidate(&mut self) {
        self.invalidations += 1;
    }
}

/// Handles every backend receives at construction
#[derive(Debug, Clone)]
pub struct SharedResources {
    pub framebuffer: SharedFramebuffer,
    pub texture_cache: TextureCacheHandle,
}
