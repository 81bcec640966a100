//! Null renderer
//!
//! Draws nothing. It is the permanent fallback of the renderer context: it
//! is active whenever no other backend is, and it keeps the framebuffer
//! binding, pending-finish flag and clear logic working so a failed backend
//! switch leaves the emulator running.

use crate::render3d::{Render3D, Render3DBase, RendererDescriptor};
use crate::texcache::SharedResources;

/// Backend that implements no stage hooks
#[derive(Debug)]
pub struct NullRenderer {
    base: Render3DBase,
}

impl NullRenderer {
    pub fn new(resources: &SharedResources) -> Self {
        Self {
            base: Render3DBase::new(RendererDescriptor::null(), resources),
        }
    }
}

impl Render3D for NullRenderer {
    fn base(&self) -> &Render3DBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Render3DBase {
        &mut self.base
    }
}
