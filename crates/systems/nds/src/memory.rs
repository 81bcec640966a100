//! Texture memory as seen by the 3D renderer
//!
//! VRAM banks mapped as texture memory form four 128 KiB slots. The clear
//! image uses two of them as 256x256 arrays of 16-bit samples: slot 2 holds
//! BGR555 colors (bit 15 = alpha) and slot 3 holds 15-bit depths (bit 15 =
//! fog). The scroll offset comes from the CLRIMAGE_OFFSET I/O register.

/// 16-bit samples in one 128 KiB texture slot (a 256x256 image)
pub const TEXTURE_SLOT_TEXELS: usize = 256 * 256;

/// Number of texture slots
pub const TEXTURE_SLOT_COUNT: usize = 4;

/// CLRIMAGE_OFFSET, relative to the ARM9 I/O base
pub const REG_CLRIMAGE_OFFSET: u32 = 0x356;

/// Read access to texture memory for the renderer
pub trait TextureMemory {
    /// Samples of a texture slot; an unmapped slot may return a short slice
    fn texture_slot(&self, slot: usize) -> &[u16];

    /// CLRIMAGE_OFFSET: low byte x scroll, high byte y scroll
    fn clear_image_offset(&self) -> u16;
}

/// Flat texture memory with all four slots mapped
#[derive(Debug, Clone)]
pub struct TextureSlots {
    samples: Vec<u16>,
    clear_image_offset: u16,
}

impl TextureSlots {
    pub fn new() -> Self {
        Self {
            samples: vec![0; TEXTURE_SLOT_TEXELS * TEXTURE_SLOT_COUNT],
            clear_image_offset: 0,
        }
    }

    /// Mutable samples of a slot
    ///
    /// # Panics
    /// Panics if `slot` is not below `TEXTURE_SLOT_COUNT`.
    pub fn slot_mut(&mut self, slot: usize) -> &mut [u16] {
        let start = slot * TEXTURE_SLOT_TEXELS;
        &mut self.samples[start..start + TEXTURE_SLOT_TEXELS]
    }

    /// Copy little-endian bytes into a slot starting at sample 0
    ///
    /// Excess bytes beyond the slot and a trailing odd byte are ignored.
    pub fn load_slot_bytes(&mut self, slot: usize, bytes: &[u8]) {
        for (dst, pair) in self.slot_mut(slot).iter_mut().zip(bytes.chunks_exact(2)) {
            *dst = u16::from_le_bytes([pair[0], pair[1]]);
        }
    }

    pub fn set_clear_image_offset(&mut self, offset: u16) {
        self.clear_image_offset = offset;
    }

    /// 16-bit write to the ARM9 I/O space; only CLRIMAGE_OFFSET is decoded
    pub fn write_io16(&mut self, addr: u32, value: u16) -> bool {
        if addr == REG_CLRIMAGE_OFFSET {
            self.clear_image_offset = value;
            true
        } else {
            false
        }
    }
}

impl Default for TextureSlots {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureMemory for TextureSlots {
    fn texture_slot(&self, slot: usize) -> &[u16] {
        if slot >= TEXTURE_SLOT_COUNT {
            return &[];
        }
        let start = slot * TEXTURE_SLOT_TEXELS;
        &self.samples[start..start + TEXTURE_SLOT_TEXELS]
    }

    fn clear_image_offset(&self) -> u16 {
        self.clear_image_offset
    }
}
