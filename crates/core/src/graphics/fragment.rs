//! Per-pixel fragment attributes for hidden surface removal and fog
//!
//! Every framebuffer pixel carries a small set of attributes next to its
//! color: a 24-bit depth value, the ids of the last opaque and translucent
//! polygons drawn there, a shadow-volume stencil value and two flags. The
//! buffer stores them as six parallel arrays (structure of arrays) so each
//! shading pass only streams the fields it reads.
//!
//! # Usage
//!
//! ```
//! use emu_core::graphics::{FragmentAttributes, FragmentAttributesBuffer};
//!
//! let mut attrs = FragmentAttributesBuffer::new(256 * 192);
//! attrs.set_all(&FragmentAttributes::default());
//! assert_eq!(attrs.get(0), Some(FragmentAttributes::default()));
//! ```

/// Translucent polygon id of a pixel no translucent polygon has touched
///
/// Valid polygon ids are 6 bits wide, so this never collides with a real id
/// (clearing to 0 made translucent polygons with id 0 fail the same-id test
/// against untouched pixels).
pub const UNSET_TRANSLUCENT_POLY_ID: u8 = 255;

/// Attributes of a single pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentAttributes {
    /// 24-bit depth stored in 32 bits
    pub depth: u32,
    pub opaque_poly_id: u8,
    pub translucent_poly_id: u8,
    pub stencil: u8,
    pub is_fogged: bool,
    pub is_translucent_poly: bool,
}

impl Default for FragmentAttributes {
    fn default() -> Self {
        Self {
            depth: 0,
            opaque_poly_id: 0,
            translucent_poly_id: UNSET_TRANSLUCENT_POLY_ID,
            stencil: 0,
            is_fogged: false,
            is_translucent_poly: false,
        }
    }
}

/// Structure-of-arrays store of `FragmentAttributes`
///
/// All six arrays always have the same length and are indexed by
/// `y * width + x`.
#[derive(Debug, Clone)]
pub struct FragmentAttributesBuffer {
    pub depth: Vec<u32>,
    pub opaque_poly_id: Vec<u8>,
    pub translucent_poly_id: Vec<u8>,
    pub stencil: Vec<u8>,
    pub is_fogged: Vec<u8>,
    pub is_translucent_poly: Vec<u8>,
}

impl FragmentAttributesBuffer {
    /// Allocate storage for `count` pixels, zero-filled
    pub fn new(count: usize) -> Self {
        Self {
            depth: vec![0; count],
            opaque_poly_id: vec![0; count],
            translucent_poly_id: vec![0; count],
            stencil: vec![0; count],
            is_fogged: vec![0; count],
            is_translucent_poly: vec![0; count],
        }
    }

    /// Number of pixels
    pub fn len(&self) -> usize {
        self.depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth.is_empty()
    }

    /// Write all six fields of one pixel
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    #[inline]
    pub fn set_at_index(&mut self, index: usize, attr: &FragmentAttributes) {
        self.depth[index] = attr.depth;
        self.opaque_poly_id[index] = attr.opaque_poly_id;
        self.translucent_poly_id[index] = attr.translucent_poly_id;
        self.stencil[index] = attr.stencil;
        self.is_fogged[index] = attr.is_fogged as u8;
        self.is_translucent_poly[index] = attr.is_translucent_poly as u8;
    }

    /// Overwrite every pixel with the same attributes
    pub fn set_all(&mut self, attr: &FragmentAttributes) {
        self.depth.fill(attr.depth);
        self.opaque_poly_id.fill(attr.opaque_poly_id);
        self.translucent_poly_id.fill(attr.translucent_poly_id);
        self.stencil.fill(attr.stencil);
        self.is_fogged.fill(attr.is_fogged as u8);
        self.is_translucent_poly.fill(attr.is_translucent_poly as u8);
    }

    /// Read one pixel back; `None` when out of range
    pub fn get(&self, index: usize) -> Option<FragmentAttributes> {
        Some(FragmentAttributes {
            depth: *self.depth.get(index)?,
            opaque_poly_id: self.opaque_poly_id[index],
            translucent_poly_id: self.translucent_poly_id[index],
            stencil: self.stencil[index],
            is_fogged: self.is_fogged[index] != 0,
            is_translucent_poly: self.is_translucent_poly[index] != 0,
        })
    }

    /// Reallocate for a new pixel count; contents are zeroed
    pub fn resize(&mut self, count: usize) {
        *self = Self::new(count);
    }
}
