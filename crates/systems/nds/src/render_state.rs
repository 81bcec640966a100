//! Per-frame input to the 3D renderer
//!
//! The geometry engine latches its rendering registers and the polygon/vertex
//! lists on SWAP_BUFFERS; the renderer only ever reads the resulting
//! snapshot. Polygons and indices are passed through to backend hooks
//! untouched.

/// Rendering registers latched for one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderState {
    /// CLEAR_COLOR: bits 0-14 BGR555, bit 15 fog, bits 16-20 alpha, bits 24-29 polygon id
    pub clear_color: u32,
    /// Rear-plane depth, already expanded to 24 bits
    pub clear_depth: u32,
    pub enable_clear_image: bool,
    pub enable_edge_marking: bool,
    pub enable_antialiasing: bool,
    pub enable_fog: bool,
    pub enable_fog_alpha_only: bool,
    pub fog_color: u32,
    pub fog_offset: u32,
    pub fog_shift: u8,
    pub fog_density_table: [u8; 32],
    pub edge_mark_color_table: [u16; 8],
    pub toon_table: [u16; 32],
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            clear_color: 0,
            clear_depth: crate::depth15_to_24(0x7FFF),
            enable_clear_image: false,
            enable_edge_marking: false,
            enable_antialiasing: false,
            enable_fog: false,
            enable_fog_alpha_only: false,
            fog_color: 0,
            fog_offset: 0,
            fog_shift: 0,
            fog_density_table: [0; 32],
            edge_mark_color_table: [0; 8],
            toon_table: [0; 32],
        }
    }
}

/// A polygon as emitted by the geometry engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Poly {
    /// POLYGON_ATTR
    pub attributes: u32,
    /// TEXIMAGE_PARAM
    pub texture_params: u32,
    /// PLTT_BASE
    pub texture_palette: u32,
    /// VIEWPORT at the time of submission
    pub viewport: u32,
    pub vertex_indices: [u16; 4],
    /// 3 for triangles, 4 for quads
    pub vertex_count: u8,
}

/// Polygons in submission order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolyList {
    pub polys: Vec<Poly>,
}

/// Polygon indices in draw order (opaque first, then translucent)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexList {
    pub indices: Vec<usize>,
}

/// Everything the renderer needs for one frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gfx3dFrame {
    pub render_state: RenderState,
    pub poly_list: PolyList,
    pub index_list: IndexList,
    /// Number of frames the 3D engine has rendered so far
    pub frame_count: u64,
}
