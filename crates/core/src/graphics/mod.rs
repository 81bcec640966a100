//! Graphics primitives shared by the 3D renderer backends
//!
//! Pixel formats and per-pixel attribute storage live here so that every
//! backend (and the frontends that display their output) agree on layout.

pub mod color;
pub mod fragment;

pub use color::{ColorOps, FragmentColor};
pub use fragment::{FragmentAttributes, FragmentAttributesBuffer, UNSET_TRANSLUCENT_POLY_ID};
