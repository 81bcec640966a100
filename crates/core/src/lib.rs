//! Core emulator primitives shared across systems.

pub mod graphics;
pub mod logging;
