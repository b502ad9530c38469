//! Backend abstraction layer
//!
//! Provides the traits and types the depth compositor records against, plus
//! two implementations:
//! - [`SoftwareBackend`]: CPU reference backend that executes blits on `f32`
//!   texel data. Always available.
//! - `WgpuBackend`: GPU backend over an existing `wgpu` device (feature
//!   `wgpu-backend`).

pub mod software;
pub mod traits;
pub mod types;

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

pub use software::*;
pub use traits::*;
pub use types::*;

#[cfg(feature = "wgpu-backend")]
pub use wgpu_backend::{WgpuBackend, WgpuMaterial};
