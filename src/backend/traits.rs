//! Core backend abstraction traits
//!
//! The depth compositor only needs a narrow slice of a GPU API: allocating and
//! releasing 2D textures, blitting one texture into another (optionally through
//! a material), and toggling material keywords. Every backend implements
//! [`GraphicsBackend`] for exactly that.

use crate::backend::types::*;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Unknown texture {0:?}")]
    TextureNotFound(TextureHandle),
    #[error("Unknown material {0:?}")]
    MaterialNotFound(MaterialHandle),
    #[error("Invalid blit: {0}")]
    InvalidBlit(String),
    #[error("Out of memory")]
    OutOfMemory,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u64);

impl TextureHandle {
    /// Raw id, for logging
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Handle to a material owned by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub(crate) u64);

impl MaterialHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Graphics backend trait
pub trait GraphicsBackend {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Create a texture
    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    /// Destroy a texture.
    ///
    /// Destroying an unknown or already destroyed handle is a no-op.
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Blit `desc.source` into `desc.destination`
    fn blit(&mut self, desc: &BlitDescriptor) -> BackendResult<()>;

    /// Enable or disable a keyword on a material
    fn set_material_keyword(
        &mut self,
        material: MaterialHandle,
        keyword: &str,
        enabled: bool,
    ) -> BackendResult<()>;
}
