//! Resource access declarations for recorded passes

use crate::backend::TextureHandle;

/// How a pass uses a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceUsage {
    /// Read as a sampled texture
    TextureRead,
    /// Written as a color render target
    RenderTarget,
}

/// Texture access declaration for a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceAccess {
    pub texture: TextureHandle,
    pub usage: ResourceUsage,
}

impl ResourceAccess {
    pub fn read(texture: TextureHandle) -> Self {
        Self {
            texture,
            usage: ResourceUsage::TextureRead,
        }
    }

    pub fn write(texture: TextureHandle) -> Self {
        Self {
            texture,
            usage: ResourceUsage::RenderTarget,
        }
    }
}
