//! Common types shared between backends

use crate::backend::traits::{MaterialHandle, TextureHandle};

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    Depth32Float,
    Depth24PlusStencil8,
    R32Float,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::Depth32Float | TextureFormat::Depth24PlusStencil8
        )
    }

    /// Number of stored channels per texel.
    pub fn channel_count(&self) -> u32 {
        match self {
            TextureFormat::Depth32Float
            | TextureFormat::Depth24PlusStencil8
            | TextureFormat::R32Float => 1,
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Rgba16Float
            | TextureFormat::Rgba32Float => 4,
        }
    }
}

/// Texture usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureUsage(u32);

impl TextureUsage {
    pub const COPY_SRC: Self = Self(1 << 0);
    pub const COPY_DST: Self = Self(1 << 1);
    pub const TEXTURE_BINDING: Self = Self(1 << 2);
    pub const STORAGE_BINDING: Self = Self(1 << 3);
    pub const RENDER_ATTACHMENT: Self = Self(1 << 4);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for TextureUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Texture descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub sample_count: u32,
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Single-channel 32-bit float color target used for captured and merged depth.
    ///
    /// No depth-stencil aspect and no multisampling, so the texture can be both
    /// rendered into and sampled by the merge material.
    pub fn depth_layer(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: Some(label.into()),
            width,
            height,
            format: TextureFormat::R32Float,
            sample_count: 1,
            usage: TextureUsage::RENDER_ATTACHMENT
                | TextureUsage::TEXTURE_BINDING
                | TextureUsage::COPY_SRC
                | TextureUsage::COPY_DST,
        }
    }

    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8Unorm,
            sample_count: 1,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        }
    }
}

/// Blit operation: draw `source` into `destination`, optionally through a material.
///
/// Without a material the blit is a plain texel copy. With a material, the
/// material's pass `pass` is drawn as a fullscreen triangle and every entry of
/// `bindings` is bound to the named texture property.
#[derive(Debug, Clone, PartialEq)]
pub struct BlitDescriptor {
    pub source: TextureHandle,
    pub destination: TextureHandle,
    pub material: Option<MaterialHandle>,
    pub pass: u32,
    pub bindings: Vec<TextureBinding>,
}

impl BlitDescriptor {
    /// Plain copy with no material
    pub fn copy(source: TextureHandle, destination: TextureHandle) -> Self {
        Self {
            source,
            destination,
            material: None,
            pass: 0,
            bindings: Vec::new(),
        }
    }

    /// Material blit using pass 0
    pub fn with_material(
        source: TextureHandle,
        destination: TextureHandle,
        material: MaterialHandle,
    ) -> Self {
        Self {
            source,
            destination,
            material: Some(material),
            pass: 0,
            bindings: Vec::new(),
        }
    }

    pub fn bind(mut self, property: &'static str, texture: TextureHandle) -> Self {
        self.bindings.push(TextureBinding { property, texture });
        self
    }

    /// Texture bound to a named property, if any
    pub fn binding(&self, property: &str) -> Option<TextureHandle> {
        self.bindings
            .iter()
            .find(|b| b.property == property)
            .map(|b| b.texture)
    }
}

/// Texture bound to a named material property for the duration of a blit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBinding {
    pub property: &'static str,
    pub texture: TextureHandle,
}
