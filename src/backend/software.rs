//! CPU software backend.
//!
//! Executes blits on `f32` texel data in system memory. It is the reference
//! implementation of the blit/merge semantics and the backend used by tests
//! and the demo: every texture stores `channel_count` floats per texel, and
//! materials are small built-in programs that read their bound textures with
//! nearest sampling.

use std::collections::{HashMap, HashSet};

use crate::backend::traits::*;
use crate::backend::types::*;

/// Fragment program run by a software material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftwareShader {
    /// Writes the red channel of `source_property` (or the blit source when
    /// unbound) to every color channel, alpha 1.
    ShowDepth { source_property: &'static str },
    /// Combines `back_property` and `front_property`: the front value when
    /// `overlay_keyword` is enabled on the material, the maximum otherwise.
    MergeDepth {
        back_property: &'static str,
        front_property: &'static str,
        overlay_keyword: &'static str,
    },
}

struct SoftwareTexture {
    desc: TextureDescriptor,
    texels: Vec<f32>,
}

impl SoftwareTexture {
    fn channels(&self) -> usize {
        self.desc.format.channel_count() as usize
    }

    /// Nearest sample of channel 0 at the texel center of `(x, y)` in a
    /// `width`x`height` destination.
    fn sample(&self, x: u32, y: u32, width: u32, height: u32) -> f32 {
        let sx = ((x as u64 * self.desc.width as u64) / width.max(1) as u64) as usize;
        let sy = ((y as u64 * self.desc.height as u64) / height.max(1) as u64) as usize;
        let index = (sy * self.desc.width as usize + sx) * self.channels();
        self.texels.get(index).copied().unwrap_or(0.0)
    }
}

struct SoftwareMaterial {
    shader: SoftwareShader,
    keywords: HashSet<String>,
}

/// CPU backend with real texel storage.
pub struct SoftwareBackend {
    textures: HashMap<u64, SoftwareTexture>,
    materials: HashMap<u64, SoftwareMaterial>,
    next_texture_id: u64,
    next_material_id: u64,

    // Counters
    created: usize,
    destroyed: usize,
    blits: usize,

    /// Maximum number of live textures; creation beyond it fails with `OutOfMemory`
    texture_limit: Option<usize>,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            materials: HashMap::new(),
            next_texture_id: 1,
            next_material_id: 1,
            created: 0,
            destroyed: 0,
            blits: 0,
            texture_limit: None,
        }
    }

    /// Limit the number of simultaneously live textures
    pub fn set_texture_limit(&mut self, limit: Option<usize>) {
        self.texture_limit = limit;
    }

    /// Register a material running `shader`
    pub fn create_material(&mut self, shader: SoftwareShader) -> MaterialHandle {
        let id = self.next_material_id;
        self.next_material_id += 1;
        self.materials.insert(
            id,
            SoftwareMaterial {
                shader,
                keywords: HashSet::new(),
            },
        );
        MaterialHandle(id)
    }

    /// Check whether a keyword is enabled on a material
    pub fn is_keyword_enabled(&self, material: MaterialHandle, keyword: &str) -> bool {
        self.materials
            .get(&material.0)
            .is_some_and(|m| m.keywords.contains(keyword))
    }

    /// Fill every channel of every texel with `value`
    pub fn fill(&mut self, texture: TextureHandle, value: f32) -> BackendResult<()> {
        let tex = self
            .textures
            .get_mut(&texture.0)
            .ok_or(BackendError::TextureNotFound(texture))?;
        tex.texels.iter_mut().for_each(|t| *t = value);
        Ok(())
    }

    /// All texels of a texture
    pub fn texels(&self, texture: TextureHandle) -> Option<&[f32]> {
        self.textures.get(&texture.0).map(|t| t.texels.as_slice())
    }

    /// Texture contents as native-endian bytes, the layout a GPU readback produces
    pub fn read_texture_bytes(&self, texture: TextureHandle) -> Option<Vec<u8>> {
        self.texels(texture)
            .map(|texels| bytemuck::cast_slice::<f32, u8>(texels).to_vec())
    }

    /// Channel 0 of the texel at `(x, y)`
    pub fn texel(&self, texture: TextureHandle, x: u32, y: u32) -> Option<f32> {
        let tex = self.textures.get(&texture.0)?;
        if x >= tex.desc.width || y >= tex.desc.height {
            return None;
        }
        let index = (y as usize * tex.desc.width as usize + x as usize) * tex.channels();
        tex.texels.get(index).copied()
    }

    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture.0).map(|t| &t.desc)
    }

    pub fn contains_texture(&self, texture: TextureHandle) -> bool {
        self.textures.contains_key(&texture.0)
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn created_count(&self) -> usize {
        self.created
    }

    pub fn destroyed_count(&self) -> usize {
        self.destroyed
    }

    pub fn blit_count(&self) -> usize {
        self.blits
    }

    fn source_texture(&self, handle: TextureHandle) -> BackendResult<&SoftwareTexture> {
        self.textures
            .get(&handle.0)
            .ok_or(BackendError::TextureNotFound(handle))
    }

    /// Compute the output channel-0 value of every destination texel
    fn shade(&self, desc: &BlitDescriptor, width: u32, height: u32) -> BackendResult<Vec<f32>> {
        let Some(material_handle) = desc.material else {
            let source = self.source_texture(desc.source)?;
            return Ok(sample_all(source, width, height));
        };

        let material = self
            .materials
            .get(&material_handle.0)
            .ok_or(BackendError::MaterialNotFound(material_handle))?;

        match &material.shader {
            SoftwareShader::ShowDepth { source_property } => {
                let source = desc.binding(source_property).unwrap_or(desc.source);
                Ok(sample_all(self.source_texture(source)?, width, height))
            }
            SoftwareShader::MergeDepth {
                back_property,
                front_property,
                overlay_keyword,
            } => {
                let back = desc.binding(back_property).ok_or_else(|| {
                    BackendError::InvalidBlit(format!("'{back_property}' is not bound"))
                })?;
                let front = desc.binding(front_property).ok_or_else(|| {
                    BackendError::InvalidBlit(format!("'{front_property}' is not bound"))
                })?;
                let back = sample_all(self.source_texture(back)?, width, height);
                let front = sample_all(self.source_texture(front)?, width, height);

                let overlay = material.keywords.contains(*overlay_keyword);
                let merged = back
                    .into_iter()
                    .zip(front)
                    .map(|(b, f)| if overlay { f } else { b.max(f) })
                    .collect();
                Ok(merged)
            }
        }
    }
}

fn sample_all(source: &SoftwareTexture, width: u32, height: u32) -> Vec<f32> {
    let mut values = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            values.push(source.sample(x, y, width, height));
        }
    }
    values
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsBackend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "Software Backend"
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?} has zero size ({}x{})",
                desc.label, desc.width, desc.height
            )));
        }
        if self
            .texture_limit
            .is_some_and(|limit| self.textures.len() >= limit)
        {
            return Err(BackendError::OutOfMemory);
        }

        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.created += 1;

        log::trace!(
            "SoftwareBackend: creating texture {} {:?} ({}x{} {:?})",
            id,
            desc.label,
            desc.width,
            desc.height,
            desc.format
        );

        let len = desc.texel_count() * desc.format.channel_count() as usize;
        self.textures.insert(
            id,
            SoftwareTexture {
                desc: desc.clone(),
                texels: vec![0.0; len],
            },
        );
        Ok(TextureHandle(id))
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture.0).is_some() {
            self.destroyed += 1;
            log::trace!("SoftwareBackend: destroyed texture {}", texture.0);
        }
    }

    fn blit(&mut self, desc: &BlitDescriptor) -> BackendResult<()> {
        let (width, height) = {
            let dst = self.source_texture(desc.destination)?;
            (dst.desc.width, dst.desc.height)
        };

        let values = self.shade(desc, width, height)?;
        let is_material = desc.material.is_some();

        let dst = self
            .textures
            .get_mut(&desc.destination.0)
            .ok_or(BackendError::TextureNotFound(desc.destination))?;
        let channels = dst.channels();
        for (texel, value) in dst.texels.chunks_exact_mut(channels).zip(values) {
            if is_material && channels == 4 {
                texel.copy_from_slice(&[value, value, value, 1.0]);
            } else {
                texel[0] = value;
            }
        }

        self.blits += 1;
        Ok(())
    }

    fn set_material_keyword(
        &mut self,
        material: MaterialHandle,
        keyword: &str,
        enabled: bool,
    ) -> BackendResult<()> {
        let material = self
            .materials
            .get_mut(&material.0)
            .ok_or(BackendError::MaterialNotFound(material))?;
        if enabled {
            material.keywords.insert(keyword.to_string());
        } else {
            material.keywords.remove(keyword);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(backend: &mut SoftwareBackend, value: f32) -> TextureHandle {
        let tex = backend
            .create_texture(&TextureDescriptor::depth_layer("layer", 2, 2))
            .unwrap();
        backend.fill(tex, value).unwrap();
        tex
    }

    #[test]
    fn test_copy_blit() {
        let mut backend = SoftwareBackend::new();
        let src = layer(&mut backend, 0.25);
        let dst = layer(&mut backend, 0.0);

        backend.blit(&BlitDescriptor::copy(src, dst)).unwrap();

        assert_eq!(backend.texels(dst).unwrap(), &[0.25; 4]);
        assert_eq!(backend.blit_count(), 1);
    }

    #[test]
    fn test_merge_respects_keyword() {
        let mut backend = SoftwareBackend::new();
        let material = backend.create_material(SoftwareShader::MergeDepth {
            back_property: "back",
            front_property: "front",
            overlay_keyword: "OVERLAY",
        });
        let back = layer(&mut backend, 0.8);
        let front = layer(&mut backend, 0.3);
        let out = layer(&mut backend, 0.0);
        let blit = BlitDescriptor::with_material(back, out, material)
            .bind("back", back)
            .bind("front", front);

        backend
            .set_material_keyword(material, "MAXIMUM", true)
            .unwrap();
        backend.blit(&blit).unwrap();
        assert_eq!(backend.texel(out, 1, 1), Some(0.8));

        backend
            .set_material_keyword(material, "MAXIMUM", false)
            .unwrap();
        backend
            .set_material_keyword(material, "OVERLAY", true)
            .unwrap();
        backend.blit(&blit).unwrap();
        assert_eq!(backend.texel(out, 1, 1), Some(0.3));
    }

    #[test]
    fn test_merge_uses_configured_overlay_keyword() {
        let mut backend = SoftwareBackend::new();
        let material = backend.create_material(SoftwareShader::MergeDepth {
            back_property: "back",
            front_property: "front",
            overlay_keyword: "FRONT_WINS",
        });
        let back = layer(&mut backend, 0.6);
        let front = layer(&mut backend, 0.1);
        let out = layer(&mut backend, 0.0);
        let blit = BlitDescriptor::with_material(back, out, material)
            .bind("back", back)
            .bind("front", front);

        backend.set_material_keyword(material, "OVERLAY", true).unwrap();
        backend.blit(&blit).unwrap();
        assert_eq!(backend.texel(out, 0, 0), Some(0.6));

        backend.set_material_keyword(material, "FRONT_WINS", true).unwrap();
        backend.blit(&blit).unwrap();
        assert_eq!(backend.texel(out, 0, 0), Some(0.1));
    }

    #[test]
    fn test_merge_requires_bindings() {
        let mut backend = SoftwareBackend::new();
        let material = backend.create_material(SoftwareShader::MergeDepth {
            back_property: "back",
            front_property: "front",
            overlay_keyword: "OVERLAY",
        });
        let a = layer(&mut backend, 0.1);
        let b = layer(&mut backend, 0.2);

        let result = backend.blit(&BlitDescriptor::with_material(a, b, material).bind("back", a));
        assert!(matches!(result, Err(BackendError::InvalidBlit(_))));
    }

    #[test]
    fn test_show_depth_into_color_target() {
        let mut backend = SoftwareBackend::new();
        let material = backend.create_material(SoftwareShader::ShowDepth {
            source_property: "depth",
        });
        let depth = layer(&mut backend, 0.5);
        let color = backend
            .create_texture(&TextureDescriptor {
                label: Some("color".into()),
                width: 2,
                height: 2,
                format: TextureFormat::Rgba8Unorm,
                ..Default::default()
            })
            .unwrap();

        backend
            .blit(&BlitDescriptor::with_material(depth, color, material).bind("depth", depth))
            .unwrap();

        assert_eq!(&backend.texels(color).unwrap()[..4], &[0.5, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut backend = SoftwareBackend::new();
        let tex = layer(&mut backend, 0.0);

        backend.destroy_texture(tex);
        backend.destroy_texture(tex);

        assert_eq!(backend.destroyed_count(), 1);
        assert_eq!(backend.live_texture_count(), 0);
    }

    #[test]
    fn test_texture_limit() {
        let mut backend = SoftwareBackend::new();
        backend.set_texture_limit(Some(1));
        layer(&mut backend, 0.0);

        let result = backend.create_texture(&TextureDescriptor::depth_layer("extra", 2, 2));
        assert_eq!(result, Err(BackendError::OutOfMemory));
    }

    #[test]
    fn test_read_texture_bytes() {
        let mut backend = SoftwareBackend::new();
        let tex = layer(&mut backend, 1.0);
        let bytes = backend.read_texture_bytes(tex).unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..4], &1.0f32.to_ne_bytes());
    }
}
