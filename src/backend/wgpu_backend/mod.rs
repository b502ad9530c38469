//! wgpu backend implementation
//!
//! Runs the compositor's blits on an existing `wgpu` device. The host owns
//! the device and queue; the backend records into its own command encoder
//! which the host submits with [`WgpuBackend::submit`] once the frame's
//! passes were executed.
//!
//! - Plain blits are texture copies. Depth sources are copied through a
//!   staging buffer, since wgpu cannot copy a depth aspect into a color
//!   texture directly.
//! - Material blits draw a fullscreen triangle with the material's pipeline.
//!   Keywords are exposed to the shader as a `u32` bitmask uniform.

use crate::backend::traits::*;
use crate::backend::types::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Keyword bitmask as seen by the shader
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct KeywordUniform {
    mask: u32,
    _padding: [u32; 3],
}

/// Render pipeline plus the binding layout a material blit fills in.
///
/// The pipeline must draw a fullscreen triangle from `vertex_index` with no
/// vertex buffers and target the destination texture's format. Bind group 0
/// is built per blit from the declared bindings.
pub struct WgpuMaterial {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    textures: Vec<(&'static str, u32)>,
    sampler_binding: Option<u32>,
    keyword_binding: Option<u32>,
    keywords: Vec<&'static str>,
}

impl WgpuMaterial {
    pub fn new(pipeline: wgpu::RenderPipeline, layout: wgpu::BindGroupLayout) -> Self {
        Self {
            pipeline,
            layout,
            textures: Vec::new(),
            sampler_binding: None,
            keyword_binding: None,
            keywords: Vec::new(),
        }
    }

    /// Bind the texture assigned to `property` at `binding`
    pub fn with_texture(mut self, property: &'static str, binding: u32) -> Self {
        self.textures.push((property, binding));
        self
    }

    /// Bind the backend's nearest sampler at `binding`
    pub fn with_sampler(mut self, binding: u32) -> Self {
        self.sampler_binding = Some(binding);
        self
    }

    /// Expose `keywords` as bits of a uniform at `binding`, bit `i` for
    /// `keywords[i]`
    pub fn with_keywords(mut self, binding: u32, keywords: &[&'static str]) -> Self {
        self.keyword_binding = Some(binding);
        self.keywords = keywords.to_vec();
        self
    }
}

struct MaterialEntry {
    material: WgpuMaterial,
    keyword_mask: u32,
    keyword_buffer: wgpu::Buffer,
}

struct WgpuTexture {
    texture: Arc<wgpu::Texture>,
    view: wgpu::TextureView,
    format: TextureFormat,
    imported: bool,
}

/// wgpu backend implementation
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    sampler: wgpu::Sampler,

    // Resource storage
    textures: HashMap<u64, WgpuTexture>,
    materials: HashMap<u64, MaterialEntry>,

    // Handle counters
    next_texture_id: u64,
    next_material_id: u64,

    // Command encoding
    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuBackend {
    fn convert_texture_format(format: TextureFormat) -> wgpu::TextureFormat {
        match format {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
            TextureFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
            TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
        }
    }

    fn convert_texture_format_back(format: wgpu::TextureFormat) -> Option<TextureFormat> {
        match format {
            wgpu::TextureFormat::Rgba8Unorm => Some(TextureFormat::Rgba8Unorm),
            wgpu::TextureFormat::Rgba8UnormSrgb => Some(TextureFormat::Rgba8UnormSrgb),
            wgpu::TextureFormat::Bgra8Unorm => Some(TextureFormat::Bgra8Unorm),
            wgpu::TextureFormat::Bgra8UnormSrgb => Some(TextureFormat::Bgra8UnormSrgb),
            wgpu::TextureFormat::Rgba16Float => Some(TextureFormat::Rgba16Float),
            wgpu::TextureFormat::Rgba32Float => Some(TextureFormat::Rgba32Float),
            wgpu::TextureFormat::Depth32Float => Some(TextureFormat::Depth32Float),
            wgpu::TextureFormat::Depth24PlusStencil8 => Some(TextureFormat::Depth24PlusStencil8),
            wgpu::TextureFormat::R32Float => Some(TextureFormat::R32Float),
            _ => None,
        }
    }

    fn convert_texture_usage(usage: TextureUsage) -> wgpu::TextureUsages {
        let mut result = wgpu::TextureUsages::empty();
        if usage.contains(TextureUsage::COPY_SRC) {
            result |= wgpu::TextureUsages::COPY_SRC;
        }
        if usage.contains(TextureUsage::COPY_DST) {
            result |= wgpu::TextureUsages::COPY_DST;
        }
        if usage.contains(TextureUsage::TEXTURE_BINDING) {
            result |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if usage.contains(TextureUsage::STORAGE_BINDING) {
            result |= wgpu::TextureUsages::STORAGE_BINDING;
        }
        if usage.contains(TextureUsage::RENDER_ATTACHMENT) {
            result |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        result
    }

    /// Create a backend on a device and queue owned by the host
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        // R32Float is not filterable on every adapter
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Camera Stack Depth Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            device,
            queue,
            sampler,
            textures: HashMap::new(),
            materials: HashMap::new(),
            next_texture_id: 1,
            next_material_id: 1,
            encoder: None,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Register a texture owned by the host, such as a camera's depth buffer
    /// or the frame's color target.
    ///
    /// Destroying the returned handle only forgets it; the host keeps the
    /// texture alive.
    pub fn import_texture(&mut self, texture: Arc<wgpu::Texture>) -> BackendResult<TextureHandle> {
        let format = Self::convert_texture_format_back(texture.format()).ok_or_else(|| {
            BackendError::TextureCreationFailed(format!(
                "unsupported imported texture format {:?}",
                texture.format()
            ))
        })?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            aspect: if format.is_depth() {
                wgpu::TextureAspect::DepthOnly
            } else {
                wgpu::TextureAspect::All
            },
            ..Default::default()
        });
        Ok(self.insert_texture(WgpuTexture {
            texture,
            view,
            format,
            imported: true,
        }))
    }

    /// Register a material
    pub fn create_material(&mut self, material: WgpuMaterial) -> MaterialHandle {
        let keyword_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Material Keywords"),
            size: std::mem::size_of::<KeywordUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue
            .write_buffer(&keyword_buffer, 0, bytemuck::bytes_of(&KeywordUniform::default()));

        let id = self.next_material_id;
        self.next_material_id += 1;
        self.materials.insert(
            id,
            MaterialEntry {
                material,
                keyword_mask: 0,
                keyword_buffer,
            },
        );
        MaterialHandle(id)
    }

    pub fn destroy_material(&mut self, material: MaterialHandle) {
        self.materials.remove(&material.0);
    }

    /// The wgpu texture behind a handle
    pub fn texture(&self, texture: TextureHandle) -> Option<&wgpu::Texture> {
        self.textures.get(&texture.0).map(|t| t.texture.as_ref())
    }

    pub fn texture_view(&self, texture: TextureHandle) -> Option<&wgpu::TextureView> {
        self.textures.get(&texture.0).map(|t| &t.view)
    }

    /// Finish the pending command encoder and submit it to the queue
    pub fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    fn insert_texture(&mut self, texture: WgpuTexture) -> TextureHandle {
        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.textures.insert(id, texture);
        TextureHandle(id)
    }

    fn take_encoder(&mut self) -> wgpu::CommandEncoder {
        self.encoder.take().unwrap_or_else(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Camera Stack Depth Encoder"),
                })
        })
    }

    fn copy(&mut self, source: TextureHandle, destination: TextureHandle) -> BackendResult<()> {
        let mut encoder = self.take_encoder();
        let result = encode_copy(&self.device, &self.textures, &mut encoder, source, destination);
        // Put encoder back
        self.encoder = Some(encoder);
        result
    }

    fn draw_material(&mut self, desc: &BlitDescriptor, material: MaterialHandle) -> BackendResult<()> {
        let mut encoder = self.take_encoder();
        let result = self.encode_material_blit(&mut encoder, desc, material);
        self.encoder = Some(encoder);
        result
    }

    fn encode_material_blit(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        desc: &BlitDescriptor,
        material: MaterialHandle,
    ) -> BackendResult<()> {
        let entry = self
            .materials
            .get(&material.0)
            .ok_or(BackendError::MaterialNotFound(material))?;
        let dst = lookup(&self.textures, desc.destination)?;

        let mut entries = Vec::new();
        for &(property, binding) in &entry.material.textures {
            let texture = desc.binding(property).ok_or_else(|| {
                BackendError::InvalidBlit(format!("'{property}' is not bound"))
            })?;
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(&lookup(&self.textures, texture)?.view),
            });
        }
        if let Some(binding) = entry.material.sampler_binding {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }
        if let Some(binding) = entry.material.keyword_binding {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: entry.keyword_buffer.as_entire_binding(),
            });
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Blit Bind Group"),
            layout: &entry.material.layout,
            entries: &entries,
        });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Material Blit"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &dst.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(&entry.material.pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
        Ok(())
    }
}

fn lookup(textures: &HashMap<u64, WgpuTexture>, texture: TextureHandle) -> BackendResult<&WgpuTexture> {
    textures
        .get(&texture.0)
        .ok_or(BackendError::TextureNotFound(texture))
}

/// Copies need single-sampled textures with copy usage on both ends; wgpu
/// reports anything else as a validation error on the device.
fn validate_copy(
    src_samples: u32,
    src_usage: wgpu::TextureUsages,
    dst_samples: u32,
    dst_usage: wgpu::TextureUsages,
) -> BackendResult<()> {
    if src_samples != 1 || dst_samples != 1 {
        return Err(BackendError::InvalidBlit(format!(
            "cannot copy multisampled textures ({src_samples} -> {dst_samples} samples)"
        )));
    }
    if !src_usage.contains(wgpu::TextureUsages::COPY_SRC) {
        return Err(BackendError::InvalidBlit(
            "copy source lacks COPY_SRC usage".into(),
        ));
    }
    if !dst_usage.contains(wgpu::TextureUsages::COPY_DST) {
        return Err(BackendError::InvalidBlit(
            "copy destination lacks COPY_DST usage".into(),
        ));
    }
    Ok(())
}

fn encode_copy(
    device: &wgpu::Device,
    textures: &HashMap<u64, WgpuTexture>,
    encoder: &mut wgpu::CommandEncoder,
    source: TextureHandle,
    destination: TextureHandle,
) -> BackendResult<()> {
    let src = lookup(textures, source)?;
    let dst = lookup(textures, destination)?;
    let size = src.texture.size();
    if size != dst.texture.size() {
        return Err(BackendError::InvalidBlit(format!(
            "copy between differently sized textures ({}x{} -> {}x{})",
            size.width,
            size.height,
            dst.texture.width(),
            dst.texture.height()
        )));
    }

    validate_copy(
        src.texture.sample_count(),
        src.texture.usage(),
        dst.texture.sample_count(),
        dst.texture.usage(),
    )?;

    if src.format == dst.format {
        encoder.copy_texture_to_texture(src.texture.as_image_copy(), dst.texture.as_image_copy(), size);
        return Ok(());
    }
    if src.format != TextureFormat::Depth32Float || dst.format != TextureFormat::R32Float {
        return Err(BackendError::InvalidBlit(format!(
            "cannot copy {:?} into {:?}",
            src.format, dst.format
        )));
    }

    // Depth aspect -> staging buffer -> color texture
    let bytes_per_row = (size.width * 4).next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Depth Copy Staging"),
        size: bytes_per_row as u64 * size.height as u64,
        usage: wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let layout = wgpu::ImageDataLayout {
        offset: 0,
        bytes_per_row: Some(bytes_per_row),
        rows_per_image: Some(size.height),
    };
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture: &src.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::DepthOnly,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout,
        },
        size,
    );
    encoder.copy_buffer_to_texture(
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout,
        },
        dst.texture.as_image_copy(),
        size,
    );
    Ok(())
}

impl GraphicsBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu Backend"
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?} has zero size ({}x{})",
                desc.label, desc.width, desc.height
            )));
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: desc.sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: Self::convert_texture_format(desc.format),
            usage: Self::convert_texture_usage(desc.usage),
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        log::trace!(
            "WgpuBackend: created texture {:?} ({}x{} {:?})",
            desc.label,
            desc.width,
            desc.height,
            desc.format
        );

        Ok(self.insert_texture(WgpuTexture {
            texture: Arc::new(texture),
            view,
            format: desc.format,
            imported: false,
        }))
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(removed) = self.textures.remove(&texture.0) {
            if !removed.imported {
                removed.texture.destroy();
            }
            log::trace!("WgpuBackend: destroyed texture {}", texture.0);
        }
    }

    fn blit(&mut self, desc: &BlitDescriptor) -> BackendResult<()> {
        match desc.material {
            None => self.copy(desc.source, desc.destination),
            Some(material) => self.draw_material(desc, material),
        }
    }

    fn set_material_keyword(
        &mut self,
        material: MaterialHandle,
        keyword: &str,
        enabled: bool,
    ) -> BackendResult<()> {
        let entry = self
            .materials
            .get_mut(&material.0)
            .ok_or(BackendError::MaterialNotFound(material))?;
        let Some(bit) = entry.material.keywords.iter().position(|k| *k == keyword) else {
            log::trace!("WgpuBackend: material {} has no keyword {}", material.0, keyword);
            return Ok(());
        };

        let mask = if enabled {
            entry.keyword_mask | (1 << bit)
        } else {
            entry.keyword_mask & !(1 << bit)
        };
        if mask != entry.keyword_mask {
            entry.keyword_mask = mask;
            let uniform = KeywordUniform {
                mask,
                ..Default::default()
            };
            self.queue
                .write_buffer(&entry.keyword_buffer, 0, bytemuck::bytes_of(&uniform));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_conversion_round_trip() {
        for format in [
            TextureFormat::R32Float,
            TextureFormat::Depth32Float,
            TextureFormat::Rgba8UnormSrgb,
        ] {
            let wgpu_format = WgpuBackend::convert_texture_format(format);
            assert_eq!(WgpuBackend::convert_texture_format_back(wgpu_format), Some(format));
        }
        assert_eq!(
            WgpuBackend::convert_texture_format_back(wgpu::TextureFormat::R8Unorm),
            None
        );
    }

    #[test]
    fn test_depth_layer_usage() {
        let usage = WgpuBackend::convert_texture_usage(
            TextureDescriptor::depth_layer("layer", 1, 1).usage,
        );
        assert!(usage.contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
        assert!(usage.contains(wgpu::TextureUsages::TEXTURE_BINDING));
        assert!(usage.contains(wgpu::TextureUsages::COPY_DST));
    }

    #[test]
    fn test_copy_validation() {
        let layer = WgpuBackend::convert_texture_usage(
            TextureDescriptor::depth_layer("layer", 1, 1).usage,
        );
        let attachment_only = wgpu::TextureUsages::RENDER_ATTACHMENT;

        assert!(validate_copy(1, layer, 1, layer).is_ok());
        assert!(matches!(
            validate_copy(4, layer, 1, layer),
            Err(BackendError::InvalidBlit(_))
        ));
        assert!(matches!(
            validate_copy(1, attachment_only, 1, layer),
            Err(BackendError::InvalidBlit(_))
        ));
        assert!(matches!(
            validate_copy(1, layer, 1, attachment_only),
            Err(BackendError::InvalidBlit(_))
        ));
    }

    #[test]
    fn test_keyword_uniform_layout() {
        assert_eq!(std::mem::size_of::<KeywordUniform>(), 16);
        let uniform = KeywordUniform {
            mask: 0b10,
            ..Default::default()
        };
        assert_eq!(&bytemuck::bytes_of(&uniform)[..4], &2u32.to_ne_bytes());
    }
}
