//! Depth texture pool
//!
//! Owns the per-camera depth layers and the intermediate merge targets. The
//! pool is sized from the number of active cameras: one depth slot per active
//! camera and one merge slot per active camera after the first.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{FeatureError, FeatureResult, SlotKind};

/// Outcome of [`DepthTexturePool::reconcile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolChange {
    /// Slot counts and viewport already matched; nothing was touched
    Unchanged,
    /// Every slot was released and allocated again
    Rebuilt,
}

/// Pool of single-channel float textures used for depth capture and merging
#[derive(Debug, Default)]
pub struct DepthTexturePool {
    depth_slots: Vec<TextureHandle>,
    merge_slots: Vec<TextureHandle>,
    viewport: Option<(u32, u32)>,
}

impl DepthTexturePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the pool in line with `active_count` cameras rendering at
    /// `width`x`height`.
    ///
    /// The pool is never resized in place. Any change in active count or
    /// viewport releases every slot and allocates the full set again.
    pub fn reconcile<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        active_count: usize,
        width: u32,
        height: u32,
    ) -> FeatureResult<PoolChange> {
        if active_count == self.depth_slots.len() && self.viewport == Some((width, height)) {
            return Ok(PoolChange::Unchanged);
        }

        log::debug!(
            "Rebuilding depth texture pool: {} -> {} active cameras, viewport {:?} -> {}x{}",
            self.depth_slots.len(),
            active_count,
            self.viewport,
            width,
            height
        );

        self.release(backend);

        if let Err(err) = self.allocate(backend, active_count, width, height) {
            log::error!("Failed to allocate depth texture pool: {}", err);
            self.release(backend);
            return Err(err.into());
        }

        self.viewport = Some((width, height));
        Ok(PoolChange::Rebuilt)
    }

    fn allocate<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        active_count: usize,
        width: u32,
        height: u32,
    ) -> BackendResult<()> {
        for n in 1..=active_count {
            let desc = TextureDescriptor::depth_layer(format!("Stacked Depth Texture {n}"), width, height);
            self.depth_slots.push(backend.create_texture(&desc)?);
        }
        for n in 1..=active_count.saturating_sub(1) {
            let desc = TextureDescriptor::depth_layer(format!("Merged Depth Texture {n}"), width, height);
            self.merge_slots.push(backend.create_texture(&desc)?);
        }
        Ok(())
    }

    /// Release every slot. Safe to call repeatedly.
    pub fn release<B: GraphicsBackend>(&mut self, backend: &mut B) {
        for texture in self.depth_slots.drain(..).chain(self.merge_slots.drain(..)) {
            backend.destroy_texture(texture);
        }
        self.viewport = None;
    }

    /// Depth slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn depth_slot(&self, index: usize) -> TextureHandle {
        self.depth_slots[index]
    }

    /// Merge slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn merge_slot(&self, index: usize) -> TextureHandle {
        self.merge_slots[index]
    }

    pub fn try_depth_slot(&self, index: usize) -> FeatureResult<TextureHandle> {
        self.depth_slots
            .get(index)
            .copied()
            .ok_or(FeatureError::SlotOutOfRange {
                kind: SlotKind::Depth,
                index,
                len: self.depth_slots.len(),
            })
    }

    pub fn try_merge_slot(&self, index: usize) -> FeatureResult<TextureHandle> {
        self.merge_slots
            .get(index)
            .copied()
            .ok_or(FeatureError::SlotOutOfRange {
                kind: SlotKind::Merge,
                index,
                len: self.merge_slots.len(),
            })
    }

    /// Number of active cameras the pool is currently sized for
    pub fn active_count(&self) -> usize {
        self.depth_slots.len()
    }

    /// Viewport of the current allocation, `None` when nothing is allocated
    pub fn viewport(&self) -> Option<(u32, u32)> {
        self.viewport
    }

    pub fn depth_slots(&self) -> &[TextureHandle] {
        &self.depth_slots
    }

    pub fn merge_slots(&self) -> &[TextureHandle] {
        &self.merge_slots
    }
}
