//! Recorded pass definitions

use crate::backend::{BlitDescriptor, MaterialHandle, TextureHandle};
use crate::render_graph::resource::*;
use crate::scene::CameraId;
use serde::{Deserialize, Serialize};

/// Material property the composite blit binds its source to
pub const DEPTH_TEXTURE_PROPERTY: &str = "depth_texture";
/// Material property the merge blit binds the accumulated depth to
pub const BACK_DEPTH_PROPERTY: &str = "back_depth";
/// Material property the merge blit binds the newly captured depth to
pub const FRONT_DEPTH_PROPERTY: &str = "front_depth";

/// Point in the host's frame timeline where recorded passes are inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum RenderPassEvent {
    BeforeRendering,
    BeforeRenderingOpaques,
    AfterRenderingOpaques,
    BeforeRenderingSkybox,
    AfterRenderingSkybox,
    BeforeRenderingTransparents,
    #[default]
    AfterRenderingTransparents,
    BeforeRenderingPostProcessing,
    AfterRenderingPostProcessing,
    AfterRendering,
}

/// What a recorded pass does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Copy of a camera's depth into its depth slot
    Capture { active_ordinal: usize },
    /// Merge of a captured layer with the accumulated composite
    Merge { active_ordinal: usize },
    /// Final blit of the composite into the visible color target
    Composite,
}

/// A pass recorded for later execution
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPass {
    pub name: &'static str,
    pub kind: PassKind,
    pub camera: CameraId,
    pub event: RenderPassEvent,
    pub blit: BlitDescriptor,
    pub inputs: Vec<ResourceAccess>,
    pub outputs: Vec<ResourceAccess>,
}

impl RecordedPass {
    pub const CAPTURE_NAME: &'static str = "Depth Preservation Pass";
    pub const MERGE_NAME: &'static str = "Depth Merge Pass";
    pub const COMPOSITE_NAME: &'static str = "Blit Depth Texture Pass";

    /// Direct copy of `source` into `destination`, no blending
    pub fn capture(
        camera: CameraId,
        active_ordinal: usize,
        source: TextureHandle,
        destination: TextureHandle,
        event: RenderPassEvent,
    ) -> Self {
        Self {
            name: Self::CAPTURE_NAME,
            kind: PassKind::Capture { active_ordinal },
            camera,
            event,
            blit: BlitDescriptor::copy(source, destination),
            inputs: vec![ResourceAccess::read(source)],
            outputs: vec![ResourceAccess::write(destination)],
        }
    }

    /// Merge of `back` and `front` into `destination` through `material`
    pub fn merge(
        camera: CameraId,
        active_ordinal: usize,
        back: TextureHandle,
        front: TextureHandle,
        destination: TextureHandle,
        material: MaterialHandle,
        event: RenderPassEvent,
    ) -> Self {
        // The blit source is irrelevant for the merge material; both inputs are bound.
        let blit = BlitDescriptor::with_material(back, destination, material)
            .bind(BACK_DEPTH_PROPERTY, back)
            .bind(FRONT_DEPTH_PROPERTY, front);
        Self {
            name: Self::MERGE_NAME,
            kind: PassKind::Merge { active_ordinal },
            camera,
            event,
            blit,
            inputs: vec![ResourceAccess::read(back), ResourceAccess::read(front)],
            outputs: vec![ResourceAccess::write(destination)],
        }
    }

    /// Display blit of the composite into the color target
    pub fn composite(
        camera: CameraId,
        source: TextureHandle,
        color_target: TextureHandle,
        material: MaterialHandle,
        event: RenderPassEvent,
    ) -> Self {
        let blit = BlitDescriptor::with_material(source, color_target, material)
            .bind(DEPTH_TEXTURE_PROPERTY, source);
        Self {
            name: Self::COMPOSITE_NAME,
            kind: PassKind::Composite,
            camera,
            event,
            blit,
            inputs: vec![ResourceAccess::read(source)],
            outputs: vec![ResourceAccess::write(color_target)],
        }
    }

    pub fn reads_texture(&self, texture: TextureHandle) -> bool {
        self.inputs.iter().any(|a| a.texture == texture)
    }

    pub fn writes_texture(&self, texture: TextureHandle) -> bool {
        self.outputs.iter().any(|a| a.texture == texture)
    }

    /// The single render target this pass writes
    pub fn destination(&self) -> TextureHandle {
        self.blit.destination
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_pass_declares_both_inputs() {
        let pass = RecordedPass::merge(
            CameraId(1),
            1,
            TextureHandle(10),
            TextureHandle(11),
            TextureHandle(20),
            MaterialHandle(1),
            RenderPassEvent::default(),
        );

        assert_eq!(pass.name, "Depth Merge Pass");
        assert!(pass.reads_texture(TextureHandle(10)));
        assert!(pass.reads_texture(TextureHandle(11)));
        assert!(pass.writes_texture(TextureHandle(20)));
        assert!(!pass.writes_texture(TextureHandle(10)));
        assert_eq!(pass.blit.binding(FRONT_DEPTH_PROPERTY), Some(TextureHandle(11)));
    }

    #[test]
    fn test_capture_has_no_material() {
        let pass = RecordedPass::capture(
            CameraId(1),
            0,
            TextureHandle(1),
            TextureHandle(2),
            RenderPassEvent::AfterRenderingOpaques,
        );
        assert!(pass.blit.material.is_none());
        assert_eq!(pass.destination(), TextureHandle(2));
        assert_eq!(pass.kind, PassKind::Capture { active_ordinal: 0 });
    }

    #[test]
    fn test_default_event() {
        assert_eq!(
            RenderPassEvent::default(),
            RenderPassEvent::AfterRenderingTransparents
        );
        assert!(RenderPassEvent::BeforeRenderingOpaques < RenderPassEvent::AfterRendering);
    }
}
