//! Camera identity and camera stack description supplied by the host

use std::fmt;

/// Engine-assigned camera identity.
///
/// Two cameras are the same camera exactly when their ids are equal; no other
/// camera state takes part in comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraId(pub u64);

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "camera#{}", self.0)
    }
}

/// What a camera renders for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraKind {
    /// In-game camera
    #[default]
    Game,
    /// Editor scene view
    SceneView,
    /// Asset preview
    Preview,
    /// Reflection probe capture
    Reflection,
}

/// Camera stack as resolved by the host for one frame.
///
/// The base camera is optional because the host may have no main camera at
/// all; the compositor treats that as a configuration problem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraStackDescriptor {
    pub base: Option<CameraId>,
    pub overlays: Vec<CameraId>,
}

impl CameraStackDescriptor {
    pub fn new(base: CameraId, overlays: impl IntoIterator<Item = CameraId>) -> Self {
        Self {
            base: Some(base),
            overlays: overlays.into_iter().collect(),
        }
    }

    /// Base camera followed by overlays, in render order
    pub fn raw_cameras(&self) -> Vec<CameraId> {
        self.base
            .iter()
            .copied()
            .chain(self.overlays.iter().copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.base.iter().count() + self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
