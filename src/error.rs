//! Camera stack depth error types.

use crate::backend::BackendError;
use crate::scene::CameraId;
use thiserror::Error;

/// Which pool sequence a slot index refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Depth,
    Merge,
}

/// Errors reported by the camera stack depth feature.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    // Configuration problems: the frame is skipped and a warning is logged.
    #[error(
        "Missing display material. Assign a material that shows the merged depth texture \
         in the camera stack depth settings."
    )]
    MissingDisplayMaterial,
    #[error(
        "Missing merge material. Assign the depth merge material in the camera stack depth \
         settings."
    )]
    MissingMergeMaterial,
    #[error("No main camera found. Ensure the host supplies a base camera for the stack.")]
    NoMainCamera,
    #[error(
        "No overlay cameras detected in the base camera stack. Depth stacking requires \
         camera stacking with at least one overlay camera."
    )]
    NoOverlayCameras,
    #[error("No active camera found. Set at least one camera in the stack to active.")]
    NoActiveCameras,
    #[error("Viewport has zero size ({width}x{height})")]
    ZeroSizedViewport { width: u32, height: u32 },

    // Precondition violations: this feature's contribution to the frame is aborted.
    #[error("{0} is not part of the tracked camera stack")]
    CameraNotTracked(CameraId),
    #[error("{kind:?} slot {index} is out of range (pool holds {len})")]
    SlotOutOfRange {
        kind: SlotKind,
        index: usize,
        len: usize,
    },
    #[error("{camera} invoked at raw ordinal {raw_ordinal}, expected at least {expected}")]
    OutOfOrderInvocation {
        camera: CameraId,
        raw_ordinal: usize,
        expected: usize,
    },
    #[error("Camera recorded before the camera stack was resolved for this frame")]
    FrameNotStarted,

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Invalid settings: {0}")]
    Settings(String),
}

impl FeatureError {
    /// Configuration problems are recoverable: the feature renders nothing until
    /// the configuration changes.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingDisplayMaterial
                | Self::MissingMergeMaterial
                | Self::NoMainCamera
                | Self::NoOverlayCameras
                | Self::NoActiveCameras
                | Self::ZeroSizedViewport { .. }
        )
    }

    /// Precondition violations abort the feature's work for the current frame.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::CameraNotTracked(_)
                | Self::SlotOutOfRange { .. }
                | Self::OutOfOrderInvocation { .. }
                | Self::FrameNotStarted
        )
    }
}

pub type FeatureResult<T> = Result<T, FeatureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FeatureError::CameraNotTracked(CameraId(4));
        assert_eq!(err.to_string(), "camera#4 is not part of the tracked camera stack");

        let err = FeatureError::SlotOutOfRange {
            kind: SlotKind::Merge,
            index: 2,
            len: 1,
        };
        assert_eq!(err.to_string(), "Merge slot 2 is out of range (pool holds 1)");
    }

    #[test]
    fn test_error_classes() {
        assert!(FeatureError::NoActiveCameras.is_configuration());
        assert!(!FeatureError::NoActiveCameras.is_precondition());
        assert!(FeatureError::FrameNotStarted.is_precondition());

        let err: FeatureError = BackendError::OutOfMemory.into();
        assert!(!err.is_configuration());
        assert!(!err.is_precondition());
    }
}
