//! Persisted feature settings
//!
//! Settings are stored as TOML:
//!
//! ```toml
//! pass_event = "AfterRenderingTransparents"
//! merge_mode = "Maximum"
//! active_cameras = [true, false, true]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, FeatureResult};
use crate::render_graph::RenderPassEvent;

/// How a newly captured layer is combined with the composite behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MergeMode {
    /// The front layer replaces the composite
    Overlay,
    /// Per-texel maximum of both layers
    #[default]
    Maximum,
}

impl MergeMode {
    pub const ALL: [MergeMode; 2] = [MergeMode::Overlay, MergeMode::Maximum];

    /// Material keyword selecting this mode in the merge shader
    pub fn keyword(&self) -> &'static str {
        match self {
            MergeMode::Overlay => "MERGE_MODE_OVERLAY",
            MergeMode::Maximum => "MERGE_MODE_MAXIMUM",
        }
    }
}

/// User-facing configuration of the camera stack depth feature
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CameraStackDepthSettings {
    #[serde(default)]
    pub pass_event: RenderPassEvent,
    #[serde(default)]
    pub merge_mode: MergeMode,
    /// Active flag per camera of the stack, by raw ordinal
    #[serde(default)]
    pub active_cameras: Vec<bool>,
}

impl CameraStackDepthSettings {
    pub fn from_toml(content: &str) -> FeatureResult<Self> {
        toml::from_str(content).map_err(|e| FeatureError::Settings(e.to_string()))
    }

    pub fn to_toml(&self) -> FeatureResult<String> {
        toml::to_string_pretty(self).map_err(|e| FeatureError::Settings(e.to_string()))
    }

    /// Load settings from a TOML file.
    ///
    /// Returns `Err` with a human-readable message if the file cannot be read
    /// or parsed.
    pub fn load(path: &Path) -> FeatureResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FeatureError::Settings(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            FeatureError::Settings(format!("failed to parse {}: {e}", path.display()))
        })
    }

    pub fn save(&self, path: &Path) -> FeatureResult<()> {
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| {
            FeatureError::Settings(format!("failed to write {}: {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = CameraStackDepthSettings::default();
        assert_eq!(settings.merge_mode, MergeMode::Maximum);
        assert_eq!(settings.pass_event, RenderPassEvent::AfterRenderingTransparents);
        assert!(settings.active_cameras.is_empty());
    }

    #[test]
    fn test_keywords() {
        assert_eq!(MergeMode::Overlay.keyword(), "MERGE_MODE_OVERLAY");
        assert_eq!(MergeMode::Maximum.keyword(), "MERGE_MODE_MAXIMUM");
    }

    #[test]
    fn test_parse_partial_file() {
        let settings = CameraStackDepthSettings::from_toml("merge_mode = \"Overlay\"").unwrap();
        assert_eq!(settings.merge_mode, MergeMode::Overlay);
        assert_eq!(settings.pass_event, RenderPassEvent::default());
    }

    #[test]
    fn test_parse_error() {
        let result = CameraStackDepthSettings::from_toml("merge_mode = \"Average\"");
        assert!(matches!(result, Err(FeatureError::Settings(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = CameraStackDepthSettings::load(Path::new("/nonexistent/depth.toml"));
        let Err(FeatureError::Settings(message)) = result else {
            panic!("expected a settings error");
        };
        assert!(message.starts_with("failed to read"));
    }
}
