//! Camera Stack Depth - depth compositing across a camera stack
//!
//! A renderer extension for hosts that draw one frame with a stack of cameras
//! (a base camera plus overlay cameras). Every active camera's depth is
//! captured into its own single-channel float texture, the layers are merged
//! back to front, and the merged depth is blitted into the visible color target.
//!
//! # Features
//! - Per-camera active flags, persisted as TOML settings
//! - Two merge policies: overlay (front wins) and maximum
//! - Passes are recorded per frame and replayed by an executor
//! - CPU software backend and a wgpu backend (feature `wgpu-backend`)
//!
//! # Usage
//!
//! ```ignore
//! let status = feature.on_camera_stack_resolved(&mut backend, &stack, (width, height));
//! for camera in stack.raw_cameras() {
//!     feature.on_camera_record(&CameraRecordRequest { camera, .. })?;
//! }
//! if let Some(recording) = feature.take_recording() {
//!     executor.execute(&recording, &mut backend)?;
//! }
//! ```

pub mod backend;
pub mod error;
pub mod pipeline;
pub mod render_graph;
pub mod scene;

pub use backend::{GraphicsBackend, MaterialHandle, SoftwareBackend, TextureHandle};
pub use error::{FeatureError, FeatureResult};
pub use pipeline::{
    CameraRecordRequest, CameraStackDepthFeature, CameraStackDepthSettings, FrameStatus,
    MergeMode,
};
pub use render_graph::{FrameRecording, RecordedPass, RenderGraphExecutor, RenderPassEvent};
pub use scene::{CameraId, CameraKind, CameraStackDescriptor};

#[cfg(feature = "wgpu-backend")]
pub use backend::WgpuBackend;
