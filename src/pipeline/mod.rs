//! Camera stack depth compositing
//!
//! 1. [`DepthTexturePool`] - per-camera depth layers and merge targets
//! 2. [`CameraStackTracker`] - the ordered stack with per-camera active flags
//! 3. [`DepthScheduler`] - capture, merge and composite passes per camera
//! 4. [`CameraStackDepthFeature`] - the host-facing feature tying them together

pub mod camera_stack;
pub mod camera_stack_depth;
pub mod depth_pool;
pub mod depth_scheduler;
pub mod settings;

pub use camera_stack::*;
pub use camera_stack_depth::*;
pub use depth_pool::*;
pub use depth_scheduler::*;
pub use settings::*;
