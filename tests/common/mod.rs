//! Common utilities for camera stack depth integration tests.
//!
//! [`TestContext`] drives a [`CameraStackDepthFeature`] the way a host renderer
//! would: resolve the stack, record every camera in raw order, then execute the
//! recording on the software backend so merged values can be read back.

#![allow(dead_code)]

use camera_stack_depth::backend::{
    GraphicsBackend, MaterialHandle, SoftwareBackend, SoftwareShader, TextureDescriptor,
    TextureFormat, TextureHandle,
};
use camera_stack_depth::pipeline::{
    CameraRecordRequest, CameraStackDepthFeature, CameraStackDepthSettings, FrameStatus,
    MergeMode,
};
use camera_stack_depth::render_graph::{
    FrameRecording, RenderGraphExecutor, BACK_DEPTH_PROPERTY, DEPTH_TEXTURE_PROPERTY,
    FRONT_DEPTH_PROPERTY,
};
use camera_stack_depth::scene::{CameraId, CameraKind, CameraStackDescriptor};
use camera_stack_depth::FeatureResult;

pub const WIDTH: u32 = 4;
pub const HEIGHT: u32 = 4;

/// Initialize `env_logger` once for the test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Camera ids used by [`TestContext`]: the base camera is `camera#1`, overlays
/// follow as `camera#2`, `camera#3`, ...
pub fn camera(raw_ordinal: usize) -> CameraId {
    CameraId(raw_ordinal as u64 + 1)
}

pub struct TestContext {
    pub backend: SoftwareBackend,
    pub feature: CameraStackDepthFeature,
    pub executor: RenderGraphExecutor,
    pub display_material: MaterialHandle,
    pub merge_material: MaterialHandle,
    pub color_target: TextureHandle,
    /// Host depth buffer per raw camera
    pub depth_sources: Vec<TextureHandle>,
    pub stack: CameraStackDescriptor,
    pub viewport: (u32, u32),
}

impl TestContext {
    /// A stack of `camera_count` cameras, all active
    pub fn new(camera_count: usize) -> Self {
        Self::with_settings(camera_count, CameraStackDepthSettings::default())
    }

    pub fn with_settings(camera_count: usize, settings: CameraStackDepthSettings) -> Self {
        init_logging();

        let mut backend = SoftwareBackend::new();
        let display_material = backend.create_material(SoftwareShader::ShowDepth {
            source_property: DEPTH_TEXTURE_PROPERTY,
        });
        let merge_material = backend.create_material(SoftwareShader::MergeDepth {
            back_property: BACK_DEPTH_PROPERTY,
            front_property: FRONT_DEPTH_PROPERTY,
            overlay_keyword: MergeMode::Overlay.keyword(),
        });

        let color_target = backend
            .create_texture(&TextureDescriptor {
                label: Some("color".into()),
                width: WIDTH,
                height: HEIGHT,
                format: TextureFormat::Rgba8Unorm,
                ..Default::default()
            })
            .unwrap();
        let depth_sources = (0..camera_count)
            .map(|i| {
                let desc = TextureDescriptor {
                    label: Some(format!("camera depth {i}")),
                    width: WIDTH,
                    height: HEIGHT,
                    format: TextureFormat::Depth32Float,
                    ..Default::default()
                };
                backend.create_texture(&desc).unwrap()
            })
            .collect();

        let stack = CameraStackDescriptor {
            base: (camera_count > 0).then(|| camera(0)),
            overlays: (1..camera_count).map(camera).collect(),
        };

        let mut feature = CameraStackDepthFeature::from_settings(&settings);
        feature.set_display_material(Some(display_material));
        feature.set_merge_material(Some(merge_material));

        Self {
            backend,
            feature,
            executor: RenderGraphExecutor::new(),
            display_material,
            merge_material,
            color_target,
            depth_sources,
            stack,
            viewport: (WIDTH, HEIGHT),
        }
    }

    /// Fill each camera's depth buffer with a constant value
    pub fn set_depths(&mut self, values: &[f32]) {
        for (&texture, &value) in self.depth_sources.iter().zip(values) {
            self.backend.fill(texture, value).unwrap();
        }
    }

    pub fn request(&self, raw_ordinal: usize) -> CameraRecordRequest {
        CameraRecordRequest {
            camera: camera(raw_ordinal),
            kind: CameraKind::Game,
            depth_source: self.depth_sources[raw_ordinal],
            color_target: self.color_target,
        }
    }

    pub fn resolve(&mut self) -> FrameStatus {
        self.feature
            .on_camera_stack_resolved(&mut self.backend, &self.stack, self.viewport)
    }

    pub fn record(&mut self, raw_ordinal: usize) -> FeatureResult<usize> {
        let request = self.request(raw_ordinal);
        self.feature.on_camera_record(&request).map(|p| p.len())
    }

    /// Resolve the stack, record every camera in raw order and take the
    /// frame's recording. Skipped frames yield an empty recording.
    pub fn run_frame(&mut self) -> (FrameStatus, FrameRecording) {
        let status = self.resolve();
        for raw in 0..self.depth_sources.len() {
            self.record(raw).unwrap();
        }
        let recording = self.feature.take_recording().unwrap_or_default();
        (status, recording)
    }

    /// Run a frame and execute it, returning the composited depth at (0, 0)
    pub fn composite(&mut self) -> f32 {
        self.backend.fill(self.color_target, 0.0).unwrap();
        let (_, recording) = self.run_frame();
        self.executor.execute(&recording, &mut self.backend).unwrap();
        self.backend.texel(self.color_target, 0, 0).unwrap()
    }

    /// Textures alive besides the ones this context created itself
    pub fn pool_texture_count(&self) -> usize {
        self.backend.live_texture_count() - 1 - self.depth_sources.len()
    }
}
