//! Camera stack depth feature
//!
//! The long-lived object the host renderer talks to. Once per frame the host
//! reports the resolved camera stack through
//! [`CameraStackDepthFeature::on_camera_stack_resolved`]; then, for every
//! camera it renders, it asks for that camera's passes through
//! [`CameraStackDepthFeature::on_camera_record`].

use crate::backend::{GraphicsBackend, MaterialHandle, TextureHandle};
use crate::error::{FeatureError, FeatureResult};
use crate::pipeline::camera_stack::CameraStackTracker;
use crate::pipeline::depth_pool::{DepthTexturePool, PoolChange};
use crate::pipeline::depth_scheduler::{DepthScheduler, FrameInvocationContext};
use crate::pipeline::settings::{CameraStackDepthSettings, MergeMode};
use crate::render_graph::{FrameRecording, RecordedPass, RenderPassEvent};
use crate::scene::{CameraId, CameraKind, CameraStackDescriptor};

/// State of the feature's contribution to the current frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameStatus {
    /// Cameras are being recorded
    Recording,
    /// Configuration problem; nothing is recorded this frame
    Skipped(FeatureError),
    /// A camera invocation failed; nothing more is recorded this frame
    Aborted(FeatureError),
    /// The composite blit was recorded
    Completed,
}

impl FrameStatus {
    pub fn is_recording(&self) -> bool {
        matches!(self, FrameStatus::Recording)
    }
}

/// Per-camera request from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraRecordRequest {
    pub camera: CameraId,
    pub kind: CameraKind,
    /// Depth buffer the camera just rendered
    pub depth_source: TextureHandle,
    /// Visible color target of the frame
    pub color_target: TextureHandle,
}

/// Tracks the currently reported problems so a persisting condition is only
/// logged once.
///
/// Configuration problems and frame aborts are tracked separately: the former
/// clears when a frame starts recording, the latter when a frame completes.
#[derive(Debug, Default)]
pub struct Diagnostics {
    condition: Option<FeatureError>,
    warnings_emitted: usize,
    abort: Option<FeatureError>,
    errors_emitted: usize,
}

impl Diagnostics {
    /// Report `error` as the current condition. Logs only if it differs from
    /// the condition already reported. Returns true if it was logged.
    pub fn report(&mut self, error: &FeatureError) -> bool {
        if self.condition.as_ref() == Some(error) {
            return false;
        }
        if error.is_configuration() {
            log::warn!("Camera stack depth: {}", error);
        } else {
            log::error!("Camera stack depth: {}", error);
        }
        self.warnings_emitted += 1;
        self.condition = Some(error.clone());
        true
    }

    /// Clear the current condition
    pub fn resolve(&mut self) {
        if let Some(previous) = self.condition.take() {
            log::info!("Camera stack depth resumed after: {}", previous);
        }
    }

    pub fn condition(&self) -> Option<&FeatureError> {
        self.condition.as_ref()
    }

    pub fn warnings_emitted(&self) -> usize {
        self.warnings_emitted
    }

    /// Report a precondition violation that aborted a frame. Logged at error
    /// level only if it differs from the last reported abort.
    pub fn report_abort(&mut self, frame_id: u64, error: &FeatureError) -> bool {
        if self.abort.as_ref() == Some(error) {
            log::debug!("frame {}: aborted again: {}", frame_id, error);
            return false;
        }
        log::error!("Camera stack depth: frame {} aborted: {}", frame_id, error);
        self.errors_emitted += 1;
        self.abort = Some(error.clone());
        true
    }

    /// A frame completed; forget the last abort
    pub fn frame_completed(&mut self) {
        if let Some(previous) = self.abort.take() {
            log::info!("Camera stack depth completed a frame after: {}", previous);
        }
    }

    pub fn last_abort(&self) -> Option<&FeatureError> {
        self.abort.as_ref()
    }

    pub fn errors_emitted(&self) -> usize {
        self.errors_emitted
    }
}

/// Recording state of one frame, keyed by frame id and raw ordinal
#[derive(Debug)]
struct FrameContext {
    frame_id: u64,
    status: FrameStatus,
    next_raw_ordinal: usize,
    /// Display and merge material, present while recording
    materials: Option<(MaterialHandle, MaterialHandle)>,
    scheduler: DepthScheduler,
    recording: FrameRecording,
}

/// Captures, merges and displays the depth of every active camera of a stack
pub struct CameraStackDepthFeature {
    pass_event: RenderPassEvent,
    merge_mode: MergeMode,
    display_material: Option<MaterialHandle>,
    merge_material: Option<MaterialHandle>,

    tracker: CameraStackTracker,
    pool: DepthTexturePool,

    frame: Option<FrameContext>,
    last_status: Option<FrameStatus>,
    /// Active flag changes requested while a frame was recording
    pending_flags: Vec<(usize, bool)>,
    next_frame_id: u64,
    diagnostics: Diagnostics,
}

impl CameraStackDepthFeature {
    pub fn new() -> Self {
        Self::from_settings(&CameraStackDepthSettings::default())
    }

    /// Build a feature from persisted settings.
    ///
    /// Materials are runtime references and must be assigned separately.
    pub fn from_settings(settings: &CameraStackDepthSettings) -> Self {
        Self {
            pass_event: settings.pass_event,
            merge_mode: settings.merge_mode,
            display_material: None,
            merge_material: None,
            tracker: CameraStackTracker::from_flags(&settings.active_cameras),
            pool: DepthTexturePool::new(),
            frame: None,
            last_status: None,
            pending_flags: Vec::new(),
            next_frame_id: 0,
            diagnostics: Diagnostics::default(),
        }
    }

    /// Current persisted state, including flag changes not applied yet
    pub fn settings(&self) -> CameraStackDepthSettings {
        let mut active_cameras = self.tracker.active_flags();
        for &(raw_ordinal, active) in &self.pending_flags {
            if let Some(flag) = active_cameras.get_mut(raw_ordinal) {
                *flag = active;
            }
        }
        CameraStackDepthSettings {
            pass_event: self.pass_event,
            merge_mode: self.merge_mode,
            active_cameras,
        }
    }

    pub fn set_display_material(&mut self, material: Option<MaterialHandle>) {
        self.display_material = material;
    }

    pub fn set_merge_material(&mut self, material: Option<MaterialHandle>) {
        self.merge_material = material;
    }

    pub fn set_merge_mode(&mut self, mode: MergeMode) {
        self.merge_mode = mode;
    }

    pub fn merge_mode(&self) -> MergeMode {
        self.merge_mode
    }

    pub fn set_pass_event(&mut self, event: RenderPassEvent) {
        self.pass_event = event;
    }

    pub fn pass_event(&self) -> RenderPassEvent {
        self.pass_event
    }

    /// Toggle a camera of the stack by raw ordinal. Returns false if there is
    /// no such camera.
    ///
    /// While a frame is recording, the change is deferred until the frame ends
    /// so every camera of the frame sees the same active set. The pool follows
    /// on the next resolved stack.
    pub fn set_camera_active(&mut self, raw_ordinal: usize, active: bool) -> bool {
        if raw_ordinal >= self.tracker.len() {
            return false;
        }
        let recording = self
            .frame
            .as_ref()
            .is_some_and(|f| f.status.is_recording());
        if recording {
            log::debug!(
                "Deferring active flag of camera {} until the frame ends",
                raw_ordinal
            );
            self.pending_flags.push((raw_ordinal, active));
            true
        } else {
            self.tracker.set_active(raw_ordinal, active)
        }
    }

    fn apply_pending_flags(&mut self) {
        for (raw_ordinal, active) in std::mem::take(&mut self.pending_flags) {
            self.tracker.set_active(raw_ordinal, active);
        }
    }

    pub fn tracker(&self) -> &CameraStackTracker {
        &self.tracker
    }

    pub fn pool(&self) -> &DepthTexturePool {
        &self.pool
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Status of the current (or most recently finished) frame
    pub fn frame_status(&self) -> Option<&FrameStatus> {
        self.frame
            .as_ref()
            .map(|f| &f.status)
            .or(self.last_status.as_ref())
    }

    /// Passes recorded so far in the current frame
    pub fn frame_recording(&self) -> Option<&FrameRecording> {
        self.frame.as_ref().map(|f| &f.recording)
    }

    /// Take the current frame's recording, ending the frame
    pub fn take_recording(&mut self) -> Option<FrameRecording> {
        let frame = self.frame.take()?;
        self.last_status = Some(frame.status);
        self.apply_pending_flags();
        Some(frame.recording)
    }

    /// Per-frame hook: the host resolved its camera stack.
    ///
    /// Validates the configuration, syncs the tracked stack, reconciles the
    /// texture pool against the active count and viewport, and applies the
    /// merge mode keyword to the merge material. Must run before any camera of
    /// the frame is recorded.
    pub fn on_camera_stack_resolved<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        stack: &CameraStackDescriptor,
        viewport: (u32, u32),
    ) -> FrameStatus {
        let frame_id = self.next_frame_id;
        self.next_frame_id += 1;
        self.frame = None;
        self.last_status = None;
        self.apply_pending_flags();

        let (status, materials) = match self.prepare_frame(backend, stack, viewport) {
            Ok(materials) => {
                self.diagnostics.resolve();
                (FrameStatus::Recording, Some(materials))
            }
            Err(err) => {
                self.diagnostics.report(&err);
                (FrameStatus::Skipped(err), None)
            }
        };

        log::debug!("frame {}: camera stack resolved, {:?}", frame_id, status);
        self.frame = Some(FrameContext {
            frame_id,
            status: status.clone(),
            next_raw_ordinal: 0,
            materials,
            scheduler: DepthScheduler::new(),
            recording: FrameRecording::new(frame_id),
        });
        status
    }

    fn prepare_frame<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        stack: &CameraStackDescriptor,
        (width, height): (u32, u32),
    ) -> FeatureResult<(MaterialHandle, MaterialHandle)> {
        let display_material = self
            .display_material
            .ok_or(FeatureError::MissingDisplayMaterial)?;
        let merge_material = self
            .merge_material
            .ok_or(FeatureError::MissingMergeMaterial)?;

        if stack.base.is_none() {
            return Err(FeatureError::NoMainCamera);
        }

        self.tracker.sync_stack(&stack.raw_cameras());

        if stack.overlays.is_empty() {
            return Err(FeatureError::NoOverlayCameras);
        }
        let active_count = self.tracker.active_count();
        if active_count == 0 {
            if self.pool.active_count() > 0 {
                log::debug!("No active cameras, releasing depth texture pool");
            }
            self.pool.release(backend);
            self.tracker.clear_slots();
            return Err(FeatureError::NoActiveCameras);
        }
        if width == 0 || height == 0 {
            return Err(FeatureError::ZeroSizedViewport { width, height });
        }

        match self.pool.reconcile(backend, active_count, width, height) {
            Ok(PoolChange::Rebuilt) => {
                log::debug!(
                    "Depth texture pool rebuilt for {} active cameras at {}x{}",
                    active_count,
                    width,
                    height
                );
            }
            Ok(PoolChange::Unchanged) => {}
            Err(err) => {
                self.tracker.clear_slots();
                return Err(err);
            }
        }
        self.tracker.bind_slots(&self.pool);

        for mode in MergeMode::ALL {
            backend.set_material_keyword(merge_material, mode.keyword(), mode == self.merge_mode)?;
        }

        Ok((display_material, merge_material))
    }

    /// Per-camera hook: record the passes for one camera.
    ///
    /// Non-game cameras and cameras of skipped or aborted frames yield no
    /// passes. A precondition violation aborts the rest of the frame and is
    /// returned as an error; nothing is recorded for the failing camera.
    pub fn on_camera_record(
        &mut self,
        request: &CameraRecordRequest,
    ) -> FeatureResult<Vec<RecordedPass>> {
        if request.kind != CameraKind::Game {
            log::trace!("ignoring {:?} camera {}", request.kind, request.camera);
            return Ok(Vec::new());
        }

        let Some(frame) = self.frame.as_mut() else {
            let err = FeatureError::FrameNotStarted;
            self.diagnostics.report_abort(self.next_frame_id, &err);
            return Err(err);
        };
        if !frame.status.is_recording() {
            return Ok(Vec::new());
        }

        match Self::record_camera(&self.tracker, &self.pool, self.pass_event, frame, request) {
            Ok(passes) => {
                frame.recording.extend(passes.iter().cloned());
                if frame.status == FrameStatus::Completed {
                    self.diagnostics.frame_completed();
                }
                Ok(passes)
            }
            Err(err) => {
                self.diagnostics.report_abort(frame.frame_id, &err);
                frame.status = FrameStatus::Aborted(err.clone());
                Err(err)
            }
        }
    }

    fn record_camera(
        tracker: &CameraStackTracker,
        pool: &DepthTexturePool,
        pass_event: RenderPassEvent,
        frame: &mut FrameContext,
        request: &CameraRecordRequest,
    ) -> FeatureResult<Vec<RecordedPass>> {
        let (raw_ordinal, active_ordinal) = tracker.resolve_ordinals(request.camera)?;
        if raw_ordinal < frame.next_raw_ordinal {
            return Err(FeatureError::OutOfOrderInvocation {
                camera: request.camera,
                raw_ordinal,
                expected: frame.next_raw_ordinal,
            });
        }

        let (display_material, merge_material) =
            frame.materials.ok_or(FeatureError::FrameNotStarted)?;

        let ctx = FrameInvocationContext {
            frame_id: frame.frame_id,
            camera: request.camera,
            raw_ordinal,
            active_ordinal,
            is_last_raw: tracker.is_last_in_raw_stack(raw_ordinal),
            active_count: tracker.active_count(),
            depth_source: request.depth_source,
            color_target: request.color_target,
            display_material,
            merge_material,
            pass_event,
            pool,
        };
        let passes = frame.scheduler.record(&ctx)?;

        frame.next_raw_ordinal = raw_ordinal + 1;
        if ctx.is_last_raw {
            frame.status = FrameStatus::Completed;
        }
        Ok(passes)
    }

    /// Release every texture the feature owns
    pub fn dispose<B: GraphicsBackend>(&mut self, backend: &mut B) {
        log::debug!(
            "Disposing camera stack depth feature ({} depth, {} merge textures)",
            self.pool.depth_slots().len(),
            self.pool.merge_slots().len()
        );
        self.pool.release(backend);
        self.tracker.clear_slots();
        self.frame = None;
        self.apply_pending_flags();
    }
}

impl Default for CameraStackDepthFeature {
    fn default() -> Self {
        Self::new()
    }
}
