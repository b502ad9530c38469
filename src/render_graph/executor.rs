//! Recorded pass executor

use crate::backend::traits::*;
use crate::render_graph::graph::*;
use crate::render_graph::pass::*;

/// Replays recorded passes against a backend, in recorded order
pub struct RenderGraphExecutor {
    executed_passes: usize,
}

impl RenderGraphExecutor {
    pub fn new() -> Self {
        Self { executed_passes: 0 }
    }

    /// Execute every pass of a frame recording
    pub fn execute<B: GraphicsBackend>(
        &mut self,
        recording: &FrameRecording,
        backend: &mut B,
    ) -> BackendResult<()> {
        log::trace!(
            "{}: executing frame {} with {} passes",
            backend.name(),
            recording.frame_id(),
            recording.len()
        );
        self.execute_passes(recording.passes(), backend)
    }

    /// Execute a slice of passes, stopping at the first backend failure
    pub fn execute_passes<B: GraphicsBackend>(
        &mut self,
        passes: &[RecordedPass],
        backend: &mut B,
    ) -> BackendResult<()> {
        for pass in passes {
            log::trace!(
                "executing '{}' for {} ({:?})",
                pass.name,
                pass.camera,
                pass.kind
            );
            backend.blit(&pass.blit)?;
            self.executed_passes += 1;
        }
        Ok(())
    }

    /// Total number of passes executed by this executor
    pub fn executed_passes(&self) -> usize {
        self.executed_passes
    }
}

impl Default for RenderGraphExecutor {
    fn default() -> Self {
        Self::new()
    }
}
