//! Depth capture and merge scheduling
//!
//! Decides, for one camera invocation, which passes to record:
//!
//! 1. Capture: every active camera copies its depth into its depth slot.
//! 2. Merge: every active camera after the first merges its captured layer
//!    with the composite accumulated so far.
//! 3. Composite: the last camera of the raw stack blits the final composite
//!    into the visible color target, whether or not it is active itself.

use crate::backend::{MaterialHandle, TextureHandle};
use crate::error::FeatureResult;
use crate::pipeline::depth_pool::DepthTexturePool;
use crate::render_graph::{RecordedPass, RenderPassEvent};
use crate::scene::CameraId;

/// Where the scheduler is within the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// No camera recorded yet, or the composite was recorded
    #[default]
    Idle,
    /// The first active layer has been captured
    Capturing,
    /// At least one merge has been recorded
    Merging,
}

/// Everything one camera invocation needs, built fresh per invocation
#[derive(Debug, Clone, Copy)]
pub struct FrameInvocationContext<'a> {
    pub frame_id: u64,
    pub camera: CameraId,
    pub raw_ordinal: usize,
    pub active_ordinal: Option<usize>,
    pub is_last_raw: bool,
    pub active_count: usize,
    pub depth_source: TextureHandle,
    pub color_target: TextureHandle,
    pub display_material: MaterialHandle,
    pub merge_material: MaterialHandle,
    pub pass_event: RenderPassEvent,
    pub pool: &'a DepthTexturePool,
}

/// Pool slots one invocation touches, resolved before anything is recorded
struct ResolvedSlots {
    capture: Option<TextureHandle>,
    merge: Option<(TextureHandle, TextureHandle, TextureHandle)>,
    composite_source: Option<TextureHandle>,
}

/// Per-frame pass scheduler
#[derive(Debug, Default)]
pub struct DepthScheduler {
    state: SchedulerState,
}

impl DepthScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Record the passes for one camera.
    ///
    /// All slot lookups happen up front: if any index is outside the pool, an
    /// error is returned and nothing is recorded.
    pub fn record(&mut self, ctx: &FrameInvocationContext<'_>) -> FeatureResult<Vec<RecordedPass>> {
        let slots = Self::resolve_slots(ctx)?;
        let mut passes = Vec::with_capacity(3);

        if let (Some(active), Some(dst)) = (ctx.active_ordinal, slots.capture) {
            passes.push(RecordedPass::capture(
                ctx.camera,
                active,
                ctx.depth_source,
                dst,
                ctx.pass_event,
            ));
            if self.state == SchedulerState::Idle {
                self.state = SchedulerState::Capturing;
            }
        }

        if let (Some(active), Some((back, front, dst))) = (ctx.active_ordinal, slots.merge) {
            passes.push(RecordedPass::merge(
                ctx.camera,
                active,
                back,
                front,
                dst,
                ctx.merge_material,
                ctx.pass_event,
            ));
            self.state = SchedulerState::Merging;
        }

        if let Some(source) = slots.composite_source {
            passes.push(RecordedPass::composite(
                ctx.camera,
                source,
                ctx.color_target,
                ctx.display_material,
                ctx.pass_event,
            ));
            self.state = SchedulerState::Idle;
        }

        log::trace!(
            "frame {}: {} (raw {}, active {:?}) recorded {} passes",
            ctx.frame_id,
            ctx.camera,
            ctx.raw_ordinal,
            ctx.active_ordinal,
            passes.len()
        );
        Ok(passes)
    }

    fn resolve_slots(ctx: &FrameInvocationContext<'_>) -> FeatureResult<ResolvedSlots> {
        let pool = ctx.pool;

        let (capture, merge) = match ctx.active_ordinal {
            None => (None, None),
            Some(active) => {
                let front = pool.try_depth_slot(active)?;
                let merge = match active {
                    0 => None,
                    1 => Some((pool.try_depth_slot(0)?, front, pool.try_merge_slot(0)?)),
                    _ => Some((
                        pool.try_merge_slot(active - 2)?,
                        front,
                        pool.try_merge_slot(active - 1)?,
                    )),
                };
                (Some(front), merge)
            }
        };

        let composite_source = if ctx.is_last_raw {
            let source = if ctx.active_count > 1 {
                pool.try_merge_slot(ctx.active_count - 2)?
            } else {
                pool.try_depth_slot(0)?
            };
            Some(source)
        } else {
            None
        };

        Ok(ResolvedSlots {
            capture,
            merge,
            composite_source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SoftwareBackend;
    use crate::error::{FeatureError, SlotKind};
    use crate::render_graph::PassKind;

    fn context<'a>(
        pool: &'a DepthTexturePool,
        raw: usize,
        active: Option<usize>,
        is_last_raw: bool,
    ) -> FrameInvocationContext<'a> {
        FrameInvocationContext {
            frame_id: 0,
            camera: CameraId(raw as u64),
            raw_ordinal: raw,
            active_ordinal: active,
            is_last_raw,
            active_count: pool.active_count(),
            depth_source: TextureHandle(1000 + raw as u64),
            color_target: TextureHandle(2000),
            display_material: MaterialHandle(1),
            merge_material: MaterialHandle(2),
            pass_event: RenderPassEvent::default(),
            pool,
        }
    }

    fn pool(active: usize) -> DepthTexturePool {
        let mut backend = SoftwareBackend::new();
        let mut pool = DepthTexturePool::new();
        pool.reconcile(&mut backend, active, 2, 2).unwrap();
        pool
    }

    #[test]
    fn test_first_active_camera_only_captures() {
        let pool = pool(3);
        let mut scheduler = DepthScheduler::new();

        let passes = scheduler.record(&context(&pool, 0, Some(0), false)).unwrap();
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].kind, PassKind::Capture { active_ordinal: 0 });
        assert_eq!(passes[0].destination(), pool.depth_slot(0));
        assert_eq!(scheduler.state(), SchedulerState::Capturing);
    }

    #[test]
    fn test_merge_addressing() {
        let pool = pool(3);
        let mut scheduler = DepthScheduler::new();

        let second = scheduler.record(&context(&pool, 1, Some(1), false)).unwrap();
        let merge = &second[1];
        assert_eq!(merge.blit.destination, pool.merge_slot(0));
        assert!(merge.reads_texture(pool.depth_slot(0)));
        assert!(merge.reads_texture(pool.depth_slot(1)));
        assert_eq!(scheduler.state(), SchedulerState::Merging);

        let third = scheduler.record(&context(&pool, 2, Some(2), true)).unwrap();
        assert_eq!(third.len(), 3);
        assert_eq!(third[1].blit.destination, pool.merge_slot(1));
        assert!(third[1].reads_texture(pool.merge_slot(0)));
        assert!(third[1].reads_texture(pool.depth_slot(2)));
        assert_eq!(third[2].blit.source, pool.merge_slot(1));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_inactive_last_camera_still_composites() {
        let pool = pool(1);
        let mut scheduler = DepthScheduler::new();

        let passes = scheduler.record(&context(&pool, 1, None, true)).unwrap();
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].kind, PassKind::Composite);
        assert_eq!(passes[0].blit.source, pool.depth_slot(0));
    }

    #[test]
    fn test_out_of_range_records_nothing() {
        let pool = pool(1);
        let mut scheduler = DepthScheduler::new();

        let result = scheduler.record(&context(&pool, 1, Some(1), true));
        assert_eq!(
            result,
            Err(FeatureError::SlotOutOfRange {
                kind: SlotKind::Depth,
                index: 1,
                len: 1
            })
        );
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }
}
