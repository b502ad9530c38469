//! Camera stack tracker
//!
//! Keeps one entry per camera of the raw stack (base first, then overlays in
//! stack order) together with its active flag and the pool slots it currently
//! writes to.

use crate::backend::TextureHandle;
use crate::error::{FeatureError, FeatureResult};
use crate::pipeline::depth_pool::DepthTexturePool;
use crate::scene::CameraId;

/// One camera of the tracked stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraStackEntry {
    /// `None` only for entries restored from settings before the first sync
    pub camera: Option<CameraId>,
    pub active: bool,
    pub depth_slot: Option<TextureHandle>,
    pub merge_slot: Option<TextureHandle>,
}

impl CameraStackEntry {
    fn new(camera: Option<CameraId>, active: bool) -> Self {
        Self {
            camera,
            active,
            depth_slot: None,
            merge_slot: None,
        }
    }
}

/// Ordered camera stack with per-camera active flags
#[derive(Debug, Clone, Default)]
pub struct CameraStackTracker {
    entries: Vec<CameraStackEntry>,
}

impl CameraStackTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a tracker from persisted active flags.
    ///
    /// Cameras are unknown until the first [`sync_stack`](Self::sync_stack);
    /// the flags are kept by index.
    pub fn from_flags(flags: &[bool]) -> Self {
        Self {
            entries: flags
                .iter()
                .map(|&active| CameraStackEntry::new(None, active))
                .collect(),
        }
    }

    /// Replace the tracked cameras with `raw_cameras`.
    ///
    /// Entries keep their active flag by index; entries beyond the previous
    /// length start active and trailing entries are dropped. Returns true if
    /// the stack composition changed.
    pub fn sync_stack(&mut self, raw_cameras: &[CameraId]) -> bool {
        let mut changed = self.entries.len() != raw_cameras.len();

        self.entries
            .resize_with(raw_cameras.len(), || CameraStackEntry::new(None, true));

        for (entry, &camera) in self.entries.iter_mut().zip(raw_cameras) {
            if entry.camera != Some(camera) {
                entry.camera = Some(camera);
                changed = true;
            }
        }

        if changed {
            log::debug!(
                "Camera stack changed: {} cameras, {} active",
                self.entries.len(),
                self.active_count()
            );
        }
        changed
    }

    /// Raw ordinal of `camera` and its active ordinal if it is active.
    ///
    /// The first entry matching the camera's identity wins.
    pub fn resolve_ordinals(&self, camera: CameraId) -> FeatureResult<(usize, Option<usize>)> {
        let raw = self
            .entries
            .iter()
            .position(|e| e.camera == Some(camera))
            .ok_or(FeatureError::CameraNotTracked(camera))?;

        let entry = &self.entries[raw];
        let active = entry.active.then(|| {
            self.entries[..raw].iter().filter(|e| e.active).count()
        });
        Ok((raw, active))
    }

    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|e| e.active).count()
    }

    /// True if `raw` is the last position of the raw stack
    pub fn is_last_in_raw_stack(&self, raw: usize) -> bool {
        !self.entries.is_empty() && raw == self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CameraStackEntry] {
        &self.entries
    }

    /// Set the active flag of the entry at `index`.
    ///
    /// Returns false if there is no such entry. Deactivating an entry clears
    /// its slots.
    pub fn set_active(&mut self, index: usize, active: bool) -> bool {
        let Some(entry) = self.entries.get_mut(index) else {
            return false;
        };
        entry.active = active;
        if !active {
            entry.depth_slot = None;
            entry.merge_slot = None;
        }
        true
    }

    pub fn active_flags(&self) -> Vec<bool> {
        self.entries.iter().map(|e| e.active).collect()
    }

    /// Point each active entry at its pool slots, in active order.
    ///
    /// The first active entry has no merge slot; the k-th active entry
    /// (k > 0) merges into merge slot k-1. Inactive entries are cleared.
    pub fn bind_slots(&mut self, pool: &DepthTexturePool) {
        let mut active = 0;
        for entry in &mut self.entries {
            if entry.active {
                entry.depth_slot = pool.try_depth_slot(active).ok();
                entry.merge_slot = active
                    .checked_sub(1)
                    .and_then(|m| pool.try_merge_slot(m).ok());
                active += 1;
            } else {
                entry.depth_slot = None;
                entry.merge_slot = None;
            }
        }
    }

    /// Forget every slot reference
    pub fn clear_slots(&mut self) {
        for entry in &mut self.entries {
            entry.depth_slot = None;
            entry.merge_slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SoftwareBackend;

    fn cams(ids: &[u64]) -> Vec<CameraId> {
        ids.iter().copied().map(CameraId).collect()
    }

    #[test]
    fn test_new_entries_are_active() {
        let mut tracker = CameraStackTracker::new();
        assert!(tracker.sync_stack(&cams(&[1, 2, 3])));
        assert_eq!(tracker.active_flags(), vec![true, true, true]);
        assert!(!tracker.sync_stack(&cams(&[1, 2, 3])));
    }

    #[test]
    fn test_flags_preserved_by_index() {
        let mut tracker = CameraStackTracker::new();
        tracker.sync_stack(&cams(&[1, 2, 3]));
        tracker.set_active(1, false);

        tracker.sync_stack(&cams(&[1, 5, 3, 4]));
        assert_eq!(tracker.active_flags(), vec![true, false, true, true]);

        tracker.sync_stack(&cams(&[1, 5]));
        assert_eq!(tracker.active_flags(), vec![true, false]);
    }

    #[test]
    fn test_resolve_ordinals() {
        let mut tracker = CameraStackTracker::new();
        tracker.sync_stack(&cams(&[10, 11, 12, 13]));
        tracker.set_active(1, false);

        assert_eq!(tracker.resolve_ordinals(CameraId(10)).unwrap(), (0, Some(0)));
        assert_eq!(tracker.resolve_ordinals(CameraId(11)).unwrap(), (1, None));
        assert_eq!(tracker.resolve_ordinals(CameraId(12)).unwrap(), (2, Some(1)));
        assert_eq!(tracker.resolve_ordinals(CameraId(13)).unwrap(), (3, Some(2)));
        assert_eq!(
            tracker.resolve_ordinals(CameraId(99)),
            Err(FeatureError::CameraNotTracked(CameraId(99)))
        );
        assert!(tracker.is_last_in_raw_stack(3));
        assert!(!tracker.is_last_in_raw_stack(2));
    }

    #[test]
    fn test_duplicate_camera_uses_first_entry() {
        let mut tracker = CameraStackTracker::new();
        tracker.sync_stack(&cams(&[1, 2, 1]));
        assert_eq!(tracker.resolve_ordinals(CameraId(1)).unwrap(), (0, Some(0)));
    }

    #[test]
    fn test_restored_flags_apply_on_first_sync() {
        let mut tracker = CameraStackTracker::from_flags(&[true, false]);
        assert!(tracker.sync_stack(&cams(&[4, 5, 6])));
        assert_eq!(tracker.active_flags(), vec![true, false, true]);
    }

    #[test]
    fn test_bind_slots() {
        let mut backend = SoftwareBackend::new();
        let mut pool = DepthTexturePool::new();
        let mut tracker = CameraStackTracker::new();
        tracker.sync_stack(&cams(&[1, 2, 3]));
        tracker.set_active(1, false);
        pool.reconcile(&mut backend, tracker.active_count(), 4, 4)
            .unwrap();

        tracker.bind_slots(&pool);
        let entries = tracker.entries();
        assert_eq!(entries[0].depth_slot, Some(pool.depth_slot(0)));
        assert_eq!(entries[0].merge_slot, None);
        assert_eq!(entries[1].depth_slot, None);
        assert_eq!(entries[2].depth_slot, Some(pool.depth_slot(1)));
        assert_eq!(entries[2].merge_slot, Some(pool.merge_slot(0)));

        tracker.clear_slots();
        assert!(tracker.entries().iter().all(|e| e.depth_slot.is_none()));
    }
}
