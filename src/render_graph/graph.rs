//! Per-frame recording of compositor passes

use crate::backend::TextureHandle;
use crate::render_graph::pass::*;

/// Ordered list of passes recorded during one frame.
///
/// Passes are appended in the order the host invoked the cameras and are
/// executed in exactly that order; nothing here reorders them.
#[derive(Debug, Clone, Default)]
pub struct FrameRecording {
    frame_id: u64,
    passes: Vec<RecordedPass>,
}

impl FrameRecording {
    pub fn new(frame_id: u64) -> Self {
        Self {
            frame_id,
            passes: Vec::new(),
        }
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// Append the passes recorded for one camera invocation
    pub fn extend(&mut self, passes: impl IntoIterator<Item = RecordedPass>) {
        self.passes.extend(passes);
    }

    pub fn push(&mut self, pass: RecordedPass) {
        self.passes.push(pass);
    }

    pub fn passes(&self) -> &[RecordedPass] {
        &self.passes
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn capture_count(&self) -> usize {
        self.passes
            .iter()
            .filter(|p| matches!(p.kind, PassKind::Capture { .. }))
            .count()
    }

    pub fn merge_count(&self) -> usize {
        self.passes
            .iter()
            .filter(|p| matches!(p.kind, PassKind::Merge { .. }))
            .count()
    }

    pub fn composite_count(&self) -> usize {
        self.passes
            .iter()
            .filter(|p| p.kind == PassKind::Composite)
            .count()
    }

    /// The composite pass, if one was recorded
    pub fn composite(&self) -> Option<&RecordedPass> {
        self.passes.iter().find(|p| p.kind == PassKind::Composite)
    }

    /// Index of the last pass writing `texture` before position `before`
    pub fn last_writer(&self, texture: TextureHandle, before: usize) -> Option<usize> {
        self.passes[..before.min(self.passes.len())]
            .iter()
            .rposition(|p| p.writes_texture(texture))
    }

    /// Check that every texture a pass reads was either written earlier in
    /// this frame or is not owned by the compositor (`is_owned` is false).
    ///
    /// Returns the index of the first pass that reads an owned texture
    /// nothing wrote yet.
    pub fn first_unwritten_read(&self, is_owned: impl Fn(TextureHandle) -> bool) -> Option<usize> {
        self.passes.iter().enumerate().find_map(|(index, pass)| {
            let bad = pass
                .inputs
                .iter()
                .any(|input| is_owned(input.texture) && self.last_writer(input.texture, index).is_none());
            bad.then_some(index)
        })
    }

    pub fn clear(&mut self) {
        self.passes.clear();
    }
}

impl IntoIterator for FrameRecording {
    type Item = RecordedPass;
    type IntoIter = std::vec::IntoIter<RecordedPass>;

    fn into_iter(self) -> Self::IntoIter {
        self.passes.into_iter()
    }
}
