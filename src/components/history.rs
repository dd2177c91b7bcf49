use image::RgbaImage;
use std::collections::VecDeque;

use crate::canvas::MaskSurface;
use crate::settings::DEFAULT_MAX_UNDO;

// ============================================================================
// SNAPSHOT ENTRY - full-surface copy taken before a mutating action
// ============================================================================

/// A deep copy of the mask surface plus a label for the UI.
#[derive(Clone)]
pub struct SurfaceSnapshot {
    pub description: String,
    pub pixels: RgbaImage,
}

impl SurfaceSnapshot {
    pub fn capture(description: impl Into<String>, surface: &MaskSurface) -> Self {
        Self {
            description: description.into(),
            pixels: surface.snapshot(),
        }
    }

    fn memory_size(&self) -> usize {
        self.pixels.as_raw().len()
    }
}

// ============================================================================
// HISTORY MANAGER - linear undo/redo over surface snapshots
// ============================================================================

/// Undo/redo history with a bounded undo side.
///
/// `record_before_change` is called once per discrete action (stroke start,
/// clear, selection mark), never per stamp, so one stroke is one undo step.
pub struct HistoryManager {
    undo_stack: VecDeque<SurfaceSnapshot>,
    redo_stack: VecDeque<SurfaceSnapshot>,
    max_history_size: usize,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNDO)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_history_size: max_history_size.max(1),
            total_memory: 0,
        }
    }

    /// Snapshot `surface` before it is mutated.  Starts a fresh branch, so
    /// any redo history is discarded.
    pub fn record_before_change(&mut self, description: impl Into<String>, surface: &MaskSurface) {
        for snap in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(snap.memory_size());
        }

        let snap = SurfaceSnapshot::capture(description, surface);
        self.total_memory += snap.memory_size();
        self.undo_stack.push_back(snap);

        self.prune();
    }

    /// Restore the most recent snapshot.  Returns the undone action's
    /// description, or `None` when there is nothing to undo.
    pub fn undo(&mut self, surface: &mut MaskSurface) -> Option<String> {
        let prev = self.undo_stack.pop_back()?;
        let description = prev.description.clone();
        let current = SurfaceSnapshot::capture(description.clone(), surface);
        self.total_memory = self.total_memory.saturating_sub(prev.memory_size());
        self.total_memory += current.memory_size();

        if !surface.restore(prev.pixels) {
            // Stale snapshot from a different surface size: history is useless
            self.clear();
            return None;
        }
        self.redo_stack.push_back(current);
        Some(description)
    }

    /// Re-apply the most recently undone action.
    pub fn redo(&mut self, surface: &mut MaskSurface) -> Option<String> {
        let next = self.redo_stack.pop_back()?;
        let description = next.description.clone();
        let current = SurfaceSnapshot::capture(description.clone(), surface);
        self.total_memory = self.total_memory.saturating_sub(next.memory_size());
        self.total_memory += current.memory_size();

        if !surface.restore(next.pixels) {
            self.clear();
            return None;
        }
        self.undo_stack.push_back(current);
        self.prune();
        Some(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|s| s.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|s| s.description.as_str())
    }

    /// Get the current memory usage of the history (O(1) via cached total)
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    /// Drop the oldest undo entries beyond the cap
    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_history_size {
            if let Some(removed) = self.undo_stack.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                log::debug!("History full, dropped oldest entry '{}'", removed.description);
            }
        }
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::DisplaySize;
    use image::Rgba;

    fn surface() -> MaskSurface {
        MaskSurface::new(DisplaySize { width: 8, height: 8 })
    }

    fn paint(s: &mut MaskSurface, i: u32) {
        s.pixels_mut().put_pixel(i % 8, i / 8, Rgba([255, 0, 0, 200]));
    }

    #[test]
    fn undo_on_empty_is_noop() {
        let mut h = HistoryManager::default();
        let mut s = surface();
        assert!(h.undo(&mut s).is_none());
        assert!(h.redo(&mut s).is_none());
        assert_eq!(s, surface());
    }

    #[test]
    fn undo_then_redo_round_trips() {
        let mut h = HistoryManager::default();
        let mut s = surface();
        h.record_before_change("Brush stroke", &s);
        paint(&mut s, 3);
        let painted = s.clone();

        assert_eq!(h.undo(&mut s).as_deref(), Some("Brush stroke"));
        assert_eq!(s, surface());
        assert!(h.can_redo());
        assert_eq!(h.redo_description(), Some("Brush stroke"));
        assert_eq!(h.undo_description(), None);

        assert_eq!(h.redo(&mut s).as_deref(), Some("Brush stroke"));
        assert_eq!(s, painted);
    }

    #[test]
    fn new_action_discards_redo_branch() {
        let mut h = HistoryManager::default();
        let mut s = surface();
        h.record_before_change("a", &s);
        paint(&mut s, 1);
        h.undo(&mut s);
        assert_eq!(h.redo_count(), 1);
        h.record_before_change("b", &s);
        assert_eq!(h.redo_count(), 0);
        assert_eq!(h.undo_description(), Some("b"));
    }

    #[test]
    fn cap_drops_oldest() {
        let mut h = HistoryManager::new(3);
        let mut s = surface();
        for i in 0..5 {
            h.record_before_change(format!("step {}", i), &s);
            paint(&mut s, i);
        }
        assert_eq!(h.undo_count(), 3);
        assert_eq!(h.memory_usage(), 3 * 8 * 8 * 4);
    }

    #[test]
    fn snapshot_from_other_size_clears_history() {
        let mut h = HistoryManager::default();
        let s = surface();
        h.record_before_change("a", &s);
        let mut other = MaskSurface::new(DisplaySize { width: 4, height: 4 });
        assert!(h.undo(&mut other).is_none());
        assert!(!h.can_undo());
        assert_eq!(h.memory_usage(), 0);
    }
}
