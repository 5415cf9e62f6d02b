//! Utilities for raw capturer implementations: damage accumulation between
//! captures, resolution change tracking, and a two-slot frame queue.

use std::sync::Mutex;

use crate::geometry::{DesktopRect, DesktopSize};
use crate::region::DesktopRegion;

/// Accumulates invalidated regions on behalf of a capturer. The region may be
/// invalidated from OS callbacks on another thread, so it sits behind a
/// mutex; everything else belongs to the capture thread.
#[derive(Default)]
pub struct CapturerHelper {
    invalid_region: Mutex<DesktopRegion>,
    size_most_recent: DesktopSize,
    log_grid_size: i32,
}

impl CapturerHelper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_invalid_region(&self) {
        self.invalid_region.lock().unwrap().clear();
    }

    pub fn invalidate_region(&self, invalid_region: &DesktopRegion) {
        self.invalid_region.lock().unwrap().add_region(invalid_region);
    }

    pub fn invalidate_screen(&self, size: DesktopSize) {
        self.invalid_region
            .lock()
            .unwrap()
            .add_rect(&DesktopRect::from_size(size));
    }

    /// Takes the accumulated invalid region, leaving it empty for the next
    /// frame. With a grid size configured the result is expanded to grid
    /// alignment and clipped to the most recent screen size.
    pub fn take_invalid_region(&self) -> DesktopRegion {
        let mut region = std::mem::take(&mut *self.invalid_region.lock().unwrap());
        if self.log_grid_size >= 1 {
            let mut expanded = expand_to_grid(&region, self.log_grid_size);
            expanded.intersect_with_rect(&DesktopRect::from_size(self.size_most_recent));
            region = expanded;
        }
        region
    }

    pub fn size_most_recent(&self) -> DesktopSize {
        self.size_most_recent
    }

    pub fn set_size_most_recent(&mut self, size: DesktopSize) {
        self.size_most_recent = size;
    }

    /// Makes `take_invalid_region` snap damage outwards to a grid of
    /// `2 ^ log_grid_size` pixels. Values below 1 disable the expansion.
    pub fn set_log_grid_size(&mut self, log_grid_size: i32) {
        self.log_grid_size = log_grid_size;
    }
}

/// Expands a region so every rectangle vertex lies on a grid of
/// `2 ^ log_grid_size` pixels.
pub fn expand_to_grid(region: &DesktopRegion, log_grid_size: i32) -> DesktopRegion {
    assert!(log_grid_size >= 1);
    let mask = (1 << log_grid_size) - 1;
    let mut result = DesktopRegion::new();
    for rect in region.iter() {
        let left = rect.left() & !mask;
        let top = rect.top() & !mask;
        let right = (rect.right() + mask) & !mask;
        let bottom = (rect.bottom() + mask) & !mask;
        result.add_rect(&DesktopRect::ltrb(left, top, right, bottom));
    }
    result
}

/// Reports when the source resolution changes between captures.
#[derive(Default)]
pub struct ResolutionTracker {
    last_size: DesktopSize,
    initialized: bool,
}

impl ResolutionTracker {
    /// Records `size`. Returns true when a previous size was recorded and
    /// differs.
    pub fn set_resolution(&mut self, size: DesktopSize) -> bool {
        let changed = self.initialized && self.last_size != size;
        self.last_size = size;
        self.initialized = true;
        changed
    }

    pub fn reset(&mut self) {
        self.initialized = false;
    }
}

/// A queue of two reusable frames: the one being written and its
/// predecessor. Callers allocate when `current_frame` is `None` and mark all
/// slots for reallocation by resetting.
pub struct FrameQueue<T> {
    frames: [Option<T>; 2],
    current: usize,
}

impl<T> Default for FrameQueue<T> {
    fn default() -> Self {
        Self {
            frames: [None, None],
            current: 0,
        }
    }
}

impl<T> FrameQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the current frame the previous one.
    pub fn move_to_next_frame(&mut self) {
        self.current = (self.current + 1) % 2;
    }

    pub fn replace_current_frame(&mut self, frame: T) {
        self.frames[self.current] = Some(frame);
    }

    pub fn reset(&mut self) {
        self.frames = [None, None];
        self.current = 0;
    }

    pub fn current_frame(&self) -> Option<&T> {
        self.frames[self.current].as_ref()
    }

    pub fn current_frame_mut(&mut self) -> Option<&mut T> {
        self.frames[self.current].as_mut()
    }

    pub fn previous_frame(&self) -> Option<&T> {
        self.frames[(self.current + 1) % 2].as_ref()
    }
}
