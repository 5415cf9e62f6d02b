//! The capture contract: sources, capture results, callbacks and the
//! [`DesktopCapturer`] trait that raw platform producers and all wrappers
//! implement.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use once_cell::sync::Lazy;

use crate::frame::SharedDesktopFrame;
use crate::geometry::DesktopVector;
use crate::shared_memory::SharedMemoryFactory;

/// Identifies a capturable source. Values are opaque platform handles: a
/// monitor index, a display id, or a window handle cast to `i64`.
pub type SourceId = i64;

/// Identifies a screen. Shares the value space with [`SourceId`].
pub type ScreenId = i64;

/// Identifies a window. Shares the value space with [`SourceId`].
pub type WindowId = i64;

/// Selects the union of all screens.
pub const SCREEN_ID_FULL: ScreenId = -1;

pub const SCREEN_ID_INVALID: ScreenId = -2;

pub const WINDOW_ID_NULL: WindowId = 0;

pub const DISPLAY_ID_INVALID: i64 = -1;

/// FourCC-like tags attached to frames to identify the producing
/// implementation.
pub mod capture_id {
    pub const fn four_cc(a: u8, b: u8, c: u8, d: u8) -> u32 {
        (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
    }

    pub const UNKNOWN: u32 = 0;
    pub const WGC: u32 = 1;
    pub const GDI_SCREEN: u32 = four_cc(b'G', b'D', b'I', b' ');
    pub const DXGI: u32 = four_cc(b'D', b'X', b'G', b'I');
    pub const X11: u32 = four_cc(b'X', b'1', b'1', b' ');
    pub const WAYLAND: u32 = four_cc(b'W', b'L', b' ', b' ');
    pub const FAKE: u32 = four_cc(b'F', b'A', b'K', b'E');
}

/// A nameable capturable unit: a monitor or a top-level window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Opaque platform-specific handle. This is the value to pass to
    /// [`DesktopCapturer::select_source`].
    pub id: SourceId,
    /// UTF-8 title of the window or screen; may be empty and must not be used
    /// to identify a source.
    pub title: String,
    /// OS-stable display identifier when available.
    pub display_id: i64,
}

impl Source {
    pub fn new(id: SourceId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            display_id: DISPLAY_ID_INVALID,
        }
    }
}

/// Outcome of a single `capture_frame` call. A frame is present if and only
/// if the capture succeeded.
#[derive(Debug)]
pub enum CaptureResult {
    Success(SharedDesktopFrame),
    /// The caller should retry at the next tick.
    ErrorTemporary,
    /// The source can never produce frames again.
    ErrorPermanent,
}

impl CaptureResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CaptureResult::Success(_))
    }

    pub fn frame(&self) -> Option<&SharedDesktopFrame> {
        match self {
            CaptureResult::Success(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn into_frame(self) -> Option<SharedDesktopFrame> {
        match self {
            CaptureResult::Success(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Receives capture results. Exactly one `on_capture_result` call is made per
/// `capture_frame` call on the owning capturer.
pub trait CaptureCallback: Send {
    /// Called before a frame capture is started.
    fn on_capture_start(&mut self) {}

    fn on_capture_result(&mut self, result: CaptureResult);
}

/// Callback handle shared between a capturer and the wrappers interposed on
/// it. All calls on one capturer happen on one thread; the mutex only guards
/// against misuse.
pub type SharedCaptureCallback = Arc<Mutex<dyn CaptureCallback>>;

/// Screen and window capturers, raw or wrapped.
///
/// `start` must be called before the first `capture_frame`, and the callback
/// stays in place for the capturer's lifetime. Dropping the capturer is the
/// only way to stop capturing.
pub trait DesktopCapturer: Send {
    fn start(&mut self, callback: SharedCaptureCallback);

    /// Captures one frame and delivers the result through the callback
    /// exactly once.
    fn capture_frame(&mut self);

    /// Appends the currently capturable sources to `sources`. Returns false
    /// on enumeration failure. Order is implementation-defined but stable
    /// within one call.
    fn get_source_list(&mut self, sources: &mut Vec<Source>) -> bool {
        let _ = sources;
        false
    }

    /// Switches subsequent captures to `id`. Returns false when the id is not
    /// recognized; that is an argument error, not a capture error.
    fn select_source(&mut self, id: SourceId) -> bool {
        let _ = id;
        false
    }

    /// Best effort; brings the selected source to the front.
    fn focus_on_selected_source(&mut self) -> bool {
        false
    }

    /// Best effort; excludes `window` from captured pixels (used to hide a
    /// "you are sharing" indicator).
    fn set_excluded_window(&mut self, window: WindowId) {
        let _ = window;
    }

    /// Supplies an allocator for frame buffers. `None` reverts to heap
    /// allocation.
    fn set_shared_memory_factory(&mut self, factory: Option<Arc<dyn SharedMemoryFactory>>) {
        let _ = factory;
    }

    /// Whether the desktop-coordinate point `pos` on the selected source is
    /// hidden by other windows.
    fn is_occluded(&mut self, pos: DesktopVector) -> bool {
        let _ = pos;
        false
    }

    /// Best effort cap on how often new frames become available.
    fn set_max_frame_rate(&mut self, max_frame_rate: u32) {
        let _ = max_frame_rate;
    }

    /// Tag identifying the producing implementation, see [`capture_id`].
    fn current_capturer_id(&self) -> u32 {
        capture_id::UNKNOWN
    }
}

static CLOCK_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Milliseconds on a process-wide monotonic clock. Used for capture
/// timestamps and the full-screen detector's refresh throttle.
pub(crate) fn monotonic_ms() -> i64 {
    CLOCK_EPOCH.elapsed().as_millis() as i64
}
