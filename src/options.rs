//! Configuration bag for creating capturers.

use std::sync::Arc;

use crate::capturer::DesktopCapturer;
use crate::environment::WindowEnvironment;
use crate::frame::BgraPixel;
use crate::full_screen::FullScreenWindowDetector;

/// Creates a raw platform capturer for the given options, or `None` when the
/// backend is unavailable. This is the seam through which platform producers
/// (DXGI, WGC, GDI, ScreenCaptureKit, PipeWire, ...) plug into the core.
pub type RawCapturerFactory =
    Arc<dyn Fn(&CaptureOptions) -> Option<Box<dyn DesktopCapturer>> + Send + Sync>;

/// Configuration of the blank-frame detector applied to a raw capturer.
#[derive(Debug, Clone, Copy)]
pub struct BlankDetection {
    /// The pixel value a blank frame consists of.
    pub blank_pixel: BgraPixel,
    /// Restart detection on every source change.
    pub check_per_capture: bool,
}

impl Default for BlankDetection {
    fn default() -> Self {
        Self {
            blank_pixel: BgraPixel::BLACK,
            check_per_capture: false,
        }
    }
}

/// Initialization parameters for screen and window capturers.
#[derive(Clone)]
pub struct CaptureOptions {
    /// Wrap the capturer with the frame differ so `updated_region()` is
    /// accurate even when the producer cannot report damage.
    pub detect_updated_region: bool,
    /// Ask the OS to disable desktop compositor effects while capturing.
    pub disable_effects: bool,
    /// Accept frames with the cursor composited into the pixels; such frames
    /// report `may_contain_cursor`.
    pub prefer_cursor_embedded: bool,
    /// Use OS damage notifications (e.g. XDAMAGE) where available.
    pub use_update_notifications: bool,
    /// Include the calling process's own windows in enumeration.
    pub enumerate_current_process_windows: bool,

    // Windows backends.
    pub allow_directx_capturer: bool,
    pub allow_wgc_screen_capturer: bool,
    pub allow_wgc_window_capturer: bool,
    pub allow_wgc_capturer_fallback: bool,
    pub allow_wgc_zero_hertz: bool,
    pub allow_cropping_window_capturer: bool,

    // macOS backends.
    pub allow_iosurface: bool,
    pub allow_sck_capturer: bool,

    // Linux backends.
    pub allow_pipewire: bool,
    pub pipewire_use_damage_region: bool,
    pub pipewire_width: u32,
    pub pipewire_height: u32,

    /// Suppress solid frames during display reconfiguration.
    pub blank_frame_detection: Option<BlankDetection>,
    /// Redirect window capture to full-screen companion windows.
    pub full_screen_window_detector: Option<Arc<FullScreenWindowDetector>>,
    /// OS window/monitor queries, required by the cropping capturer and the
    /// full-screen detector.
    pub window_environment: Option<Arc<dyn WindowEnvironment>>,

    /// Produces the raw screen capturer.
    pub raw_screen_factory: Option<RawCapturerFactory>,
    /// Produces the backup screen capturer paired through the fallback
    /// wrapper.
    pub secondary_screen_factory: Option<RawCapturerFactory>,
    /// Produces the raw window capturer.
    pub raw_window_factory: Option<RawCapturerFactory>,
    /// Produces a capturer serving both screens and windows.
    pub raw_generic_factory: Option<RawCapturerFactory>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            detect_updated_region: false,
            disable_effects: true,
            prefer_cursor_embedded: false,
            use_update_notifications: cfg!(target_os = "linux"),
            enumerate_current_process_windows: true,
            allow_directx_capturer: true,
            allow_wgc_screen_capturer: false,
            allow_wgc_window_capturer: false,
            allow_wgc_capturer_fallback: false,
            allow_wgc_zero_hertz: true,
            allow_cropping_window_capturer: false,
            allow_iosurface: false,
            allow_sck_capturer: false,
            allow_pipewire: false,
            pipewire_use_damage_region: true,
            pipewire_width: 0,
            pipewire_height: 0,
            blank_frame_detection: None,
            full_screen_window_detector: None,
            window_environment: None,
            raw_screen_factory: None,
            secondary_screen_factory: None,
            raw_window_factory: None,
            raw_generic_factory: None,
        }
    }
}

impl CaptureOptions {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for CaptureOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureOptions")
            .field("detect_updated_region", &self.detect_updated_region)
            .field("disable_effects", &self.disable_effects)
            .field("prefer_cursor_embedded", &self.prefer_cursor_embedded)
            .field("use_update_notifications", &self.use_update_notifications)
            .field("allow_cropping_window_capturer", &self.allow_cropping_window_capturer)
            .field("blank_frame_detection", &self.blank_frame_detection)
            .finish_non_exhaustive()
    }
}
