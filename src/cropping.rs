//! A window capturer that captures the screen and crops.
//!
//! Capturing a whole screen is often much faster than capturing a single
//! window, so when the selected window is opaque, rectangular, fully on
//! screen and not covered by anything, the screen capturer runs and the
//! frame is cropped to the window area. In every other case the ordinary
//! window capturer takes over for that tick.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::capturer::{
    CaptureCallback, CaptureResult, DesktopCapturer, SharedCaptureCallback, Source, SourceId,
    WindowId, SCREEN_ID_FULL, WINDOW_ID_NULL,
};
use crate::environment::{Translucency, WindowEnvironment, WindowRegionKind};
use crate::full_screen::FullScreenWindowDetector;
use crate::geometry::{DesktopRect, DesktopVector};
use crate::shared_memory::SharedMemoryFactory;

struct CropShared {
    window_capturer: Box<dyn DesktopCapturer>,
    env: Arc<dyn WindowEnvironment>,
    detector: Option<Arc<FullScreenWindowDetector>>,
    callback: Option<SharedCaptureCallback>,
    selected_window: WindowId,
    excluded_window: WindowId,
    // Window rect clipped to the window's region, in desktop coordinates.
    // Refreshed by should_use_screen_capturer.
    window_region_rect: DesktopRect,
    fullscreen_usage_logged: bool,
}

impl CropShared {
    // The selected window, or the full-screen companion nominated by the
    // detector.
    fn window_to_capture(&mut self) -> WindowId {
        let selected = self.selected_window;
        let full_screen = self
            .detector
            .as_ref()
            .map(|detector| detector.find_full_screen_window(selected))
            .unwrap_or(WINDOW_ID_NULL);
        if full_screen != WINDOW_ID_NULL && full_screen != selected {
            if !self.fullscreen_usage_logged {
                self.fullscreen_usage_logged = true;
                debug!(selected, full_screen, "redirecting capture to full-screen window");
            }
            full_screen
        } else {
            selected
        }
    }

    fn refresh_full_screen_detector(&mut self) {
        let Some(detector) = &self.detector else {
            return;
        };
        let env = Arc::clone(&self.env);
        detector.update_window_list_if_needed(self.selected_window, move |sources| {
            // The detector needs the full list, including windows with empty
            // titles.
            sources.extend(
                env.capturable_windows()
                    .into_iter()
                    .map(|entry| Source::new(entry.id, entry.title)),
            );
            true
        });
    }

    // The decision procedure: capture the screen only when cropping it can
    // reproduce the window capture exactly.
    fn should_use_screen_capturer(&mut self) -> bool {
        let selected = self.window_to_capture();

        // The window exists, is visible on the current desktop, and is not
        // minimized.
        if !self.env.is_window_visible_on_current_desktop(selected) {
            return false;
        }
        let Some(placement) = self.env.window_placement(selected) else {
            return false;
        };
        if placement.minimized {
            return false;
        }

        // Translucent layered windows never match the screen content.
        match placement.translucency {
            Translucency::Opaque => {}
            Translucency::WindowAlpha(alpha) if alpha == 0xff => {}
            _ => return false,
        }

        let mut window_region_rect = placement.rect;
        let mut content_rect = placement.content_rect;
        match placement.region {
            WindowRegionKind::Complex | WindowRegionKind::Null => return false,
            WindowRegionKind::Simple(region) => {
                // The region is in window coordinates.
                let region = region.translated(placement.rect.left(), placement.rect.top());
                window_region_rect.intersect_with(&region);
                content_rect.intersect_with(&region);
            }
            WindowRegionKind::Rectangular => {}
        }
        self.window_region_rect = window_region_rect;

        // When the window is maximized only the content area is on screen;
        // anything hanging off the virtual screen cannot be cropped out of a
        // screen frame.
        if !self.env.virtual_screen_rect().contains_rect(&content_rect) {
            return false;
        }

        self.is_window_on_top(selected, &content_rect)
    }

    // Walks the z-order from the top; any visible, non-excluded, non-owned
    // window overlapping the content rect above the selected one disqualifies
    // screen capture.
    fn is_window_on_top(&self, selected: WindowId, content_rect: &DesktopRect) -> bool {
        for id in self.env.windows_in_z_order() {
            if id == selected {
                return true;
            }
            if id == self.excluded_window {
                continue;
            }
            if !self.env.is_window_visible_on_current_desktop(id) {
                continue;
            }
            if self.env.is_window_owned_by(id, selected) {
                continue;
            }
            let Some(placement) = self.env.window_placement(id) else {
                continue;
            };
            let mut overlap = placement.rect;
            overlap.intersect_with(content_rect);
            if !overlap.is_empty() {
                return false;
            }
        }
        // The selected window disappeared during enumeration, likely closed.
        warn!(selected, "selected window not found in z-order enumeration");
        false
    }

    // The area to crop out of a screen frame, relative to the virtual screen
    // origin.
    fn window_rect_in_virtual_screen(&mut self) -> DesktopRect {
        let selected = self.window_to_capture();
        let Some(placement) = self.env.window_placement(selected) else {
            warn!(selected, "failed to get window placement");
            return DesktopRect::default();
        };
        let mut rect = placement.content_rect;
        rect.intersect_with(&self.window_region_rect);

        let screen_rect = self.env.virtual_screen_rect();
        rect.intersect_with(&screen_rect);
        rect.translated(-screen_rect.left(), -screen_rect.top())
    }
}

/// Captures a window by cropping full-screen frames whenever that is safe,
/// and falls back to `window_capturer` otherwise.
pub struct CroppingWindowCapturer {
    screen_capturer: Box<dyn DesktopCapturer>,
    shared: Arc<Mutex<CropShared>>,
}

impl CroppingWindowCapturer {
    pub fn new(
        window_capturer: Box<dyn DesktopCapturer>,
        screen_capturer: Box<dyn DesktopCapturer>,
        env: Arc<dyn WindowEnvironment>,
        detector: Option<Arc<FullScreenWindowDetector>>,
    ) -> Self {
        Self {
            screen_capturer,
            shared: Arc::new(Mutex::new(CropShared {
                window_capturer,
                env,
                detector,
                callback: None,
                selected_window: WINDOW_ID_NULL,
                excluded_window: WINDOW_ID_NULL,
                window_region_rect: DesktopRect::default(),
                fullscreen_usage_logged: false,
            })),
        }
    }
}

impl DesktopCapturer for CroppingWindowCapturer {
    fn start(&mut self, callback: SharedCaptureCallback) {
        {
            let mut shared = self.shared.lock().unwrap();
            shared.callback = Some(Arc::clone(&callback));
            // Window capture results need no post-processing.
            shared.window_capturer.start(callback);
        }
        let sink = ScreenSink {
            shared: Arc::clone(&self.shared),
        };
        self.screen_capturer.start(Arc::new(Mutex::new(sink)));
        self.screen_capturer.select_source(SCREEN_ID_FULL);
    }

    fn capture_frame(&mut self) {
        let use_screen = {
            let mut shared = self.shared.lock().unwrap();
            shared.refresh_full_screen_detector();
            let target = shared.window_to_capture();
            shared.window_capturer.select_source(target);
            shared.should_use_screen_capturer()
        };
        if use_screen {
            self.screen_capturer.capture_frame();
        } else {
            self.shared.lock().unwrap().window_capturer.capture_frame();
        }
    }

    fn get_source_list(&mut self, sources: &mut Vec<Source>) -> bool {
        self.shared.lock().unwrap().window_capturer.get_source_list(sources)
    }

    fn select_source(&mut self, id: SourceId) -> bool {
        let mut shared = self.shared.lock().unwrap();
        shared.selected_window = id;
        shared.window_capturer.select_source(id)
    }

    fn focus_on_selected_source(&mut self) -> bool {
        self.shared.lock().unwrap().window_capturer.focus_on_selected_source()
    }

    fn set_excluded_window(&mut self, window: WindowId) {
        let mut shared = self.shared.lock().unwrap();
        shared.excluded_window = window;
        shared.window_capturer.set_excluded_window(window);
        drop(shared);
        self.screen_capturer.set_excluded_window(window);
    }

    fn set_shared_memory_factory(&mut self, factory: Option<Arc<dyn SharedMemoryFactory>>) {
        self.shared
            .lock()
            .unwrap()
            .window_capturer
            .set_shared_memory_factory(factory.clone());
        self.screen_capturer.set_shared_memory_factory(factory);
    }

    fn is_occluded(&mut self, pos: DesktopVector) -> bool {
        self.shared.lock().unwrap().window_capturer.is_occluded(pos)
            || self.screen_capturer.is_occluded(pos)
    }

    fn set_max_frame_rate(&mut self, max_frame_rate: u32) {
        self.shared
            .lock()
            .unwrap()
            .window_capturer
            .set_max_frame_rate(max_frame_rate);
        self.screen_capturer.set_max_frame_rate(max_frame_rate);
    }

    fn current_capturer_id(&self) -> u32 {
        self.screen_capturer.current_capturer_id()
    }
}

struct ScreenSink {
    shared: Arc<Mutex<CropShared>>,
}

impl CaptureCallback for ScreenSink {
    fn on_capture_start(&mut self) {
        let callback = self.shared.lock().unwrap().callback.clone();
        if let Some(callback) = callback {
            callback.lock().unwrap().on_capture_start();
        }
    }

    fn on_capture_result(&mut self, result: CaptureResult) {
        let mut shared = self.shared.lock().unwrap();
        let callback = shared
            .callback
            .clone()
            .expect("capture result before start()");

        // The window may have lost its top position while the screen frame
        // was in flight; retry with the window capturer in the same tick.
        if !shared.should_use_screen_capturer() {
            debug!("window no longer croppable when screen frame arrived");
            shared.window_capturer.capture_frame();
            return;
        }

        let output = match result {
            CaptureResult::Success(frame) => {
                let window_rect = shared.window_rect_in_virtual_screen();
                if window_rect.is_empty() {
                    debug!("croppable area is empty");
                    CaptureResult::ErrorTemporary
                } else {
                    match frame.crop(window_rect) {
                        Some(mut cropped) => {
                            cropped.set_top_left(window_rect.top_left());
                            CaptureResult::Success(cropped)
                        }
                        None => CaptureResult::ErrorTemporary,
                    }
                }
            }
            other => other,
        };
        drop(shared);
        callback.lock().unwrap().on_capture_result(output);
    }
}
