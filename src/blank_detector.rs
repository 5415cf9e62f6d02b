//! A wrapper that suppresses fully solid frames.
//!
//! Some producers hand out all-black frames during transient display
//! reconfigurations. Until a non-blank frame has been seen on the current
//! source, every captured frame is sampled; blank ones are converted into
//! temporary errors so the consumer simply retries.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::capturer::{
    CaptureCallback, CaptureResult, DesktopCapturer, SharedCaptureCallback, Source, SourceId,
    WindowId,
};
use crate::frame::{BgraPixel, DesktopFrame};
use crate::geometry::DesktopVector;
use crate::shared_memory::SharedMemoryFactory;

// Sampling stride over the linearized image. Checks roughly 7500 pixels of a
// 1024x768 frame, enough to catch any pattern covering more than a fraction
// of a percent of the surface.
const SAMPLE_STRIDE: i32 = 105;

struct BlankState {
    callback: Option<SharedCaptureCallback>,
    blank_pixel: BgraPixel,
    is_first_frame: bool,
    non_blank_frame_received: bool,
    last_frame_is_blank: bool,
}

/// Wraps `inner` and withholds frames that are entirely `blank_pixel`.
pub struct BlankDetectorCapturer {
    inner: Box<dyn DesktopCapturer>,
    state: Arc<Mutex<BlankState>>,
    check_per_capture: bool,
}

impl BlankDetectorCapturer {
    /// `check_per_capture` restarts blank detection whenever a new source is
    /// selected; otherwise the first non-blank frame disables it for good.
    pub fn new(
        inner: Box<dyn DesktopCapturer>,
        blank_pixel: BgraPixel,
        check_per_capture: bool,
    ) -> Self {
        Self {
            inner,
            state: Arc::new(Mutex::new(BlankState {
                callback: None,
                blank_pixel,
                is_first_frame: true,
                non_blank_frame_received: false,
                last_frame_is_blank: false,
            })),
            check_per_capture,
        }
    }
}

impl DesktopCapturer for BlankDetectorCapturer {
    fn start(&mut self, callback: SharedCaptureCallback) {
        self.state.lock().unwrap().callback = Some(callback);
        let sink = BlankSink {
            state: Arc::clone(&self.state),
        };
        self.inner.start(Arc::new(Mutex::new(sink)));
    }

    fn capture_frame(&mut self) {
        self.inner.capture_frame();
    }

    fn get_source_list(&mut self, sources: &mut Vec<Source>) -> bool {
        self.inner.get_source_list(sources)
    }

    fn select_source(&mut self, id: SourceId) -> bool {
        if self.check_per_capture {
            // A new source must prove itself non-blank again.
            let mut state = self.state.lock().unwrap();
            state.is_first_frame = true;
            state.non_blank_frame_received = false;
        }
        self.inner.select_source(id)
    }

    fn focus_on_selected_source(&mut self) -> bool {
        self.inner.focus_on_selected_source()
    }

    fn set_excluded_window(&mut self, window: WindowId) {
        self.inner.set_excluded_window(window);
    }

    fn set_shared_memory_factory(&mut self, factory: Option<Arc<dyn SharedMemoryFactory>>) {
        self.inner.set_shared_memory_factory(factory);
    }

    fn is_occluded(&mut self, pos: DesktopVector) -> bool {
        self.inner.is_occluded(pos)
    }

    fn set_max_frame_rate(&mut self, max_frame_rate: u32) {
        self.inner.set_max_frame_rate(max_frame_rate);
    }

    fn current_capturer_id(&self) -> u32 {
        self.inner.current_capturer_id()
    }
}

struct BlankSink {
    state: Arc<Mutex<BlankState>>,
}

impl CaptureCallback for BlankSink {
    fn on_capture_start(&mut self) {
        let callback = self.state.lock().unwrap().callback.clone();
        if let Some(callback) = callback {
            callback.lock().unwrap().on_capture_start();
        }
    }

    fn on_capture_result(&mut self, result: CaptureResult) {
        let (callback, output) = {
            let mut state = self.state.lock().unwrap();
            let callback = state
                .callback
                .clone()
                .expect("capture result before start()");

            let output = match result {
                CaptureResult::Success(frame) if !state.non_blank_frame_received => {
                    // An unchanged frame cannot have become blank, so only
                    // recheck when something changed or nothing was checked
                    // yet.
                    if !frame.updated_region().is_empty() || state.is_first_frame {
                        state.last_frame_is_blank =
                            is_blank_frame(frame.as_frame(), state.blank_pixel);
                        state.is_first_frame = false;
                    }

                    if state.last_frame_is_blank {
                        debug!("suppressing blank frame");
                        CaptureResult::ErrorTemporary
                    } else {
                        state.non_blank_frame_received = true;
                        CaptureResult::Success(frame)
                    }
                }
                other => other,
            };
            (callback, output)
        };
        callback.lock().unwrap().on_capture_result(output);
    }
}

fn is_blank_frame(frame: &DesktopFrame, blank_pixel: BgraPixel) -> bool {
    let width = frame.size().width();
    let height = frame.size().height();
    let mut index = 0;
    while index < width * height {
        let pos = DesktopVector::new(index % width, index / width);
        if frame.pixel_at(pos) != blank_pixel {
            return false;
        }
        index += SAMPLE_STRIDE;
    }

    // The center pixel is verified as well.
    frame.pixel_at(DesktopVector::new(width / 2, height / 2)) == blank_pixel
}
