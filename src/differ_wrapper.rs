//! A wrapper that fills in an accurate updated region by comparing each
//! successful frame with the previous one.
//!
//! Whatever region the inner capturer reports is treated as a set of hints
//! that must be a superset of the real damage; the block differ then narrows
//! each hint down to the blocks that actually changed.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::capturer::{
    CaptureCallback, CaptureResult, DesktopCapturer, SharedCaptureCallback, Source, SourceId,
    WindowId,
};
use crate::differ;
use crate::frame::SharedDesktopFrame;
use crate::geometry::{DesktopRect, DesktopVector};
use crate::region::DesktopRegion;
use crate::shared_memory::SharedMemoryFactory;

struct DifferState {
    callback: Option<SharedCaptureCallback>,
    last_frame: Option<SharedDesktopFrame>,
}

pub struct DifferWrapperCapturer {
    inner: Box<dyn DesktopCapturer>,
    state: Arc<Mutex<DifferState>>,
}

impl DifferWrapperCapturer {
    pub fn new(inner: Box<dyn DesktopCapturer>) -> Self {
        Self {
            inner,
            state: Arc::new(Mutex::new(DifferState {
                callback: None,
                last_frame: None,
            })),
        }
    }
}

impl DesktopCapturer for DifferWrapperCapturer {
    fn start(&mut self, callback: SharedCaptureCallback) {
        self.state.lock().unwrap().callback = Some(callback);
        let sink = DifferSink {
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
        // A new source is a fresh start: the next frame must report the full
        // rectangle rather than a diff against another source's content.
        self.state.lock().unwrap().last_frame = None;
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

struct DifferSink {
    state: Arc<Mutex<DifferState>>,
}

impl CaptureCallback for DifferSink {
    fn on_capture_start(&mut self) {
        let callback = self.state.lock().unwrap().callback.clone();
        if let Some(callback) = callback {
            callback.lock().unwrap().on_capture_start();
        }
    }

    fn on_capture_result(&mut self, result: CaptureResult) {
        let started = Instant::now();
        let (callback, output) = {
            let mut state = self.state.lock().unwrap();
            let callback = state
                .callback
                .clone()
                .expect("capture result before start()");

            let output = match result {
                CaptureResult::Success(mut frame) => {
                    if let Some(last) = &state.last_frame {
                        if last.size() != frame.size() || last.stride() != frame.stride() {
                            state.last_frame = None;
                        }
                    }

                    if let Some(last) = &state.last_frame {
                        let hints = std::mem::take(frame.updated_region_mut());
                        let mut damage = DesktopRegion::new();
                        for rect in hints.iter() {
                            differ::compare_frames(
                                last.as_frame(),
                                frame.as_frame(),
                                rect,
                                &mut damage,
                            );
                        }
                        *frame.updated_region_mut() = damage;
                    } else {
                        let size = frame.size();
                        frame
                            .updated_region_mut()
                            .set_rect(DesktopRect::from_size(size));
                    }
                    state.last_frame = Some(frame.share());

                    let elapsed_ms = started.elapsed().as_millis() as i64;
                    frame.set_capture_time_ms(frame.capture_time_ms() + elapsed_ms);
                    CaptureResult::Success(frame)
                }
                other => other,
            };
            (callback, output)
        };
        callback.lock().unwrap().on_capture_result(output);
    }
}
