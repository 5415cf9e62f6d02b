//! A wrapper that pairs a preferred capturer with a more reliable backup.
//!
//! Every call goes to the primary capturer until it reports a permanent
//! error; from then on the secondary serves for the rest of the wrapper's
//! lifetime. A failing tick is never dropped: when the primary fails, the
//! secondary captures within the same tick, so the consumer still receives
//! exactly one result per `capture_frame` call.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::capturer::{
    CaptureCallback, CaptureResult, DesktopCapturer, SharedCaptureCallback, Source, SourceId,
    WindowId,
};
use crate::geometry::DesktopVector;
use crate::shared_memory::SharedMemoryFactory;

struct FallbackShared {
    secondary: Box<dyn DesktopCapturer>,
    callback: Option<SharedCaptureCallback>,
    primary_permanent_error: bool,
}

pub struct FallbackCapturer {
    primary: Box<dyn DesktopCapturer>,
    shared: Arc<Mutex<FallbackShared>>,
}

impl FallbackCapturer {
    pub fn new(primary: Box<dyn DesktopCapturer>, secondary: Box<dyn DesktopCapturer>) -> Self {
        Self {
            primary,
            shared: Arc::new(Mutex::new(FallbackShared {
                secondary,
                callback: None,
                primary_permanent_error: false,
            })),
        }
    }

    fn primary_failed(&self) -> bool {
        self.shared.lock().unwrap().primary_permanent_error
    }
}

impl DesktopCapturer for FallbackCapturer {
    fn start(&mut self, callback: SharedCaptureCallback) {
        {
            let mut shared = self.shared.lock().unwrap();
            shared.callback = Some(Arc::clone(&callback));
            // The secondary has no backup plan of its own, so its results go
            // straight to the consumer.
            shared.secondary.start(callback);
        }
        // The primary's results are intercepted to decide whether the
        // secondary should take over.
        let sink = PrimarySink {
            shared: Arc::clone(&self.shared),
        };
        self.primary.start(Arc::new(Mutex::new(sink)));
    }

    fn capture_frame(&mut self) {
        if self.primary_failed() {
            self.shared.lock().unwrap().secondary.capture_frame();
        } else {
            self.primary.capture_frame();
        }
    }

    fn get_source_list(&mut self, sources: &mut Vec<Source>) -> bool {
        if self.primary_failed() {
            return self.shared.lock().unwrap().secondary.get_source_list(sources);
        }
        self.primary.get_source_list(sources)
    }

    fn select_source(&mut self, id: SourceId) -> bool {
        if self.primary_failed() {
            return self.shared.lock().unwrap().secondary.select_source(id);
        }
        if !self.primary.select_source(id) {
            warn!(id, "primary capturer rejected source, switching to secondary");
            self.shared.lock().unwrap().primary_permanent_error = true;
        }
        // Pre-arm the secondary so a later switch does not lose the selection.
        self.shared.lock().unwrap().secondary.select_source(id)
    }

    fn focus_on_selected_source(&mut self) -> bool {
        if self.primary_failed() {
            return self.shared.lock().unwrap().secondary.focus_on_selected_source();
        }
        self.primary.focus_on_selected_source()
            || self.shared.lock().unwrap().secondary.focus_on_selected_source()
    }

    fn set_excluded_window(&mut self, window: WindowId) {
        self.primary.set_excluded_window(window);
        self.shared.lock().unwrap().secondary.set_excluded_window(window);
    }

    fn set_shared_memory_factory(&mut self, factory: Option<Arc<dyn SharedMemoryFactory>>) {
        // Both capturers draw from the same allocator.
        self.primary.set_shared_memory_factory(factory.clone());
        self.shared.lock().unwrap().secondary.set_shared_memory_factory(factory);
    }

    fn is_occluded(&mut self, pos: DesktopVector) -> bool {
        // Occlusion reported by either side counts.
        if self.primary_failed() {
            return self.shared.lock().unwrap().secondary.is_occluded(pos);
        }
        self.primary.is_occluded(pos) || self.shared.lock().unwrap().secondary.is_occluded(pos)
    }

    fn set_max_frame_rate(&mut self, max_frame_rate: u32) {
        self.primary.set_max_frame_rate(max_frame_rate);
        self.shared.lock().unwrap().secondary.set_max_frame_rate(max_frame_rate);
    }

    fn current_capturer_id(&self) -> u32 {
        if self.primary_failed() {
            return self.shared.lock().unwrap().secondary.current_capturer_id();
        }
        self.primary.current_capturer_id()
    }
}

struct PrimarySink {
    shared: Arc<Mutex<FallbackShared>>,
}

impl CaptureCallback for PrimarySink {
    fn on_capture_start(&mut self) {
        let callback = self.shared.lock().unwrap().callback.clone();
        if let Some(callback) = callback {
            callback.lock().unwrap().on_capture_start();
        }
    }

    fn on_capture_result(&mut self, result: CaptureResult) {
        match result {
            CaptureResult::Success(_) => {
                let callback = self
                    .shared
                    .lock()
                    .unwrap()
                    .callback
                    .clone()
                    .expect("capture result before start()");
                callback.lock().unwrap().on_capture_result(result);
            }
            other => {
                let mut shared = self.shared.lock().unwrap();
                if matches!(other, CaptureResult::ErrorPermanent) {
                    warn!("primary capturer failed permanently, switching to secondary");
                    shared.primary_permanent_error = true;
                } else {
                    debug!("primary capture failed, trying secondary for this tick");
                }
                // Still this tick: the secondary reports straight to the
                // consumer callback.
                shared.secondary.capture_frame();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::DesktopSize;
    use crate::testing::{
        FakeCapturer, FakeState, PainterFrameGenerator, RecordingSink, ResultKind,
    };

    struct Harness {
        capturer: FallbackCapturer,
        sink: Arc<Mutex<RecordingSink>>,
        primary: Arc<Mutex<FakeState>>,
        secondary: Arc<Mutex<FakeState>>,
    }

    // The primary produces 100x100 frames and the secondary 50x50 ones, so a
    // recorded result reveals which capturer served it.
    fn harness() -> Harness {
        crate::testing::init_test_logging();
        let (primary, primary_state) = FakeCapturer::with_generator(Box::new(
            PainterFrameGenerator::new(DesktopSize::new(100, 100)),
        ));
        let (secondary, secondary_state) = FakeCapturer::with_generator(Box::new(
            PainterFrameGenerator::new(DesktopSize::new(50, 50)),
        ));
        let mut capturer = FallbackCapturer::new(Box::new(primary), Box::new(secondary));
        let sink = RecordingSink::new_shared();
        capturer.start(sink.clone());
        Harness {
            capturer,
            sink,
            primary: primary_state,
            secondary: secondary_state,
        }
    }

    fn frame_widths(sink: &Arc<Mutex<RecordingSink>>) -> Vec<i32> {
        sink.lock()
            .unwrap()
            .results
            .iter()
            .map(|result| result.frame().expect("expected success").size().width())
            .collect()
    }

    #[test]
    fn test_success_sequence_with_temporary_and_permanent_failures() {
        let mut h = harness();
        {
            let mut primary = h.primary.lock().unwrap();
            primary.script.extend([
                ResultKind::Success,
                ResultKind::Temporary,
                ResultKind::Success,
                ResultKind::Permanent,
            ]);
        }

        for _ in 0..5 {
            h.capturer.capture_frame();
        }

        assert_eq!(frame_widths(&h.sink), vec![100, 50, 100, 50, 50]);
        assert_eq!(h.primary.lock().unwrap().frames_captured, 2);
        assert_eq!(h.primary.lock().unwrap().capture_attempts, 4);
        assert_eq!(h.secondary.lock().unwrap().frames_captured, 3);
    }

    #[test]
    fn test_temporary_failure_does_not_latch() {
        let mut h = harness();
        h.primary.lock().unwrap().script.push_back(ResultKind::Temporary);

        h.capturer.capture_frame();
        h.capturer.capture_frame();

        assert_eq!(frame_widths(&h.sink), vec![50, 100]);
        assert_eq!(h.primary.lock().unwrap().capture_attempts, 2);
    }

    #[test]
    fn test_permanent_failure_retires_primary() {
        let mut h = harness();
        h.primary.lock().unwrap().script.push_back(ResultKind::Permanent);

        for _ in 0..10 {
            h.capturer.capture_frame();
        }

        assert_eq!(h.primary.lock().unwrap().capture_attempts, 1);
        assert_eq!(h.secondary.lock().unwrap().capture_attempts, 10);
        let guard = h.sink.lock().unwrap();
        assert_eq!(guard.results.len(), 10);
        assert!(guard.results.iter().all(|result| result.is_success()));
    }

    #[test]
    fn test_select_source_pre_arms_secondary() {
        let mut h = harness();
        assert!(h.capturer.select_source(7));
        assert_eq!(h.primary.lock().unwrap().selected_source, Some(7));
        assert_eq!(h.secondary.lock().unwrap().selected_source, Some(7));
    }

    #[test]
    fn test_select_source_failure_latches_secondary() {
        let mut h = harness();
        h.primary.lock().unwrap().select_succeeds = false;
        assert!(h.capturer.select_source(7));

        h.capturer.capture_frame();
        assert_eq!(h.primary.lock().unwrap().capture_attempts, 0);
        assert_eq!(h.secondary.lock().unwrap().capture_attempts, 1);
    }

    #[test]
    fn test_source_list_follows_active_capturer() {
        let mut h = harness();
        h.primary.lock().unwrap().sources.push(Source::new(1, "primary"));
        h.secondary.lock().unwrap().sources.push(Source::new(2, "secondary"));

        let mut sources = Vec::new();
        assert!(h.capturer.get_source_list(&mut sources));
        assert_eq!(sources[0].title, "primary");

        h.primary.lock().unwrap().script.push_back(ResultKind::Permanent);
        h.capturer.capture_frame();

        sources.clear();
        assert!(h.capturer.get_source_list(&mut sources));
        assert_eq!(sources[0].title, "secondary");
    }

    #[test]
    fn test_occlusion_is_reported_by_either_side() {
        let mut h = harness();
        assert!(!h.capturer.is_occluded(DesktopVector::new(1, 1)));
        h.secondary.lock().unwrap().occluded = true;
        assert!(h.capturer.is_occluded(DesktopVector::new(1, 1)));
        h.secondary.lock().unwrap().occluded = false;
        h.primary.lock().unwrap().occluded = true;
        assert!(h.capturer.is_occluded(DesktopVector::new(1, 1)));
    }

    #[test]
    fn test_excluded_window_reaches_both() {
        let mut h = harness();
        h.capturer.set_excluded_window(99);
        assert_eq!(h.primary.lock().unwrap().excluded_window, 99);
        assert_eq!(h.secondary.lock().unwrap().excluded_window, 99);
    }

    #[test]
    fn test_shared_memory_factory_is_shared() {
        use crate::shared_memory::HeapSharedMemoryFactory;

        let mut h = harness();
        let factory: Arc<dyn SharedMemoryFactory> = Arc::new(HeapSharedMemoryFactory::new());
        h.capturer.set_shared_memory_factory(Some(factory));

        h.capturer.capture_frame();
        let guard = h.sink.lock().unwrap();
        let frame = guard.results[0].frame().unwrap();
        assert!(frame.shared_memory().is_some());
    }
}
