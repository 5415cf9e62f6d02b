//! Test doubles shared by the wrapper tests: a scriptable capturer, frame
//! generators and painters.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::capturer::{
    capture_id, CaptureCallback, CaptureResult, DesktopCapturer, SharedCaptureCallback, Source,
    SourceId, WindowId, WINDOW_ID_NULL,
};
use crate::frame::{BgraPixel, DesktopFrame, SharedDesktopFrame};
use crate::geometry::{DesktopRect, DesktopSize, DesktopVector};
use crate::region::DesktopRegion;
use crate::shared_memory::SharedMemoryFactory;

/// What the fake capturer reports on the next capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResultKind {
    Success,
    Temporary,
    Permanent,
}

/// Produces a frame per capture. Returning `None` makes the fake capturer
/// report a temporary error.
pub(crate) trait FrameGenerator: Send {
    fn next_frame(
        &mut self,
        factory: Option<&Arc<dyn SharedMemoryFactory>>,
    ) -> Option<DesktopFrame>;
}

/// Paints the pixels of a generated frame and reports what was painted.
pub(crate) trait FramePainter: Send {
    fn paint(&mut self, frame: &mut DesktopFrame, updated_region: &mut DesktopRegion) -> bool;
}

// Shared handles let a test keep steering a generator or painter after it
// has been boxed into a capturer.
impl<G: FrameGenerator> FrameGenerator for Arc<Mutex<G>> {
    fn next_frame(
        &mut self,
        factory: Option<&Arc<dyn SharedMemoryFactory>>,
    ) -> Option<DesktopFrame> {
        self.lock().unwrap().next_frame(factory)
    }
}

impl<P: FramePainter> FramePainter for Arc<Mutex<P>> {
    fn paint(&mut self, frame: &mut DesktopFrame, updated_region: &mut DesktopRegion) -> bool {
        self.lock().unwrap().paint(frame, updated_region)
    }
}

/// Draws a white frame with black rectangles in the pending updated region.
/// Each paint call consumes the pending region.
#[derive(Default)]
pub(crate) struct BlackWhitePainter {
    pub updated_region: DesktopRegion,
}

impl FramePainter for BlackWhitePainter {
    fn paint(&mut self, frame: &mut DesktopFrame, updated_region: &mut DesktopRegion) -> bool {
        frame.fill_rect(frame.rect(), BgraPixel::WHITE);
        for rect in self.updated_region.iter() {
            frame.fill_rect(rect, BgraPixel::BLACK);
        }
        *updated_region = std::mem::take(&mut self.updated_region);
        true
    }
}

/// Paints a solid background with one-shot colored rectangles on top. The
/// painted rectangles are reported as the updated region and consumed.
pub(crate) struct RectPainter {
    pub background: BgraPixel,
    pub pending: Vec<(DesktopRect, BgraPixel)>,
}

impl RectPainter {
    pub fn new(background: BgraPixel) -> Self {
        Self {
            background,
            pending: Vec::new(),
        }
    }
}

impl FramePainter for RectPainter {
    fn paint(&mut self, frame: &mut DesktopFrame, updated_region: &mut DesktopRegion) -> bool {
        frame.fill_rect(frame.rect(), self.background);
        for (rect, color) in self.pending.drain(..) {
            frame.fill_rect(rect, color);
            updated_region.add_rect(&rect);
        }
        true
    }
}

/// Generates frames of a configurable size and delegates the pixels to a
/// painter. When hints are disabled the updated region is set to the full
/// frame rectangle, as the capturer contract requires from producers that
/// cannot determine damage.
pub(crate) struct PainterFrameGenerator {
    pub size: DesktopSize,
    pub return_frame: bool,
    pub provide_updated_region_hints: bool,
    pub enlarge_updated_region: bool,
    pub enlarge_range: i32,
    pub painter: Option<Box<dyn FramePainter>>,
}

impl PainterFrameGenerator {
    pub fn new(size: DesktopSize) -> Self {
        Self {
            size,
            return_frame: true,
            provide_updated_region_hints: false,
            enlarge_updated_region: false,
            enlarge_range: 20,
            painter: None,
        }
    }
}

impl FrameGenerator for PainterFrameGenerator {
    fn next_frame(
        &mut self,
        factory: Option<&Arc<dyn SharedMemoryFactory>>,
    ) -> Option<DesktopFrame> {
        if !self.return_frame {
            return None;
        }
        let mut frame = match factory {
            Some(factory) => DesktopFrame::with_factory(self.size, factory.as_ref()),
            None => DesktopFrame::new(self.size),
        };

        let mut painted = DesktopRegion::new();
        if let Some(painter) = &mut self.painter {
            if !painter.paint(&mut frame, &mut painted) {
                return None;
            }
        }

        if self.provide_updated_region_hints {
            if self.enlarge_updated_region && self.enlarge_range > 0 {
                let mut enlarged = DesktopRegion::new();
                for mut rect in painted.iter() {
                    rect.extend(
                        self.enlarge_range,
                        self.enlarge_range,
                        self.enlarge_range,
                        self.enlarge_range,
                    );
                    rect.intersect_with(&frame.rect());
                    enlarged.add_rect(&rect);
                }
                painted = enlarged;
            }
            *frame.updated_region_mut() = painted;
        } else {
            let rect = frame.rect();
            frame.updated_region_mut().set_rect(rect);
        }
        Some(frame)
    }
}

/// Knobs and counters of a [`FakeCapturer`], shared with the test body so it
/// can keep steering the capturer after handing it to a wrapper.
pub(crate) struct FakeState {
    pub result: ResultKind,
    /// Per-capture overrides consumed before `result` applies.
    pub script: VecDeque<ResultKind>,
    pub generator: Option<Box<dyn FrameGenerator>>,
    pub frames_captured: usize,
    pub capture_attempts: usize,
    pub selected_source: Option<SourceId>,
    pub select_succeeds: bool,
    pub excluded_window: WindowId,
    pub sources: Vec<Source>,
    pub occluded: bool,
    pub factory: Option<Arc<dyn SharedMemoryFactory>>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            result: ResultKind::Success,
            script: VecDeque::new(),
            generator: None,
            frames_captured: 0,
            capture_attempts: 0,
            selected_source: None,
            select_succeeds: true,
            excluded_window: WINDOW_ID_NULL,
            sources: Vec::new(),
            occluded: false,
            factory: None,
        }
    }
}

/// A capturer that produces frames from a [`FrameGenerator`] or scripted
/// error results.
pub(crate) struct FakeCapturer {
    state: Arc<Mutex<FakeState>>,
    callback: Option<SharedCaptureCallback>,
}

impl FakeCapturer {
    pub fn new() -> (Self, Arc<Mutex<FakeState>>) {
        let state = Arc::new(Mutex::new(FakeState::default()));
        (
            Self {
                state: Arc::clone(&state),
                callback: None,
            },
            state,
        )
    }

    pub fn with_generator(generator: Box<dyn FrameGenerator>) -> (Self, Arc<Mutex<FakeState>>) {
        let (capturer, state) = Self::new();
        state.lock().unwrap().generator = Some(generator);
        (capturer, state)
    }
}

impl DesktopCapturer for FakeCapturer {
    fn start(&mut self, callback: SharedCaptureCallback) {
        self.callback = Some(callback);
    }

    fn capture_frame(&mut self) {
        let callback = self.callback.clone().expect("start() was not called");
        callback.lock().unwrap().on_capture_start();

        let result = {
            let mut state = self.state.lock().unwrap();
            state.capture_attempts += 1;
            let kind = state.script.pop_front().unwrap_or(state.result);
            match kind {
                ResultKind::Temporary => CaptureResult::ErrorTemporary,
                ResultKind::Permanent => CaptureResult::ErrorPermanent,
                ResultKind::Success => {
                    let factory = state.factory.clone();
                    match state
                        .generator
                        .as_mut()
                        .and_then(|generator| generator.next_frame(factory.as_ref()))
                    {
                        Some(mut frame) => {
                            state.frames_captured += 1;
                            frame.set_capturer_id(capture_id::FAKE);
                            CaptureResult::Success(SharedDesktopFrame::wrap(frame))
                        }
                        None => CaptureResult::ErrorTemporary,
                    }
                }
            }
        };
        callback.lock().unwrap().on_capture_result(result);
    }

    fn get_source_list(&mut self, sources: &mut Vec<Source>) -> bool {
        sources.extend(self.state.lock().unwrap().sources.iter().cloned());
        true
    }

    fn select_source(&mut self, id: SourceId) -> bool {
        let mut state = self.state.lock().unwrap();
        state.selected_source = Some(id);
        state.select_succeeds
    }

    fn set_excluded_window(&mut self, window: WindowId) {
        self.state.lock().unwrap().excluded_window = window;
    }

    fn set_shared_memory_factory(&mut self, factory: Option<Arc<dyn SharedMemoryFactory>>) {
        self.state.lock().unwrap().factory = factory;
    }

    fn is_occluded(&mut self, _pos: DesktopVector) -> bool {
        self.state.lock().unwrap().occluded
    }

    fn current_capturer_id(&self) -> u32 {
        capture_id::FAKE
    }
}

/// Records every delivered result for later inspection.
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub results: Vec<CaptureResult>,
    pub starts: usize,
}

impl RecordingSink {
    pub fn new_shared() -> Arc<Mutex<RecordingSink>> {
        Arc::new(Mutex::new(RecordingSink::default()))
    }
}

impl CaptureCallback for RecordingSink {
    fn on_capture_start(&mut self) {
        self.starts += 1;
    }

    fn on_capture_result(&mut self, result: CaptureResult) {
        self.results.push(result);
    }
}

/// One scripted window of a [`FakeWindowEnvironment`].
#[derive(Clone)]
pub(crate) struct FakeWindow {
    pub id: WindowId,
    pub title: String,
    pub owner_name: String,
    pub pid: u32,
    pub rect: DesktopRect,
    pub content_rect: DesktopRect,
    pub region: crate::environment::WindowRegionKind,
    pub translucency: crate::environment::Translucency,
    pub minimized: bool,
    pub visible: bool,
    pub on_screen: bool,
    pub layer: i32,
    /// Owning window id, or WINDOW_ID_NULL.
    pub owner: WindowId,
}

impl FakeWindow {
    pub fn new(id: WindowId, rect: DesktopRect) -> Self {
        Self {
            id,
            title: String::new(),
            owner_name: String::new(),
            pid: 1,
            rect,
            content_rect: rect,
            region: crate::environment::WindowRegionKind::Rectangular,
            translucency: crate::environment::Translucency::Opaque,
            minimized: false,
            visible: true,
            on_screen: true,
            layer: 0,
            owner: WINDOW_ID_NULL,
        }
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn owned_by_process(mut self, pid: u32, owner_name: &str) -> Self {
        self.pid = pid;
        self.owner_name = owner_name.to_string();
        self
    }
}

#[derive(Default)]
pub(crate) struct FakeEnvState {
    /// Windows in decreasing z-order.
    pub windows: Vec<FakeWindow>,
    pub monitors: Vec<DesktopRect>,
    pub virtual_rect: DesktopRect,
    pub app_names: std::collections::HashMap<u32, String>,
}

/// A scriptable [`WindowEnvironment`](crate::environment::WindowEnvironment).
#[derive(Default)]
pub(crate) struct FakeWindowEnvironment {
    pub state: Mutex<FakeEnvState>,
}

impl FakeWindowEnvironment {
    pub fn new(virtual_rect: DesktopRect) -> Arc<Self> {
        let env = Arc::new(Self::default());
        {
            let mut state = env.state.lock().unwrap();
            state.virtual_rect = virtual_rect;
            state.monitors = vec![virtual_rect];
        }
        env
    }

    fn find(&self, id: WindowId) -> Option<FakeWindow> {
        self.state
            .lock()
            .unwrap()
            .windows
            .iter()
            .find(|window| window.id == id)
            .cloned()
    }
}

impl crate::environment::WindowEnvironment for FakeWindowEnvironment {
    fn window_placement(&self, id: WindowId) -> Option<crate::environment::WindowPlacement> {
        self.find(id).map(|window| crate::environment::WindowPlacement {
            rect: window.rect,
            content_rect: window.content_rect,
            region: window.region,
            translucency: window.translucency,
            minimized: window.minimized,
        })
    }

    fn is_window_visible_on_current_desktop(&self, id: WindowId) -> bool {
        self.find(id).map(|window| window.visible).unwrap_or(false)
    }

    fn is_window_on_screen(&self, id: WindowId) -> bool {
        self.find(id).map(|window| window.on_screen).unwrap_or(false)
    }

    fn is_window_owned_by(&self, id: WindowId, owner: WindowId) -> bool {
        self.find(id)
            .map(|window| window.owner != WINDOW_ID_NULL && window.owner == owner)
            .unwrap_or(false)
    }

    fn windows_in_z_order(&self) -> Vec<WindowId> {
        self.state
            .lock()
            .unwrap()
            .windows
            .iter()
            .map(|window| window.id)
            .collect()
    }

    fn virtual_screen_rect(&self) -> DesktopRect {
        self.state.lock().unwrap().virtual_rect
    }

    fn monitor_rects(&self) -> Vec<DesktopRect> {
        self.state.lock().unwrap().monitors.clone()
    }

    fn window_owner_pid(&self, id: WindowId) -> Option<u32> {
        self.find(id).map(|window| window.pid)
    }

    fn application_name(&self, pid: u32) -> Option<String> {
        self.state.lock().unwrap().app_names.get(&pid).cloned()
    }

    fn window_title(&self, id: WindowId) -> Option<String> {
        self.find(id).map(|window| window.title)
    }

    fn capturable_windows(&self) -> Vec<crate::environment::WindowListEntry> {
        let state = self.state.lock().unwrap();
        state
            .windows
            .iter()
            .map(|window| crate::environment::WindowListEntry {
                id: window.id,
                title: window.title.clone(),
                owner_name: window.owner_name.clone(),
                pid: window.pid,
                layer: window.layer,
                on_screen: window.on_screen,
                full_screen: state.monitors.contains(&window.rect),
            })
            .collect()
    }
}

/// Enables tracing output for a test run. Safe to call from every test; only
/// the first call installs the subscriber.
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Counts successes and errors in a recorded result list.
pub(crate) fn tally(results: &[CaptureResult]) -> (usize, usize, usize) {
    let mut success = 0;
    let mut temporary = 0;
    let mut permanent = 0;
    for result in results {
        match result {
            CaptureResult::Success(_) => success += 1,
            CaptureResult::ErrorTemporary => temporary += 1,
            CaptureResult::ErrorPermanent => permanent += 1,
        }
    }
    (success, temporary, permanent)
}
