//! Assembles capturers from options: raw producer plus the configured
//! wrapper stack.

use tracing::debug;

use crate::blank_detector::BlankDetectorCapturer;
use crate::capturer::DesktopCapturer;
use crate::cropping::CroppingWindowCapturer;
use crate::differ_wrapper::DifferWrapperCapturer;
use crate::error::{CaptureError, Result};
use crate::fallback::FallbackCapturer;
use crate::options::{CaptureOptions, RawCapturerFactory};

fn instantiate(
    factory: &Option<RawCapturerFactory>,
    options: &CaptureOptions,
) -> Option<Box<dyn DesktopCapturer>> {
    factory.as_ref().and_then(|factory| factory(options))
}

fn with_blank_detection(
    options: &CaptureOptions,
    capturer: Box<dyn DesktopCapturer>,
) -> Box<dyn DesktopCapturer> {
    match options.blank_frame_detection {
        Some(blank) => Box::new(BlankDetectorCapturer::new(
            capturer,
            blank.blank_pixel,
            blank.check_per_capture,
        )),
        None => capturer,
    }
}

// The differ is the outermost wrapper so it sees exactly what the consumer
// sees.
fn with_differ(
    options: &CaptureOptions,
    capturer: Box<dyn DesktopCapturer>,
) -> Box<dyn DesktopCapturer> {
    if options.detect_updated_region {
        Box::new(DifferWrapperCapturer::new(capturer))
    } else {
        capturer
    }
}

/// Creates a capturer targeting screens.
pub fn create_screen_capturer(options: &CaptureOptions) -> Result<Box<dyn DesktopCapturer>> {
    let raw = instantiate(&options.raw_screen_factory, options)
        .ok_or_else(|| CaptureError::unsupported("no screen capture backend installed"))?;

    let raw = match instantiate(&options.secondary_screen_factory, options) {
        Some(secondary) => {
            debug!("pairing screen capturer with a fallback");
            Box::new(FallbackCapturer::new(raw, secondary)) as Box<dyn DesktopCapturer>
        }
        None => raw,
    };

    Ok(with_differ(options, with_blank_detection(options, raw)))
}

/// Creates a capturer targeting windows.
pub fn create_window_capturer(options: &CaptureOptions) -> Result<Box<dyn DesktopCapturer>> {
    let raw_window = instantiate(&options.raw_window_factory, options)
        .ok_or_else(|| CaptureError::unsupported("no window capture backend installed"))?;

    let capturer = if options.allow_cropping_window_capturer {
        let screen = instantiate(&options.raw_screen_factory, options);
        match (&options.window_environment, screen) {
            (Some(env), Some(screen)) => Box::new(CroppingWindowCapturer::new(
                raw_window,
                screen,
                env.clone(),
                options.full_screen_window_detector.clone(),
            )) as Box<dyn DesktopCapturer>,
            _ => {
                debug!("cropping capturer requested but screen backend or environment missing");
                raw_window
            }
        }
    } else {
        raw_window
    };

    Ok(with_differ(options, capturer))
}

/// Creates a capturer serving both screens and windows.
pub fn create_generic_capturer(options: &CaptureOptions) -> Result<Box<dyn DesktopCapturer>> {
    let raw = instantiate(&options.raw_generic_factory, options)
        .ok_or_else(|| CaptureError::unsupported("no generic capture backend installed"))?;
    Ok(with_differ(options, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capturer::CaptureResult;
    use crate::frame::BgraPixel;
    use crate::geometry::{DesktopRect, DesktopSize};
    use crate::options::BlankDetection;
    use crate::region::DesktopRegion;
    use crate::testing::{FakeCapturer, PainterFrameGenerator, RecordingSink, RectPainter};
    use std::sync::{Arc, Mutex};

    fn frame_factory(size: DesktopSize, background: BgraPixel) -> RawCapturerFactory {
        Arc::new(move |_options: &CaptureOptions| {
            let mut generator = PainterFrameGenerator::new(size);
            generator.provide_updated_region_hints = true;
            let mut painter = RectPainter::new(background);
            painter
                .pending
                .push((DesktopRect::wh(size.width(), size.height()), background));
            generator.painter = Some(Box::new(Arc::new(Mutex::new(painter))));
            let (capturer, _) = FakeCapturer::with_generator(Box::new(generator));
            Some(Box::new(capturer) as Box<dyn DesktopCapturer>)
        })
    }

    #[test]
    fn test_missing_backend_is_unsupported() {
        let options = CaptureOptions::default();
        assert!(matches!(
            create_screen_capturer(&options),
            Err(CaptureError::Unsupported(_))
        ));
        assert!(matches!(
            create_window_capturer(&options),
            Err(CaptureError::Unsupported(_))
        ));
        assert!(matches!(
            create_generic_capturer(&options),
            Err(CaptureError::Unsupported(_))
        ));
    }

    #[test]
    fn test_differ_wrapping_reports_full_first_frame() {
        let mut options = CaptureOptions::default();
        options.detect_updated_region = true;
        options.raw_screen_factory =
            Some(frame_factory(DesktopSize::new(320, 240), BgraPixel::WHITE));

        let mut capturer = create_screen_capturer(&options).unwrap();
        let sink = RecordingSink::new_shared();
        capturer.start(sink.clone());
        capturer.capture_frame();

        let guard = sink.lock().unwrap();
        let frame = guard.results[0].frame().expect("expected frame");
        assert!(frame
            .updated_region()
            .equals(&DesktopRegion::from_rect(DesktopRect::wh(320, 240))));
    }

    #[test]
    fn test_blank_detection_wrapping_suppresses_blank_frames() {
        let mut options = CaptureOptions::default();
        options.blank_frame_detection = Some(BlankDetection::default());
        options.raw_screen_factory =
            Some(frame_factory(DesktopSize::new(320, 240), BgraPixel::BLACK));

        let mut capturer = create_screen_capturer(&options).unwrap();
        let sink = RecordingSink::new_shared();
        capturer.start(sink.clone());
        capturer.capture_frame();

        let guard = sink.lock().unwrap();
        assert!(matches!(guard.results[0], CaptureResult::ErrorTemporary));
    }

    #[test]
    fn test_window_capturer_without_cropping_uses_raw_backend() {
        let mut options = CaptureOptions::default();
        options.raw_window_factory =
            Some(frame_factory(DesktopSize::new(100, 100), BgraPixel::WHITE));

        let mut capturer = create_window_capturer(&options).unwrap();
        let sink = RecordingSink::new_shared();
        capturer.start(sink.clone());
        capturer.capture_frame();
        assert!(sink.lock().unwrap().results[0].is_success());
    }

    #[test]
    fn test_cropping_without_environment_degrades_to_raw_window() {
        let mut options = CaptureOptions::default();
        options.allow_cropping_window_capturer = true;
        options.raw_window_factory =
            Some(frame_factory(DesktopSize::new(100, 100), BgraPixel::WHITE));
        // No screen backend and no environment: the raw window capturer
        // serves directly.
        let mut capturer = create_window_capturer(&options).unwrap();
        let sink = RecordingSink::new_shared();
        capturer.start(sink.clone());
        capturer.capture_frame();
        assert!(sink.lock().unwrap().results[0].is_success());
    }

    #[test]
    fn test_generic_capturer_uses_generic_backend() {
        let mut options = CaptureOptions::default();
        options.raw_generic_factory =
            Some(frame_factory(DesktopSize::new(64, 64), BgraPixel::WHITE));
        let mut capturer = create_generic_capturer(&options).unwrap();
        let sink = RecordingSink::new_shared();
        capturer.start(sink.clone());
        capturer.capture_frame();
        assert!(sink.lock().unwrap().results[0].is_success());
    }
}
