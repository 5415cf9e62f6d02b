//! # deskcap
//!
//! A desktop capture core: acquires pixel-accurate BGRA frames from monitors
//! and top-level windows, tracks which pixels changed between frames, and
//! reports a stable, de-duplicated set of capture sources through one
//! capturer contract.
//!
//! ## Features
//!
//! - A single [`DesktopCapturer`] trait implemented by raw platform
//!   producers and by composable wrappers: frame differencing, blank-frame
//!   suppression, primary/secondary fallback, and capture-screen-then-crop
//!   window capture
//! - A dense 2D [`DesktopRegion`] algebra for damage, visibility and
//!   clipping
//! - A 32x32 block differ that synthesizes a minimal updated region when the
//!   platform cannot supply one
//! - A full-screen window detector that follows slide shows and full-screen
//!   browser windows
//!
//! ## Example
//!
//! ```rust,no_run
//! use deskcap::{DesktopRect, DesktopRegion};
//!
//! // Damage tracking: accumulate dirty rectangles, iterate the canonical
//! // decomposition.
//! let mut damage = DesktopRegion::new();
//! damage.add_rect(&DesktopRect::xywh(0, 0, 100, 100));
//! damage.add_rect(&DesktopRect::xywh(50, 50, 100, 100));
//! for rect in damage.iter() {
//!     println!("repaint {}x{} at ({}, {})",
//!         rect.width(), rect.height(), rect.left(), rect.top());
//! }
//! ```
//!
//! Platform frame producers are not part of this crate; they plug in through
//! [`CaptureOptions`] as [`options::RawCapturerFactory`] closures and a
//! [`WindowEnvironment`] implementation.

pub mod blank_detector;
pub mod capturer;
pub mod configuration;
pub mod cropping;
pub mod differ;
pub mod differ_wrapper;
pub mod environment;
pub mod error;
pub mod factory;
pub mod fallback;
pub mod frame;
pub mod full_screen;
pub mod geometry;
pub mod helper;
pub mod options;
pub mod region;
pub mod shared_memory;
pub mod window_list;

#[cfg(test)]
mod testing;

pub use blank_detector::BlankDetectorCapturer;
pub use capturer::{
    capture_id, CaptureCallback, CaptureResult, DesktopCapturer, ScreenId, SharedCaptureCallback,
    Source, SourceId, WindowId, DISPLAY_ID_INVALID, SCREEN_ID_FULL, SCREEN_ID_INVALID,
    WINDOW_ID_NULL,
};
pub use configuration::{DesktopConfiguration, DesktopConfigurationMonitor, DisplayConfiguration};
pub use cropping::CroppingWindowCapturer;
pub use differ_wrapper::DifferWrapperCapturer;
pub use environment::{
    Translucency, WindowEnvironment, WindowListEntry, WindowPlacement, WindowRegionKind,
};
pub use error::{CaptureError, Result};
pub use factory::{create_generic_capturer, create_screen_capturer, create_window_capturer};
pub use fallback::FallbackCapturer;
pub use frame::{BgraPixel, DesktopFrame, SharedDesktopFrame, BYTES_PER_PIXEL};
pub use full_screen::{ApplicationFamily, FullScreenAppHandler, FullScreenWindowDetector};
pub use geometry::{DesktopRect, DesktopSize, DesktopVector};
pub use helper::{CapturerHelper, FrameQueue, ResolutionTracker};
pub use options::{BlankDetection, CaptureOptions};
pub use region::DesktopRegion;
pub use shared_memory::{HeapSharedMemoryFactory, SharedMemory, SharedMemoryFactory};
pub use window_list::filter_capturable_windows;
