//! The OS window/monitor query surface.
//!
//! The cropping capturer and the full-screen detector need answers only the
//! platform can give: window bounds, z-order, translucency, monitor layout.
//! Platform backends implement [`WindowEnvironment`]; the core never talks to
//! the OS directly.

use crate::capturer::WindowId;
use crate::geometry::DesktopRect;

/// Shape of a window's region as configured with the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowRegionKind {
    /// No region set; the window is a plain rectangle.
    Rectangular,
    /// A single rectangular region, in window-local coordinates.
    Simple(DesktopRect),
    /// An empty region.
    Null,
    /// A region built from multiple rectangles.
    Complex,
}

/// Window translucency as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translucency {
    Opaque,
    /// Per-pixel alpha; effective opacity cannot be determined.
    PerPixelAlpha,
    /// A window-wide alpha multiplier. 255 means fully opaque.
    WindowAlpha(u8),
    /// Pixels matching a color key are transparent.
    ColorKey,
}

/// A snapshot of one window's geometry and attributes, in desktop
/// coordinates unless noted otherwise.
#[derive(Debug, Clone)]
pub struct WindowPlacement {
    /// Outer window rectangle.
    pub rect: DesktopRect,
    /// Content area, without borders and decorations.
    pub content_rect: DesktopRect,
    pub region: WindowRegionKind,
    pub translucency: Translucency,
    pub minimized: bool,
}

/// Raw metadata of one enumerated window, input to the source list rules.
#[derive(Debug, Clone)]
pub struct WindowListEntry {
    pub id: WindowId,
    pub title: String,
    /// Name of the owning application, e.g. for windows without a title.
    pub owner_name: String,
    pub pid: u32,
    /// Window layer; menus and docks use non-zero layers.
    pub layer: i32,
    pub on_screen: bool,
    /// Occupies exactly one monitor.
    pub full_screen: bool,
}

/// Answers about windows and monitors that only the platform can give.
/// Implementations must tolerate ids of windows that no longer exist.
pub trait WindowEnvironment: Send + Sync {
    fn window_placement(&self, id: WindowId) -> Option<WindowPlacement>;

    fn is_window_visible_on_current_desktop(&self, id: WindowId) -> bool;

    /// Whether the window participates in the on-screen window list.
    fn is_window_on_screen(&self, id: WindowId) -> bool {
        self.is_window_visible_on_current_desktop(id)
    }

    /// Whether `id` is owned by `owner`, directly or transitively.
    fn is_window_owned_by(&self, id: WindowId, owner: WindowId) -> bool;

    /// All top-level windows in decreasing z-order.
    fn windows_in_z_order(&self) -> Vec<WindowId>;

    /// Bounding rectangle of all monitors, in desktop coordinates.
    fn virtual_screen_rect(&self) -> DesktopRect;

    /// One rectangle per monitor, in desktop coordinates.
    fn monitor_rects(&self) -> Vec<DesktopRect>;

    fn window_owner_pid(&self, id: WindowId) -> Option<u32>;

    /// Application name for a process, e.g. the executable or bundle name.
    fn application_name(&self, pid: u32) -> Option<String>;

    fn window_title(&self, id: WindowId) -> Option<String>;

    /// Entries for source enumeration, in decreasing z-order, including
    /// windows with empty titles.
    fn capturable_windows(&self) -> Vec<WindowListEntry>;
}

/// Whether `id` occupies exactly one monitor.
pub fn is_window_full_screen(env: &dyn WindowEnvironment, id: WindowId) -> bool {
    match env.window_placement(id) {
        Some(placement) => env
            .monitor_rects()
            .iter()
            .any(|monitor| *monitor == placement.rect),
        None => false,
    }
}
