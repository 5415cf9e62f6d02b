//! Value snapshots of the desktop's display layout.
//!
//! Capture deals in physical pixels while window management on some
//! platforms deals in density-independent pixels (DIPs); the configuration
//! carries both plus the scale between them. Platform display-change hooks
//! push fresh snapshots into a [`DesktopConfigurationMonitor`].

use std::sync::Mutex;

use crate::geometry::{DesktopRect, DesktopVector};

/// Configuration of a single display.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfiguration {
    /// OS identifier for this display.
    pub id: i64,
    /// Bounds in density-independent pixels.
    pub bounds: DesktopRect,
    /// Bounds in physical pixels.
    pub pixel_bounds: DesktopRect,
    /// Scale factor from DIPs to physical pixels.
    pub dip_to_pixel_scale: f32,
    /// Built-in or external display.
    pub is_builtin: bool,
}

/// Configuration of the whole desktop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesktopConfiguration {
    /// Bounds of the desktop in density-independent pixels.
    pub bounds: DesktopRect,
    /// Same bounds in physical pixels.
    pub pixel_bounds: DesktopRect,
    /// Scale factor of the primary display.
    pub dip_to_pixel_scale: f32,
    /// The displays making up the desktop.
    pub displays: Vec<DisplayConfiguration>,
}

impl DesktopConfiguration {
    /// Builds the desktop bounds from the per-display entries.
    pub fn from_displays(displays: Vec<DisplayConfiguration>) -> Self {
        let mut bounds = DesktopRect::default();
        let mut pixel_bounds = DesktopRect::default();
        for display in &displays {
            bounds.union_with(&display.bounds);
            pixel_bounds.union_with(&display.pixel_bounds);
        }
        let dip_to_pixel_scale = displays
            .first()
            .map(|display| display.dip_to_pixel_scale)
            .unwrap_or(1.0);
        Self {
            bounds,
            pixel_bounds,
            dip_to_pixel_scale,
            displays,
        }
    }

    pub fn find_by_id(&self, id: i64) -> Option<&DisplayConfiguration> {
        self.displays.iter().find(|display| display.id == id)
    }

    /// The DIP-to-pixel scale of the display containing `position` (in
    /// DIPs), or 1.0 when no display contains it.
    pub fn scale_at_position(&self, position: DesktopVector) -> f32 {
        self.displays
            .iter()
            .find(|display| display.bounds.contains_point(position))
            .map(|display| display.dip_to_pixel_scale)
            .unwrap_or(1.0)
    }
}

/// Holds the most recent desktop configuration behind a mutex and hands out
/// value snapshots.
#[derive(Default)]
pub struct DesktopConfigurationMonitor {
    configuration: Mutex<DesktopConfiguration>,
}

impl DesktopConfigurationMonitor {
    pub fn new(initial: DesktopConfiguration) -> Self {
        Self {
            configuration: Mutex::new(initial),
        }
    }

    /// A value snapshot of the current configuration.
    pub fn desktop_configuration(&self) -> DesktopConfiguration {
        self.configuration.lock().unwrap().clone()
    }

    /// Installs a fresh configuration, typically from a display-change
    /// notification.
    pub fn set_desktop_configuration(&self, configuration: DesktopConfiguration) {
        *self.configuration.lock().unwrap() = configuration;
    }
}
