//! Source-list normalization rules for window enumeration.
//!
//! Raw OS window lists arrive in decreasing z-order and include plenty of
//! entries that are useless as capture sources: menus and docks, the session
//! status indicator, minimized windows, untitled helper windows. This module
//! turns them into the deduplicated source list the capturer contract
//! promises.

use std::collections::HashMap;

use crate::capturer::{Source, WINDOW_ID_NULL};
use crate::environment::WindowListEntry;

// The status-indicator dot the window server shows while a capture runs; it
// sits on layer 0 and would otherwise be enumerated.
const STATUS_INDICATOR_TITLE: &str = "StatusIndicator";
const STATUS_INDICATOR_OWNER: &str = "Window Server";

/// Filters raw window entries into capture sources, preserving z-order.
///
/// Windows with empty titles are admitted at most once per process, under
/// the owning application's name, and only until a titled window of the same
/// process shows up; the placeholder entry is then removed for good.
pub fn filter_capturable_windows(
    entries: Vec<WindowListEntry>,
    ignore_minimized: bool,
) -> Vec<Source> {
    let mut sources: Vec<Option<Source>> = Vec::with_capacity(entries.len());
    // Maps a pid to the position of its placeholder entry; `None` once the
    // placeholder has been displaced by a titled window.
    let mut pid_placeholder: HashMap<u32, Option<usize>> = HashMap::new();

    for entry in entries {
        if entry.id == WINDOW_ID_NULL {
            continue;
        }
        // Menus, docks and other system surfaces use non-zero layers.
        if entry.layer != 0 {
            continue;
        }
        // Minimized windows are not capturable unless they are full screen.
        if ignore_minimized && !entry.on_screen && !entry.full_screen {
            continue;
        }
        // Untitled windows are only interesting while actually visible.
        if entry.title.is_empty() && !entry.on_screen && !entry.full_screen {
            continue;
        }
        if entry.title == STATUS_INDICATOR_TITLE && entry.owner_name == STATUS_INDICATOR_OWNER {
            continue;
        }

        if entry.title.is_empty() {
            if !entry.owner_name.is_empty() && !pid_placeholder.contains_key(&entry.pid) {
                sources.push(Some(Source::new(entry.id, entry.owner_name)));
                pid_placeholder.insert(entry.pid, Some(sources.len() - 1));
            }
        } else {
            sources.push(Some(Source::new(entry.id, entry.title)));
            if let Some(slot) = pid_placeholder.get_mut(&entry.pid) {
                if let Some(index) = slot.take() {
                    sources[index] = None;
                }
            }
        }
    }

    sources.into_iter().flatten().collect()
}
