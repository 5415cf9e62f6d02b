//! Block-based comparison of two frames.
//!
//! Frames are compared in 32x32 pixel blocks; contiguous differing blocks in
//! a block-row are merged into single rectangles before they are added to the
//! output region. The result is a superset of the exact pixel difference,
//! block-aligned except at the right and bottom frame edges.

use crate::frame::{DesktopFrame, BYTES_PER_PIXEL};
use crate::geometry::DesktopRect;
use crate::region::DesktopRegion;

/// Side length in pixels of the square comparison block.
pub const BLOCK_SIZE: i32 = 32;

// Whether the two frames differ anywhere in the column range
// `[left, right)` of the rows `[top, bottom)`.
fn block_differs(
    old_frame: &DesktopFrame,
    new_frame: &DesktopFrame,
    left: i32,
    right: i32,
    top: i32,
    bottom: i32,
) -> bool {
    let from = (left * BYTES_PER_PIXEL) as usize;
    let to = (right * BYTES_PER_PIXEL) as usize;
    for y in top..bottom {
        if old_frame.row(y)[from..to] != new_frame.row(y)[from..to] {
            return true;
        }
    }
    false
}

// Compares the columns `[left, right)` of the band `[top, bottom)` block by
// block, merging runs of differing blocks into single rectangles. The
// trailing block may be narrower than BLOCK_SIZE.
fn compare_row(
    old_frame: &DesktopFrame,
    new_frame: &DesktopFrame,
    left: i32,
    right: i32,
    top: i32,
    bottom: i32,
    output: &mut DesktopRegion,
) {
    let width = right - left;
    let block_count = (width - 1) / BLOCK_SIZE;
    let last_block_width = width - block_count * BLOCK_SIZE;

    // Index of the first block-column of the current run of differing
    // blocks, or -1 while outside a run.
    let mut first_dirty_block = -1;

    for x in 0..block_count {
        let block_left = left + x * BLOCK_SIZE;
        if block_differs(old_frame, new_frame, block_left, block_left + BLOCK_SIZE, top, bottom) {
            if first_dirty_block == -1 {
                first_dirty_block = x;
            }
        } else if first_dirty_block != -1 {
            output.add_rect(&DesktopRect::ltrb(
                first_dirty_block * BLOCK_SIZE + left,
                top,
                x * BLOCK_SIZE + left,
                bottom,
            ));
            first_dirty_block = -1;
        }
    }

    // The trailing block is possibly partial, and always closes the run.
    let last_left = left + block_count * BLOCK_SIZE;
    let last_differs =
        block_differs(old_frame, new_frame, last_left, last_left + last_block_width, top, bottom);
    if last_differs {
        if first_dirty_block == -1 {
            first_dirty_block = block_count;
        }
        output.add_rect(&DesktopRect::ltrb(
            first_dirty_block * BLOCK_SIZE + left,
            top,
            right,
            bottom,
        ));
    } else if first_dirty_block != -1 {
        output.add_rect(&DesktopRect::ltrb(
            first_dirty_block * BLOCK_SIZE + left,
            top,
            block_count * BLOCK_SIZE + left,
            bottom,
        ));
    }
}

/// Compares `rect` (clipped to the frame) between two frames of identical
/// size and stride, adding every rectangle of differing blocks to `output`.
/// Output depends only on the input bytes.
pub fn compare_frames(
    old_frame: &DesktopFrame,
    new_frame: &DesktopFrame,
    rect: DesktopRect,
    output: &mut DesktopRegion,
) {
    debug_assert_eq!(old_frame.size(), new_frame.size());
    debug_assert_eq!(old_frame.stride(), new_frame.stride());

    let mut rect = rect;
    rect.intersect_with(&DesktopRect::from_size(old_frame.size()));
    if rect.is_empty() {
        return;
    }

    let height = rect.height();
    let y_block_count = (height - 1) / BLOCK_SIZE;
    let last_block_height = height - y_block_count * BLOCK_SIZE;

    // The trailing block-row is possibly shorter, so it is handled after the
    // loop.
    let mut top = rect.top();
    for _ in 0..y_block_count {
        compare_row(old_frame, new_frame, rect.left(), rect.right(), top, top + BLOCK_SIZE, output);
        top += BLOCK_SIZE;
    }
    compare_row(
        old_frame,
        new_frame,
        rect.left(),
        rect.right(),
        top,
        top + last_block_height,
        output,
    );
}
