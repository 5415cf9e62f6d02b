//! Desktop frames: BGRA pixel buffers plus capture metadata.
//!
//! Pixel format is BGRA little-endian, 4 bytes per pixel, on every platform.
//! Rows are laid out top-down when the stride is positive and bottom-up when
//! it is negative; all row addressing goes through [`DesktopFrame::row`] so
//! callers never deal with the stride sign.

use std::sync::Arc;

use image::{Rgba, RgbaImage};

use crate::geometry::{DesktopRect, DesktopSize, DesktopVector};
use crate::region::DesktopRegion;
use crate::shared_memory::{SharedMemory, SharedMemoryFactory};

/// Bytes per BGRA pixel.
pub const BYTES_PER_PIXEL: i32 = 4;

/// A single BGRA pixel value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BgraPixel {
    pub blue: u8,
    pub green: u8,
    pub red: u8,
    pub alpha: u8,
}

impl BgraPixel {
    pub const BLACK: BgraPixel = BgraPixel::new(0, 0, 0, 0xff);
    pub const WHITE: BgraPixel = BgraPixel::new(0xff, 0xff, 0xff, 0xff);
    pub const TRANSPARENT: BgraPixel = BgraPixel::new(0, 0, 0, 0);

    pub const fn new(blue: u8, green: u8, red: u8, alpha: u8) -> Self {
        Self {
            blue,
            green,
            red,
            alpha,
        }
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }

    pub fn to_bytes(self) -> [u8; 4] {
        [self.blue, self.green, self.red, self.alpha]
    }
}

enum FrameStorage {
    Heap(Vec<u8>),
    Shared(SharedMemory),
}

impl FrameStorage {
    fn bytes(&self) -> &[u8] {
        match self {
            FrameStorage::Heap(data) => data,
            FrameStorage::Shared(memory) => memory.data(),
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            FrameStorage::Heap(data) => data,
            FrameStorage::Shared(memory) => memory.data_mut(),
        }
    }
}

/// A single snapshot of a source's pixels.
pub struct DesktopFrame {
    size: DesktopSize,
    stride: i32,
    storage: FrameStorage,
    updated_region: DesktopRegion,
    top_left: DesktopVector,
    capture_time_ms: i64,
    capturer_id: u32,
    may_contain_cursor: bool,
}

impl DesktopFrame {
    /// Allocates a zeroed top-down frame with a packed stride.
    pub fn new(size: DesktopSize) -> Self {
        Self::with_stride(size, size.width() * BYTES_PER_PIXEL)
    }

    /// Allocates a zeroed frame with an explicit stride. A negative stride
    /// stores rows bottom-up.
    pub fn with_stride(size: DesktopSize, stride: i32) -> Self {
        assert!(!size.is_empty(), "frame size must be positive");
        assert!(
            stride.unsigned_abs() >= (size.width() * BYTES_PER_PIXEL) as u32,
            "stride too small for frame width"
        );
        let bytes = stride.unsigned_abs() as usize * size.height() as usize;
        Self::from_storage(size, stride, FrameStorage::Heap(vec![0; bytes]))
    }

    /// Allocates a frame through `factory`, degrading to a heap buffer when
    /// the factory declines.
    pub fn with_factory(size: DesktopSize, factory: &dyn SharedMemoryFactory) -> Self {
        let stride = size.width() * BYTES_PER_PIXEL;
        let bytes = stride as usize * size.height() as usize;
        match factory.create_shared_memory(bytes) {
            Some(memory) => Self::from_storage(size, stride, FrameStorage::Shared(memory)),
            None => Self::new(size),
        }
    }

    /// Wraps a shared-memory buffer already holding frame data.
    pub fn from_shared_memory(size: DesktopSize, stride: i32, memory: SharedMemory) -> Self {
        assert!(
            memory.len() >= stride.unsigned_abs() as usize * size.height() as usize,
            "shared memory too small for frame"
        );
        Self::from_storage(size, stride, FrameStorage::Shared(memory))
    }

    fn from_storage(size: DesktopSize, stride: i32, storage: FrameStorage) -> Self {
        Self {
            size,
            stride,
            storage,
            updated_region: DesktopRegion::new(),
            top_left: DesktopVector::default(),
            capture_time_ms: 0,
            capturer_id: crate::capturer::capture_id::UNKNOWN,
            may_contain_cursor: false,
        }
    }

    pub fn size(&self) -> DesktopSize {
        self.size
    }

    pub fn stride(&self) -> i32 {
        self.stride
    }

    /// The frame rectangle with origin (0, 0).
    pub fn rect(&self) -> DesktopRect {
        DesktopRect::from_size(self.size)
    }

    pub fn data(&self) -> &[u8] {
        self.storage.bytes()
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.storage.bytes_mut()
    }

    pub fn shared_memory(&self) -> Option<&SharedMemory> {
        match &self.storage {
            FrameStorage::Shared(memory) => Some(memory),
            FrameStorage::Heap(_) => None,
        }
    }

    fn row_offset(&self, y: i32) -> usize {
        debug_assert!(y >= 0 && y < self.size.height());
        let abs_stride = self.stride.unsigned_abs() as usize;
        if self.stride >= 0 {
            y as usize * abs_stride
        } else {
            (self.size.height() - 1 - y) as usize * abs_stride
        }
    }

    /// The pixels of row `y` as `width * 4` bytes, top-down regardless of the
    /// stride sign.
    pub fn row(&self, y: i32) -> &[u8] {
        let offset = self.row_offset(y);
        let len = (self.size.width() * BYTES_PER_PIXEL) as usize;
        &self.storage.bytes()[offset..offset + len]
    }

    pub fn row_mut(&mut self, y: i32) -> &mut [u8] {
        let offset = self.row_offset(y);
        let len = (self.size.width() * BYTES_PER_PIXEL) as usize;
        &mut self.storage.bytes_mut()[offset..offset + len]
    }

    pub fn pixel_at(&self, pos: DesktopVector) -> BgraPixel {
        let row = self.row(pos.y());
        let offset = (pos.x() * BYTES_PER_PIXEL) as usize;
        BgraPixel::from_bytes([row[offset], row[offset + 1], row[offset + 2], row[offset + 3]])
    }

    pub fn put_pixel(&mut self, pos: DesktopVector, pixel: BgraPixel) {
        let offset = (pos.x() * BYTES_PER_PIXEL) as usize;
        self.row_mut(pos.y())[offset..offset + 4].copy_from_slice(&pixel.to_bytes());
    }

    /// Fills `rect` (clipped to the frame) with a solid color.
    pub fn fill_rect(&mut self, rect: DesktopRect, pixel: BgraPixel) {
        let mut rect = rect;
        rect.intersect_with(&self.rect());
        let bytes = pixel.to_bytes();
        for y in rect.top()..rect.bottom() {
            let row = self.row_mut(y);
            for x in rect.left()..rect.right() {
                let offset = (x * BYTES_PER_PIXEL) as usize;
                row[offset..offset + 4].copy_from_slice(&bytes);
            }
        }
    }

    /// Copies the `dest_rect`-sized area starting at `src_pos` in `src` into
    /// `dest_rect` of this frame. Both rectangles must be in bounds.
    pub fn copy_pixels_from(
        &mut self,
        src: &DesktopFrame,
        src_pos: DesktopVector,
        dest_rect: DesktopRect,
    ) {
        debug_assert!(DesktopRect::from_size(src.size())
            .contains_rect(&DesktopRect::from_origin_size(src_pos, dest_rect.size())));
        debug_assert!(self.rect().contains_rect(&dest_rect));

        let len = (dest_rect.width() * BYTES_PER_PIXEL) as usize;
        let src_offset = (src_pos.x() * BYTES_PER_PIXEL) as usize;
        let dest_offset = (dest_rect.left() * BYTES_PER_PIXEL) as usize;
        for y in 0..dest_rect.height() {
            let src_row = src.row(src_pos.y() + y);
            let dest_row = self.row_mut(dest_rect.top() + y);
            dest_row[dest_offset..dest_offset + len]
                .copy_from_slice(&src_row[src_offset..src_offset + len]);
        }
    }

    /// Pixels that may have changed since the previous frame delivered on the
    /// same source.
    pub fn updated_region(&self) -> &DesktopRegion {
        &self.updated_region
    }

    pub fn updated_region_mut(&mut self) -> &mut DesktopRegion {
        &mut self.updated_region
    }

    /// Origin of the frame within the virtual desktop.
    pub fn top_left(&self) -> DesktopVector {
        self.top_left
    }

    pub fn set_top_left(&mut self, top_left: DesktopVector) {
        self.top_left = top_left;
    }

    pub fn capture_time_ms(&self) -> i64 {
        self.capture_time_ms
    }

    pub fn set_capture_time_ms(&mut self, time_ms: i64) {
        self.capture_time_ms = time_ms;
    }

    /// FourCC-like tag of the producing implementation.
    pub fn capturer_id(&self) -> u32 {
        self.capturer_id
    }

    pub fn set_capturer_id(&mut self, id: u32) {
        self.capturer_id = id;
    }

    pub fn may_contain_cursor(&self) -> bool {
        self.may_contain_cursor
    }

    pub fn set_may_contain_cursor(&mut self, value: bool) {
        self.may_contain_cursor = value;
    }

    /// Converts the frame to an RGBA image.
    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.size.width() as u32, self.size.height() as u32, |x, y| {
            let pixel = self.pixel_at(DesktopVector::new(x as i32, y as i32));
            Rgba([pixel.red, pixel.green, pixel.blue, pixel.alpha])
        })
    }
}

impl std::fmt::Debug for DesktopFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesktopFrame")
            .field("size", &self.size)
            .field("stride", &self.stride)
            .field("top_left", &self.top_left)
            .field("capturer_id", &self.capturer_id)
            .finish()
    }
}

/// A frame handle whose pixel buffer may be shared between instances.
///
/// Each handle carries its own copy of the frame metadata; only the pixels
/// are shared. The buffer is mutable only while the handle is unique.
pub struct SharedDesktopFrame {
    core: Arc<DesktopFrame>,
    updated_region: DesktopRegion,
    top_left: DesktopVector,
    capture_time_ms: i64,
    capturer_id: u32,
    may_contain_cursor: bool,
}

impl SharedDesktopFrame {
    pub fn wrap(mut frame: DesktopFrame) -> Self {
        let updated_region = std::mem::take(&mut frame.updated_region);
        let top_left = frame.top_left;
        let capture_time_ms = frame.capture_time_ms;
        let capturer_id = frame.capturer_id;
        let may_contain_cursor = frame.may_contain_cursor;
        Self {
            core: Arc::new(frame),
            updated_region,
            top_left,
            capture_time_ms,
            capturer_id,
            may_contain_cursor,
        }
    }

    /// Creates another handle to the same pixel buffer with a copy of this
    /// handle's metadata.
    pub fn share(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            updated_region: self.updated_region.clone(),
            top_left: self.top_left,
            capture_time_ms: self.capture_time_ms,
            capturer_id: self.capturer_id,
            may_contain_cursor: self.may_contain_cursor,
        }
    }

    /// True while any other handle references the same buffer.
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.core) > 1
    }

    pub fn shares_buffer_with(&self, other: &SharedDesktopFrame) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    /// Read-only view of the underlying frame. Its metadata is stale; use the
    /// handle accessors instead.
    pub fn as_frame(&self) -> &DesktopFrame {
        &self.core
    }

    pub fn size(&self) -> DesktopSize {
        self.core.size()
    }

    pub fn stride(&self) -> i32 {
        self.core.stride()
    }

    pub fn rect(&self) -> DesktopRect {
        self.core.rect()
    }

    pub fn data(&self) -> &[u8] {
        self.core.data()
    }

    /// Mutable pixel access, available only while the handle is unique.
    pub fn data_mut(&mut self) -> Option<&mut [u8]> {
        Arc::get_mut(&mut self.core).map(|frame| frame.data_mut())
    }

    pub fn row(&self, y: i32) -> &[u8] {
        self.core.row(y)
    }

    pub fn pixel_at(&self, pos: DesktopVector) -> BgraPixel {
        self.core.pixel_at(pos)
    }

    pub fn shared_memory(&self) -> Option<&SharedMemory> {
        self.core.shared_memory()
    }

    pub fn updated_region(&self) -> &DesktopRegion {
        &self.updated_region
    }

    pub fn updated_region_mut(&mut self) -> &mut DesktopRegion {
        &mut self.updated_region
    }

    pub fn top_left(&self) -> DesktopVector {
        self.top_left
    }

    pub fn set_top_left(&mut self, top_left: DesktopVector) {
        self.top_left = top_left;
    }

    pub fn capture_time_ms(&self) -> i64 {
        self.capture_time_ms
    }

    pub fn set_capture_time_ms(&mut self, time_ms: i64) {
        self.capture_time_ms = time_ms;
    }

    pub fn capturer_id(&self) -> u32 {
        self.capturer_id
    }

    pub fn set_capturer_id(&mut self, id: u32) {
        self.capturer_id = id;
    }

    pub fn may_contain_cursor(&self) -> bool {
        self.may_contain_cursor
    }

    pub fn set_may_contain_cursor(&mut self, value: bool) {
        self.may_contain_cursor = value;
    }

    /// Copies `rect` out of this frame into a new handle. The updated region
    /// and origin are remapped into the cropped coordinate space. Returns
    /// `None` when `rect` does not fit inside the frame.
    pub fn crop(&self, rect: DesktopRect) -> Option<SharedDesktopFrame> {
        if rect.is_empty() || !self.rect().contains_rect(&rect) {
            return None;
        }
        let mut out = DesktopFrame::new(rect.size());
        out.copy_pixels_from(self.as_frame(), rect.top_left(), DesktopRect::from_size(rect.size()));
        let mut region = self.updated_region.clone();
        region.intersect_with_rect(&rect);
        region.translate(-rect.left(), -rect.top());
        *out.updated_region_mut() = region;
        out.set_top_left(self.top_left.add(rect.top_left()));
        out.set_capture_time_ms(self.capture_time_ms);
        out.set_capturer_id(self.capturer_id);
        out.set_may_contain_cursor(self.may_contain_cursor);
        Some(SharedDesktopFrame::wrap(out))
    }
}

impl std::fmt::Debug for SharedDesktopFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedDesktopFrame")
            .field("size", &self.size())
            .field("shared", &self.is_shared())
            .field("capturer_id", &self.capturer_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_memory::HeapSharedMemoryFactory;

    fn size(w: i32, h: i32) -> DesktopSize {
        DesktopSize::new(w, h)
    }

    #[test]
    fn test_new_frame_is_black_and_packed() {
        let frame = DesktopFrame::new(size(4, 3));
        assert_eq!(frame.stride(), 16);
        assert_eq!(frame.data().len(), 48);
        assert_eq!(frame.pixel_at(DesktopVector::new(2, 1)), BgraPixel::TRANSPARENT);
    }

    #[test]
    fn test_put_and_get_pixel() {
        let mut frame = DesktopFrame::new(size(8, 8));
        let pixel = BgraPixel::new(1, 2, 3, 4);
        frame.put_pixel(DesktopVector::new(5, 6), pixel);
        assert_eq!(frame.pixel_at(DesktopVector::new(5, 6)), pixel);
        assert_eq!(frame.pixel_at(DesktopVector::new(6, 5)), BgraPixel::TRANSPARENT);
    }

    #[test]
    fn test_negative_stride_addresses_rows_bottom_up() {
        let mut frame = DesktopFrame::with_stride(size(2, 3), -8);
        frame.put_pixel(DesktopVector::new(0, 0), BgraPixel::WHITE);
        // Row 0 of a bottom-up frame lives at the end of the buffer.
        let data = frame.data();
        assert_eq!(&data[16..20], &BgraPixel::WHITE.to_bytes());
        assert_eq!(frame.pixel_at(DesktopVector::new(0, 0)), BgraPixel::WHITE);
        assert_eq!(frame.row(0)[0..4], BgraPixel::WHITE.to_bytes());
    }

    #[test]
    fn test_fill_rect_clips_to_frame() {
        let mut frame = DesktopFrame::new(size(4, 4));
        frame.fill_rect(DesktopRect::ltrb(2, 2, 100, 100), BgraPixel::WHITE);
        assert_eq!(frame.pixel_at(DesktopVector::new(3, 3)), BgraPixel::WHITE);
        assert_eq!(frame.pixel_at(DesktopVector::new(1, 1)), BgraPixel::TRANSPARENT);
    }

    #[test]
    fn test_copy_pixels_from() {
        let mut src = DesktopFrame::new(size(4, 4));
        src.fill_rect(DesktopRect::ltrb(0, 0, 4, 4), BgraPixel::WHITE);
        let mut dest = DesktopFrame::new(size(4, 4));
        dest.copy_pixels_from(&src, DesktopVector::new(0, 0), DesktopRect::ltrb(1, 1, 3, 3));
        assert_eq!(dest.pixel_at(DesktopVector::new(1, 1)), BgraPixel::WHITE);
        assert_eq!(dest.pixel_at(DesktopVector::new(2, 2)), BgraPixel::WHITE);
        assert_eq!(dest.pixel_at(DesktopVector::new(0, 0)), BgraPixel::TRANSPARENT);
        assert_eq!(dest.pixel_at(DesktopVector::new(3, 3)), BgraPixel::TRANSPARENT);
    }

    #[test]
    fn test_factory_allocation_reports_shared_memory() {
        let factory = HeapSharedMemoryFactory::new();
        let frame = DesktopFrame::with_factory(size(2, 2), &factory);
        assert!(frame.shared_memory().is_some());
        assert_eq!(frame.data().len(), 16);
    }

    #[test]
    fn test_share_and_unique_mutation() {
        let frame = DesktopFrame::new(size(2, 2));
        let mut shared = SharedDesktopFrame::wrap(frame);
        assert!(!shared.is_shared());
        assert!(shared.data_mut().is_some());

        let mut other = shared.share();
        assert!(shared.is_shared());
        assert!(other.is_shared());
        assert!(shared.shares_buffer_with(&other));
        assert!(other.data_mut().is_none());

        drop(shared);
        assert!(!other.is_shared());
        assert!(other.data_mut().is_some());
    }

    #[test]
    fn test_shared_metadata_is_per_handle() {
        let frame = DesktopFrame::new(size(10, 10));
        let mut a = SharedDesktopFrame::wrap(frame);
        a.updated_region_mut().add_rect(&DesktopRect::ltrb(0, 0, 5, 5));
        let mut b = a.share();
        b.updated_region_mut().clear();
        b.set_capture_time_ms(99);
        assert!(!a.updated_region().is_empty());
        assert!(b.updated_region().is_empty());
        assert_eq!(a.capture_time_ms(), 0);
        assert_eq!(b.capture_time_ms(), 99);
    }

    #[test]
    fn test_crop_remaps_region_and_origin() {
        let mut frame = DesktopFrame::new(size(10, 10));
        frame.fill_rect(DesktopRect::ltrb(4, 4, 6, 6), BgraPixel::WHITE);
        let mut shared = SharedDesktopFrame::wrap(frame);
        shared.updated_region_mut().add_rect(&DesktopRect::ltrb(4, 4, 6, 6));

        let cropped = shared.crop(DesktopRect::ltrb(3, 3, 8, 8)).unwrap();
        assert_eq!(cropped.size(), size(5, 5));
        assert_eq!(cropped.top_left(), DesktopVector::new(3, 3));
        assert_eq!(cropped.pixel_at(DesktopVector::new(1, 1)), BgraPixel::WHITE);
        assert_eq!(cropped.pixel_at(DesktopVector::new(0, 0)), BgraPixel::TRANSPARENT);
        let rects: Vec<_> = cropped.updated_region().iter().collect();
        assert_eq!(rects, vec![DesktopRect::ltrb(1, 1, 3, 3)]);

        assert!(shared.crop(DesktopRect::ltrb(5, 5, 20, 20)).is_none());
    }

    #[test]
    fn test_to_rgba_image_swaps_channels() {
        let mut frame = DesktopFrame::new(size(2, 1));
        frame.put_pixel(DesktopVector::new(0, 0), BgraPixel::new(10, 20, 30, 40));
        let img = frame.to_rgba_image();
        assert_eq!(img.get_pixel(0, 0).0, [30, 20, 10, 40]);
    }
}
