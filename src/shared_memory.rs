//! Pluggable allocation of frame buffers.
//!
//! Real deployments back [`SharedMemory`] with OS shared memory so frames can
//! cross a process boundary without copying; that plumbing lives with the
//! embedder. The core only needs a buffer, a caller-chosen id and the native
//! handle to ship alongside a frame.

use std::sync::atomic::{AtomicI64, Ordering};

/// A native handle value meaning "no shared memory attached".
pub const SHARED_MEMORY_NULL_HANDLE: isize = 0;

/// A buffer that may be shared with other processes.
pub struct SharedMemory {
    data: Vec<u8>,
    id: i64,
    native_handle: isize,
}

impl SharedMemory {
    pub fn new(size: usize, id: i64, native_handle: isize) -> Self {
        Self {
            data: vec![0; size],
            id,
            native_handle,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn native_handle(&self) -> isize {
        self.native_handle
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl std::fmt::Debug for SharedMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemory")
            .field("id", &self.id)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Allocator for [`SharedMemory`] buffers. May be called from whichever
/// thread the capturer chooses, so implementations must be `Send + Sync`.
pub trait SharedMemoryFactory: Send + Sync {
    /// Returns `None` when allocation fails; callers degrade to heap buffers
    /// where they can.
    fn create_shared_memory(&self, size: usize) -> Option<SharedMemory>;
}

/// A factory producing plain heap buffers with sequential ids. Stands in for
/// a real shared-memory allocator in tests and single-process embedders.
#[derive(Debug, Default)]
pub struct HeapSharedMemoryFactory {
    next_id: AtomicI64,
}

impl HeapSharedMemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SharedMemoryFactory for HeapSharedMemoryFactory {
    fn create_shared_memory(&self, size: usize) -> Option<SharedMemory> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        Some(SharedMemory::new(size, id, SHARED_MEMORY_NULL_HANDLE))
    }
}
