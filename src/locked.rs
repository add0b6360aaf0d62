use std::ptr::NonNull;
use std::sync::Mutex;

use crate::error::AllocError;
use crate::heap::Heap;
use crate::source::HeapSource;
use crate::stats::HeapStats;

/// A mutex-serialized heap for concurrent callers.
///
/// One lock spans every entry point, covering list traversal, splitting,
/// growth, and coalescing. A split or coalesce observed mid-mutation by a
/// second thread corrupts the list, so nothing finer-grained is offered.
pub struct LockedHeap<S: HeapSource> {
    inner: Mutex<Heap<S>>,
}

// Raw list pointers are only reachable while the lock is held.
unsafe impl<S: HeapSource + Send> Send for LockedHeap<S> {}
unsafe impl<S: HeapSource + Send> Sync for LockedHeap<S> {}

impl<S: HeapSource> LockedHeap<S> {
    pub fn new(heap: Heap<S>) -> Self {
        LockedHeap {
            inner: Mutex::new(heap),
        }
    }

    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        self.inner.lock().unwrap().allocate(size)
    }

    /// See [`Heap::deallocate`].
    pub unsafe fn deallocate(&self, ptr: *mut u8) {
        self.inner.lock().unwrap().deallocate(ptr)
    }

    pub fn allocate_zeroed(
        &self,
        count: usize,
        element_size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        self.inner.lock().unwrap().allocate_zeroed(count, element_size)
    }

    /// See [`Heap::reallocate`].
    pub unsafe fn reallocate(
        &self,
        ptr: *mut u8,
        new_size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        self.inner.lock().unwrap().reallocate(ptr, new_size)
    }

    pub fn stats(&self) -> HeapStats {
        self.inner.lock().unwrap().stats()
    }
}
