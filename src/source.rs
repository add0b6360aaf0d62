use std::alloc::{alloc, dealloc, Layout};
use std::mem;
use std::ptr::NonNull;

use crate::block::Block;

/// Boundary to the OS heap-growth primitive.
///
/// The allocator treats the source as a monotonically advancing break: every
/// successful [`extend`](HeapSource::extend) must return the previous break
/// and advance it by exactly `delta` bytes. The allocator verifies this on
/// every growth and aborts if it does not hold.
///
/// # Safety
///
/// Implementors must return regions that are valid for reads and writes of
/// `delta` bytes, at least 4-byte aligned, and not handed out to anyone
/// else for as long as the source is alive.
pub unsafe trait HeapSource {
    /// Current break address.
    fn current(&self) -> *mut u8;

    /// Advance the break by `delta` bytes. Returns the previous break, or
    /// `None` if the underlying memory is exhausted.
    fn extend(&mut self, delta: usize) -> Option<NonNull<u8>>;
}

/// The real program break, via `sbrk(2)`.
///
/// Process-global state: two `Sbrk`-backed heaps in one process would fight
/// over the same break, as would any other library that moves it.
#[cfg(unix)]
pub struct Sbrk;

#[cfg(unix)]
unsafe impl HeapSource for Sbrk {
    fn current(&self) -> *mut u8 {
        unsafe { libc::sbrk(0) as *mut u8 }
    }

    fn extend(&mut self, delta: usize) -> Option<NonNull<u8>> {
        let prev = unsafe { libc::sbrk(delta as libc::intptr_t) };

        if prev == usize::MAX as *mut libc::c_void {
            None
        } else {
            NonNull::new(prev as *mut u8)
        }
    }
}

/// A bounded in-memory break.
///
/// Behaves exactly like `sbrk` over a fixed reservation, so independent
/// allocator instances can coexist in one process and exhaustion is
/// reproducible. This is what the tests and benches run on.
pub struct Arena {
    base: NonNull<u8>,
    capacity: usize,
    brk: usize,
}

// The buffer is owned exclusively; nothing aliases it until the allocator
// hands payloads out.
unsafe impl Send for Arena {}

impl Arena {
    /// Reserve `capacity` bytes. Panics if the reservation itself fails.
    pub fn new(capacity: usize) -> Arena {
        assert!(capacity > 0, "arena capacity must be non-zero");

        let layout = Layout::from_size_align(capacity, mem::align_of::<Block>()).unwrap();
        let ptr = unsafe { alloc(layout) };

        Arena {
            base: NonNull::new(ptr).expect("arena reservation failed"),
            capacity,
            brk: 0,
        }
    }

    /// Bytes left below the reservation limit.
    pub fn remaining(&self) -> usize {
        self.capacity - self.brk
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        let layout = Layout::from_size_align(self.capacity, mem::align_of::<Block>()).unwrap();

        unsafe { dealloc(self.base.as_ptr(), layout) };
    }
}

unsafe impl HeapSource for Arena {
    fn current(&self) -> *mut u8 {
        unsafe { self.base.as_ptr().add(self.brk) }
    }

    fn extend(&mut self, delta: usize) -> Option<NonNull<u8>> {
        if delta > self.capacity - self.brk {
            return None;
        }

        let prev = self.current();
        self.brk += delta;

        NonNull::new(prev)
    }
}
