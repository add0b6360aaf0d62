use std::cmp;
use std::ptr::{self, NonNull};
use std::thread;

use log::debug;

use crate::block::{align4, aligned_unit, Block, BLOCK_MAGIC, HEADER_SIZE, MIN_SPLIT_PAYLOAD};
use crate::error::AllocError;
#[cfg(unix)]
use crate::source::Sbrk;
use crate::source::HeapSource;
use crate::stats::HeapStats;
use crate::strategy::FitStrategy;

/// A free-list allocator over a [`HeapSource`].
///
/// The context owns the block list head, the NextFit cursor, and the
/// lifetime counters, so independent instances never share state. Blocks
/// are appended in address order as the source grows and are never returned
/// to it; splitting and coalescing rearrange the list in place.
///
/// Dropping the heap writes the statistics report to stderr, once, and not
/// while panicking.
pub struct Heap<S: HeapSource> {
    source: S,
    strategy: FitStrategy,
    head: *mut Block,
    tail: *mut Block,
    /// Block that satisfied the previous NextFit allocation.
    cursor: *mut Block,
    heap_bytes: u64,
    stats: HeapStats,
}

#[cfg(unix)]
impl Heap<Sbrk> {
    /// Allocator over the real program break.
    pub fn over_sbrk(strategy: FitStrategy) -> Self {
        Heap::new(Sbrk, strategy)
    }
}

impl<S: HeapSource> Heap<S> {
    pub fn new(source: S, strategy: FitStrategy) -> Self {
        Heap {
            source,
            strategy,
            head: ptr::null_mut(),
            tail: ptr::null_mut(),
            cursor: ptr::null_mut(),
            heap_bytes: 0,
            stats: HeapStats::default(),
        }
    }

    pub fn strategy(&self) -> FitStrategy {
        self.strategy
    }

    /// Counter snapshot.
    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    /// `malloc`. Returns a 4-byte-aligned payload of at least `size` bytes,
    /// rounded up to the next 4-byte allocation unit. The region is not
    /// zero-initialized. Zero-size requests fail without touching the list,
    /// sizes too large to align and header-extend report
    /// [`AllocError::Overflow`], and a source that cannot grow fails
    /// without side effects.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }

        let unit = aligned_unit(size).ok_or(AllocError::Overflow)?;
        let found = unsafe { self.strategy.find(self.head, self.cursor, unit) };

        let block = if found.is_null() {
            self.grow(unit).ok_or(AllocError::Exhausted)?
        } else {
            unsafe {
                if (*found).size > unit + HEADER_SIZE + MIN_SPLIT_PAYLOAD {
                    self.split(found, unit);
                }
            }

            if self.strategy == FitStrategy::NextFit {
                self.cursor = found;
            }

            self.stats.reuses += 1;
            found
        };

        unsafe { (*block).free = false };

        self.stats.mallocs += 1;
        self.stats.requested += size as u64;

        Ok(unsafe { NonNull::new_unchecked(Block::payload_of(block)) })
    }

    /// `free`. Null is a no-op. Panics on a double free or on a pointer
    /// that did not come from this allocator; the list cannot be trusted
    /// after either, so neither is recoverable.
    pub unsafe fn deallocate(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }

        let block = self.checked_header(ptr);
        assert!(!(*block).free, "double free of {:p}", ptr);

        (*block).free = true;
        self.stats.frees += 1;

        self.coalesce(block);
    }

    /// `calloc`. Fails on multiplication overflow before any allocation is
    /// attempted; on success the whole region reads as zero.
    pub fn allocate_zeroed(
        &mut self,
        count: usize,
        element_size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        let total = count
            .checked_mul(element_size)
            .ok_or(AllocError::Overflow)?;

        let ptr = self.allocate(total)?;
        unsafe { ptr::write_bytes(ptr.as_ptr(), 0, total) };

        Ok(ptr)
    }

    /// `realloc`. Null behaves as [`allocate`](Heap::allocate); a zero
    /// `new_size` behaves as [`deallocate`](Heap::deallocate) and reports
    /// [`AllocError::ZeroSize`]. A shrink keeps the pointer and, when the
    /// tail is big enough to stand alone, splits it back into the free
    /// list. A grow moves the data to a fresh block; if that allocation
    /// fails the old block is left valid and untouched. Panics on a foreign
    /// pointer or a block that is already free, like
    /// [`deallocate`](Heap::deallocate).
    pub unsafe fn reallocate(
        &mut self,
        ptr: *mut u8,
        new_size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        if ptr.is_null() {
            return self.allocate(new_size);
        }

        if new_size == 0 {
            self.deallocate(ptr);
            return Err(AllocError::ZeroSize);
        }

        let block = self.checked_header(ptr);
        assert!(!(*block).free, "reallocate of freed block {:p}", ptr);

        let old_size = (*block).size;

        if new_size <= old_size {
            self.shrink(block, align4(new_size));
            return Ok(NonNull::new_unchecked(ptr));
        }

        let new_ptr = self.allocate(new_size)?;
        ptr::copy_nonoverlapping(ptr, new_ptr.as_ptr(), cmp::min(old_size, new_size));
        self.deallocate(ptr);

        Ok(new_ptr)
    }

    /// Payload capacity currently recorded for `ptr`'s block.
    pub unsafe fn usable_size(&self, ptr: *mut u8) -> usize {
        let block = self.checked_header(ptr);

        (*block).size
    }

    /// Resolve the header and verify its tag, so foreign pointers die with
    /// a diagnostic instead of corrupting the list.
    unsafe fn checked_header(&self, ptr: *mut u8) -> *mut Block {
        let block = Block::header_of(ptr);
        assert!(
            (*block).magic == BLOCK_MAGIC,
            "pointer {:p} was not allocated by this heap",
            ptr
        );

        block
    }

    /// Ask the source for `header + size` more bytes and append the new
    /// block at the tail, marked allocated. Returns `None` on exhaustion
    /// with the list untouched; panics if the source hands back a region
    /// that is not contiguous with its advertised break.
    fn grow(&mut self, size: usize) -> Option<*mut Block> {
        let total = HEADER_SIZE + size;
        let top = self.source.current();
        let prev = self.source.extend(total)?;

        assert!(
            prev.as_ptr() == top,
            "heap source broke contiguity: extended from {:p}, expected {:p}",
            prev.as_ptr(),
            top
        );

        let block = prev.as_ptr() as *mut Block;

        unsafe {
            let mut header = Block::new(size, false);
            header.prev = self.tail;
            ptr::write(block, header);

            if self.head.is_null() {
                self.head = block;
            } else {
                (*self.tail).next = block;
            }
        }
        self.tail = block;

        self.heap_bytes += total as u64;
        self.stats.max_heap = cmp::max(self.stats.max_heap, self.heap_bytes);
        self.stats.grows += 1;
        self.stats.blocks += 1;

        debug!("grew heap by {} bytes, block {:p}", total, block);

        Some(block)
    }

    /// Carve the tail of `block` into a new free block holding whatever
    /// remains past `unit` payload bytes. Caller has checked the remainder
    /// is big enough to be worth keeping.
    unsafe fn split(&mut self, block: *mut Block, unit: usize) {
        let remainder = (*block).size - unit - HEADER_SIZE;
        let carved = Block::payload_of(block).add(unit) as *mut Block;

        let mut header = Block::new(remainder, true);
        header.next = (*block).next;
        header.prev = block;
        ptr::write(carved, header);

        let after = (*carved).next;
        if !after.is_null() {
            (*after).prev = carved;
        }

        (*block).next = carved;
        (*block).size = unit;

        if self.tail == block {
            self.tail = carved;
        }

        self.stats.splits += 1;
        self.stats.blocks += 1;

        debug!("split block {:p}: kept {}, carved {}", block, unit, remainder);
    }

    /// Fold free neighbors of a just-freed block into one. Forward first,
    /// then backward, so a triple of adjacent free blocks collapses into a
    /// single block spanning all three regions.
    unsafe fn coalesce(&mut self, block: *mut Block) {
        let next = (*block).next;
        if !next.is_null() && (*next).free {
            self.absorb(block, next);
        }

        let prev = (*block).prev;
        if !prev.is_null() && (*prev).free {
            self.absorb(prev, block);
        }
    }

    /// `left` swallows its list successor `right`.
    unsafe fn absorb(&mut self, left: *mut Block, right: *mut Block) {
        (*left).size += HEADER_SIZE + (*right).size;
        (*left).next = (*right).next;

        let after = (*left).next;
        if !after.is_null() {
            (*after).prev = left;
        }

        if self.tail == right {
            self.tail = left;
        }
        // keep the NextFit cursor off the absorbed block
        if self.cursor == right {
            self.cursor = left;
        }

        self.stats.coalesces += 1;
        self.stats.blocks -= 1;

        let merged = (*left).size;
        debug!("coalesced {:p} into {:p} ({} bytes)", right, left, merged);
    }

    /// Shrink an allocated block to `unit` payload bytes. Splits the tail
    /// off as a free block when it can hold a header plus the minimum
    /// payload, otherwise the tail bytes stay orphaned behind the recorded
    /// size, as the size-only shrink always leaves them.
    unsafe fn shrink(&mut self, block: *mut Block, unit: usize) {
        if (*block).size > unit + HEADER_SIZE + MIN_SPLIT_PAYLOAD {
            self.split(block, unit);

            // the carved remainder may now sit against a free successor
            let carved = (*block).next;
            let after = (*carved).next;
            if !after.is_null() && (*after).free {
                self.absorb(carved, after);
            }
        } else {
            (*block).size = unit;
        }
    }
}

impl<S: HeapSource> Drop for Heap<S> {
    fn drop(&mut self) {
        // fatal diagnostics must not produce a report
        if !thread::panicking() {
            eprintln!("\n{}", self.stats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Arena;

    fn heap(capacity: usize, strategy: FitStrategy) -> Heap<Arena> {
        Heap::new(Arena::new(capacity), strategy)
    }

    #[test]
    fn split_accounts_for_every_byte() {
        let mut heap = heap(4096, FitStrategy::FirstFit);

        let p = heap.allocate(128).unwrap();
        unsafe { heap.deallocate(p.as_ptr()) };

        let q = heap.allocate(16).unwrap();
        assert_eq!(q, p);

        unsafe {
            assert_eq!(heap.usable_size(q.as_ptr()), 16);
        }

        let stats = heap.stats();
        assert_eq!(stats.splits, 1);
        assert_eq!(stats.blocks, 2);
        assert_eq!(stats.grows, 1);

        // the carved remainder holds the rest of the original span
        let r = heap.allocate(128 - 16 - HEADER_SIZE).unwrap();
        assert_eq!(heap.stats().grows, 1);
        assert_eq!(heap.stats().reuses, 2);
        assert_eq!(r.as_ptr() as usize - q.as_ptr() as usize, 16 + HEADER_SIZE);
    }

    #[test]
    fn undersized_leftover_is_not_split() {
        let mut heap = heap(4096, FitStrategy::FirstFit);

        let p = heap.allocate(40).unwrap();
        unsafe { heap.deallocate(p.as_ptr()) };

        // leftover after a 16-byte reuse is 24 < header + minimum payload
        let q = heap.allocate(16).unwrap();
        assert_eq!(q, p);
        unsafe {
            assert_eq!(heap.usable_size(q.as_ptr()), 40);
        }
        assert_eq!(heap.stats().splits, 0);
    }

    #[test]
    fn grown_blocks_are_appended_in_address_order() {
        let mut heap = heap(4096, FitStrategy::FirstFit);

        let a = heap.allocate(8).unwrap();
        let b = heap.allocate(8).unwrap();
        let c = heap.allocate(8).unwrap();

        assert!(a < b && b < c);
        assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 8 + HEADER_SIZE);
        assert_eq!(heap.stats().blocks, 3);
    }

    struct Skewed {
        arena: Arena,
    }

    unsafe impl HeapSource for Skewed {
        fn current(&self) -> *mut u8 {
            self.arena.current()
        }

        // hands back a region one unit past the advertised break
        fn extend(&mut self, delta: usize) -> Option<NonNull<u8>> {
            let prev = self.arena.extend(delta + 4)?;

            Some(unsafe { NonNull::new_unchecked(prev.as_ptr().add(4)) })
        }
    }

    #[test]
    #[should_panic(expected = "broke contiguity")]
    fn non_contiguous_source_is_fatal() {
        let mut heap = Heap::new(
            Skewed {
                arena: Arena::new(4096),
            },
            FitStrategy::FirstFit,
        );

        let _ = heap.allocate(8);
    }
}
