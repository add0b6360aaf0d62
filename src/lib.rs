//! An sbrk-style free-list allocator with pluggable fit strategies.
//!
//! Every allocation is a header-prefixed block in a single address-ordered
//! list. Requests are rounded up to 4-byte units and satisfied either by
//! reusing a free block chosen by the configured [`FitStrategy`], splitting
//! it when the leftover is worth keeping, or by extending the heap through
//! a [`HeapSource`]. Frees coalesce with both neighbors, so no two adjacent
//! blocks are ever simultaneously free.
//!
//! The allocator is an ordinary value, not a global: construct a [`Heap`]
//! over the real program break ([`Sbrk`]) or over a bounded in-process
//! [`Arena`], which is what the tests use. Dropping a heap prints its
//! lifetime counters ([`HeapStats`]) to stderr.
//!
//! ```
//! use fitalloc::{Arena, FitStrategy, Heap};
//!
//! let mut heap = Heap::new(Arena::new(64 * 1024), FitStrategy::BestFit);
//! let ptr = heap.allocate(24).unwrap();
//!
//! unsafe {
//!     ptr.as_ptr().write(7);
//!     assert_eq!(*ptr.as_ptr(), 7);
//!     heap.deallocate(ptr.as_ptr());
//! }
//! ```
//!
//! For concurrent callers, [`LockedHeap`] serializes the whole entry-point
//! surface behind one mutex.

mod block;
mod error;
mod heap;
mod locked;
mod source;
mod stats;
mod strategy;

pub use error::AllocError;
pub use heap::Heap;
pub use locked::LockedHeap;
#[cfg(unix)]
pub use source::Sbrk;
pub use source::{Arena, HeapSource};
pub use stats::HeapStats;
pub use strategy::FitStrategy;
