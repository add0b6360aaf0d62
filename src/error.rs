use std::error::Error;
use std::fmt;

/// Recoverable allocation failures.
///
/// Corruption conditions (double free, foreign pointer, a heap source that
/// breaks contiguity) are not represented here; those panic, since the block
/// list cannot be trusted once they are observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The heap source reported exhaustion.
    Exhausted,
    /// A zero-byte request.
    ZeroSize,
    /// The request overflowed: `count * element_size` wrapped, or the size
    /// cannot be aligned and header-extended within `usize`.
    Overflow,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::Exhausted => write!(f, "heap source exhausted"),
            AllocError::ZeroSize => write!(f, "zero-size allocation request"),
            AllocError::Overflow => write!(f, "allocation size overflow"),
        }
    }
}

impl Error for AllocError {}
