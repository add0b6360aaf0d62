use std::mem;
use std::ptr;

/// Tag written into every header so frees of foreign pointers are caught
/// instead of corrupting the list.
pub(crate) const BLOCK_MAGIC: u32 = 0x4649_5442; // "FITB"

/// Payloads are carved in 4-byte units.
pub(crate) const ALIGNMENT: usize = 4;

pub(crate) const HEADER_SIZE: usize = mem::size_of::<Block>();

/// Smallest payload worth carving into a block of its own. A split only
/// happens when the leftover exceeds `HEADER_SIZE + MIN_SPLIT_PAYLOAD`.
pub(crate) const MIN_SPLIT_PAYLOAD: usize = ALIGNMENT;

/// Header preceding every payload handed to a caller.
///
/// Headers land on 4-byte boundaries between payloads, so the struct is
/// packed down to that alignment. Fields are only ever read and written by
/// value through raw pointers; no references into a header are formed.
#[repr(C, packed(4))]
pub(crate) struct Block {
    /// Usable payload capacity in bytes, header excluded.
    pub size: usize,
    pub next: *mut Block,
    /// Back link for adjacency checks only.
    pub prev: *mut Block,
    pub magic: u32,
    pub free: bool,
}

impl Block {
    pub(crate) fn new(size: usize, free: bool) -> Self {
        Block {
            size,
            next: ptr::null_mut(),
            prev: ptr::null_mut(),
            magic: BLOCK_MAGIC,
            free,
        }
    }

    /// The payload starts immediately after the header.
    pub(crate) unsafe fn payload_of(block: *mut Block) -> *mut u8 {
        block.add(1) as *mut u8
    }

    /// Inverse of [`Block::payload_of`]. The sole place the fixed offset is
    /// computed from the payload side.
    pub(crate) unsafe fn header_of(payload: *mut u8) -> *mut Block {
        (payload as *mut Block).sub(1)
    }
}

/// Round a request up to the next multiple of 4 bytes. Callers handle zero
/// before getting here and guarantee the sum cannot overflow, so the result
/// is always at least 4.
pub(crate) fn align4(size: usize) -> usize {
    (size + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

/// Allocation unit for a fresh request: [`align4`] with overflow checked,
/// refusing sizes that cannot also carry a header. A wrapped unit would let
/// any free block "fit" a near-`usize::MAX` request.
pub(crate) fn aligned_unit(size: usize) -> Option<usize> {
    let unit = size.checked_add(ALIGNMENT - 1)? & !(ALIGNMENT - 1);
    unit.checked_add(HEADER_SIZE)?;

    Some(unit)
}
