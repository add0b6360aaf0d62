use std::ptr;

use crate::block::Block;

/// Policy for choosing which free block satisfies a request.
///
/// Chosen once at heap construction. Every variant scans the address-ordered
/// list read-only; ties go to the block encountered first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitStrategy {
    /// Earliest qualifying block in address order.
    #[default]
    FirstFit,
    /// Qualifying block with the smallest leftover.
    BestFit,
    /// Qualifying block with the largest leftover.
    WorstFit,
    /// Resume after the previously satisfied allocation, wrapping once.
    NextFit,
}

impl FitStrategy {
    /// Scan the list rooted at `head` for a free block with at least `size`
    /// payload bytes. `cursor` is the block that satisfied the previous
    /// NextFit allocation (null before the first); the other policies
    /// ignore it. Returns null when nothing qualifies.
    pub(crate) unsafe fn find(
        self,
        head: *mut Block,
        cursor: *mut Block,
        size: usize,
    ) -> *mut Block {
        match self {
            FitStrategy::FirstFit => first_fit(head, size),
            FitStrategy::BestFit => best_fit(head, size),
            FitStrategy::WorstFit => worst_fit(head, size),
            FitStrategy::NextFit => next_fit(head, cursor, size),
        }
    }
}

unsafe fn fits(block: *mut Block, size: usize) -> bool {
    (*block).free && (*block).size >= size
}

unsafe fn first_fit(head: *mut Block, size: usize) -> *mut Block {
    let mut curr = head;

    while !curr.is_null() {
        if fits(curr, size) {
            return curr;
        }
        curr = (*curr).next;
    }

    ptr::null_mut()
}

unsafe fn best_fit(head: *mut Block, size: usize) -> *mut Block {
    let mut best: *mut Block = ptr::null_mut();
    let mut best_waste = 0;
    let mut curr = head;

    while !curr.is_null() {
        if fits(curr, size) {
            let waste = (*curr).size - size;

            if best.is_null() || waste < best_waste {
                best = curr;
                best_waste = waste;
            }
        }
        curr = (*curr).next;
    }

    best
}

unsafe fn worst_fit(head: *mut Block, size: usize) -> *mut Block {
    let mut worst: *mut Block = ptr::null_mut();
    let mut worst_waste = 0;
    let mut curr = head;

    while !curr.is_null() {
        if fits(curr, size) {
            let waste = (*curr).size - size;

            // strict comparison so an exact fit found first still wins
            // over later exact fits
            if worst.is_null() || waste > worst_waste {
                worst = curr;
                worst_waste = waste;
            }
        }
        curr = (*curr).next;
    }

    worst
}

/// Two-leg scan: cursor's successor to the tail, then head back up to and
/// including the cursor. Covers every block exactly once.
unsafe fn next_fit(head: *mut Block, cursor: *mut Block, size: usize) -> *mut Block {
    if head.is_null() {
        return ptr::null_mut();
    }

    let start = if cursor.is_null() {
        head
    } else {
        let after = (*cursor).next;
        if after.is_null() {
            head
        } else {
            after
        }
    };

    let mut curr = start;
    while !curr.is_null() {
        if fits(curr, size) {
            return curr;
        }
        curr = (*curr).next;
    }

    curr = head;
    while curr != start {
        if fits(curr, size) {
            return curr;
        }
        curr = (*curr).next;
    }

    ptr::null_mut()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(shape: &[(usize, bool)]) -> Vec<Box<Block>> {
        shape.iter()
            .map(|&(size, free)| Box::new(Block::new(size, free)))
            .collect()
    }

    fn link(chain: &mut [Box<Block>]) -> *mut Block {
        for i in 0..chain.len() - 1 {
            let curr: *mut Block = &mut *chain[i];
            let next: *mut Block = &mut *chain[i + 1];

            unsafe {
                (*curr).next = next;
                (*next).prev = curr;
            }
        }

        &mut *chain[0]
    }

    fn at(chain: &mut [Box<Block>], i: usize) -> *mut Block {
        &mut *chain[i]
    }

    #[test]
    fn first_fit_takes_the_earliest_qualifier() {
        let mut chain = blocks(&[(64, false), (32, true), (128, true)]);
        let head = link(&mut chain);

        let hit = unsafe { FitStrategy::FirstFit.find(head, ptr::null_mut(), 16) };
        assert_eq!(hit, at(&mut chain, 1));
    }

    #[test]
    fn first_fit_skips_too_small_free_blocks() {
        let mut chain = blocks(&[(8, true), (16, false), (64, true)]);
        let head = link(&mut chain);

        let hit = unsafe { FitStrategy::FirstFit.find(head, ptr::null_mut(), 32) };
        assert_eq!(hit, at(&mut chain, 2));
    }

    #[test]
    fn best_fit_minimizes_leftover() {
        let mut chain = blocks(&[(128, true), (16, false), (64, true), (96, true)]);
        let head = link(&mut chain);

        let hit = unsafe { FitStrategy::BestFit.find(head, ptr::null_mut(), 60) };
        assert_eq!(hit, at(&mut chain, 2));
    }

    #[test]
    fn best_fit_tie_goes_to_the_first_encountered() {
        let mut chain = blocks(&[(64, true), (64, true)]);
        let head = link(&mut chain);

        let hit = unsafe { FitStrategy::BestFit.find(head, ptr::null_mut(), 32) };
        assert_eq!(hit, at(&mut chain, 0));
    }

    #[test]
    fn worst_fit_maximizes_leftover() {
        let mut chain = blocks(&[(64, true), (16, false), (128, true), (96, true)]);
        let head = link(&mut chain);

        let hit = unsafe { FitStrategy::WorstFit.find(head, ptr::null_mut(), 60) };
        assert_eq!(hit, at(&mut chain, 2));
    }

    #[test]
    fn worst_fit_accepts_an_exact_fit() {
        let mut chain = blocks(&[(32, true)]);
        let head = link(&mut chain);

        let hit = unsafe { FitStrategy::WorstFit.find(head, ptr::null_mut(), 32) };
        assert_eq!(hit, at(&mut chain, 0));
    }

    #[test]
    fn next_fit_resumes_after_the_cursor() {
        let mut chain = blocks(&[(32, true), (32, false), (32, true), (32, true)]);
        let head = link(&mut chain);
        let cursor = at(&mut chain, 0);

        let hit = unsafe { FitStrategy::NextFit.find(head, cursor, 16) };
        assert_eq!(hit, at(&mut chain, 2));
    }

    #[test]
    fn next_fit_wraps_to_the_head() {
        let mut chain = blocks(&[(32, true), (32, false), (32, false)]);
        let head = link(&mut chain);
        let cursor = at(&mut chain, 2);

        let hit = unsafe { FitStrategy::NextFit.find(head, cursor, 16) };
        assert_eq!(hit, at(&mut chain, 0));
    }

    #[test]
    fn next_fit_reaches_the_cursor_block_itself_last() {
        let mut chain = blocks(&[(32, false), (32, true), (32, false)]);
        let head = link(&mut chain);
        let cursor = at(&mut chain, 1);

        let hit = unsafe { FitStrategy::NextFit.find(head, cursor, 16) };
        assert_eq!(hit, cursor);
    }

    #[test]
    fn every_strategy_reports_a_miss_as_null() {
        let mut chain = blocks(&[(32, false), (8, true)]);
        let head = link(&mut chain);

        for strategy in [
            FitStrategy::FirstFit,
            FitStrategy::BestFit,
            FitStrategy::WorstFit,
            FitStrategy::NextFit,
        ] {
            let hit = unsafe { strategy.find(head, ptr::null_mut(), 64) };
            assert!(hit.is_null());
        }
    }
}
