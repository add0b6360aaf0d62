use std::fmt;

/// Snapshot of a heap's lifetime counters.
///
/// `reuses + grows == mallocs` holds at all times: every successful
/// allocation is attributed to exactly one source.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Successful allocation calls.
    pub mallocs: u64,
    /// Deallocation calls (null no-ops excluded).
    pub frees: u64,
    /// Allocations satisfied from the free list.
    pub reuses: u64,
    /// Allocations satisfied by growing the heap.
    pub grows: u64,
    /// Splits performed.
    pub splits: u64,
    /// Coalesce merges performed.
    pub coalesces: u64,
    /// Blocks currently in the list.
    pub blocks: u64,
    /// Cumulative bytes requested, before alignment.
    pub requested: u64,
    /// High-water mark of bytes obtained from the heap source.
    pub max_heap: u64,
}

impl fmt::Display for HeapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "heap management statistics")?;
        writeln!(f, "mallocs:\t{}", self.mallocs)?;
        writeln!(f, "frees:\t\t{}", self.frees)?;
        writeln!(f, "reuses:\t\t{}", self.reuses)?;
        writeln!(f, "grows:\t\t{}", self.grows)?;
        writeln!(f, "splits:\t\t{}", self.splits)?;
        writeln!(f, "coalesces:\t{}", self.coalesces)?;
        writeln!(f, "blocks:\t\t{}", self.blocks)?;
        writeln!(f, "requested:\t{}", self.requested)?;
        write!(f, "max heap:\t{}", self.max_heap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_every_counter_in_order() {
        let stats = HeapStats {
            mallocs: 9,
            frees: 8,
            reuses: 7,
            grows: 2,
            splits: 3,
            coalesces: 4,
            blocks: 5,
            requested: 600,
            max_heap: 1024,
        };

        let report = stats.to_string();
        let labels: Vec<&str> = report
            .lines()
            .skip(1)
            .map(|line| line.split(':').next().unwrap())
            .collect();

        assert_eq!(
            labels,
            [
                "mallocs",
                "frees",
                "reuses",
                "grows",
                "splits",
                "coalesces",
                "blocks",
                "requested",
                "max heap"
            ]
        );
        assert!(report.ends_with("max heap:\t1024"));
    }
}
