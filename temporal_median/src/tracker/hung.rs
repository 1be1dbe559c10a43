use super::{MedianTracker, WindowHistogram};

/// Change of the count below the median bucket, indexed by
/// `3 * side(outgoing) + side(incoming)` with sides `<`, `=`, `>`.
const LOOKUP_LB: [i32; 9] = [0, -1, -1, 1, 0, 0, 1, 0, 0];
/// Change of the count at or below the median bucket, same indexing.
const LOOKUP_UB: [i32; 9] = [0, 0, -1, 0, 0, -1, 1, 1, 0];

/// Median tracker following Hung et al., "A Fast Algorithm of Temporal Median
/// Filter for Background Subtraction".
///
/// The median bucket stays valid while `lb <= center < ub`, where `lb` counts
/// window values below the bucket and `ub` those at or below it.
#[derive(Debug, Clone)]
pub struct HungTracker {
    window: WindowHistogram,
    median: u32,
    lb: i32,
    ub: i32,
}

impl HungTracker {
    fn rebuild(&mut self) {
        let (median, below) = self.window.scan_median();
        self.median = median;
        self.lb = below as i32;
        self.ub = (below + self.window.count(median)) as i32;
    }

    #[inline]
    fn side(&self, rank: u32) -> usize {
        match rank.cmp(&self.median) {
            std::cmp::Ordering::Less => 0,
            std::cmp::Ordering::Equal => 1,
            std::cmp::Ordering::Greater => 2,
        }
    }
}

impl MedianTracker for HungTracker {
    fn new(window: usize, max_rank: u32) -> Self {
        Self {
            window: WindowHistogram::new(window, max_rank),
            median: 0,
            lb: 0,
            ub: 0,
        }
    }

    fn seed(&mut self, ranks: impl IntoIterator<Item = u32>) {
        self.window.seed(ranks);
        self.rebuild();
    }

    #[inline]
    fn add(&mut self, rank: u32) {
        let old = self.window.push(rank);
        let c = 3 * self.side(old) + self.side(rank);
        self.lb += LOOKUP_LB[c];
        self.ub += LOOKUP_UB[c];

        let center = self.window.center as i32;
        if !(self.lb <= center && center < self.ub) {
            self.rebuild();
        }
    }

    #[inline]
    fn get(&self) -> u32 {
        self.median
    }
}
