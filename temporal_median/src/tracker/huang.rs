use super::{MedianTracker, WindowHistogram};

/// Median tracker following Huang, Yang & Tang (1979).
///
/// `aux` is the 1-based position of the centre order statistic within the run
/// of equal values in the median bucket. The bucket only changes when `aux`
/// runs off the start or end of that run.
#[derive(Debug, Clone)]
pub struct HuangTracker {
    window: WindowHistogram,
    median: u32,
    aux: u32,
}

impl HuangTracker {
    #[inline]
    fn step_right(&mut self) {
        self.median = self.window.next_occupied(self.median);
        self.aux = 1;
    }

    #[inline]
    fn step_left(&mut self) {
        self.median = self.window.prev_occupied(self.median);
        self.aux = self.window.count(self.median);
    }
}

impl MedianTracker for HuangTracker {
    fn new(window: usize, max_rank: u32) -> Self {
        Self {
            window: WindowHistogram::new(window, max_rank),
            median: 0,
            aux: 0,
        }
    }

    fn seed(&mut self, ranks: impl IntoIterator<Item = u32>) {
        self.window.seed(ranks);
        let (median, below) = self.window.scan_median();
        self.median = median;
        self.aux = self.window.center - below + 1;
    }

    #[inline]
    fn add(&mut self, rank: u32) {
        let old = self.window.push(rank);
        let new = rank;
        let m = self.median;

        if (old < m && new < m) || (old > m && new > m) || (old == m && new == m) {
            return;
        }

        if old < m && new > m {
            // One value fewer below: the centre moves one place up.
            if self.aux == self.window.count(m) {
                self.step_right();
            } else {
                self.aux += 1;
            }
        } else if old > m && new < m {
            if self.aux == 1 {
                self.step_left();
            } else {
                self.aux -= 1;
            }
        } else if new == m {
            // old != m. Only a departure from below shifts the position.
            if old < m {
                self.aux += 1;
            }
        } else if new > m {
            // old == m: the bucket shrank underneath the centre.
            if self.aux == self.window.count(m) + 1 {
                self.step_right();
            }
        } else if self.aux == 1 {
            // old == m, new < m
            self.step_left();
        } else {
            self.aux -= 1;
        }
    }

    #[inline]
    fn get(&self) -> u32 {
        self.median
    }
}
