use std::ops::Index;

/// Cumulative nanoseconds it took to load each slot, across all the iterations
/// of one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingSamples {
    sums: Vec<f64>,
}

impl TimingSamples {
    pub fn new(slot_count: usize) -> Self {
        Self {
            sums: vec![0.0; slot_count],
        }
    }

    pub fn from_sums(sums: Vec<f64>) -> Self {
        Self { sums }
    }

    pub fn reset(&mut self) {
        self.sums.iter_mut().for_each(|sum| *sum = 0.0);
    }

    #[inline(always)]
    pub fn record(&mut self, slot: usize, nanos: f64) {
        self.sums[slot] += nanos;
    }

    /// Index of the quickest slot. Only a strictly smaller sum replaces the
    /// current best, so ties go to the lowest index.
    pub fn fastest(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (index, &sum) in self.sums.iter().enumerate() {
            let quicker = match best {
                None => true,
                Some((_, best_sum)) => sum < best_sum,
            };
            if quicker {
                best = Some((index, sum));
            }
        }
        best.map(|(index, _)| index)
    }

    pub fn slowest(&self) -> Option<f64> {
        self.sums.iter().copied().reduce(f64::max)
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.sums
    }
}

impl Index<usize> for TimingSamples {
    type Output = f64;

    fn index(&self, slot: usize) -> &f64 {
        &self.sums[slot]
    }
}
