//! Online sample statistics
//!
//! One `SampleAggregator` summarizes every measurement ever taken for one
//! (task, size) cell. It keeps count, sum, sum of squares, minimum, and
//! maximum, so every statistic the rest of the system consumes is available
//! in O(1) space with no raw-sample history.

use crate::time::{Time, TimeSquared};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Cap on the diagnostics-only ring of recent raw samples.
///
/// The true minimum and maximum live in the aggregate fields, so dropping
/// old ring entries loses nothing the statistics depend on.
pub const RECENT_SAMPLE_CAP: usize = 100;

/// Running statistics over a stream of `Time` samples.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleAggregator {
    count: u64,
    sum: Time,
    sum_squared: TimeSquared,
    minimum: Option<Time>,
    maximum: Option<Time>,
    /// Most recent raw samples, for diagnostic display only.
    #[serde(skip)]
    recent: VecDeque<Time>,
}

impl SampleAggregator {
    /// An empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of samples recorded.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Exact sum of all samples.
    pub fn sum(&self) -> Time {
        self.sum
    }

    /// Exact sum of squared samples.
    pub fn sum_squared(&self) -> TimeSquared {
        self.sum_squared
    }

    /// Smallest sample seen; `None` iff no samples were recorded.
    pub fn minimum(&self) -> Option<Time> {
        self.minimum
    }

    /// Largest sample seen; `None` iff no samples were recorded.
    pub fn maximum(&self) -> Option<Time> {
        self.maximum
    }

    /// Whether no samples have been recorded.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The most recent raw samples, oldest first, capped at
    /// [`RECENT_SAMPLE_CAP`].
    pub fn recent(&self) -> impl Iterator<Item = Time> + '_ {
        self.recent.iter().copied()
    }

    /// Records one elapsed-time sample in O(1) time and space.
    pub fn add_measurement(&mut self, elapsed: Time) {
        self.count += 1;
        self.sum += elapsed;
        self.sum_squared += elapsed * elapsed;
        self.minimum = Some(match self.minimum {
            Some(min) => min.min(elapsed),
            None => elapsed,
        });
        self.maximum = Some(match self.maximum {
            Some(max) => max.max(elapsed),
            None => elapsed,
        });
        if self.recent.len() == RECENT_SAMPLE_CAP {
            self.recent.pop_front();
        }
        self.recent.push_back(elapsed);
    }

    /// Merges another aggregator into this one.
    ///
    /// Pairwise sums and componentwise min/max make this associative and
    /// commutative, so merge order never affects the result. Result-file
    /// loading relies on that to reconstruct live state exactly.
    pub fn add_sample(&mut self, other: &SampleAggregator) {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_squared += other.sum_squared;
        self.minimum = match (self.minimum, other.minimum) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.maximum = match (self.maximum, other.maximum) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        for sample in &other.recent {
            if self.recent.len() == RECENT_SAMPLE_CAP {
                self.recent.pop_front();
            }
            self.recent.push_back(*sample);
        }
    }

    /// Mean sample time; `None` when empty.
    pub fn average(&self) -> Option<Time> {
        if self.count == 0 {
            return None;
        }
        Some(self.sum.dividing_with_rounding(self.count as i128))
    }

    /// Corrected sample standard deviation; requires at least two samples.
    ///
    /// Computed as `sqrt((n * sumsq - sum^2) / (n * (n - 1)))` on the exact
    /// integer fields; only the final square root leaves integer arithmetic.
    pub fn standard_deviation(&self) -> Option<Time> {
        if self.count < 2 {
            return None;
        }
        let n = self.count as i128;
        let variance =
            (self.sum_squared * n - self.sum * self.sum).dividing_with_rounding(n * (n - 1));
        Some(variance.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate_of(samples: &[i128]) -> SampleAggregator {
        let mut agg = SampleAggregator::new();
        for &ps in samples {
            agg.add_measurement(Time::from_picoseconds(ps));
        }
        agg
    }

    fn assert_stats_eq(a: &SampleAggregator, b: &SampleAggregator) {
        assert_eq!(a.count(), b.count());
        assert_eq!(a.sum(), b.sum());
        assert_eq!(a.sum_squared(), b.sum_squared());
        assert_eq!(a.minimum(), b.minimum());
        assert_eq!(a.maximum(), b.maximum());
    }

    #[test]
    fn test_empty_aggregator() {
        let agg = SampleAggregator::new();
        assert_eq!(agg.count(), 0);
        assert_eq!(agg.minimum(), None);
        assert_eq!(agg.maximum(), None);
        assert_eq!(agg.average(), None);
        assert_eq!(agg.standard_deviation(), None);
    }

    #[test]
    fn test_basic_statistics() {
        let agg = aggregate_of(&[100, 200, 300]);
        assert_eq!(agg.count(), 3);
        assert_eq!(agg.minimum(), Some(Time::from_picoseconds(100)));
        assert_eq!(agg.maximum(), Some(Time::from_picoseconds(300)));
        assert_eq!(agg.average(), Some(Time::from_picoseconds(200)));
        // variance of {100,200,300} with Bessel's correction is 10000 ps^2
        assert_eq!(
            agg.standard_deviation(),
            Some(Time::from_picoseconds(100))
        );
    }

    #[test]
    fn test_standard_deviation_needs_two_samples() {
        let agg = aggregate_of(&[100]);
        assert_eq!(agg.average(), Some(Time::from_picoseconds(100)));
        assert_eq!(agg.standard_deviation(), None);
    }

    #[test]
    fn test_merge_is_commutative() {
        let a = aggregate_of(&[1, 5, 9]);
        let b = aggregate_of(&[2, 100]);

        let mut ab = a.clone();
        ab.add_sample(&b);
        let mut ba = b.clone();
        ba.add_sample(&a);

        assert_stats_eq(&ab, &ba);
    }

    #[test]
    fn test_merge_is_associative() {
        let a = aggregate_of(&[1, 5]);
        let b = aggregate_of(&[9]);
        let c = aggregate_of(&[2, 100, 7]);

        let mut left = a.clone();
        left.add_sample(&b);
        left.add_sample(&c);

        let mut bc = b.clone();
        bc.add_sample(&c);
        let mut right = a.clone();
        right.add_sample(&bc);

        assert_stats_eq(&left, &right);
    }

    #[test]
    fn test_merge_with_empty_is_identity() {
        let a = aggregate_of(&[3, 4, 5]);
        let mut merged = a.clone();
        merged.add_sample(&SampleAggregator::new());
        assert_stats_eq(&merged, &a);

        let mut from_empty = SampleAggregator::new();
        from_empty.add_sample(&a);
        assert_stats_eq(&from_empty, &a);
    }

    #[test]
    fn test_merge_matches_sequential_recording() {
        let combined = aggregate_of(&[1, 5, 9, 2, 100]);
        let mut merged = aggregate_of(&[1, 5, 9]);
        merged.add_sample(&aggregate_of(&[2, 100]));
        assert_stats_eq(&merged, &combined);
    }

    #[test]
    fn test_recent_ring_is_capped() {
        let mut agg = SampleAggregator::new();
        for i in 0..250 {
            agg.add_measurement(Time::from_picoseconds(i));
        }
        assert_eq!(agg.recent().count(), RECENT_SAMPLE_CAP);
        // Oldest surviving entry is 250 - 100
        assert_eq!(agg.recent().next(), Some(Time::from_picoseconds(150)));
        // The true minimum survives in the aggregate even though the ring
        // dropped it.
        assert_eq!(agg.minimum(), Some(Time::from_picoseconds(0)));
    }

    #[test]
    fn test_serde_preserves_statistics() {
        let agg = aggregate_of(&[100, 200, 300]);
        let json = serde_json::to_string(&agg).unwrap();
        let back: SampleAggregator = serde_json::from_str(&json).unwrap();
        assert_stats_eq(&back, &agg);
        // The diagnostics ring is intentionally not persisted.
        assert_eq!(back.recent().count(), 0);
    }
}
