//! Size sweep planner
//!
//! Expands a size range and a subdivision count into the concrete input
//! sizes a run sweeps over. Sizes are spaced geometrically: `subdivisions`
//! points per doubling, so plotting time against a logarithmic size axis
//! yields evenly spaced measurements.

/// Plans the input sizes of a sweep.
///
/// `lowest_scale..=highest_scale` are exponents of two; `subdivisions` is
/// how many sizes each doubling contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeSweepPlanner {
    lowest_scale: u32,
    highest_scale: u32,
    subdivisions: u32,
}

/// Sizes above 2^63 do not fit a u64, so scales clamp there.
pub const MAX_SCALE: u32 = 63;

impl SizeSweepPlanner {
    /// A planner over `lowest_scale..=highest_scale` with `subdivisions`
    /// sizes per doubling. Scales clamp to [`MAX_SCALE`], an inverted range
    /// is reordered, and `subdivisions` is raised to at least 1.
    pub fn new(lowest_scale: u32, highest_scale: u32, subdivisions: u32) -> Self {
        let lowest = lowest_scale.min(highest_scale).min(MAX_SCALE);
        let highest = lowest_scale.max(highest_scale).min(MAX_SCALE);
        Self {
            lowest_scale: lowest,
            highest_scale: highest,
            subdivisions: subdivisions.max(1),
        }
    }

    /// The planned sizes, ascending and deduplicated.
    ///
    /// Whole powers of two are computed exactly; intermediate subdivisions
    /// round down from `2^(i/k)`. At small scales several subdivisions can
    /// land on the same integer, hence the dedup.
    pub fn sizes(&self) -> Vec<u64> {
        let k = u64::from(self.subdivisions);
        let mut sizes = Vec::new();
        for i in k * u64::from(self.lowest_scale)..=k * u64::from(self.highest_scale) {
            let size = if i % k == 0 {
                1u64 << (i / k)
            } else {
                f64::exp2(i as f64 / k as f64).floor() as u64
            };
            if sizes.last() != Some(&size) {
                sizes.push(size);
            }
        }
        sizes
    }

    /// The inclusive size range the plan covers.
    pub fn bounds(&self) -> (u64, u64) {
        (1u64 << self.lowest_scale, 1u64 << self.highest_scale)
    }
}
