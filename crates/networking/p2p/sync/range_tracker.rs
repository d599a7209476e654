//! Interval bookkeeping over the 256-bit account key space.
//!
//! Account hashes are treated as unsigned 256-bit tags; a [`TagRangeSet`]
//! records which closed ranges of tags have been handled. The range-fetch
//! path and the healing path both consume and produce these sets, and the
//! process-wide [`CoverageTracker`] accumulates them across pivots as the
//! readiness signal for healing.

use std::sync::{Arc, Mutex, MutexGuard};

use ethereum_types::U256;

/// 2^256 as a double, the denominator when turning point counts into
/// fractions of the full key space.
const FULL_SPACE: f64 = 1.157920892373162e77;

/// A set of non-overlapping closed `[lo, hi]` ranges of 256-bit tags, kept
/// sorted and coalesced.
///
/// Point counts saturate at `U256::MAX`: the full space holds 2^256 points,
/// one more than the widest representable count. The factor accessors account
/// for that corner exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagRangeSet {
    ranges: Vec<(U256, U256)>,
}

impl TagRangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The set covering every possible tag.
    pub fn full_range() -> Self {
        Self {
            ranges: vec![(U256::zero(), U256::MAX)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[(U256, U256)] {
        &self.ranges
    }

    /// Returns true if the tag lies inside the set.
    pub fn contains(&self, tag: U256) -> bool {
        self.ranges.iter().any(|&(lo, hi)| lo <= tag && tag <= hi)
    }

    /// Number of points of `[lo, hi]` already inside the set.
    pub fn covered(&self, lo: U256, hi: U256) -> U256 {
        let mut total = U256::zero();
        for &(a, b) in &self.ranges {
            if b < lo || a > hi {
                continue;
            }
            total = total.saturating_add(range_len(a.max(lo), b.min(hi)));
        }
        total
    }

    /// Unions `[lo, hi]` into the set, returning the number of newly covered
    /// points.
    pub fn merge(&mut self, lo: U256, hi: U256) -> U256 {
        debug_assert!(lo <= hi);
        let added = range_len(lo, hi).saturating_sub(self.covered(lo, hi));

        let mut new_lo = lo;
        let mut new_hi = hi;
        let mut result = Vec::with_capacity(self.ranges.len() + 1);
        for &(a, b) in &self.ranges {
            if b < lo && !adjacent(b, lo) {
                result.push((a, b));
            } else if a > hi && !adjacent(hi, a) {
                result.push((a, b));
            } else {
                new_lo = new_lo.min(a);
                new_hi = new_hi.max(b);
            }
        }
        let insert_at = result.partition_point(|&(a, _)| a < new_lo);
        result.insert(insert_at, (new_lo, new_hi));
        self.ranges = result;

        added
    }

    /// Removes `[lo, hi]` from the set, returning the number of points
    /// removed.
    pub fn reduce(&mut self, lo: U256, hi: U256) -> U256 {
        debug_assert!(lo <= hi);
        let removed = self.covered(lo, hi);

        let mut result = Vec::with_capacity(self.ranges.len() + 1);
        for &(a, b) in &self.ranges {
            if b < lo || a > hi {
                result.push((a, b));
                continue;
            }
            if a < lo {
                result.push((a, lo - U256::one()));
            }
            if b > hi {
                result.push((hi + U256::one(), b));
            }
        }
        self.ranges = result;

        removed
    }

    /// Fraction of the full 256-bit space the set covers, in [0, 1].
    pub fn full_factor(&self) -> f64 {
        if self.ranges.len() == 1 && self.ranges[0] == (U256::zero(), U256::MAX) {
            return 1.0;
        }
        let covered: f64 = self
            .ranges
            .iter()
            .map(|&(lo, hi)| u256_to_f64(hi - lo) + 1.0)
            .sum();
        (covered / FULL_SPACE).clamp(0.0, 1.0)
    }

    /// Complement of [`full_factor`](Self::full_factor).
    pub fn empty_factor(&self) -> f64 {
        1.0 - self.full_factor()
    }
}

/// Closed-range point count, saturating on the full space.
fn range_len(lo: U256, hi: U256) -> U256 {
    (hi - lo).saturating_add(U256::one())
}

/// True when `left` and `right` are consecutive tags, so the ranges they end
/// and begin coalesce.
fn adjacent(left: U256, right: U256) -> bool {
    left.saturating_add(U256::one()) == right
}

fn u256_to_f64(value: U256) -> f64 {
    value
        .0
        .iter()
        .enumerate()
        .map(|(i, limb)| *limb as f64 * 2f64.powi(64 * i as i32))
        .sum()
}

/// Shared, monotonically growing record of the account ranges any pivot has
/// covered so far. Grows through `merge` only; used as the healing readiness
/// signal.
#[derive(Clone, Default)]
pub struct CoverageTracker {
    inner: Arc<Mutex<TagRangeSet>>,
}

impl CoverageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&self, lo: U256, hi: U256) -> U256 {
        self.lock().merge(lo, hi)
    }

    pub fn contains(&self, tag: U256) -> bool {
        self.lock().contains(tag)
    }

    pub fn full_factor(&self) -> f64 {
        self.lock().full_factor()
    }

    fn lock(&self) -> MutexGuard<'_, TagRangeSet> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(n: u64) -> U256 {
        U256::from(n)
    }

    #[test]
    fn merge_counts_new_points_only() {
        let mut set = TagRangeSet::new();
        assert_eq!(set.merge(tag(10), tag(19)), tag(10));
        // Half overlapping
        assert_eq!(set.merge(tag(15), tag(24)), tag(5));
        // Fully covered
        assert_eq!(set.merge(tag(12), tag(18)), U256::zero());
        assert_eq!(set.ranges(), &[(tag(10), tag(24))]);
    }

    #[test]
    fn merge_coalesces_adjacent_ranges() {
        let mut set = TagRangeSet::new();
        set.merge(tag(0), tag(9));
        set.merge(tag(20), tag(29));
        set.merge(tag(10), tag(19));
        assert_eq!(set.ranges(), &[(tag(0), tag(29))]);
    }

    #[test]
    fn reduce_splits_ranges() {
        let mut set = TagRangeSet::new();
        set.merge(tag(0), tag(29));
        assert_eq!(set.reduce(tag(10), tag(19)), tag(10));
        assert_eq!(set.ranges(), &[(tag(0), tag(9)), (tag(20), tag(29))]);
        // Single point
        assert_eq!(set.reduce(tag(0), tag(0)), U256::one());
        assert_eq!(set.ranges(), &[(tag(1), tag(9)), (tag(20), tag(29))]);
    }

    #[test]
    fn covered_measures_the_intersection() {
        let mut set = TagRangeSet::new();
        set.merge(tag(10), tag(19));
        assert_eq!(set.covered(tag(0), tag(9)), U256::zero());
        assert_eq!(set.covered(tag(15), tag(100)), tag(5));
        assert_eq!(set.covered(tag(0), tag(100)), tag(10));
    }

    #[test]
    fn full_factor_boundaries() {
        assert_eq!(TagRangeSet::new().full_factor(), 0.0);
        assert_eq!(TagRangeSet::full_range().full_factor(), 1.0);
        assert_eq!(TagRangeSet::full_range().empty_factor(), 0.0);

        // Half the space
        let mut set = TagRangeSet::new();
        set.merge(U256::zero(), U256::MAX / U256::from(2u64));
        let factor = set.full_factor();
        assert!((factor - 0.5).abs() < 1e-9, "got {factor}");
    }

    #[test]
    fn full_factor_is_monotone_under_merge() {
        let mut set = TagRangeSet::new();
        let mut last = 0.0;
        for i in 0..10u64 {
            set.merge(U256::from(i * 100), U256::from(i * 100 + 50));
            let factor = set.full_factor();
            assert!(factor >= last);
            last = factor;
        }
    }

    #[test]
    fn reduce_then_merge_single_point_round_trips() {
        let mut set = TagRangeSet::full_range();
        let point = U256::from(12345u64);
        assert_eq!(set.reduce(point, point), U256::one());
        assert!(!set.contains(point));
        assert_eq!(set.merge(point, point), U256::one());
        assert!(set.contains(point));
    }

    #[test]
    fn coverage_tracker_grows_monotonically() {
        let tracker = CoverageTracker::new();
        assert_eq!(tracker.full_factor(), 0.0);
        tracker.merge(U256::zero(), U256::MAX / U256::from(2u64));
        let half = tracker.full_factor();
        tracker.merge(U256::zero(), U256::MAX);
        assert!(tracker.full_factor() >= half);
        assert_eq!(tracker.full_factor(), 1.0);
    }
}
