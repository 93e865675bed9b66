// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! Fee estimator (C6): an exponentially-decayed histogram over a
//! fee-rate x confirmation-delay grid, fed by block connect/disconnect
//! and queried for a fee quote at a given target depth and confidence.

mod history;

pub use history::{Bucket, History, Observation};

/// Sentinel returned by [`Estimator::estimate`] when no bin meets the
/// confidence threshold.
pub const UNAVAILABLE: u64 = u64::MAX;

/// Number of fee-rate bins shared by all three horizon scales.
pub const RATE_BINS: usize = 100;

/// Horizon-independent sizing constants for the fee-rate axis: bin `i`'s
/// rate is `min * step^i`.
pub mod sizing {
    /// Shared decay half-life, in blocks.
    pub const COUNT: u32 = 1008;
    /// Floor fee rate (sat/vByte) for bin 0.
    pub const MIN: f64 = 1.0;
    /// Per-bin multiplicative step.
    pub const STEP: f64 = 1.1;
}

/// The three confirmation-target horizons tracked in parallel, named for
/// the depth of their `confirmed` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    Small,
    Medium,
    Large,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::Small, Horizon::Medium, Horizon::Large];

    pub const fn depth(self) -> usize {
        match self {
            Horizon::Small => 12,
            Horizon::Medium => 48,
            Horizon::Large => 1008,
        }
    }

    /// The narrowest horizon whose depth covers `target`, or `None` if
    /// `target` exceeds every horizon's depth.
    pub fn covering(target: usize) -> Option<Horizon> {
        Horizon::ALL.into_iter().find(|h| target < h.depth())
    }
}

/// How strict a confirmation-probability threshold `estimate` requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Mid,
    Low,
}

impl Confidence {
    /// Minimum required `confirmed / total` ratio (basic) or
    /// `1 - (1-p)^target` (geometric) for a bin to qualify.
    pub const fn threshold(self) -> f64 {
        match self {
            Confidence::High => 0.95,
            Confidence::Mid => 0.85,
            Confidence::Low => 0.65,
        }
    }
}

/// The decay rate `d = 0.5^(1/H)` for the shared half-life `sizing::COUNT`.
pub fn decay_rate() -> f64 {
    0.5f64.powf(1.0 / sizing::COUNT as f64)
}

/// `d^age`; `1.0` for `age == 0` (avoids a `powf` call on the hot path).
pub fn to_scale_term(age: u32) -> f64 {
    if age == 0 {
        1.0
    } else {
        decay_rate().powi(age as i32)
    }
}

/// `d` when applying a new block (`push`), `d^-1` when reversing one
/// (`pop`).
pub fn to_scale_factor(push: bool) -> f64 {
    if push {
        decay_rate()
    } else {
        1.0 / decay_rate()
    }
}

/// Minimum weighted sample count required before a bin's ratio is
/// trusted at all, scaled by how deep into the horizon `target` reaches.
fn min_required_samples(target: usize) -> f64 {
    2.0 * (target as f64 + 1.0)
}

fn rate_to_bin(rate: f64) -> usize {
    if rate <= sizing::MIN {
        return 0;
    }
    let bin = ((rate / sizing::MIN).ln() / sizing::STEP.ln()).floor();
    (bin.max(0.0) as usize).min(RATE_BINS - 1)
}

/// The decayed histogram itself, plus the block-level operations that
/// keep it current. Cheap to construct; holds no external resources.
#[derive(Debug, Default, Clone)]
pub struct Estimator {
    history: History,
}

impl Estimator {
    pub fn new() -> Self {
        Estimator::default()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    pub fn top_height(&self) -> usize {
        self.history.top_height
    }

    /// Replay a sequence of per-block rate tallies, oldest first. Each
    /// block `i` (0-based from the oldest) is scaled by
    /// `d^(blocks.len() - 1 - i)` before folding in. Refuses (returning
    /// `false`, state unchanged) if `top_height` would overflow.
    pub fn initialize(&mut self, blocks: &[Vec<Observation>]) -> bool {
        if blocks.is_empty() {
            return true;
        }
        let delta = blocks.len() - 1;
        let new_height = match self.history.top_height.checked_add(delta) {
            Some(h) => h,
            None => return false,
        };

        for (i, tally) in blocks.iter().enumerate() {
            let age = (blocks.len() - 1 - i) as u32;
            let scale = to_scale_term(age);
            self.history.fold_in(tally, scale);
        }
        self.history.top_height = new_height;
        true
    }

    /// Decay every accumulator by `d`, then fold in `tally` at unit
    /// weight; increments `top_height`.
    pub fn push(&mut self, tally: &[Observation]) -> bool {
        let new_height = match self.history.top_height.checked_add(1) {
            Some(h) => h,
            None => return false,
        };
        self.history.decay(to_scale_factor(true));
        self.history.fold_in(tally, 1.0);
        self.history.top_height = new_height;
        true
    }

    /// Inverse of `push`: subtract `tally` at unit weight, then scale by
    /// `d^-1`. Never reduces `top_height` below zero.
    pub fn pop(&mut self, tally: &[Observation]) -> bool {
        let new_height = match self.history.top_height.checked_sub(1) {
            Some(h) => h,
            None => return false,
        };
        self.history.fold_in(tally, -1.0);
        self.history.decay(to_scale_factor(false));
        self.history.top_height = new_height;
        true
    }

    /// Scan bins from highest fee to lowest, accumulating `total` and
    /// `confirmed[target]`; return the fee rate of the first (highest)
    /// bin whose confirmation probability meets `confidence`'s
    /// threshold, or [`UNAVAILABLE`] if none qualifies.
    pub fn estimate(&self, target: usize, confidence: Confidence, geometric: bool) -> u64 {
        let horizon = match Horizon::covering(target) {
            Some(h) => h,
            None => return UNAVAILABLE,
        };
        let buckets = self.history.buckets(horizon);
        let threshold = confidence.threshold();
        let required = min_required_samples(target);

        let mut cumulative_total = 0.0;
        let mut cumulative_confirmed = 0.0;
        let mut found: Option<usize> = None;

        for bin in (0..RATE_BINS).rev() {
            cumulative_total += buckets[bin].total;
            cumulative_confirmed += buckets[bin].confirmed[target];

            if cumulative_total < required {
                continue;
            }

            let ratio = cumulative_confirmed / cumulative_total;
            let probability = if geometric {
                1.0 - (1.0 - ratio).powi(target as i32)
            } else {
                ratio
            };

            if probability >= threshold {
                found = Some(bin);
            } else {
                break;
            }
        }

        match found {
            Some(bin) => (sizing::MIN * sizing::STEP.powi(bin as i32)).ceil() as u64,
            None => UNAVAILABLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(rate: f64, blocks_to_confirm: u32) -> Observation {
        Observation { rate, blocks_to_confirm }
    }

    #[test]
    fn decay_rate_matches_half_life_formula() {
        let expected = 0.5f64.powf(1.0 / sizing::COUNT as f64);
        assert!((decay_rate() - expected).abs() < 1e-9);
    }

    #[test]
    fn estimate_default_state_is_unavailable() {
        let estimator = Estimator::new();
        assert_eq!(estimator.estimate(0, Confidence::High, false), UNAVAILABLE);
        assert_eq!(estimator.estimate(50, Confidence::Low, false), UNAVAILABLE);
    }

    #[test]
    fn estimate_insufficient_total_is_unavailable() {
        let mut estimator = Estimator::new();
        estimator.history_mut().buckets_mut(Horizon::Small)[0].total = 1.0;
        estimator.history_mut().buckets_mut(Horizon::Small)[0].confirmed[0] = 1.0;
        assert_eq!(estimator.estimate(0, Confidence::High, false), UNAVAILABLE);
    }

    #[test]
    fn estimate_high_confidence_basic() {
        let mut estimator = Estimator::new();
        let bucket = &mut estimator.history_mut().buckets_mut(Horizon::Small)[0];
        bucket.total = 10.0;
        bucket.confirmed[0] = 10.0;
        let fee = estimator.estimate(0, Confidence::High, false);
        assert_eq!(fee, (sizing::MIN * sizing::STEP.powi(0)).ceil() as u64);
    }

    #[test]
    fn estimate_below_threshold_is_unavailable() {
        let mut estimator = Estimator::new();
        let bucket = &mut estimator.history_mut().buckets_mut(Horizon::Small)[0];
        bucket.total = 10.0;
        bucket.confirmed[0] = 1.0;
        assert_eq!(estimator.estimate(0, Confidence::High, false), UNAVAILABLE);
    }

    #[test]
    fn push_decays_existing_total_and_increments_height() {
        let mut estimator = Estimator::new();
        estimator.history_mut().buckets_mut(Horizon::Small)[0].total = 100.0;
        assert!(estimator.push(&[]));
        assert_eq!(estimator.top_height(), 1);
        let expected = (100.0 * to_scale_factor(true)).floor();
        assert_eq!(estimator.history().buckets(Horizon::Small)[0].total, expected);
    }

    #[test]
    fn push_then_pop_restores_state() {
        let mut estimator = Estimator::new();
        let tally = vec![obs(0.5, 1)];
        assert!(estimator.push(&tally));
        assert!(estimator.pop(&tally));
        assert_eq!(estimator.top_height(), 0);
        let bucket = &estimator.history().buckets(Horizon::Small)[0];
        assert!(bucket.total.abs() < 1e-6);
        for &c in &bucket.confirmed {
            assert!(c.abs() < 1e-6);
        }
    }

    #[test]
    fn pop_refuses_below_zero_height() {
        let mut estimator = Estimator::new();
        assert!(!estimator.pop(&[]));
        assert_eq!(estimator.top_height(), 0);
    }

    #[test]
    fn initialize_two_blocks_sets_height_and_totals() {
        let mut estimator = Estimator::new();
        let oldest = vec![obs(0.5, 1)];
        let newest = vec![obs(0.5, 1), obs(0.5, 1)];
        assert!(estimator.initialize(&[oldest, newest]));
        assert_eq!(estimator.top_height(), 1);
        assert!(estimator.history().buckets(Horizon::Small)[0].total >= 2.0 - 1e-6);
    }

    #[test]
    fn initialize_refuses_on_overflow() {
        let mut estimator = Estimator::new();
        estimator.history_mut().top_height = usize::MAX - 1;
        let blocks = vec![vec![], vec![], vec![]];
        assert!(!estimator.initialize(&blocks));
        assert_eq!(estimator.top_height(), usize::MAX - 1);
    }

    #[test]
    fn confirmed_never_exceeds_total_after_a_push() {
        let mut estimator = Estimator::new();
        estimator.push(&[obs(0.3, 2), obs(0.3, 5), obs(2.0, 1)]);
        for horizon in Horizon::ALL {
            for bucket in estimator.history().buckets(horizon) {
                for &confirmed in &bucket.confirmed {
                    assert!(confirmed <= bucket.total + 1e-9);
                }
            }
        }
    }

    #[test]
    fn rate_to_bin_is_monotone_and_clamped() {
        assert_eq!(rate_to_bin(0.5), 0);
        assert_eq!(rate_to_bin(sizing::MIN), 0);
        assert!(rate_to_bin(sizing::MIN * sizing::STEP) >= 1);
        assert_eq!(rate_to_bin(f64::MAX), RATE_BINS - 1);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn observation() -> impl Strategy<Value = Observation> {
        (1.0..500.0f64, 0u32..1200).prop_map(|(rate, blocks_to_confirm)| Observation { rate, blocks_to_confirm })
    }

    proptest! {
        /// Pushing a tally never leaves a bucket's `confirmed[target]`
        /// above its `total`, for any rate/delay combination.
        #[test]
        fn confirmed_never_exceeds_total(tally in proptest::collection::vec(observation(), 0..20)) {
            let mut estimator = Estimator::new();
            estimator.push(&tally);
            for horizon in Horizon::ALL {
                for bucket in estimator.history().buckets(horizon) {
                    for &confirmed in &bucket.confirmed {
                        prop_assert!(confirmed <= bucket.total + 1e-6);
                    }
                }
            }
        }

        /// A push immediately followed by popping the same tally restores
        /// the pre-push height and histogram state, up to floating-point
        /// rounding.
        #[test]
        fn push_then_pop_is_identity(tally in proptest::collection::vec(observation(), 0..20)) {
            let mut estimator = Estimator::new();
            let before = estimator.top_height();
            estimator.push(&tally);
            estimator.pop(&tally);
            prop_assert_eq!(estimator.top_height(), before);
            for horizon in Horizon::ALL {
                for bucket in estimator.history().buckets(horizon) {
                    prop_assert!(bucket.total.abs() < 1e-6);
                    for &confirmed in &bucket.confirmed {
                        prop_assert!(confirmed.abs() < 1e-6);
                    }
                }
            }
        }
    }
}
