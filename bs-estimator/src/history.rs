// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{rate_to_bin, Horizon, RATE_BINS};

/// A single mempool-to-confirmation observation: the transaction's fee
/// rate (sat/vByte) and how many blocks it took to confirm.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Observation {
    pub rate: f64,
    pub blocks_to_confirm: u32,
}

/// One fee-rate bin's weighted sample: how many transactions were seen
/// at this rate, and how many of those confirmed within `t+1` blocks
/// for each `t`.
#[derive(Debug, Clone)]
pub struct Bucket {
    pub total: f64,
    pub confirmed: Vec<f64>,
}

impl Bucket {
    fn new(depth: usize) -> Self {
        Bucket {
            total: 0.0,
            confirmed: vec![0.0; depth],
        }
    }
}

/// The persistent sliding histogram: three horizon-scale bin arrays
/// sharing one fee-rate axis, plus the highest block height folded in.
#[derive(Debug, Clone)]
pub struct History {
    pub top_height: usize,
    pub small: Vec<Bucket>,
    pub medium: Vec<Bucket>,
    pub large: Vec<Bucket>,
}

impl Default for History {
    fn default() -> Self {
        History {
            top_height: 0,
            small: (0..RATE_BINS).map(|_| Bucket::new(Horizon::Small.depth())).collect(),
            medium: (0..RATE_BINS).map(|_| Bucket::new(Horizon::Medium.depth())).collect(),
            large: (0..RATE_BINS).map(|_| Bucket::new(Horizon::Large.depth())).collect(),
        }
    }
}

impl History {
    pub fn buckets(&self, horizon: Horizon) -> &[Bucket] {
        match horizon {
            Horizon::Small => &self.small,
            Horizon::Medium => &self.medium,
            Horizon::Large => &self.large,
        }
    }

    pub fn buckets_mut(&mut self, horizon: Horizon) -> &mut [Bucket] {
        match horizon {
            Horizon::Small => &mut self.small,
            Horizon::Medium => &mut self.medium,
            Horizon::Large => &mut self.large,
        }
    }

    /// Multiply every `total` and `confirmed` entry, across all three
    /// horizons, by `factor`, flooring each to stay monotone with the
    /// original integral-counter model.
    pub(crate) fn decay(&mut self, factor: f64) {
        for horizon in Horizon::ALL {
            for bucket in self.buckets_mut(horizon) {
                bucket.total = (bucket.total * factor).floor();
                for c in bucket.confirmed.iter_mut() {
                    *c = (*c * factor).floor();
                }
            }
        }
    }

    /// Fold a tally of observations into the histogram at `weight`
    /// (positive to add, negative to subtract, as used by `pop`). Each
    /// observation lands in one fee-rate bin and is recorded as having
    /// confirmed within every horizon index `i >= blocks_to_confirm - 1`.
    pub(crate) fn fold_in(&mut self, tally: &[Observation], weight: f64) {
        for observation in tally {
            let bin = rate_to_bin(observation.rate);
            let start = observation.blocks_to_confirm.saturating_sub(1) as usize;

            for horizon in Horizon::ALL {
                let depth = horizon.depth();
                let bucket = &mut self.buckets_mut(horizon)[bin];
                bucket.total += weight;
                for i in start.min(depth)..depth {
                    bucket.confirmed[i] += weight;
                }
            }
        }
    }
}
