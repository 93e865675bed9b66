// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! The four diagnostic scans (C5), grounded line-for-line on
//! `executor_scans.cpp`: fork-flag transitions, tx slab counts, hashmap
//! bucket fill, and hashmap collision distributions plus a bloom-filter
//! false-positive simulation over the point table.
//!
//! Every loop polls `canceled` at the top of its body and returns as soon
//! as it observes a stop, per §4.5's cancellation contract; none of them
//! materialize more than `O(max_bucket_count)` auxiliary memory, and that
//! memory is released between sub-scans (freeing a `Vec` by letting it
//! drop at the end of its pass).

use std::collections::BTreeMap;

use slog::{info, warn, Logger};

use crate::{Link, NodeQuery};

/// Progress cadence constants, named for the table the count is over
/// (`executor_scans.cpp`'s `frequency`/`block_frequency`/`tx_frequency`/
/// `put_frequency`).
pub const F_TX: usize = 100_000;
pub const F_BLOCK: usize = 10_000;
pub const F_TX_BUCKET: usize = 1_000_000;
pub const F_PUT: usize = 10_000_000;

/// Bloom simulation parameters (§4.5.4): `m` bits per bucket, `k =
/// floor(log2(m))` hash positions per insert.
pub const BLOOM_M: u32 = 32;
pub const BLOOM_K: u32 = 5; // floor(log2(32))

fn hash64(key: [u8; 32]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&key[0..8]);
    u64::from_le_bytes(buf)
}

fn entropy32(key: [u8; 32]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&key[4..8]);
    u32::from_le_bytes(buf)
}

fn bucket_of(value: u64, buckets: usize) -> usize {
    if buckets == 0 {
        0
    } else {
        (value as usize) % buckets
    }
}

/// Bloom bit positions for one insert, via double hashing (`h1 + i*h2`)
/// so a single 32-bit entropy value still yields `k` distinct probe
/// positions in a `m`-bit word.
fn bloom_positions(entropy: u32) -> impl Iterator<Item = u32> {
    let h1 = entropy % BLOOM_M;
    let h2 = ((entropy >> 16) | 1) % BLOOM_M;
    (0..BLOOM_K).map(move |i| (h1 + i * h2) % BLOOM_M)
}

/// OR the insert's bit positions into `prev`, returning the updated word.
fn bloom_screen(prev: u32, entropy: u32) -> u32 {
    let mut bits = prev;
    for pos in bloom_positions(entropy) {
        bits |= 1 << pos;
    }
    bits
}

/// §4.5's per-loop cancellation check.
pub trait Cancelable {
    fn canceled(&self) -> bool;
}

impl<F: Fn() -> bool> Cancelable for F {
    fn canceled(&self) -> bool {
        self()
    }
}

/// §4.5.1 — fork-flag transitions over the candidate chain.
/// `O(top_candidate)` time, `O(1)` extra memory.
pub fn scan_flags(query: &dyn NodeQuery, logger: &Logger, cancel: &dyn Cancelable) {
    let top = query.get_top_candidate();
    let mut flags: u32 = 0;
    info!(logger, "scan_flags: interruptible, ctrl-c to cancel");

    for height in 0..=top {
        if cancel.canceled() {
            info!(logger, "scan_flags: canceled"; "height" => height);
            return;
        }

        let link = query.to_candidate(height);
        let context = match query.get_context(link) {
            Some(ctx) if ctx.height == height => ctx,
            _ => {
                warn!(logger, "scan_flags: integrity error"; "height" => height);
                return;
            }
        };

        if context.flags != flags {
            info!(
                logger,
                "Forked from [{:#b}] to [{:#b}] at [{}:{}]",
                flags,
                context.flags,
                hex::encode(query.get_header_key(link)),
                height
            );
            flags = context.flags;
        }
    }

    info!(logger, "scan_flags: scanned headers for rule forks"; "top" => top);
}

/// §4.5.2 — tx input/output slab counts. Terminal condition is the first
/// link whose `put_counts` is `(0, 0)`.
pub fn scan_slabs(query: &dyn NodeQuery, logger: &Logger, cancel: &dyn Cancelable) -> (usize, usize) {
    info!(logger, "scan_slabs: measuring input/output slab counts");
    info!(logger, "scan_slabs: interruptible, ctrl-c to cancel");

    let mut link = Link(0);
    let mut inputs = 0usize;
    let mut outputs = 0usize;

    loop {
        if cancel.canceled() {
            info!(logger, "scan_slabs: canceled"; "link" => link.0);
            break;
        }

        let (i, o) = query.put_counts(link);
        if i == 0 && o == 0 {
            break;
        }
        inputs += i;
        outputs += o;

        if link.0 % F_TX == 0 {
            info!(logger, "scan_slabs: progress"; "link" => link.0, "inputs" => inputs, "outputs" => outputs);
        }
        link = Link(link.0 + 1);
    }

    info!(logger, "scan_slabs: done"; "inputs" => inputs, "outputs" => outputs);
    (inputs, outputs)
}

/// One table's fill-ratio result from §4.5.3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketReport {
    pub table: &'static str,
    pub buckets: usize,
    pub filled: usize,
}

impl BucketReport {
    pub fn fill_rate(&self) -> f64 {
        if self.buckets == 0 {
            0.0
        } else {
            self.filled as f64 / self.buckets as f64
        }
    }
}

fn scan_one_bucket_table(
    table: &'static str,
    buckets: usize,
    top: impl Fn(usize) -> Link,
    frequency: usize,
    logger: &Logger,
    cancel: &dyn Cancelable,
) -> Option<BucketReport> {
    // A table with zero buckets is treated as disabled (§4.5, Edge cases).
    if buckets == 0 {
        return None;
    }

    let mut filled = 0usize;
    for bucket in 0..buckets {
        if cancel.canceled() {
            info!(logger, "scan_buckets: canceled"; "table" => table, "bucket" => bucket);
            return Some(BucketReport { table, buckets, filled });
        }
        if !top(bucket).is_terminal() {
            filled += 1;
        }
        if bucket % frequency == 0 {
            info!(logger, "scan_buckets: progress"; "table" => table, "bucket" => bucket);
        }
    }

    Some(BucketReport { table, buckets, filled })
}

/// §4.5.3 — bucket fill ratio for the header, tx, and point tables, at
/// their respective progress cadences.
pub fn scan_buckets(query: &dyn NodeQuery, logger: &Logger, cancel: &dyn Cancelable) -> Vec<BucketReport> {
    info!(logger, "scan_buckets: interruptible, ctrl-c to cancel");
    let mut reports = Vec::with_capacity(3);

    if let Some(r) = scan_one_bucket_table(
        "header",
        query.header_buckets(),
        |b| query.top_header(b),
        F_BLOCK,
        logger,
        cancel,
    ) {
        info!(logger, "scan_buckets: header fill rate {}", r.fill_rate());
        reports.push(r);
    }

    if let Some(r) = scan_one_bucket_table(
        "tx",
        query.tx_buckets(),
        |b| query.top_tx(b),
        F_TX_BUCKET,
        logger,
        cancel,
    ) {
        info!(logger, "scan_buckets: tx fill rate {}", r.fill_rate());
        reports.push(r);
    }

    if let Some(r) = scan_one_bucket_table(
        "point",
        query.point_buckets(),
        |b| query.top_point(b),
        F_PUT,
        logger,
        cancel,
    ) {
        info!(logger, "scan_buckets: point fill rate {}", r.fill_rate());
        reports.push(r);
    }

    reports
}

/// One bucket-table's collision distribution: fill frequency (how many
/// records land in one bucket) mapped to how many buckets see that
/// frequency — a histogram keyed by small integers, not a per-bucket
/// vector, per the DESIGN NOTES "large-vector allocations" guidance.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionReport {
    pub table: &'static str,
    pub records: usize,
    pub buckets: usize,
    pub filled: usize,
    pub frequency: BTreeMap<usize, usize>,
}

impl CollisionReport {
    pub fn fill_rate(&self) -> f64 {
        if self.buckets == 0 {
            0.0
        } else {
            self.filled as f64 / self.buckets as f64
        }
    }
}

/// Bloom false-positive simulation result over the point table
/// (§4.5.4's spend-points pass).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomReport {
    pub inserts: usize,
    pub coinbases: usize,
    pub bloom_collisions: usize,
}

impl BloomReport {
    /// Coinbase inputs are excluded from the spend-only denominator
    /// (§4.5.4 edge case / SPEC_FULL's exact subtraction shape).
    pub fn spends(&self) -> usize {
        self.inserts.saturating_sub(self.coinbases)
    }

    pub fn spend_collisions(&self) -> usize {
        self.bloom_collisions.saturating_sub(self.coinbases)
    }

    pub fn spend_false_positive_rate(&self) -> f64 {
        let spends = self.spends();
        if spends == 0 {
            0.0
        } else {
            self.spend_collisions() as f64 / spends as f64
        }
    }
}

fn count_vec(counts: &[usize]) -> usize {
    counts.iter().filter(|&&v| v != 0).count()
}

fn distribution(counts: &[usize]) -> BTreeMap<usize, usize> {
    let mut map = BTreeMap::new();
    for &v in counts {
        *map.entry(v).or_insert(0) += 1;
    }
    map
}

fn scan_hash_distribution(
    table: &'static str,
    buckets: usize,
    records: usize,
    key_at: impl Fn(usize) -> [u8; 32],
    frequency: usize,
    logger: &Logger,
    cancel: &dyn Cancelable,
) -> Option<CollisionReport> {
    if buckets == 0 {
        return None;
    }

    let mut counts = vec![0usize; buckets];
    for index in 0..records {
        if cancel.canceled() {
            info!(logger, "scan_collisions: canceled"; "table" => table, "index" => index);
            break;
        }
        let bucket = bucket_of(hash64(key_at(index)), buckets);
        counts[bucket] += 1;
        if index % frequency == 0 {
            info!(logger, "scan_collisions: progress"; "table" => table, "index" => index);
        }
    }

    let filled = count_vec(&counts);
    let frequency_map = distribution(&counts);
    info!(
        logger,
        "scan_collisions: {} in {} buckets {} filled rate {}",
        table,
        buckets,
        filled,
        filled as f64 / buckets as f64
    );
    for (freq, count) in &frequency_map {
        info!(logger, "scan_collisions: {} frequency: {} count: {}", table, freq, count);
    }

    Some(CollisionReport { table, records, buckets, filled, frequency: frequency_map })
}

/// §4.5.4 — collision distributions for header, tx, and point tables,
/// plus the point table's bloom false-positive simulation.
pub fn scan_collisions(
    query: &dyn NodeQuery,
    logger: &Logger,
    cancel: &dyn Cancelable,
) -> (Vec<CollisionReport>, Option<BloomReport>) {
    info!(logger, "scan_collisions: interruptible, ctrl-c to cancel");
    let mut reports = Vec::with_capacity(3);

    if let Some(r) = scan_hash_distribution(
        "header",
        query.header_buckets(),
        query.header_records(),
        |i| query.get_header_key(Link(i)),
        F_BLOCK,
        logger,
        cancel,
    ) {
        reports.push(r);
    }

    if let Some(r) = scan_hash_distribution(
        "tx",
        query.tx_buckets(),
        query.tx_records(),
        |i| query.get_tx_key(Link(i)),
        F_TX_BUCKET,
        logger,
        cancel,
    ) {
        reports.push(r);
    }

    let bloom = scan_point_bloom(query, logger, cancel);
    (reports, bloom)
}

fn scan_point_bloom(query: &dyn NodeQuery, logger: &Logger, cancel: &dyn Cancelable) -> Option<BloomReport> {
    let point_buckets = query.point_buckets();
    if point_buckets == 0 {
        return None;
    }

    let mut bloom_filter = vec![0u32; point_buckets];
    let mut inserts = 0usize;
    let mut coinbases = 0usize;
    let mut bloom_collisions = 0usize;
    let mut window_inserts = 0usize;
    let mut window_fps = 0usize;

    let top = query.get_top_associated();
    for height in 0..=top {
        if cancel.canceled() {
            info!(logger, "scan_collisions: point scan canceled"; "height" => height);
            break;
        }

        // One assumed coinbase per confirmed block, per the original's
        // simplified per-block accounting (`++coinbases` once per block).
        coinbases += 1;

        let candidate = query.to_candidate(height);
        if candidate.is_terminal() {
            continue;
        }

        for tx in query.to_transactions(candidate) {
            for point in query.to_points(tx) {
                let key = query.get_point(point);
                let bucket = bucket_of(hash64(key), point_buckets);
                let entropy = entropy32(key);

                let prev = bloom_filter[bucket];
                let next = bloom_screen(prev, entropy);
                bloom_filter[bucket] = next;

                inserts += 1;
                window_inserts += 1;
                if next == prev {
                    bloom_collisions += 1;
                    window_fps += 1;
                }

                if inserts % F_PUT == 0 {
                    info!(
                        logger,
                        "scan_collisions: point {} bloom fps {} rate {}",
                        inserts,
                        bloom_collisions,
                        window_fps as f64 / window_inserts as f64
                    );
                    window_fps = 0;
                    window_inserts = 0;
                }
            }
        }
    }

    let report = BloomReport { inserts, coinbases, bloom_collisions };
    info!(
        logger,
        "scan_collisions: bloom {} fps of {} spends (ex {} cbs) rate {}",
        report.spend_collisions(),
        report.spends(),
        report.coinbases,
        report.spend_false_positive_rate()
    );
    Some(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeQuery;
    use slog::{o, Discard};

    fn silent_logger() -> Logger {
        Logger::root(Discard, o!())
    }

    fn never_canceled() -> impl Fn() -> bool {
        || false
    }

    #[test]
    fn scan_flags_reports_top_with_no_forks() {
        let query = FakeQuery::empty();
        query.push_header([1u8; 32], 0, 0);
        query.push_header([2u8; 32], 1, 0);
        let logger = silent_logger();
        scan_flags(&query, &logger, &never_canceled());
        // No panics and top reached: implicit pass if no integrity warning
        // fired (nothing to assert on besides completion here).
    }

    #[test]
    fn scan_slabs_stops_at_first_zero_pair() {
        let query = FakeQuery::empty();
        query.push_tx([1u8; 32], 2, 3);
        query.push_tx([2u8; 32], 1, 1);
        // third slot is implicitly terminal (0, 0).
        let logger = silent_logger();
        let (inputs, outputs) = scan_slabs(&query, &logger, &never_canceled());
        assert_eq!(inputs, 3);
        assert_eq!(outputs, 4);
    }

    #[test]
    fn scan_slabs_cancels_immediately() {
        let query = FakeQuery::empty();
        query.push_tx([1u8; 32], 2, 3);
        let logger = silent_logger();
        let (inputs, outputs) = scan_slabs(&query, &logger, &(|| true));
        assert_eq!((inputs, outputs), (0, 0));
    }

    #[test]
    fn scan_buckets_runs_all_three_tables_when_none_disabled() {
        let query = FakeQuery::empty();
        let logger = silent_logger();
        let reports = scan_buckets(&query, &logger, &never_canceled());
        // header/tx/point buckets are all 16 in FakeQuery::empty, so all
        // three tables participate (none disabled).
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].filled, 0);
    }

    #[test]
    fn scan_one_bucket_table_is_skipped_when_bucket_count_is_zero() {
        let logger = silent_logger();
        let report = scan_one_bucket_table("header", 0, |_| Link::TERMINAL, F_BLOCK, &logger, &never_canceled());
        assert!(report.is_none());
    }

    #[test]
    fn scan_buckets_counts_filled_header_slots() {
        let query = FakeQuery::empty();
        query.push_header([9u8; 32], 0, 0);
        let logger = silent_logger();
        let reports = scan_buckets(&query, &logger, &never_canceled());
        let header = reports.iter().find(|r| r.table == "header").unwrap();
        assert_eq!(header.filled, 1);
    }

    #[test]
    fn scan_collisions_distribution_counts_every_record_once() {
        let query = FakeQuery::empty();
        query.push_header([1u8; 32], 0, 0);
        query.push_header([2u8; 32], 1, 0);
        query.push_header([3u8; 32], 2, 0);
        let logger = silent_logger();
        let (reports, _) = scan_collisions(&query, &logger, &never_canceled());
        let header = reports.iter().find(|r| r.table == "header").unwrap();
        let total_in_buckets: usize = header.frequency.iter().map(|(freq, count)| freq * count).sum();
        assert_eq!(total_in_buckets, 3);
    }

    #[test]
    fn bloom_report_excludes_coinbases_from_spend_denominator() {
        let report = BloomReport { inserts: 10, coinbases: 2, bloom_collisions: 3 };
        assert_eq!(report.spends(), 8);
        assert_eq!(report.spend_collisions(), 1);
    }

    #[test]
    fn scan_point_bloom_counts_one_coinbase_per_associated_block() {
        let query = FakeQuery::empty();
        let header0 = query.push_header([0u8; 32], 0, 0);
        let _ = header0;
        let tx = query.push_tx([5u8; 32], 1, 1);
        let point = query.push_point([7u8; 32]);
        query.associate(0, vec![tx]);
        query.set_points_for_tx(tx, vec![point]);

        let logger = silent_logger();
        let bloom = scan_point_bloom(&query, &logger, &never_canceled()).unwrap();
        assert_eq!(bloom.inserts, 1);
        assert_eq!(bloom.coinbases, 1);
        assert_eq!(bloom.spends(), 0);
    }
}
