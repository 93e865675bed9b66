// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! Store facade (C4) and scan engine (C5).
//!
//! The node core's on-disk table format is an external collaborator (§1):
//! this crate never lays out bytes on disk. It consumes a fixed set of
//! read-only query operations through [`NodeQuery`] — a hashmap-table
//! abstraction named table-by-table in §3 — and builds the facade
//! lifecycle and the four diagnostic scans on top of that single seam.

pub mod facade;
pub mod scan;

#[cfg(test)]
pub mod fake;

use std::fmt;

/// A 32-byte key: header hash, tx hash, or point (outpoint) identity.
pub type Hash32 = [u8; 32];

/// An ordinal record index into an append table, or a bucket-chain head
/// into a hashmap table. `is_terminal` mirrors the "out of range or
/// sentinel value" glossary definition — the query layer never hands out
/// a distinguishable "doesn't exist" except via this sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Link(pub usize);

impl Link {
    pub const TERMINAL: Link = Link(usize::MAX);

    pub const fn is_terminal(self) -> bool {
        self.0 == usize::MAX
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_terminal() {
            write!(f, "terminal")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Candidate-chain header context: the height and rule-flag bitmask
/// associated with one header link (§4.5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    pub height: usize,
    pub flags: u32,
}

/// The named hashmap/append tables listed in §3. Used both by the store
/// facade's progress callback and by `<table>_buckets()`-style scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Header,
    Input,
    Output,
    Point,
    Ins,
    Outs,
    Tx,
    Txs,
    Candidate,
    Confirmed,
    StrongTx,
    Duplicate,
    Prevout,
    ValidatedBk,
    ValidatedTx,
    FilterBk,
    FilterTx,
    Address,
}

impl Table {
    pub const ALL: [Table; 18] = [
        Table::Header,
        Table::Input,
        Table::Output,
        Table::Point,
        Table::Ins,
        Table::Outs,
        Table::Tx,
        Table::Txs,
        Table::Candidate,
        Table::Confirmed,
        Table::StrongTx,
        Table::Duplicate,
        Table::Prevout,
        Table::ValidatedBk,
        Table::ValidatedTx,
        Table::FilterBk,
        Table::FilterTx,
        Table::Address,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Table::Header => "header",
            Table::Input => "input",
            Table::Output => "output",
            Table::Point => "point",
            Table::Ins => "ins",
            Table::Outs => "outs",
            Table::Tx => "tx",
            Table::Txs => "txs",
            Table::Candidate => "candidate",
            Table::Confirmed => "confirmed",
            Table::StrongTx => "strong_tx",
            Table::Duplicate => "duplicate",
            Table::Prevout => "prevout",
            Table::ValidatedBk => "validated_bk",
            Table::ValidatedTx => "validated_tx",
            Table::FilterBk => "filter_bk",
            Table::FilterTx => "filter_tx",
            Table::Address => "address",
        }
    }
}

/// Store error taxonomy (§7 "Store errors"), plus the lifecycle errors
/// that the facade's state machine rejects a transition with.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store integrity error")]
    Integrity,
    #[error("store flush lock held by a previous unclean run")]
    FlushLock,
    #[error("disk full")]
    DiskFull,
    #[error("store not initialized")]
    Uninitialized,
    #[error("operation refused: store has a fault latched")]
    Faulted,
    #[error("invalid lifecycle transition: {0}")]
    InvalidTransition(&'static str),
}

/// The external-collaborator seam (§1, §6): the node core's read-only
/// query surface that the scan engine and the HTTP dispatcher consume.
/// Implementations own the real hashmap tables; this crate only ever
/// reads through this trait.
pub trait NodeQuery: Send + Sync {
    fn header_buckets(&self) -> usize;
    fn header_records(&self) -> usize;
    fn top_header(&self, bucket: usize) -> Link;
    fn get_header_key(&self, link: Link) -> Hash32;
    fn get_context(&self, link: Link) -> Option<Context>;
    fn get_top_candidate(&self) -> usize;
    fn to_candidate(&self, height: usize) -> Link;

    fn tx_buckets(&self) -> usize;
    fn tx_records(&self) -> usize;
    fn top_tx(&self, bucket: usize) -> Link;
    fn get_tx_key(&self, link: Link) -> Hash32;
    /// `(inputs, outputs)` for the tx at `link`; `(0, 0)` denotes a
    /// terminal link (the first unwritten slot on a quiescent store).
    fn put_counts(&self, link: Link) -> (usize, usize);

    fn point_buckets(&self) -> usize;
    fn top_point(&self, bucket: usize) -> Link;
    fn get_point(&self, link: Link) -> Hash32;

    /// Highest candidate height whose confirmed transactions and spend
    /// points are traversable (the "real insert stream" for §4.5.4's
    /// bloom simulation).
    fn get_top_associated(&self) -> usize;
    fn to_transactions(&self, candidate: Link) -> Vec<Link>;
    fn to_points(&self, tx: Link) -> Vec<Link>;

    fn is_dirty(&self) -> bool;
    fn is_full(&self) -> bool;
    fn is_fault(&self) -> bool;
    fn get_fault(&self) -> Option<StoreError>;
    /// Free bytes remaining, reported by `do_report_condition`'s disk-full
    /// branch.
    fn space(&self) -> u64;
    fn body_size(&self, table: Table) -> Option<u64>;
}

/// Lets the executor hand the same query handle to both the store
/// facade and the node (§4.9 step d: the node is constructed from
/// `(query, config, log)`, while the facade also holds it for scans and
/// health checks) without duplicating the underlying tables.
impl<Q: NodeQuery + ?Sized> NodeQuery for std::sync::Arc<Q> {
    fn header_buckets(&self) -> usize {
        (**self).header_buckets()
    }
    fn header_records(&self) -> usize {
        (**self).header_records()
    }
    fn top_header(&self, bucket: usize) -> Link {
        (**self).top_header(bucket)
    }
    fn get_header_key(&self, link: Link) -> Hash32 {
        (**self).get_header_key(link)
    }
    fn get_context(&self, link: Link) -> Option<Context> {
        (**self).get_context(link)
    }
    fn get_top_candidate(&self) -> usize {
        (**self).get_top_candidate()
    }
    fn to_candidate(&self, height: usize) -> Link {
        (**self).to_candidate(height)
    }
    fn tx_buckets(&self) -> usize {
        (**self).tx_buckets()
    }
    fn tx_records(&self) -> usize {
        (**self).tx_records()
    }
    fn top_tx(&self, bucket: usize) -> Link {
        (**self).top_tx(bucket)
    }
    fn get_tx_key(&self, link: Link) -> Hash32 {
        (**self).get_tx_key(link)
    }
    fn put_counts(&self, link: Link) -> (usize, usize) {
        (**self).put_counts(link)
    }
    fn point_buckets(&self) -> usize {
        (**self).point_buckets()
    }
    fn top_point(&self, bucket: usize) -> Link {
        (**self).top_point(bucket)
    }
    fn get_point(&self, link: Link) -> Hash32 {
        (**self).get_point(link)
    }
    fn get_top_associated(&self) -> usize {
        (**self).get_top_associated()
    }
    fn to_transactions(&self, candidate: Link) -> Vec<Link> {
        (**self).to_transactions(candidate)
    }
    fn to_points(&self, tx: Link) -> Vec<Link> {
        (**self).to_points(tx)
    }
    fn is_dirty(&self) -> bool {
        (**self).is_dirty()
    }
    fn is_full(&self) -> bool {
        (**self).is_full()
    }
    fn is_fault(&self) -> bool {
        (**self).is_fault()
    }
    fn get_fault(&self) -> Option<StoreError> {
        (**self).get_fault()
    }
    fn space(&self) -> u64 {
        (**self).space()
    }
    fn body_size(&self, table: Table) -> Option<u64> {
        (**self).body_size(table)
    }
}
