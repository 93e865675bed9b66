// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! A minimal in-memory [`NodeQuery`] implementation standing in for the
//! real node core's table set.
//!
//! The peer wire protocol, block validator, mempool, and on-disk table
//! format are explicitly out of scope (§1 "external collaborator"); this
//! binary still needs something behind [`NodeQuery`] to serve scans and
//! HTTP queries against. `MemoryQuery` is that placeholder: genesis-only
//! at `create`, growable only through [`MemoryQuery::connect_block`] (what
//! the real node's block-connect notifier would drive). It is not a
//! validator and performs no consensus checks.

use std::collections::HashMap;
use std::sync::RwLock;

use bs_store::{Context, Hash32, Link, NodeQuery, StoreError, Table};

#[derive(Default)]
struct Block {
    header_key: Hash32,
    flags: u32,
    tx_links: Vec<Link>,
}

#[derive(Default)]
struct Inner {
    blocks: Vec<Block>,
    tx_keys: Vec<Hash32>,
    tx_puts: Vec<(usize, usize)>,
    point_keys: Vec<Hash32>,
    points_per_tx: HashMap<usize, Vec<Link>>,
    dirty: bool,
    full: bool,
    fault: Option<StoreError>,
}

pub const HEADER_BUCKETS: usize = 1 << 16;
pub const TX_BUCKETS: usize = 1 << 18;
pub const POINT_BUCKETS: usize = 1 << 18;

pub struct MemoryQuery(RwLock<Inner>);

impl MemoryQuery {
    pub fn new() -> Self {
        MemoryQuery(RwLock::new(Inner::default()))
    }

    /// Installs the single genesis header with an all-zero hash and no
    /// rule flags, mirroring `Store::create`'s genesis step (§4.4).
    pub fn install_genesis(&self) {
        let mut inner = self.0.write().expect("memory query poisoned");
        if inner.blocks.is_empty() {
            inner.blocks.push(Block { header_key: [0u8; 32], flags: 0, tx_links: Vec::new() });
        }
    }

    /// Append one connected block: a header key, its rule-flag bitmask,
    /// and the (already-appended) tx links it confirms. Returns the new
    /// height.
    pub fn connect_block(&self, header_key: Hash32, flags: u32, tx_links: Vec<Link>) -> usize {
        let mut inner = self.0.write().expect("memory query poisoned");
        inner.blocks.push(Block { header_key, flags, tx_links });
        inner.blocks.len() - 1
    }

    pub fn append_tx(&self, key: Hash32, inputs: usize, outputs: usize) -> Link {
        let mut inner = self.0.write().expect("memory query poisoned");
        inner.tx_keys.push(key);
        inner.tx_puts.push((inputs, outputs));
        Link(inner.tx_keys.len() - 1)
    }

    pub fn append_point(&self, key: Hash32) -> Link {
        let mut inner = self.0.write().expect("memory query poisoned");
        inner.point_keys.push(key);
        Link(inner.point_keys.len() - 1)
    }

    pub fn set_points_for_tx(&self, tx: Link, points: Vec<Link>) {
        self.0.write().expect("memory query poisoned").points_per_tx.insert(tx.0, points);
    }

    pub fn set_full(&self, full: bool) {
        self.0.write().expect("memory query poisoned").full = full;
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.0.write().expect("memory query poisoned").dirty = dirty;
    }
}

impl Default for MemoryQuery {
    fn default() -> Self {
        MemoryQuery::new()
    }
}

impl NodeQuery for MemoryQuery {
    fn header_buckets(&self) -> usize {
        HEADER_BUCKETS
    }

    fn header_records(&self) -> usize {
        self.0.read().expect("memory query poisoned").blocks.len()
    }

    fn top_header(&self, bucket: usize) -> Link {
        let inner = self.0.read().expect("memory query poisoned");
        inner
            .blocks
            .iter()
            .position(|b| crate::hashing::bucket_of(b.header_key, HEADER_BUCKETS) == bucket)
            .map(Link)
            .unwrap_or(Link::TERMINAL)
    }

    fn get_header_key(&self, link: Link) -> Hash32 {
        self.0.read().expect("memory query poisoned").blocks[link.0].header_key
    }

    fn get_context(&self, link: Link) -> std::option::Option<Context> {
        self.0
            .read()
            .expect("memory query poisoned")
            .blocks
            .get(link.0)
            .map(|b| Context { height: link.0, flags: b.flags })
    }

    fn get_top_candidate(&self) -> usize {
        self.0.read().expect("memory query poisoned").blocks.len().saturating_sub(1)
    }

    fn to_candidate(&self, height: usize) -> Link {
        let inner = self.0.read().expect("memory query poisoned");
        if height < inner.blocks.len() {
            Link(height)
        } else {
            Link::TERMINAL
        }
    }

    fn tx_buckets(&self) -> usize {
        TX_BUCKETS
    }

    fn tx_records(&self) -> usize {
        self.0.read().expect("memory query poisoned").tx_keys.len()
    }

    fn top_tx(&self, bucket: usize) -> Link {
        let inner = self.0.read().expect("memory query poisoned");
        inner
            .tx_keys
            .iter()
            .position(|key| crate::hashing::bucket_of(*key, TX_BUCKETS) == bucket)
            .map(Link)
            .unwrap_or(Link::TERMINAL)
    }

    fn get_tx_key(&self, link: Link) -> Hash32 {
        self.0.read().expect("memory query poisoned").tx_keys[link.0]
    }

    fn put_counts(&self, link: Link) -> (usize, usize) {
        self.0.read().expect("memory query poisoned").tx_puts.get(link.0).copied().unwrap_or((0, 0))
    }

    fn point_buckets(&self) -> usize {
        POINT_BUCKETS
    }

    fn top_point(&self, bucket: usize) -> Link {
        let inner = self.0.read().expect("memory query poisoned");
        inner
            .point_keys
            .iter()
            .position(|key| crate::hashing::bucket_of(*key, POINT_BUCKETS) == bucket)
            .map(Link)
            .unwrap_or(Link::TERMINAL)
    }

    fn get_point(&self, link: Link) -> Hash32 {
        self.0.read().expect("memory query poisoned").point_keys[link.0]
    }

    fn get_top_associated(&self) -> usize {
        self.get_top_candidate()
    }

    fn to_transactions(&self, candidate: Link) -> Vec<Link> {
        self.0
            .read()
            .expect("memory query poisoned")
            .blocks
            .get(candidate.0)
            .map(|b| b.tx_links.clone())
            .unwrap_or_default()
    }

    fn to_points(&self, tx: Link) -> Vec<Link> {
        self.0.read().expect("memory query poisoned").points_per_tx.get(&tx.0).cloned().unwrap_or_default()
    }

    fn is_dirty(&self) -> bool {
        self.0.read().expect("memory query poisoned").dirty
    }

    fn is_full(&self) -> bool {
        self.0.read().expect("memory query poisoned").full
    }

    fn is_fault(&self) -> bool {
        self.0.read().expect("memory query poisoned").fault.is_some()
    }

    fn get_fault(&self) -> std::option::Option<StoreError> {
        self.0.read().expect("memory query poisoned").fault.clone()
    }

    fn space(&self) -> u64 {
        u64::MAX
    }

    fn body_size(&self, _table: Table) -> std::option::Option<u64> {
        Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_is_installed_once() {
        let query = MemoryQuery::new();
        query.install_genesis();
        query.install_genesis();
        assert_eq!(query.header_records(), 1);
    }

    #[test]
    fn connect_block_advances_top_candidate() {
        let query = MemoryQuery::new();
        query.install_genesis();
        query.connect_block([1u8; 32], 0, vec![]);
        assert_eq!(query.get_top_candidate(), 1);
    }
}
