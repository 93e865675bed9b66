// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! An in-memory [`NodeQuery`] fake used by this crate's own tests and
//! available to `bs-rpc`/`bs-node` test suites. Never the real node core
//! (§1's external-collaborator boundary); just enough bookkeeping to
//! drive the facade lifecycle and the four scans deterministically.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::{Context, Hash32, Link, NodeQuery, StoreError, Table};

#[derive(Default)]
struct Inner {
    headers: Vec<(Hash32, Context)>,
    header_buckets: usize,
    txs: Vec<(Hash32, usize, usize)>,
    tx_buckets: usize,
    points: Vec<Hash32>,
    point_buckets: usize,
    candidates: Vec<usize>,
    tx_links_per_candidate: HashMap<usize, Vec<Link>>,
    points_per_tx: HashMap<usize, Vec<Link>>,
    dirty: bool,
    full: bool,
    fault: Option<StoreError>,
    space: u64,
}

/// Deterministic stand-in for the real hashmap tables.
pub struct FakeQuery(Mutex<Inner>);

impl FakeQuery {
    pub fn empty() -> Self {
        FakeQuery(Mutex::new(Inner { header_buckets: 16, tx_buckets: 16, point_buckets: 16, ..Inner::default() }))
    }

    pub fn dirty() -> Self {
        let q = Self::empty();
        q.0.lock().unwrap().dirty = true;
        q
    }

    pub fn faulted() -> Self {
        let q = Self::empty();
        q.0.lock().unwrap().fault = Some(StoreError::Integrity);
        q
    }

    pub fn full(space: u64) -> Self {
        let q = Self::empty();
        let mut inner = q.0.lock().unwrap();
        inner.full = true;
        inner.space = space;
        drop(inner);
        q
    }

    pub fn push_header(&self, key: Hash32, height: usize, flags: u32) -> Link {
        let mut inner = self.0.lock().unwrap();
        let link = Link(inner.headers.len());
        inner.headers.push((key, Context { height, flags }));
        inner.candidates.push(link.0);
        link
    }

    pub fn push_tx(&self, key: Hash32, inputs: usize, outputs: usize) -> Link {
        let mut inner = self.0.lock().unwrap();
        let link = Link(inner.txs.len());
        inner.txs.push((key, inputs, outputs));
        link
    }

    pub fn push_point(&self, key: Hash32) -> Link {
        let mut inner = self.0.lock().unwrap();
        let link = Link(inner.points.len());
        inner.points.push(key);
        link
    }

    pub fn associate(&self, candidate_height: usize, tx_links: Vec<Link>) {
        self.0.lock().unwrap().tx_links_per_candidate.insert(candidate_height, tx_links);
    }

    pub fn set_points_for_tx(&self, tx_link: Link, point_links: Vec<Link>) {
        self.0.lock().unwrap().points_per_tx.insert(tx_link.0, point_links);
    }
}

impl NodeQuery for FakeQuery {
    fn header_buckets(&self) -> usize {
        self.0.lock().unwrap().header_buckets
    }

    fn header_records(&self) -> usize {
        self.0.lock().unwrap().headers.len()
    }

    fn top_header(&self, bucket: usize) -> Link {
        let inner = self.0.lock().unwrap();
        if bucket < inner.headers.len() {
            Link(bucket)
        } else {
            Link::TERMINAL
        }
    }

    fn get_header_key(&self, link: Link) -> Hash32 {
        self.0.lock().unwrap().headers[link.0].0
    }

    fn get_context(&self, link: Link) -> Option<Context> {
        self.0.lock().unwrap().headers.get(link.0).map(|(_, ctx)| *ctx)
    }

    fn get_top_candidate(&self) -> usize {
        let inner = self.0.lock().unwrap();
        inner.candidates.iter().copied().max().unwrap_or(0)
    }

    fn to_candidate(&self, height: usize) -> Link {
        let inner = self.0.lock().unwrap();
        inner
            .headers
            .iter()
            .position(|(_, ctx)| ctx.height == height)
            .map(Link)
            .unwrap_or(Link::TERMINAL)
    }

    fn tx_buckets(&self) -> usize {
        self.0.lock().unwrap().tx_buckets
    }

    fn tx_records(&self) -> usize {
        self.0.lock().unwrap().txs.len()
    }

    fn top_tx(&self, bucket: usize) -> Link {
        let inner = self.0.lock().unwrap();
        if bucket < inner.txs.len() {
            Link(bucket)
        } else {
            Link::TERMINAL
        }
    }

    fn get_tx_key(&self, link: Link) -> Hash32 {
        self.0.lock().unwrap().txs[link.0].0
    }

    fn put_counts(&self, link: Link) -> (usize, usize) {
        let inner = self.0.lock().unwrap();
        inner.txs.get(link.0).map(|(_, i, o)| (*i, *o)).unwrap_or((0, 0))
    }

    fn point_buckets(&self) -> usize {
        self.0.lock().unwrap().point_buckets
    }

    fn top_point(&self, bucket: usize) -> Link {
        let inner = self.0.lock().unwrap();
        if bucket < inner.points.len() {
            Link(bucket)
        } else {
            Link::TERMINAL
        }
    }

    fn get_point(&self, link: Link) -> Hash32 {
        self.0.lock().unwrap().points[link.0]
    }

    fn get_top_associated(&self) -> usize {
        let inner = self.0.lock().unwrap();
        inner.tx_links_per_candidate.keys().copied().max().unwrap_or(0)
    }

    fn to_transactions(&self, candidate: Link) -> Vec<Link> {
        let inner = self.0.lock().unwrap();
        let height = inner.headers.get(candidate.0).map(|(_, ctx)| ctx.height).unwrap_or(0);
        inner.tx_links_per_candidate.get(&height).cloned().unwrap_or_default()
    }

    fn to_points(&self, tx: Link) -> Vec<Link> {
        self.0.lock().unwrap().points_per_tx.get(&tx.0).cloned().unwrap_or_default()
    }

    fn is_dirty(&self) -> bool {
        self.0.lock().unwrap().dirty
    }

    fn is_full(&self) -> bool {
        self.0.lock().unwrap().full
    }

    fn is_fault(&self) -> bool {
        self.0.lock().unwrap().fault.is_some()
    }

    fn get_fault(&self) -> Option<StoreError> {
        self.0.lock().unwrap().fault.clone()
    }

    fn space(&self) -> u64 {
        self.0.lock().unwrap().space
    }

    fn body_size(&self, _table: Table) -> Option<u64> {
        Some(0)
    }
}
