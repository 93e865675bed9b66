// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! The content-level [`bs_rpc::dispatch::Store`] implementation: full
//! block headers, transactions, and address indices. The on-disk record
//! layout is explicitly out of scope (§1); `ContentStore` is this
//! binary's own minimal, in-memory content representation, separate
//! from [`crate::memory_query::MemoryQuery`] (which only ever models the
//! structural shape the scan engine needs).

use std::collections::HashMap;
use std::sync::RwLock;

use bs_rpc::dispatch::Store;
use bs_rpc::model::{AddressBalance, BlockHeader, ConfigurationSummary, Filter, HeaderContext, Input, Output, TopSummary, Transaction};
use bs_rpc::path::{BlockSelector, Hash32};

#[derive(Default)]
struct Inner {
    headers: Vec<BlockHeader>,
    contexts: Vec<HeaderContext>,
    block_txs: Vec<Vec<Transaction>>,
    filters: HashMap<(u32, u8), Filter>,
    filter_hashes: HashMap<(u32, u8), Hash32>,
    filter_headers: HashMap<(u32, u8), Hash32>,
    tx_by_hash: HashMap<Hash32, Transaction>,
    spenders: HashMap<(Hash32, u32), Input>,
    address_confirmed: HashMap<Hash32, Vec<Transaction>>,
    address_unconfirmed: HashMap<Hash32, Vec<Transaction>>,
    address_balance: HashMap<Hash32, AddressBalance>,
    network_identifier: u32,
    checkpoints: Vec<Hash32>,
}

/// Cheap to clone (it's just an `Arc` in practice via [`std::sync::Arc`]
/// at the call site); interior-mutable so the HTTP layer and the block-
/// connect notifier can both hold a reference.
#[derive(Default)]
pub struct ContentStore(RwLock<Inner>);

impl ContentStore {
    pub fn new(network_identifier: u32) -> Self {
        let store = ContentStore(RwLock::new(Inner::default()));
        store.0.write().expect("content store poisoned").network_identifier = network_identifier;
        store
    }

    /// Appends one connected block's full content (§2 "incoming block
    /// events feed the Fee estimator" — this is the HTTP-facing half of
    /// the same connect notification).
    pub fn push_block(&self, header: BlockHeader, context: HeaderContext, txs: Vec<Transaction>) -> u32 {
        let mut inner = self.0.write().expect("content store poisoned");
        let height = inner.headers.len() as u32;
        for tx in &txs {
            inner.tx_by_hash.insert(tx.hash, tx.clone());
        }
        inner.headers.push(header);
        inner.contexts.push(context);
        inner.block_txs.push(txs);
        height
    }

    pub fn set_filter(&self, height: u32, kind: u8, filter: Filter, hash: Hash32, header_hash: Hash32) {
        let mut inner = self.0.write().expect("content store poisoned");
        inner.filters.insert((height, kind), filter);
        inner.filter_hashes.insert((height, kind), hash);
        inner.filter_headers.insert((height, kind), header_hash);
    }

    pub fn set_address_activity(
        &self,
        address: Hash32,
        confirmed: Vec<Transaction>,
        unconfirmed: Vec<Transaction>,
        balance: AddressBalance,
    ) {
        let mut inner = self.0.write().expect("content store poisoned");
        inner.address_confirmed.insert(address, confirmed);
        inner.address_unconfirmed.insert(address, unconfirmed);
        inner.address_balance.insert(address, balance);
    }

    pub fn top_height(&self) -> Option<u32> {
        let inner = self.0.read().expect("content store poisoned");
        inner.headers.len().checked_sub(1).map(|h| h as u32)
    }
}

impl Store for ContentStore {
    fn configuration(&self) -> ConfigurationSummary {
        let inner = self.0.read().expect("content store poisoned");
        ConfigurationSummary { network_identifier: inner.network_identifier, checkpoints: inner.checkpoints.clone() }
    }

    fn top(&self) -> TopSummary {
        let inner = self.0.read().expect("content store poisoned");
        match inner.headers.len().checked_sub(1) {
            Some(height) => TopSummary { height: height as u32, hash: inner.headers[height].merkle_root },
            None => TopSummary { height: 0, hash: [0u8; 32] },
        }
    }

    fn resolve(&self, selector: BlockSelector) -> Option<u32> {
        let inner = self.0.read().expect("content store poisoned");
        match selector {
            BlockSelector::Height(h) => (h as usize) < inner.headers.len(),
            BlockSelector::Hash(hash) => {
                return inner.headers.iter().position(|h| h.merkle_root == hash).map(|i| i as u32);
            }
        }
        .then_some(match selector {
            BlockSelector::Height(h) => h,
            BlockSelector::Hash(_) => unreachable!(),
        })
    }

    fn block_header(&self, height: u32) -> Option<BlockHeader> {
        self.0.read().expect("content store poisoned").headers.get(height as usize).cloned()
    }

    fn block_header_context(&self, height: u32) -> Option<HeaderContext> {
        self.0.read().expect("content store poisoned").contexts.get(height as usize).cloned()
    }

    fn block_txs(&self, height: u32) -> Option<Vec<Transaction>> {
        self.0.read().expect("content store poisoned").block_txs.get(height as usize).cloned()
    }

    fn block_filter(&self, height: u32, kind: u8) -> Option<Filter> {
        self.0.read().expect("content store poisoned").filters.get(&(height, kind)).cloned()
    }

    fn block_filter_hash(&self, height: u32, kind: u8) -> Option<Hash32> {
        self.0.read().expect("content store poisoned").filter_hashes.get(&(height, kind)).copied()
    }

    fn block_filter_header(&self, height: u32, kind: u8) -> Option<Hash32> {
        self.0.read().expect("content store poisoned").filter_headers.get(&(height, kind)).copied()
    }

    fn tx(&self, hash: Hash32) -> Option<Transaction> {
        self.0.read().expect("content store poisoned").tx_by_hash.get(&hash).cloned()
    }

    fn input(&self, hash: Hash32, index: u32) -> Option<Input> {
        let inner = self.0.read().expect("content store poisoned");
        inner.tx_by_hash.get(&hash)?.inputs.get(index as usize).cloned()
    }

    fn output(&self, hash: Hash32, index: u32) -> Option<Output> {
        let inner = self.0.read().expect("content store poisoned");
        inner.tx_by_hash.get(&hash)?.outputs.get(index as usize).cloned()
    }

    fn output_spender(&self, hash: Hash32, index: u32) -> Option<Input> {
        self.0.read().expect("content store poisoned").spenders.get(&(hash, index)).cloned()
    }

    fn output_spenders(&self, hash: Hash32, index: u32) -> Option<Vec<Input>> {
        self.output_spender(hash, index).map(|input| vec![input])
    }

    fn address_confirmed(&self, hash: Hash32) -> Option<Vec<Transaction>> {
        Some(self.0.read().expect("content store poisoned").address_confirmed.get(&hash).cloned().unwrap_or_default())
    }

    fn address_unconfirmed(&self, hash: Hash32) -> Option<Vec<Transaction>> {
        Some(
            self.0
                .read()
                .expect("content store poisoned")
                .address_unconfirmed
                .get(&hash)
                .cloned()
                .unwrap_or_default(),
        )
    }

    fn address_balance(&self, hash: Hash32) -> Option<AddressBalance> {
        Some(
            self.0
                .read()
                .expect("content store poisoned")
                .address_balance
                .get(&hash)
                .copied()
                .unwrap_or(AddressBalance { confirmed: 0, unconfirmed: 0 }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(nonce: u32) -> BlockHeader {
        BlockHeader { version: 1, previous: [0; 32], merkle_root: [nonce as u8; 32], time: 0, bits: 0, nonce }
    }

    #[test]
    fn push_block_is_queryable_by_height_and_hash() {
        let store = ContentStore::new(0);
        let height = store.push_block(header(1), HeaderContext { height: 0, flags: 0, median_time_past: 0 }, vec![]);
        assert_eq!(height, 0);
        assert_eq!(store.resolve(BlockSelector::Height(0)), Some(0));
        assert_eq!(store.resolve(BlockSelector::Hash([1u8; 32])), Some(0));
        assert_eq!(store.resolve(BlockSelector::Hash([9u8; 32])), None);
    }

    #[test]
    fn top_reflects_highest_pushed_block() {
        let store = ContentStore::new(0);
        assert_eq!(store.top().height, 0);
        store.push_block(header(1), HeaderContext { height: 0, flags: 0, median_time_past: 0 }, vec![]);
        store.push_block(header(2), HeaderContext { height: 1, flags: 0, median_time_past: 0 }, vec![]);
        assert_eq!(store.top().height, 1);
    }

    #[test]
    fn address_balance_defaults_to_zero_for_unknown_address() {
        let store = ContentStore::new(0);
        assert_eq!(store.address_balance([3u8; 32]), Some(AddressBalance { confirmed: 0, unconfirmed: 0 }));
    }
}
