// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! Resolves a parsed [`crate::path::Request`] against a [`Store`] and
//! renders the result through [`crate::response`], grounded on
//! `protocol_native.cpp`'s per-method handler bodies: each method
//! fetches exactly the content it names, then falls through to the
//! shared encode-by-media step.
//!
//! [`Store`] is the dispatcher's only dependency on the rest of the
//! system: a binary wires it to whatever backs the real content (here,
//! `bs-node`'s in-memory placeholder). Every method that can fail for a
//! content reason (`not_found`) returns that through [`ServiceError`];
//! methods whose path shape the grammar already rejects any way of
//! spelling wrong never reach this layer.

use crate::error::ServiceError;
use crate::media::{self, Media};
use crate::model::{
    AddressBalance, BlockDetails, BlockHeader, ConfigurationSummary, Encodable, Filter, HeaderContext, Input,
    Output, TopSummary, Transaction,
};
use crate::path::{BlockSelector, Hash32, Method, Request};
use crate::response::{encode_many, encode_one, send_json, Encoded};

/// The content-level query surface the dispatcher services each method
/// against (§2 "HTTP query dispatcher ... services each method against
/// the store"). Deliberately narrower than `bs_store::NodeQuery`: that
/// trait is the scan engine's structural seam, this one is the content
/// seam, and a real deployment's node core would implement both against
/// the same underlying tables.
pub trait Store: Send + Sync {
    fn configuration(&self) -> ConfigurationSummary;
    fn top(&self) -> TopSummary;

    fn resolve(&self, selector: BlockSelector) -> Option<u32>;
    fn block_header(&self, height: u32) -> Option<BlockHeader>;
    fn block_header_context(&self, height: u32) -> Option<HeaderContext>;
    fn block_txs(&self, height: u32) -> Option<Vec<Transaction>>;
    fn block_filter(&self, height: u32, kind: u8) -> Option<Filter>;
    fn block_filter_hash(&self, height: u32, kind: u8) -> Option<Hash32>;
    fn block_filter_header(&self, height: u32, kind: u8) -> Option<Hash32>;

    fn tx(&self, hash: Hash32) -> Option<Transaction>;

    fn input(&self, hash: Hash32, index: u32) -> Option<Input>;
    fn output(&self, hash: Hash32, index: u32) -> Option<Output>;
    fn output_spender(&self, hash: Hash32, index: u32) -> Option<Input>;
    fn output_spenders(&self, hash: Hash32, index: u32) -> Option<Vec<Input>>;

    fn address_confirmed(&self, hash: Hash32) -> Option<Vec<Transaction>>;
    fn address_unconfirmed(&self, hash: Hash32) -> Option<Vec<Transaction>>;
    fn address_balance(&self, hash: Hash32) -> Option<AddressBalance>;
}

fn resolved_height(store: &dyn Store, selector: BlockSelector) -> Result<u32, ServiceError> {
    match selector {
        BlockSelector::Height(height) => {
            if store.block_header(height).is_some() {
                Ok(height)
            } else {
                Err(ServiceError::NotFound)
            }
        }
        BlockSelector::Hash(_) => store.resolve(selector).ok_or(ServiceError::NotFound),
    }
}

fn media_or_not_acceptable(request: &Request, format: Option<&str>, accept: Option<&str>) -> Result<Media, ServiceError> {
    let media = media::negotiate(format, accept).ok_or(ServiceError::NotAcceptable)?;
    if media::supports(&request.method, media) {
        Ok(media)
    } else {
        Err(ServiceError::NotAcceptable)
    }
}

/// Service one fully parsed request (§4.7 table) against `store`,
/// resolving `format`/`accept` to a concrete [`Media`] first (§4.7
/// "Media negotiation").
pub fn handle(
    store: &dyn Store,
    request: &Request,
    format: Option<&str>,
    accept: Option<&str>,
) -> Result<Encoded, ServiceError> {
    let media = media_or_not_acceptable(request, format, accept)?;

    match request.method {
        Method::Configuration => Ok(send_json(store.configuration().to_json(), 512)),
        Method::Top => Ok(send_json(store.top().to_json(), 64)),

        Method::Block(selector) => {
            let height = resolved_height(store, selector)?;
            let header = store.block_header(height).ok_or(ServiceError::NotFound)?;
            Ok(match media {
                Media::Json => send_json(header.to_json_with_height(Some(height as u32)), 256),
                _ => encode_one(&header, media),
            })
        }
        Method::BlockHeader(selector) => {
            let height = resolved_height(store, selector)?;
            let header = store.block_header(height).ok_or(ServiceError::NotFound)?;
            Ok(encode_one(&header, media))
        }
        Method::BlockHeaderContext(selector) => {
            let height = resolved_height(store, selector)?;
            let context = store.block_header_context(height).ok_or(ServiceError::NotFound)?;
            Ok(encode_one(&context, media))
        }
        Method::BlockDetails(selector) => {
            let height = resolved_height(store, selector)?;
            let header = store.block_header(height).ok_or(ServiceError::NotFound)?;
            let tx_count = store.block_txs(height).map(|txs| txs.len() as u32).unwrap_or(0);
            let details = BlockDetails { header, height, tx_count };
            Ok(encode_one(&details, media))
        }
        Method::BlockTxs(selector) => {
            let height = resolved_height(store, selector)?;
            let txs = store.block_txs(height).ok_or(ServiceError::NotFound)?;
            Ok(encode_many(&txs, media))
        }
        Method::BlockFilter(selector, kind) => {
            let height = resolved_height(store, selector)?;
            let filter = store.block_filter(height, kind).ok_or(ServiceError::NotFound)?;
            Ok(encode_one(&filter, media))
        }
        Method::BlockFilterHash(selector, kind) => {
            let height = resolved_height(store, selector)?;
            let hash = store.block_filter_hash(height, kind).ok_or(ServiceError::NotFound)?;
            Ok(hash_encoded(hash, media))
        }
        Method::BlockFilterHeader(selector, kind) => {
            let height = resolved_height(store, selector)?;
            let hash = store.block_filter_header(height, kind).ok_or(ServiceError::NotFound)?;
            Ok(hash_encoded(hash, media))
        }
        Method::BlockTx(selector, position) => {
            let height = resolved_height(store, selector)?;
            let txs = store.block_txs(height).ok_or(ServiceError::NotFound)?;
            let tx = txs.get(position as usize).ok_or(ServiceError::NotFound)?;
            Ok(encode_one(tx, media))
        }

        Method::Tx(hash) => {
            let tx = store.tx(hash).ok_or(ServiceError::NotFound)?;
            Ok(encode_one(&tx, media))
        }
        Method::TxHeader(hash) => {
            let tx = store.tx(hash).ok_or(ServiceError::NotFound)?;
            Ok(send_json(serde_json::json!({ "version": tx.version, "locktime": tx.locktime }), 32))
        }
        Method::TxDetails(hash) => {
            let tx = store.tx(hash).ok_or(ServiceError::NotFound)?;
            Ok(encode_one(&tx, media))
        }

        Method::Inputs(hash) => {
            let tx = store.tx(hash).ok_or(ServiceError::NotFound)?;
            Ok(encode_many(&tx.inputs, media))
        }
        Method::Input(hash, index) => {
            let input = store.input(hash, index).ok_or(ServiceError::NotFound)?;
            Ok(encode_one(&input, media))
        }
        Method::InputScript(hash, index) => {
            let input = store.input(hash, index).ok_or(ServiceError::NotFound)?;
            Ok(encode_one(&input.script, media))
        }
        Method::InputWitness(hash, index) => {
            let input = store.input(hash, index).ok_or(ServiceError::NotFound)?;
            Ok(encode_one(&input.witness, media))
        }

        Method::Outputs(hash) => {
            let tx = store.tx(hash).ok_or(ServiceError::NotFound)?;
            Ok(encode_many(&tx.outputs, media))
        }
        Method::Output(hash, index) => {
            let output = store.output(hash, index).ok_or(ServiceError::NotFound)?;
            Ok(encode_one(&output, media))
        }
        Method::OutputScript(hash, index) => {
            let output = store.output(hash, index).ok_or(ServiceError::NotFound)?;
            Ok(encode_one(&output.script, media))
        }
        Method::OutputSpender(hash, index) => {
            let spender = store.output_spender(hash, index).ok_or(ServiceError::NotFound)?;
            Ok(encode_one(&spender, media))
        }
        Method::OutputSpenders(hash, index) => {
            let spenders = store.output_spenders(hash, index).ok_or(ServiceError::NotFound)?;
            Ok(encode_many(&spenders, media))
        }

        Method::Address(hash) => {
            let mut txs = store.address_confirmed(hash).ok_or(ServiceError::NotFound)?;
            txs.extend(store.address_unconfirmed(hash).unwrap_or_default());
            Ok(encode_many(&txs, media))
        }
        Method::AddressConfirmed(hash) => {
            let confirmed = store.address_confirmed(hash).ok_or(ServiceError::NotFound)?;
            Ok(send_json(
                serde_json::Value::Array(confirmed.iter().map(Encodable::to_json).collect()),
                confirmed.len() * 256,
            ))
        }
        Method::AddressUnconfirmed(hash) => {
            let unconfirmed = store.address_unconfirmed(hash).ok_or(ServiceError::NotFound)?;
            Ok(send_json(
                serde_json::Value::Array(unconfirmed.iter().map(Encodable::to_json).collect()),
                unconfirmed.len() * 256,
            ))
        }
        Method::AddressBalance(hash) => {
            let balance = store.address_balance(hash).ok_or(ServiceError::NotFound)?;
            Ok(send_json(balance.to_json(), 32))
        }
    }
}

/// Whether `method` is one of the three long-running address queries
/// that §4.8 routes onto the worker pool.
pub fn is_long_running(method: &Method) -> bool {
    matches!(
        method,
        Method::AddressConfirmed(_) | Method::AddressUnconfirmed(_) | Method::AddressBalance(_)
    )
}

fn hash_encoded(hash: Hash32, media: Media) -> Encoded {
    match media {
        Media::Bytes => crate::response::send_chunk(hash.to_vec()),
        Media::Hex => crate::response::send_text(&hash),
        Media::Json => send_json(serde_json::json!({ "hash": hex::encode(hash) }), 80),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::parse;

    struct FakeStore;

    fn hash_of(byte: u8) -> Hash32 {
        let mut h = [0u8; 32];
        h[31] = byte;
        h
    }

    fn header() -> BlockHeader {
        BlockHeader { version: 1, previous: [0; 32], merkle_root: [1; 32], time: 10, bits: 0x1d00ffff, nonce: 7 }
    }

    fn tx() -> Transaction {
        Transaction { hash: hash_of(9), version: 1, locktime: 0, inputs: vec![], outputs: vec![] }
    }

    impl Store for FakeStore {
        fn configuration(&self) -> ConfigurationSummary {
            ConfigurationSummary { network_identifier: 0, checkpoints: vec![] }
        }
        fn top(&self) -> TopSummary {
            TopSummary { height: 5, hash: hash_of(5) }
        }
        fn resolve(&self, selector: BlockSelector) -> Option<u32> {
            match selector {
                BlockSelector::Height(h) if h <= 5 => Some(h),
                BlockSelector::Hash(h) if h == hash_of(5) => Some(5),
                _ => None,
            }
        }
        fn block_header(&self, height: u32) -> Option<BlockHeader> {
            (height <= 5).then(header)
        }
        fn block_header_context(&self, height: u32) -> Option<HeaderContext> {
            (height <= 5).then(|| HeaderContext { height, flags: 0, median_time_past: 0 })
        }
        fn block_txs(&self, height: u32) -> Option<Vec<Transaction>> {
            (height <= 5).then(|| vec![tx()])
        }
        fn block_filter(&self, height: u32, _kind: u8) -> Option<Filter> {
            (height <= 5).then(|| Filter(vec![0xab]))
        }
        fn block_filter_hash(&self, height: u32, _kind: u8) -> Option<Hash32> {
            (height <= 5).then(|| hash_of(1))
        }
        fn block_filter_header(&self, height: u32, _kind: u8) -> Option<Hash32> {
            (height <= 5).then(|| hash_of(2))
        }
        fn tx(&self, hash: Hash32) -> Option<Transaction> {
            (hash == hash_of(9)).then(tx)
        }
        fn input(&self, _hash: Hash32, _index: u32) -> Option<Input> {
            None
        }
        fn output(&self, _hash: Hash32, _index: u32) -> Option<Output> {
            None
        }
        fn output_spender(&self, _hash: Hash32, _index: u32) -> Option<Input> {
            None
        }
        fn output_spenders(&self, _hash: Hash32, _index: u32) -> Option<Vec<Input>> {
            None
        }
        fn address_confirmed(&self, _hash: Hash32) -> Option<Vec<Transaction>> {
            Some(vec![tx()])
        }
        fn address_unconfirmed(&self, _hash: Hash32) -> Option<Vec<Transaction>> {
            Some(vec![])
        }
        fn address_balance(&self, _hash: Hash32) -> Option<AddressBalance> {
            Some(AddressBalance { confirmed: 100, unconfirmed: 0 })
        }
    }

    #[test]
    fn top_and_configuration_are_json() {
        let store = FakeStore;
        let request = parse("/v1/top").unwrap();
        let encoded = handle(&store, &request, None, None).unwrap();
        assert!(matches!(encoded, Encoded::Json(_, _)));
    }

    #[test]
    fn block_by_height_not_found_past_top() {
        let store = FakeStore;
        let request = parse("/v1/block/height/9").unwrap();
        assert!(matches!(handle(&store, &request, None, None), Err(ServiceError::NotFound)));
    }

    #[test]
    fn block_by_hash_resolves_through_store() {
        let store = FakeStore;
        let request = parse(&format!("/v1/block/hash/{}", hex::encode(hash_of(5)))).unwrap();
        let encoded = handle(&store, &request, Some("json"), None).unwrap();
        assert!(matches!(encoded, Encoded::Json(_, _)));
    }

    fn request_for_balance() -> Request {
        parse(&format!("/v1/address/{}/balance", hex::encode(hash_of(1)))).unwrap()
    }

    #[test]
    fn address_balance_rejects_bytes_format() {
        let store = FakeStore;
        let request = request_for_balance();
        let err = handle(&store, &request, Some("data"), None).unwrap_err();
        assert!(matches!(err, ServiceError::NotAcceptable));
    }

    #[test]
    fn address_balance_accepts_json() {
        let store = FakeStore;
        let request = request_for_balance();
        let encoded = handle(&store, &request, Some("json"), None).unwrap();
        assert!(matches!(encoded, Encoded::Json(_, _)));
    }

    #[test]
    fn long_running_methods_are_flagged() {
        let request = request_for_balance();
        assert!(is_long_running(&request.method));
        let request = parse("/v1/top").unwrap();
        assert!(!is_long_running(&request.method));
    }
}
