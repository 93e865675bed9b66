// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! Domain DTOs returned by the dispatcher. The node's actual record
//! layout is out of scope (§1); these are the minimal wire/JSON shapes
//! the response builder (C8) needs to demonstrate the three-encoding
//! contract for each binary-typed result named in §4.8.

use serde_json::{json, Value};

pub type Hash32 = [u8; 32];

fn hash_json(hash: Hash32) -> Value {
    Value::String(hex::encode(hash))
}

/// Anything the response builder can emit in all three media forms
/// (§4.8 "Serialization rules").
pub trait Encodable {
    fn to_wire(&self) -> Vec<u8>;
    fn to_json(&self) -> Value;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u32,
    pub previous: Hash32,
    pub merkle_root: Hash32,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    /// §4.8: "augmenting header JSON with a `height` field when
    /// available" — used when the dispatcher resolved the block by
    /// height, or looked the height up as part of a hash-keyed query.
    pub fn to_json_with_height(&self, height: Option<u32>) -> Value {
        let mut value = self.to_json();
        if let (Some(height), Value::Object(ref mut map)) = (height, &mut value) {
            map.insert("height".to_string(), json!(height));
        }
        value
    }
}

impl Encodable for BlockHeader {
    fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(80);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.previous);
        buf.extend_from_slice(&self.merkle_root);
        buf.extend_from_slice(&self.time.to_le_bytes());
        buf.extend_from_slice(&self.bits.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf
    }

    fn to_json(&self) -> Value {
        json!({
            "version": self.version,
            "previous_block_hash": hash_json(self.previous),
            "merkle_root": hash_json(self.merkle_root),
            "time": self.time,
            "bits": self.bits,
            "nonce": self.nonce,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderContext {
    pub height: u32,
    pub flags: u32,
    pub median_time_past: u32,
}

impl Encodable for HeaderContext {
    fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(12);
        buf.extend_from_slice(&self.height.to_le_bytes());
        buf.extend_from_slice(&self.flags.to_le_bytes());
        buf.extend_from_slice(&self.median_time_past.to_le_bytes());
        buf
    }

    fn to_json(&self) -> Value {
        json!({ "height": self.height, "flags": self.flags, "median_time_past": self.median_time_past })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script(pub Vec<u8>);

impl Encodable for Script {
    fn to_wire(&self) -> Vec<u8> {
        self.0.clone()
    }

    fn to_json(&self) -> Value {
        json!({ "hex": hex::encode(&self.0) })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness(pub Vec<Vec<u8>>);

impl Encodable for Witness {
    fn to_wire(&self) -> Vec<u8> {
        self.0.concat()
    }

    fn to_json(&self) -> Value {
        json!({ "items": self.0.iter().map(hex::encode).collect::<Vec<_>>() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub previous_hash: Hash32,
    pub previous_index: u32,
    pub script: Script,
    pub witness: Witness,
    pub sequence: u32,
}

impl Encodable for Input {
    fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.previous_hash);
        buf.extend_from_slice(&self.previous_index.to_le_bytes());
        buf.extend_from_slice(&self.script.to_wire());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf
    }

    fn to_json(&self) -> Value {
        json!({
            "previous_output": { "hash": hash_json(self.previous_hash), "index": self.previous_index },
            "script": self.script.to_json(),
            "witness": self.witness.to_json(),
            "sequence": self.sequence,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub value: u64,
    pub script: Script,
}

impl Encodable for Output {
    fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.value.to_le_bytes());
        buf.extend_from_slice(&self.script.to_wire());
        buf
    }

    fn to_json(&self) -> Value {
        json!({ "value": self.value, "script": self.script.to_json() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub hash: Hash32,
    pub version: u32,
    pub locktime: u32,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

impl Encodable for Transaction {
    fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.version.to_le_bytes());
        for input in &self.inputs {
            buf.extend_from_slice(&input.to_wire());
        }
        for output in &self.outputs {
            buf.extend_from_slice(&output.to_wire());
        }
        buf.extend_from_slice(&self.locktime.to_le_bytes());
        buf
    }

    fn to_json(&self) -> Value {
        json!({
            "hash": hash_json(self.hash),
            "version": self.version,
            "locktime": self.locktime,
            "inputs": self.inputs.iter().map(Encodable::to_json).collect::<Vec<_>>(),
            "outputs": self.outputs.iter().map(Encodable::to_json).collect::<Vec<_>>(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDetails {
    pub header: BlockHeader,
    pub height: u32,
    pub tx_count: u32,
}

impl Encodable for BlockDetails {
    fn to_wire(&self) -> Vec<u8> {
        let mut buf = self.header.to_wire();
        buf.extend_from_slice(&self.height.to_le_bytes());
        buf.extend_from_slice(&self.tx_count.to_le_bytes());
        buf
    }

    fn to_json(&self) -> Value {
        let mut value = self.header.to_json_with_height(Some(self.height));
        if let Value::Object(ref mut map) = value {
            map.insert("tx_count".to_string(), json!(self.tx_count));
        }
        value
    }
}

/// `/v{ver}/configuration` — a JSON-only summary (no binary wire shape).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationSummary {
    pub network_identifier: u32,
    pub checkpoints: Vec<Hash32>,
}

impl ConfigurationSummary {
    pub fn to_json(&self) -> Value {
        json!({
            "network_identifier": self.network_identifier,
            "checkpoints": self.checkpoints.iter().map(|h| hash_json(*h)).collect::<Vec<_>>(),
        })
    }
}

/// `/v{ver}/top` — JSON-only top-of-chain summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopSummary {
    pub height: u32,
    pub hash: Hash32,
}

impl TopSummary {
    pub fn to_json(&self) -> Value {
        json!({ "height": self.height, "hash": hash_json(self.hash) })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter(pub Vec<u8>);

impl Encodable for Filter {
    fn to_wire(&self) -> Vec<u8> {
        self.0.clone()
    }

    fn to_json(&self) -> Value {
        json!({ "hex": hex::encode(&self.0) })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressBalance {
    pub confirmed: u64,
    pub unconfirmed: i64,
}

impl AddressBalance {
    pub fn to_json(&self) -> Value {
        json!({ "confirmed": self.confirmed, "unconfirmed": self.unconfirmed })
    }
}
