// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared bucket-hashing helper for [`crate::memory_query`]. Mirrors
//! `bs_store::scan`'s `hash64`/`bucket_of` pair so the placeholder query
//! and the scan engine agree on bucket placement.

use bs_store::Hash32;

pub fn bucket_of(key: Hash32, buckets: usize) -> usize {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&key[0..8]);
    let value = u64::from_le_bytes(buf);
    if buckets == 0 {
        0
    } else {
        (value as usize) % buckets
    }
}
