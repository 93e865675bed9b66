// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP path parser (C7) and response builder (C8): a versioned REST-like
//! path grammar parsed into a typed method + parameter bag (§4.7), media
//! negotiation, and the three-encoding response contract (§4.8).
//!
//! [`dispatch`] is the seam between the two: it resolves a parsed
//! [`path::Request`] against a [`dispatch::Store`] implementation and
//! renders the result through [`response`]. The actual store (backed by
//! `bs-store`'s facade plus whatever content representation the binary
//! wires in) lives outside this crate — see `bs-node`'s `http` module.

pub mod dispatch;
pub mod error;
pub mod media;
pub mod model;
pub mod path;
pub mod response;
