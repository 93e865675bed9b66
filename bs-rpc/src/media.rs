// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! Media negotiation (§4.7 "Media negotiation", §4.8): a `?format=` query
//! parameter or an `Accept` header resolves to one of the three response
//! encodings.

use crate::path::Method;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Media {
    Bytes,
    Hex,
    Json,
}

/// Resolve the requested media, preferring the `format` query parameter
/// over the `Accept` header, defaulting to JSON when neither is present
/// or recognized.
pub fn negotiate(format: Option<&str>, accept: Option<&str>) -> Option<Media> {
    if let Some(value) = format {
        return match value {
            "data" => Some(Media::Bytes),
            "text" => Some(Media::Hex),
            "json" => Some(Media::Json),
            _ => None,
        };
    }

    if let Some(accept) = accept {
        if accept.contains("application/octet-stream") {
            return Some(Media::Bytes);
        }
        if accept.contains("text/plain") {
            return Some(Media::Hex);
        }
        if accept.contains("application/json") {
            return Some(Media::Json);
        }
    }

    Some(Media::Json)
}

/// Whether `method` can be served in `media`. `configuration`/`top` and
/// the address-aggregate methods have no binary wire shape; everything
/// else supports all three encodings.
pub fn supports(method: &Method, media: Media) -> bool {
    let json_only = matches!(
        method,
        Method::Configuration
            | Method::Top
            | Method::AddressConfirmed(_)
            | Method::AddressUnconfirmed(_)
            | Method::AddressBalance(_)
    );
    !json_only || matches!(media, Media::Json)
}
