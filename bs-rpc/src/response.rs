// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP response builder (C8): selects exactly one of `send_chunk` /
//! `send_text` / `send_json` per handler, and renders error/status
//! responses for the service-error taxonomy.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use crate::error::ServiceError;
use crate::media::Media;
use crate::model::Encodable;

/// The single body this request will emit, matching §3's invariant that
/// "an HTTP response emits a body of exactly one media form".
#[derive(Debug, Clone, PartialEq)]
pub enum Encoded {
    Chunk(Vec<u8>),
    Text(String),
    /// `hint` is the estimated serialized size, used upstream to
    /// pre-allocate the output buffer (§4.8); it carries no weight once
    /// we hand the value to `serde_json`, so it's kept only for parity
    /// with the handler call signature.
    Json(Value, usize),
}

pub fn send_chunk(bytes: Vec<u8>) -> Encoded {
    Encoded::Chunk(bytes)
}

pub fn send_text(bytes: &[u8]) -> Encoded {
    Encoded::Text(hex::encode(bytes))
}

pub fn send_json(value: Value, hint: usize) -> Encoded {
    Encoded::Json(value, hint)
}

/// Encode a single [`Encodable`] result in the requested media.
pub fn encode_one<T: Encodable>(item: &T, media: Media) -> Encoded {
    match media {
        Media::Bytes => send_chunk(item.to_wire()),
        Media::Hex => send_text(&item.to_wire()),
        Media::Json => send_json(item.to_json(), 256),
    }
}

/// Encode a vector result: concatenate (bytes), hex-concatenate (text),
/// or array-wrap (json) the elements, per §4.8.
pub fn encode_many<T: Encodable>(items: &[T], media: Media) -> Encoded {
    match media {
        Media::Bytes => {
            let mut buf = Vec::new();
            for item in items {
                buf.extend(item.to_wire());
            }
            send_chunk(buf)
        }
        Media::Hex => {
            let mut text = String::new();
            for item in items {
                text.push_str(&hex::encode(item.to_wire()));
            }
            Encoded::Text(text)
        }
        Media::Json => {
            let array = items.iter().map(Encodable::to_json).collect();
            send_json(Value::Array(array), items.len() * 256)
        }
    }
}

impl IntoResponse for Encoded {
    fn into_response(self) -> Response {
        match self {
            Encoded::Chunk(bytes) => {
                (StatusCode::OK, [(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response()
            }
            Encoded::Text(text) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], text).into_response(),
            Encoded::Json(value, _hint) => (StatusCode::OK, Json(value)).into_response(),
        }
    }
}

/// Render a [`ServiceError`] as its mapped status code (§6 "Status
/// codes").
pub fn error_response(error: &ServiceError) -> Response {
    (error.status(), error.to_string()).into_response()
}

/// Render a path-grammar [`crate::error::ParseError`] as `400 Bad
/// Request`; the grammar itself never produces a 404/406/501, only the
/// dispatcher's service-error layer does.
pub fn parse_error_response(error: &crate::error::ParseError) -> Response {
    (StatusCode::BAD_REQUEST, error.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Output, Script};

    #[test]
    fn encode_one_bytes_matches_wire() {
        let output = Output { value: 100, script: Script(vec![1, 2, 3]) };
        let Encoded::Chunk(bytes) = encode_one(&output, Media::Bytes) else {
            panic!("expected chunk encoding");
        };
        assert_eq!(bytes, output.to_wire());
    }

    #[test]
    fn encode_one_hex_is_lowercase_hex_of_wire() {
        let output = Output { value: 1, script: Script(vec![0xde, 0xad]) };
        let Encoded::Text(text) = encode_one(&output, Media::Hex) else {
            panic!("expected text encoding");
        };
        assert_eq!(text, hex::encode(output.to_wire()));
    }

    #[test]
    fn encode_many_json_array_wraps_each_element() {
        let outputs = vec![
            Output { value: 1, script: Script(vec![]) },
            Output { value: 2, script: Script(vec![]) },
        ];
        let Encoded::Json(Value::Array(items), _) = encode_many(&outputs, Media::Json) else {
            panic!("expected json array encoding");
        };
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn encode_many_bytes_concatenates_wire_forms() {
        let outputs = vec![
            Output { value: 1, script: Script(vec![0xaa]) },
            Output { value: 2, script: Script(vec![0xbb]) },
        ];
        let expected: Vec<u8> = outputs.iter().flat_map(|o| o.to_wire()).collect();
        let Encoded::Chunk(bytes) = encode_many(&outputs, Media::Bytes) else {
            panic!("expected chunk encoding");
        };
        assert_eq!(bytes, expected);
    }
}
