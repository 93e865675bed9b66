// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy (§7): path-grammar parse errors and the service-level
//! errors the dispatcher and response builder translate into HTTP status
//! codes.

use axum::http::StatusCode;

/// §7 "Parse errors" — every way [`crate::path::parse`] can fail. The
/// grammar is total (§8 invariant 4): every input maps to either a valid
/// [`crate::path::Request`] or one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty_path")]
    EmptyPath,
    #[error("invalid_number")]
    InvalidNumber,
    #[error("invalid_hash")]
    InvalidHash,
    #[error("missing_version")]
    MissingVersion,
    #[error("missing_target")]
    MissingTarget,
    #[error("invalid_target")]
    InvalidTarget,
    #[error("missing_hash")]
    MissingHash,
    #[error("missing_height")]
    MissingHeight,
    #[error("missing_position")]
    MissingPosition,
    #[error("missing_id_type")]
    MissingIdType,
    #[error("invalid_id_type")]
    InvalidIdType,
    #[error("missing_type_id")]
    MissingTypeId,
    #[error("missing_component")]
    MissingComponent,
    #[error("invalid_component")]
    InvalidComponent,
    #[error("invalid_subcomponent")]
    InvalidSubcomponent,
    #[error("extra_segment")]
    ExtraSegment,
}

/// §7 "Service errors" — raised by the dispatcher once a [`crate::path::Request`]
/// has been resolved and handed to the store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    #[error("not_found")]
    NotFound,
    #[error("not_acceptable")]
    NotAcceptable,
    #[error("not_implemented")]
    NotImplemented,
    #[error("invalid_argument")]
    InvalidArgument,
    #[error("argument_overflow")]
    ArgumentOverflow,
    #[error("target_overflow")]
    TargetOverflow,
    #[error("server_error: {0}")]
    ServerError(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            ServiceError::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            ServiceError::InvalidArgument
            | ServiceError::ArgumentOverflow
            | ServiceError::TargetOverflow => StatusCode::BAD_REQUEST,
            ServiceError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ParseError> for StatusCode {
    fn from(_: ParseError) -> Self {
        StatusCode::BAD_REQUEST
    }
}
