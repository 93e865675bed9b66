// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! The HTTP surface (§3, §4.7, §4.8): a single fallback route parses
//! every request's path through `bs_rpc::path::parse`, negotiates media
//! from the `format` query parameter and `Accept` header, and renders
//! through `bs_rpc::dispatch::handle`. The three address-aggregate
//! methods are long-running (§4.8 "worker pool") and are offloaded onto
//! a blocking thread so they never stall the async reactor.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use slog::{debug, Logger};
use tower_http::trace::TraceLayer;

use bs_rpc::dispatch::{self, Store};
use bs_rpc::error::ServiceError;
use bs_rpc::path;
use bs_rpc::response::{error_response, parse_error_response};

use crate::metrics;

struct AppState {
    store: Arc<dyn Store>,
    logger: Logger,
}

/// Builds the router described in §4.7: one fallback handler covers
/// every versioned path, since the grammar itself (not axum's router)
/// owns path matching. `/healthz` and `/metrics` sit outside that
/// grammar entirely (§4.7's methods all live under `/v{ver}/...`).
pub fn router(store: Arc<dyn Store>, logger: Logger) -> Router {
    let state = Arc::new(AppState { store, logger });
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_text))
        .fallback(any(dispatch_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then_some(value)
    })
}

async fn dispatch_request(State(state): State<Arc<AppState>>, uri: Uri, headers: HeaderMap) -> Response {
    metrics::HTTP_REQUESTS_TOTAL.inc();
    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or_else(|| uri.path());
    let request = match path::parse(target) {
        Ok(request) => request,
        Err(err) => {
            debug!(state.logger, "path parse failed"; "target" => target, "error" => %err);
            return parse_error_response(&err);
        }
    };

    let format = uri.query().and_then(|q| query_param(q, "format"));
    let accept = headers.get(axum::http::header::ACCEPT).and_then(|v| v.to_str().ok());

    let outcome = if dispatch::is_long_running(&request.method) {
        let store = state.store.clone();
        let format = format.map(str::to_owned);
        let accept = accept.map(str::to_owned);
        tokio::task::spawn_blocking(move || {
            dispatch::handle(store.as_ref(), &request, format.as_deref(), accept.as_deref())
        })
        .await
        .unwrap_or(Err(ServiceError::ServerError("worker pool task panicked".to_string())))
    } else {
        dispatch::handle(state.store.as_ref(), &request, format, accept)
    };

    match outcome {
        Ok(encoded) => encoded.into_response(),
        Err(err) => {
            debug!(state.logger, "request failed"; "target" => target, "error" => %err);
            error_response(&err)
        }
    }
}

/// Used by the executor to answer liveness probes out-of-band from the
/// method grammar (kept separate so `/healthz` never has to parse as a
/// §4.7 method).
pub async fn healthz() -> (StatusCode, Body) {
    (StatusCode::OK, Body::from("ok"))
}

/// Prometheus text-exposition endpoint (ambient observability; not part
/// of the §4.7 method grammar).
async fn metrics_text() -> (StatusCode, [(axum::http::header::HeaderName, &'static str); 1], String) {
    (StatusCode::OK, [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], metrics::render())
}
