use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::json;

use crate::restapi::engine::ApiRequest;
use crate::restapi::errors::{status_label, ApiError};
use crate::restapi::types::{Verb, Version};
use crate::restapi::ApiState;

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/{resource}", any(handle_collection))
        .route("/api/{resource}/", any(handle_collection))
        .route("/api/{resource}/{name}", any(handle_entry))
        .route("/healthz", get(health))
        .with_state(state)
}

async fn handle_collection(
    State(state): State<Arc<ApiState>>,
    Path(resource): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch(&state, method, resource, None, &headers, body).await
}

async fn handle_entry(
    State(state): State<Arc<ApiState>>,
    Path((resource, name)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch(&state, method, resource, Some(name), &headers, body).await
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn dispatch(
    state: &ApiState,
    method: Method,
    resource: String,
    name: Option<String>,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    let Some(verb) = Verb::from_method(&method) else {
        let status = StatusCode::METHOD_NOT_ALLOWED;
        let body = json!({
            "status": status_label(status),
            "reason": "METHOD_NOT_SUPPORTED",
            "message": format!("Method {method} not supported for this resource"),
        });
        return (status, Json(body)).into_response();
    };

    let if_match = match parse_if_match(headers) {
        Ok(if_match) => if_match,
        Err(e) => return e.into_response(),
    };

    let actor = state.identity.resolve(headers);
    let request = ApiRequest {
        verb,
        resource_segment: resource,
        name,
        body: body.to_vec(),
        if_match,
    };

    match state.engine.handle(actor.as_ref(), request).await {
        Ok(outcome) => {
            let mut response = (outcome.status, Json(outcome.body)).into_response();
            if let Some(version) = outcome.version {
                if let Ok(etag) = HeaderValue::from_str(&format!("\"{version}\"")) {
                    response.headers_mut().insert(header::ETAG, etag);
                }
            }
            response
        }
        Err(e) => {
            if e.status().is_server_error() {
                tracing::error!(error = %e, "request failed");
            }
            e.into_response()
        }
    }
}

/// `If-Match: "7"`, `If-Match: W/"7"` and `If-Match: 7` all name version 7;
/// `*` matches any version.
fn parse_if_match(headers: &HeaderMap) -> Result<Option<Version>, ApiError> {
    let Some(value) = headers.get(header::IF_MATCH) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("If-Match header is not valid ASCII".to_string()))?
        .trim();
    if raw == "*" {
        return Ok(None);
    }
    let tag = raw.strip_prefix("W/").unwrap_or(raw).trim_matches('"');
    tag.parse::<Version>()
        .map(Some)
        .map_err(|_| ApiError::BadRequest(format!("If-Match value '{raw}' is not a document version")))
}
