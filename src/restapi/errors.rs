use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::{json, Value};
use thiserror::Error;

use crate::restapi::types::{Verb, Version};

/// Every way a request against the security REST API can fail.
///
/// `reason` in the response body is taken from [`ApiError::kind`], so the
/// variant names double as the public error taxonomy.
#[derive(Debug, Error, Diagnostic)]
pub enum ApiError {
    #[error("Security index not initialized")]
    #[diagnostic(
        code(warden::api::store_not_initialized),
        help("Configure `bootstrap.seed_file` so the store is initialized at startup")
    )]
    StoreNotInitialized,

    #[error("Configuration store unavailable: {0}")]
    #[diagnostic(code(warden::api::store_unavailable))]
    StoreUnavailable(String),

    #[error("Could not parse content of request: {0}")]
    #[diagnostic(code(warden::api::body_not_parseable))]
    BodyNotParseable(String),

    #[error("Request body required for this action")]
    #[diagnostic(code(warden::api::payload_mandatory))]
    PayloadMandatory,

    #[error("Request body not allowed for this action")]
    #[diagnostic(code(warden::api::payload_not_allowed))]
    PayloadNotAllowed,

    #[error("{message}")]
    #[diagnostic(code(warden::api::invalid_configuration))]
    InvalidConfiguration {
        message: String,
        invalid_keys: Vec<String>,
        missing_keys: Vec<String>,
    },

    #[error("Wrong datatype")]
    #[diagnostic(code(warden::api::wrong_datatype))]
    WrongDatatype { fields: BTreeMap<String, String> },

    #[error("{0}")]
    #[diagnostic(
        code(warden::api::password_policy),
        help("The password must match `api.password.regex` and must not equal the user name")
    )]
    PasswordPolicyViolation(String),

    #[error("Resource '{}' is read-only", .names.join(", "))]
    #[diagnostic(code(warden::api::protected_resource))]
    ProtectedResource { names: Vec<String> },

    // Rendered exactly like `NotFound`; only the server-side log tells them apart.
    #[error("Resource '{name}' not found")]
    #[diagnostic(code(warden::api::hidden_resource))]
    HiddenResource { name: String, in_collection: bool },

    #[error("Resource '{name}' not found")]
    #[diagnostic(code(warden::api::not_found))]
    NotFound { name: String, in_collection: bool },

    #[error("{0}")]
    #[diagnostic(code(warden::api::bad_request))]
    BadRequest(String),

    #[error("Authentication required")]
    #[diagnostic(code(warden::api::unauthorized))]
    Unauthorized,

    #[error("Principal '{0}' has no permission to use the security REST API")]
    #[diagnostic(
        code(warden::api::forbidden),
        help("Grant one of `api.admin_roles` to the principal or mark it as super admin")
    )]
    Forbidden(String),

    #[error("Method {0} not supported for this resource")]
    #[diagnostic(code(warden::api::method_not_supported))]
    MethodNotSupported(Verb),

    #[error("Method {0} not implemented for this resource")]
    #[diagnostic(
        code(warden::api::method_disabled),
        help("Modification of the security config requires `api.allow_config_modification = true`")
    )]
    MethodDisabled(Verb),

    #[error("Version conflict: request was based on version {expected} but the document is at version {actual}")]
    #[diagnostic(
        code(warden::api::version_conflict),
        help("Re-read the resource and retry the request against the current version")
    )]
    VersionConflict { expected: Version, actual: Version },

    #[error("Internal error: {0}")]
    #[diagnostic(code(warden::api::internal))]
    Internal(String),
}

impl ApiError {
    pub fn invalid_keys(message: impl Into<String>, keys: Vec<String>) -> Self {
        ApiError::InvalidConfiguration {
            message: message.into(),
            invalid_keys: keys,
            missing_keys: Vec::new(),
        }
    }

    pub fn missing_keys(message: impl Into<String>, keys: Vec<String>) -> Self {
        ApiError::InvalidConfiguration {
            message: message.into(),
            invalid_keys: Vec::new(),
            missing_keys: keys,
        }
    }

    pub fn not_found(name: impl Into<String>, in_collection: bool) -> Self {
        ApiError::NotFound {
            name: name.into(),
            in_collection,
        }
    }

    /// Error taxonomy kind reported as `reason`.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::StoreNotInitialized => "STORE_NOT_INITIALIZED",
            ApiError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            ApiError::BodyNotParseable(_) => "BODY_NOT_PARSEABLE",
            ApiError::PayloadMandatory => "PAYLOAD_MANDATORY",
            ApiError::PayloadNotAllowed => "PAYLOAD_NOT_ALLOWED",
            ApiError::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            ApiError::WrongDatatype { .. } => "WRONG_DATATYPE",
            ApiError::PasswordPolicyViolation(_) => "PASSWORD_POLICY_VIOLATION",
            ApiError::ProtectedResource { .. } => "PROTECTED_RESOURCE",
            ApiError::HiddenResource { .. } | ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::MethodNotSupported(_) => "METHOD_NOT_SUPPORTED",
            ApiError::MethodDisabled(_) => "METHOD_DISABLED",
            ApiError::VersionConflict { .. } => "VERSION_CONFLICT",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::StoreNotInitialized
            | ApiError::StoreUnavailable(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BodyNotParseable(_)
            | ApiError::PayloadMandatory
            | ApiError::PayloadNotAllowed
            | ApiError::InvalidConfiguration { .. }
            | ApiError::WrongDatatype { .. }
            | ApiError::PasswordPolicyViolation(_)
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ProtectedResource { .. } | ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::HiddenResource { in_collection, .. }
            | ApiError::NotFound { in_collection, .. } => {
                if *in_collection {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::NOT_FOUND
                }
            }
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::MethodNotSupported(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::MethodDisabled(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::VersionConflict { .. } => StatusCode::CONFLICT,
        }
    }

    /// Structured JSON error body.
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "status": status_label(self.status()),
            "reason": self.kind(),
            "message": self.to_string(),
        });

        match self {
            ApiError::InvalidConfiguration {
                invalid_keys,
                missing_keys,
                ..
            } => {
                if !invalid_keys.is_empty() {
                    body["invalid_keys"] = json!({ "keys": invalid_keys.join(",") });
                }
                if !missing_keys.is_empty() {
                    body["missing_mandatory_keys"] = json!({ "keys": missing_keys.join(",") });
                }
            }
            ApiError::WrongDatatype { fields } => {
                body["wrong_datatypes"] = json!(fields);
            }
            ApiError::ProtectedResource { names } => {
                body["invalid_keys"] = json!({ "keys": names.join(",") });
            }
            _ => {}
        }

        body
    }
}

/// "Bad Request" -> "BAD_REQUEST"
pub fn status_label(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Error")
        .to_uppercase()
        .replace(' ', "_")
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_body())).into_response()
    }
}
