//! The tagged status error shared by every component of the tenant core.
//!
//! Every domain failure in this crate family surfaces as a [`StatusError`]: a
//! stable string `code`, an HTTP status to use at the wire boundary, a
//! human-readable `message`, an optional cause chain, and a bag of `extras`
//! for payload-specific detail (e.g. the current offer on a version
//! mismatch). Callers match on `code`, never on `message` text.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result alias used throughout the tenant core.
pub type OprResult<T> = Result<T, StatusError>;

/// A tagged, chainable error with a stable machine-readable `code`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusError {
    /// Stable error code, e.g. `CHAIN_NO_ENTITLEMENT` or `AUTH_ERROR`.
    pub code: String,
    /// Human-readable message. Never parsed by callers.
    pub message: String,
    /// HTTP status this error maps to at the tenant node boundary.
    pub http_status: u16,
    /// Extra structured detail merged into the wire error envelope.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extras: Map<String, Value>,
    /// Preserved cause, when this error wraps a lower-level failure.
    #[serde(skip)]
    pub cause: Option<Box<StatusError>>,
}

impl StatusError {
    /// Build a new error with the given stable code and HTTP status.
    pub fn new(code: impl Into<String>, http_status: u16, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            http_status,
            extras: Map::new(),
            cause: None,
        }
    }

    /// Attach a cause, preserving the chain for logging.
    #[must_use]
    pub fn with_cause(mut self, cause: StatusError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Merge one extra field into the error envelope.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    /// 400 Bad Request constructor.
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, 400, message)
    }

    /// 401 Unauthorized constructor.
    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, 401, message)
    }

    /// 403 Forbidden constructor.
    pub fn forbidden(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, 403, message)
    }

    /// 404 Not Found constructor.
    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, 404, message)
    }

    /// 500 Internal Server Error constructor.
    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, 500, message)
    }

    /// 501 Not Implemented constructor.
    pub fn not_implemented(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, 501, message)
    }

    /// Render the `{code, message, ...extras}` wire envelope described in
    /// the external interfaces section: a flat JSON object a client can
    /// match on `code` without knowing about the cause chain.
    pub fn to_envelope(&self) -> Value {
        let mut map = self.extras.clone();
        map.insert("code".to_string(), Value::String(self.code.clone()));
        map.insert(
            "message".to_string(),
            Value::String(self.message.clone()),
        );
        Value::Object(map)
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.http_status, self.message)
    }
}

impl std::error::Error for StatusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_deref().map(|c| c as &dyn std::error::Error)
    }
}

/// Well-known error codes shared across the tenant core, collected so
/// call sites reference a constant instead of retyping string literals.
pub mod codes {
    pub const JWK_NO_ALG: &str = "JWK_NO_ALG";
    pub const CHAIN_NO_ENTITLEMENT: &str = "CHAIN_NO_ENTITLEMENT";
    pub const AUTH_ERROR: &str = "AUTH_ERROR";
    pub const AUTH_ERROR_TOKEN_EXPIRED: &str = "AUTH_ERROR_TOKEN_EXPIRED";
    pub const CHAIN_TOKEN_BAD_INITIAL_ISSUER: &str = "CHAIN_TOKEN_BAD_INITIAL_ISSUER";
    pub const CHAIN_TOKEN_BAD_INITIAL_ENTITLEMENTS: &str =
        "CHAIN_TOKEN_BAD_INITIAL_ENTITLEMENTS";
    pub const CHAIN_TOKEN_BAD_FINAL_SUBJECT: &str = "CHAIN_TOKEN_BAD_FINAL_SUBJECT";
    pub const CHAIN_TOKEN_BAD_FINAL_SCOPE: &str = "CHAIN_TOKEN_BAD_FINAL_SCOPE";
    pub const CHAIN_TOKEN_ISSUER_SUBJECT_MISMATCH: &str =
        "CHAIN_TOKEN_ISSUER_SUBJECT_MISMATCH";
    pub const CHAIN_TOKEN_ENTITLEMENTS_MISMATCH: &str = "CHAIN_TOKEN_ENTITLEMENTS_MISMATCH";
    pub const CHAIN_TOKEN_MISSING_RESHARE_SCOPE: &str = "CHAIN_TOKEN_MISSING_RESHARE_SCOPE";
    pub const CHAIN_EMPTY: &str = "CHAIN_EMPTY";
    pub const NO_KEYSET_SPECIFIED: &str = "NO_KEYSET_SPECIFIED";
    pub const ERROR_BAD_UPDATE_NO_CHANGES: &str = "ERROR_BAD_UPDATE_NO_CHANGES";
    pub const ACCEPT_ERROR_NO_AVAILABLE_OFFER: &str = "ACCEPT_ERROR_NO_AVAILABLE_OFFER";
    pub const ACCEPT_ERROR_OFFER_HAS_CHANGED: &str = "ACCEPT_ERROR_OFFER_HAS_CHANGED";
    pub const REJECT_ERROR_NO_AVAILABLE_OFFER: &str = "REJECT_ERROR_NO_AVAILABLE_OFFER";
    pub const RESERVE_ERROR_NO_AVAILABLE_OFFER: &str = "RESERVE_ERROR_NO_AVAILABLE_OFFER";
    pub const PRODUCER_ILLEGAL_RESPONSE_PAGES_INCONSISTENT: &str =
        "PRODUCER_ILLEGAL_RESPONSE_PAGES_INCONSISTENT";
    pub const NO_AUTH_HEADER: &str = "NO_AUTH_HEADER";
    pub const BAD_AUTH_HEADER: &str = "BAD_AUTH_HEADER";
    pub const AUTH_HEADER_NO_BEARER_PREFIX: &str = "AUTH_HEADER_NO_BEARER_PREFIX";
    pub const AUTH_HEADER_EMPTY_TOKEN: &str = "AUTH_HEADER_EMPTY_TOKEN";
    pub const AUTH_ERROR_MISSING_TOKEN_ISSUER: &str = "AUTH_ERROR_MISSING_TOKEN_ISSUER";
    pub const AUTH_ERROR_AUD_INVALID: &str = "AUTH_ERROR_AUD_INVALID";
    pub const AUTH_ERROR_AUD_MISSING: &str = "AUTH_ERROR_AUD_MISSING";
    pub const AUTH_ERROR_MISSING_SCOPE: &str = "AUTH_ERROR_MISSING_SCOPE";
    pub const AUTH_ERROR_ORG_NOT_AUTHORIZED: &str = "AUTH_ERROR_ORG_NOT_AUTHORIZED";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const INTERNAL_ERROR_MALFORMED_RESPONSE: &str = "INTERNAL_ERROR_MALFORMED_RESPONSE";
    pub const UNKNOWN_TENANT: &str = "UNKNOWN_TENANT";
    pub const CONFIG_UNKNOWN_FACTORY: &str = "CONFIG_UNKNOWN_FACTORY";
    pub const CONFIG_WRONG_FACTORY_TYPE: &str = "CONFIG_WRONG_FACTORY_TYPE";
    pub const CONFIG_MISSING_FIELD: &str = "CONFIG_MISSING_FIELD";
    pub const OFFER_PATCH_REQUIRES_VERSIONED_ID: &str = "OFFER_PATCH_REQUIRES_VERSIONED_ID";
    pub const OFFER_PATCH_APPLY_FAILED: &str = "OFFER_PATCH_APPLY_FAILED";
}
