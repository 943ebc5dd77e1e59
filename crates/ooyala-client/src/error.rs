//! Error types and response classification.
//!
//! Every non-200 response is mapped to exactly one [`ErrorKind`]. Several
//! predicates can match the same response, so the checks in [`classify`] run
//! in a fixed priority order and the first match wins.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Server messages
// =============================================================================

const MSG_REPLACE_PROCESSING: &str =
    "Content cannot be replaced since the asset's status is processing";
const MSG_REPLACE_DUPLICATE: &str =
    "Content cannot be replaced since the asset's status is duplicate";
const MSG_DUPLICATE: &str = "error: duplicate";
const MSG_REPLACE_UPLOADING: &str =
    "Content cannot be replaced since the asset's status is uploading";
const MSG_REPLACEMENT_UPLOADING: &str =
    "The asset is already being replaced. The replacement status is uploading";
const MSG_TOO_FAST: &str = "not enough time since last attempt.";
const MSG_HIDDEN_CHARS: &str = "cannot contain hidden chars";
const MSG_INVALID_SIGNATURE: &str = "Invalid signature.";
const MSG_UNKNOWN: &str = "Unknown Error";

// =============================================================================
// Error kinds
// =============================================================================

/// Closed set of server-derived error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Action attempted against an asset that is still processing
    ProcessingVideo,
    /// Asset is a duplicate of an existing one
    DuplicateVideo,
    /// Action attempted against an asset that is already uploading
    UploadingVideo,
    /// Upload finished with missing or corrupt chunks
    MissingChunks,
    /// Action attempted too soon after the previous attempt
    TooFast,
    /// Text field contains control characters
    HiddenCharacter,
    /// Resource not found
    NotFound,
    /// Invalid credentials
    Unauthorized,
    /// The service rejected the request signature
    InvalidSignature,
    BadRequest,
    /// Request entity too large
    TooLarge,
    /// Any other non-200 response
    Request,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ProcessingVideo => "processing_video",
            ErrorKind::DuplicateVideo => "duplicate_video",
            ErrorKind::UploadingVideo => "uploading_video",
            ErrorKind::MissingChunks => "missing_chunks",
            ErrorKind::TooFast => "too_fast",
            ErrorKind::HiddenCharacter => "hidden_character",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidSignature => "invalid_signature",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::TooLarge => "too_large",
            ErrorKind::Request => "request",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified non-200 response.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} (HTTP {status}): {message}")]
pub struct ResponseError {
    pub kind: ErrorKind,
    pub status: u16,
    /// Human-readable message decoded from the body
    pub message: String,
    /// Structured detail, when the message decoded to a JSON object
    pub detail: Option<Map<String, Value>>,
    /// Raw response body
    pub body: Value,
}

impl ResponseError {
    /// Chunk filenames the service reported as missing or bad, in report
    /// order with duplicates removed. `None` when the detail carries neither
    /// list.
    pub fn reported_chunks(&self) -> Option<Vec<String>> {
        let detail = self.detail.as_ref()?;
        let missing = detail.get("missing_chunks").and_then(Value::as_array);
        let bad = detail.get("bad_chunks").and_then(Value::as_array);
        if missing.is_none() && bad.is_none() {
            return None;
        }

        let mut names: Vec<String> = Vec::new();
        for value in missing.into_iter().chain(bad).flatten() {
            let name = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => continue,
            };
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        Some(names)
    }
}

// =============================================================================
// Top-level error
// =============================================================================

/// Errors that can occur during API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Input contract violation detected before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Request failed: {0}")]
    Response(#[from] ResponseError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Server-derived kind, if any.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ApiError::Response(e) => Some(e.kind),
            _ => None,
        }
    }

    pub fn is_missing_chunks(&self) -> bool {
        self.kind() == Some(ErrorKind::MissingChunks)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == Some(ErrorKind::NotFound)
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ApiError::Validation(_))
    }

    /// HTTP status of the failed response.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ApiError::Response(e) => Some(e.status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn as_response(&self) -> Option<&ResponseError> {
        match self {
            ApiError::Response(e) => Some(e),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Decoded response message: readable text plus optional structured detail.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub text: String,
    pub detail: Option<Map<String, Value>>,
}

/// Normalize a response body into a message.
///
/// The service sometimes nests the message under `message`, sometimes sends a
/// JSON object, and sometimes sends a string that itself contains JSON.
pub fn decode_message(body: &Value) -> DecodedMessage {
    let body = match body.get("message") {
        Some(message) if is_truthy(message) => message,
        _ => body,
    };

    match body {
        Value::Object(obj) => DecodedMessage {
            text: Value::Object(obj.clone()).to_string(),
            detail: Some(obj.clone()),
        },
        Value::String(s) => DecodedMessage {
            text: s.clone(),
            detail: match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(obj)) => Some(obj),
                _ => None,
            },
        },
        _ => DecodedMessage {
            text: MSG_UNKNOWN.to_string(),
            detail: None,
        },
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn has_field(detail: Option<&Map<String, Value>>, key: &str) -> bool {
    detail
        .and_then(|d| d.get(key))
        .map(|v| !v.is_null())
        .unwrap_or(false)
}

/// Map a non-200 response to its error kind.
pub fn classify_kind(status: u16, message: &DecodedMessage) -> ErrorKind {
    let text = message.text.as_str();
    let detail = message.detail.as_ref();

    if text == MSG_REPLACE_PROCESSING {
        ErrorKind::ProcessingVideo
    } else if text == MSG_REPLACE_DUPLICATE || text.contains(MSG_DUPLICATE) {
        ErrorKind::DuplicateVideo
    } else if text == MSG_REPLACE_UPLOADING || text == MSG_REPLACEMENT_UPLOADING {
        ErrorKind::UploadingVideo
    } else if text.contains(MSG_TOO_FAST) {
        ErrorKind::TooFast
    } else if text.contains(MSG_HIDDEN_CHARS) {
        ErrorKind::HiddenCharacter
    } else if text == MSG_INVALID_SIGNATURE {
        ErrorKind::InvalidSignature
    } else if has_field(detail, "missing_chunks") || has_field(detail, "bad_chunks") {
        ErrorKind::MissingChunks
    } else if has_field(detail, "missing_labels") {
        ErrorKind::NotFound
    } else {
        match status {
            404 => ErrorKind::NotFound,
            401 => ErrorKind::Unauthorized,
            400 => ErrorKind::BadRequest,
            413 => ErrorKind::TooLarge,
            _ => ErrorKind::Request,
        }
    }
}

/// Classify a non-200 response into a [`ResponseError`].
pub fn classify(status: u16, body: Value) -> ResponseError {
    let message = decode_message(&body);
    let kind = classify_kind(status, &message);
    ResponseError {
        kind,
        status,
        message: message.text,
        detail: message.detail,
        body,
    }
}

// =============================================================================
// Tests
// =============================================================================
