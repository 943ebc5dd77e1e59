//! Canonical request signing.
//!
//! The service recomputes the signature of every request and rejects any
//! mismatch with `Invalid signature.`, so the canonical string built here has
//! to match byte-for-byte:
//!
//! ```text
//! secret + METHOD + route + k1=v1 + k2=v2 + ... + body
//! ```
//!
//! Keys are sorted, values are unencoded, and there are no separators. The
//! SHA-256 digest is base64 encoded and truncated to 43 characters.

use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};

use ooyala_models::{Method, ParamValue, QueryParams, RequestBody};

/// Length of the truncated base64 digest.
pub const SIGNATURE_LEN: usize = 43;

/// Drop parameters that would serialize to an empty value.
///
/// List values lose their blank elements first; a list left empty is dropped
/// entirely. Blank values change the canonical string without reaching the
/// wire, which invalidates the signature.
pub fn filter_params(params: &QueryParams) -> QueryParams {
    params
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                ParamValue::List(items) => {
                    let kept: Vec<ParamValue> =
                        items.iter().filter(|v| !v.is_blank()).cloned().collect();
                    if kept.is_empty() {
                        return None;
                    }
                    ParamValue::List(kept)
                }
                v if v.is_blank() => return None,
                v => v.clone(),
            };
            Some((key.clone(), value))
        })
        .collect()
}

/// Build the canonical string that precedes the body.
pub fn canonical_string(secret: &str, method: Method, route: &str, params: &QueryParams) -> String {
    let mut canonical = String::with_capacity(secret.len() + route.len() + 64);
    canonical.push_str(secret);
    canonical.push_str(method.as_str());
    canonical.push_str(route);

    for (key, value) in filter_params(params).iter() {
        canonical.push_str(key);
        canonical.push('=');
        canonical.push_str(&value.to_canonical_string());
    }

    canonical
}

/// Compute the request signature.
pub fn sign(
    secret: &str,
    method: Method,
    route: &str,
    params: &QueryParams,
    body: Option<&RequestBody>,
) -> String {
    let mut canonical = canonical_string(secret, method, route, params);

    match body {
        Some(RequestBody::Text(text)) => canonical.push_str(text),
        Some(RequestBody::Json(value)) => canonical.push_str(&value.to_string()),
        Some(RequestBody::Bytes(_)) | None => {}
    }

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    if let Some(RequestBody::Bytes(bytes)) = body {
        hasher.update(bytes);
    }
    let digest = hasher.finalize();

    let mut signature = STANDARD.encode(digest);
    signature.truncate(SIGNATURE_LEN);
    signature
}

/// Signs requests with a fixed secret.
#[derive(Clone)]
pub struct Signer {
    secret: String,
}

impl Signer {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn sign(
        &self,
        method: Method,
        route: &str,
        params: &QueryParams,
        body: Option<&RequestBody>,
    ) -> String {
        sign(&self.secret, method, route, params, body)
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").field("secret", &"<redacted>").finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
