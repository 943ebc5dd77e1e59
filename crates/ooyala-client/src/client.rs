//! Request gateway.
//!
//! [`OoyalaClient`] turns a [`RequestDescriptor`] into a signed HTTP call:
//! - Adds `api_key` and `expires` unless the caller supplied them
//! - Signs the filtered parameters and body unless a `signature` is present
//! - Sends the body exactly as it was signed
//! - Classifies every non-200 response
//!
//! Transport failures are returned as-is and never retried here.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info_span, warn, Instrument};

use ooyala_models::{ItemsPage, Method, ParamValue, QueryParams, RequestBody, RequestDescriptor};

use crate::config::ClientConfig;
use crate::error::{classify, ApiError, ApiResult};
use crate::metrics::{record_chunk_upload, record_request};
use crate::signer::{filter_params, Signer};
use crate::upload::{Chunk, ChunkTransport};

/// Default content type for API calls.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

// =============================================================================
// Gateway contract
// =============================================================================

/// A successful (HTTP 200) response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body; non-JSON bodies are kept as a string, empty bodies as null
    pub body: Value,
}

impl ApiResponse {
    /// Deserialize the body into a typed model.
    pub fn json<T: DeserializeOwned>(self) -> ApiResult<T> {
        Ok(serde_json::from_value(self.body)?)
    }

    /// `items` of a list response, empty when the body carries none.
    pub fn items<T: DeserializeOwned>(self) -> ApiResult<Vec<T>> {
        match self.body {
            Value::Object(_) => {
                let page: ItemsPage<T> = serde_json::from_value(self.body)?;
                Ok(page.items)
            }
            _ => Ok(Vec::new()),
        }
    }
}

/// Sends one request descriptor and returns the successful response.
#[async_trait]
pub trait RequestGateway: Send + Sync {
    async fn send(&self, request: RequestDescriptor) -> ApiResult<ApiResponse>;
}

/// A request ready to go on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    /// Final query parameters, including `api_key`, `expires` and `signature`
    pub params: QueryParams,
    pub content_type: String,
    pub body: Option<Bytes>,
}

// =============================================================================
// Client
// =============================================================================

/// Ooyala v2 API client.
#[derive(Clone)]
pub struct OoyalaClient {
    http: Client,
    config: Arc<ClientConfig>,
    signer: Signer,
}

impl OoyalaClient {
    /// Create a new client. Fails with a validation error when credentials are missing.
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("ooyala-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Network)?;

        debug!(
            endpoint = %config.endpoint,
            chunk_size = config.chunk_size,
            "Ooyala client initialized"
        );

        Ok(Self {
            http,
            signer: Signer::new(config.secret.clone()),
            config: Arc::new(config),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> ApiResult<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// `expires` value for a request issued at `now_ms`.
    pub fn expires_at(&self, now_ms: i64) -> i64 {
        (now_ms + self.config.expires.as_millis() as i64).div_euclid(1000)
    }

    /// Compute the signature the gateway would attach to `request`.
    pub fn sign(&self, request: &RequestDescriptor) -> String {
        self.signer.sign(
            request.method,
            &request.route,
            &request.params,
            request.body.as_ref(),
        )
    }

    /// Add auth parameters, sign, and serialize the body.
    pub fn prepare(&self, request: &RequestDescriptor, now_ms: i64) -> ApiResult<PreparedRequest> {
        if request.route.is_empty() {
            return Err(ApiError::validation("Invalid 'route': must be a non-empty string"));
        }

        let mut params = filter_params(&request.params);
        params.insert_default("api_key", self.config.key.as_str());
        params.insert_default("expires", self.expires_at(now_ms));

        if !params.contains_key("signature") {
            let signature = self.signer.sign(
                request.method,
                &request.route,
                &params,
                request.body.as_ref(),
            );
            params.insert("signature", signature);
        }

        let query = encode_query(&params);
        let url = format!("{}{}?{}", self.config.base_url(), request.route, query);

        let body = request.body.as_ref().map(|body| match body {
            RequestBody::Text(text) => Bytes::from(text.clone()),
            RequestBody::Json(value) => Bytes::from(value.to_string()),
            RequestBody::Bytes(bytes) => bytes.clone(),
        });

        Ok(PreparedRequest {
            method: request.method,
            url,
            params,
            content_type: request
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            body,
        })
    }

    async fn execute(&self, request: RequestDescriptor) -> ApiResult<ApiResponse> {
        let prepared = self.prepare(&request, chrono::Utc::now().timestamp_millis())?;

        debug!(
            method = %request.method,
            route = %request.route,
            binary_body = request.body.as_ref().map(RequestBody::is_binary).unwrap_or(false),
            "Request started"
        );

        let mut builder = self
            .http
            .request(to_http_method(prepared.method), &prepared.url)
            .header(CONTENT_TYPE, prepared.content_type.as_str());
        if let Some(body) = prepared.body {
            builder = builder.body(body);
        }

        let start = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                record_request(request.method, 0, start.elapsed().as_millis() as f64);
                warn!(route = %request.route, "Request transport failure: {}", e);
                return Err(ApiError::Network(e));
            }
        };

        let status = response.status();
        let text = response.text().await?;
        let latency_ms = start.elapsed().as_millis() as f64;
        record_request(request.method, status.as_u16(), latency_ms);

        let body = parse_body(&text);

        if status != StatusCode::OK {
            let err = classify(status.as_u16(), body);
            debug!(route = %request.route, kind = %err.kind, "Request failed: {}", err.message);
            return Err(err.into());
        }

        debug!(
            method = %request.method,
            route = %request.route,
            status = status.as_u16(),
            latency_ms = latency_ms as u64,
            "Request done"
        );

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RequestGateway for OoyalaClient {
    async fn send(&self, request: RequestDescriptor) -> ApiResult<ApiResponse> {
        let span = info_span!("ooyala_request", method = %request.method, route = %request.route);
        self.execute(request).instrument(span).await
    }
}

#[async_trait]
impl ChunkTransport for OoyalaClient {
    /// PUT the chunk to its pre-signed URL. The URL carries its own
    /// authorization, so nothing is signed here.
    async fn put_chunk(&self, chunk: &Chunk) -> ApiResult<()> {
        let start = Instant::now();
        let response = self
            .http
            .put(&chunk.url)
            .body(chunk.data.clone())
            .send()
            .await?;

        let status = response.status();
        if !chunk_accepted(status) {
            // Left for the upload status check to report as a bad chunk.
            warn!(
                index = chunk.index,
                status = status.as_u16(),
                "Chunk upload returned non-success status"
            );
            return Ok(());
        }

        record_chunk_upload(chunk.len());
        debug!(
            index = chunk.index,
            bytes = chunk.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Chunk uploaded"
        );
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Only a 2xx answer from the storage URL counts as an uploaded chunk.
pub(crate) fn chunk_accepted(status: StatusCode) -> bool {
    status.is_success()
}

/// Reject empty identifiers before any network call.
pub(crate) fn require_non_empty(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!(
            "Invalid '{}': must be a non-empty string",
            field
        )));
    }
    Ok(())
}

fn to_http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Parse a response body: JSON when possible, otherwise the raw text.
pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Form-urlencode query parameters. List values are written as `key[i]=value`.
pub fn encode_query(params: &QueryParams) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params.iter() {
        match value {
            ParamValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    serializer.append_pair(&format!("{}[{}]", key, i), &item.to_canonical_string());
                }
            }
            ParamValue::Null => {}
            other => {
                serializer.append_pair(key, &other.to_canonical_string());
            }
        }
    }
    serializer.finish()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::sign;
    use serde_json::json;

    fn client() -> OoyalaClient {
        OoyalaClient::new(
            ClientConfig::new("such key", "so secret").with_endpoint("https://api.example.com/"),
        )
        .unwrap()
    }

    #[test]
    fn test_new_requires_credentials() {
        let err = OoyalaClient::new(ClientConfig::new("", "secret")).err().unwrap();
        assert!(err.is_validation());
    }

    #[test]
    fn test_chunk_accepted_only_on_2xx() {
        assert!(chunk_accepted(StatusCode::OK));
        assert!(chunk_accepted(StatusCode::NO_CONTENT));
        assert!(!chunk_accepted(StatusCode::FORBIDDEN));
        assert!(!chunk_accepted(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_expires_at() {
        let client = client();
        // 2000ms window
        assert_eq!(client.expires_at(1442272419310), 1442272421);
    }

    #[test]
    fn test_prepare_adds_auth_params_and_signature() {
        let client = client();
        let request = RequestDescriptor::get("/v2/labels").with_param("empty", "");
        let prepared = client.prepare(&request, 1442272419310).unwrap();

        assert_eq!(prepared.params.get("api_key"), Some(&ParamValue::from("such key")));
        assert_eq!(prepared.params.get("expires"), Some(&ParamValue::Int(1442272421)));
        assert!(!prepared.params.contains_key("empty"));

        let mut unsigned = prepared.params.clone();
        let signature = unsigned.remove("signature").unwrap();
        assert_eq!(
            signature.to_canonical_string(),
            sign("so secret", Method::Get, "/v2/labels", &unsigned, None)
        );

        assert!(prepared.url.starts_with("https://api.example.com/v2/labels?"));
        assert_eq!(prepared.content_type, DEFAULT_CONTENT_TYPE);
        assert!(prepared.body.is_none());
    }

    #[test]
    fn test_prepare_keeps_supplied_signature() {
        let client = client();
        let request = RequestDescriptor::get("/v2/assets").with_param("signature", "precomputed");
        let prepared = client.prepare(&request, 0).unwrap();
        assert_eq!(prepared.params.get("signature"), Some(&ParamValue::from("precomputed")));
    }

    #[test]
    fn test_prepare_sends_signed_json_string() {
        let client = client();
        let request = RequestDescriptor::post("/v2/assets")
            .with_body(json!({"one": 1, "two": 2, "three": 3}));
        let prepared = client.prepare(&request, 0).unwrap();
        assert_eq!(
            prepared.body.unwrap(),
            Bytes::from_static(br#"{"one":1,"two":2,"three":3}"#)
        );
    }

    #[test]
    fn test_prepare_content_type_override() {
        let client = client();
        let request = RequestDescriptor::put("/v2/assets/a/closed_captions")
            .with_body("<tt/>")
            .with_content_type("text/html");
        let prepared = client.prepare(&request, 0).unwrap();
        assert_eq!(prepared.content_type, "text/html");
    }

    #[test]
    fn test_prepare_rejects_empty_route() {
        let client = client();
        let err = client.prepare(&RequestDescriptor::get(""), 0).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_encode_query() {
        let params = QueryParams::new()
            .with("include", "metadata,labels")
            .with("ids", vec!["a", "b"])
            .with("signature", "a+b/c=");
        assert_eq!(
            encode_query(&params),
            "ids%5B0%5D=a&ids%5B1%5D=b&include=metadata%2Clabels&signature=a%2Bb%2Fc%3D"
        );
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body(r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(parse_body("Invalid signature."), json!("Invalid signature."));
    }

    #[test]
    fn test_response_items() {
        let response = ApiResponse {
            status: 200,
            body: json!({"items": [{"id": "1"}], "next_page": null}),
        };
        let items: Vec<Value> = response.items().unwrap();
        assert_eq!(items.len(), 1);

        let response = ApiResponse { status: 200, body: Value::Null };
        assert!(response.items::<Value>().unwrap().is_empty());
    }
}
