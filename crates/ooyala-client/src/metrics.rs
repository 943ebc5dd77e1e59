//! Client metrics.
//!
//! Counters and histograms recorded through the `metrics` facade. Nothing is
//! exported unless the host application installs a recorder.

use metrics::{counter, histogram};

use ooyala_models::Method;

/// Metric name constants for consistency.
pub mod names {
    /// Total API requests by method and status.
    pub const REQUESTS_TOTAL: &str = "ooyala_requests_total";

    /// Request latency in seconds by method.
    pub const LATENCY_SECONDS: &str = "ooyala_request_latency_seconds";

    /// Chunks uploaded to pre-signed URLs.
    pub const CHUNKS_UPLOADED_TOTAL: &str = "ooyala_chunks_uploaded_total";

    /// Size of each uploaded chunk in bytes.
    pub const CHUNK_SIZE_BYTES: &str = "ooyala_chunk_size_bytes";

    /// Selective re-upload rounds started.
    pub const UPLOAD_RETRY_ROUNDS_TOTAL: &str = "ooyala_upload_retry_rounds_total";
}

/// Record metrics for a completed API request. `status` is 0 for transport failures.
pub fn record_request(method: Method, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "method" => method.as_str(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "method" => method.as_str()
    )
    .record(latency_ms / 1000.0);
}

/// Record one uploaded chunk.
pub fn record_chunk_upload(bytes: usize) {
    counter!(names::CHUNKS_UPLOADED_TOTAL).increment(1);
    histogram!(names::CHUNK_SIZE_BYTES).record(bytes as f64);
}

/// Record the start of a selective re-upload round.
pub fn record_retry_round() {
    counter!(names::UPLOAD_RETRY_ROUNDS_TOTAL).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::REQUESTS_TOTAL.contains("requests"));
        assert!(names::LATENCY_SECONDS.contains("latency"));
        assert!(names::CHUNKS_UPLOADED_TOTAL.contains("chunks"));
        assert!(names::UPLOAD_RETRY_ROUNDS_TOTAL.contains("retry"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_request(Method::Get, 200, 12.0);
        record_chunk_upload(1024);
        record_retry_round();
    }
}
