//! Chunked upload with selective re-upload.
//!
//! The payload is split into fixed-size chunks, one per pre-signed URL, and
//! every chunk is PUT in order. A status check then asks the service whether
//! the upload is complete. When it answers with a missing-chunks error, only
//! the chunks it names are sent again, up to `retry_limit` extra rounds.

use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, error, info, warn};

use crate::error::{ApiError, ApiResult, ErrorKind, ResponseError};
use crate::metrics::record_retry_round;

// =============================================================================
// Chunks
// =============================================================================

/// One slice of the payload and the URL it goes to.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Position in the payload, starting at 0
    pub index: usize,
    /// Byte offset of the first byte
    pub start: usize,
    /// Byte offset one past the last byte
    pub end: usize,
    /// Pre-signed upload URL
    pub url: String,
    pub data: Bytes,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Split `payload` into `chunk_size` slices paired with `urls`.
///
/// The URL count must equal `ceil(payload.len() / chunk_size)`; the last
/// chunk may be short.
pub fn split_into_chunks(
    payload: &Bytes,
    urls: &[String],
    chunk_size: usize,
) -> ApiResult<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(ApiError::validation("Invalid 'chunk_size': must be positive"));
    }

    let expected = payload.len().div_ceil(chunk_size);
    if urls.len() != expected {
        return Err(ApiError::validation(format!(
            "Invalid 'urls': expected {} upload URLs for {} bytes in {} byte chunks, got {}",
            expected,
            payload.len(),
            chunk_size,
            urls.len()
        )));
    }

    Ok(urls
        .iter()
        .enumerate()
        .map(|(index, url)| {
            let start = index * chunk_size;
            let end = (start + chunk_size).min(payload.len());
            Chunk {
                index,
                start,
                end,
                url: url.clone(),
                data: payload.slice(start..end),
            }
        })
        .collect())
}

/// Sends one chunk to its pre-signed URL.
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    /// Returns an error only when the chunk could not be sent at all.
    async fn put_chunk(&self, chunk: &Chunk) -> ApiResult<()>;
}

// =============================================================================
// Retry bookkeeping
// =============================================================================

/// What to do after a missing-chunks status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-upload [`UploadAttempt::remaining`] and check again
    Retry,
    /// `retry_limit` extra rounds already ran
    Exhausted,
    /// The error carried no chunk list
    NoChunkDetail,
    /// None of the reported filenames matched an upload URL
    NoMatchingChunks,
}

/// Per-upload retry state. Lives for one upload call only.
#[derive(Debug, Clone)]
pub struct UploadAttempt {
    remaining: Vec<usize>,
    attempt: u32,
    retry_limit: u32,
}

impl UploadAttempt {
    /// First round covers every chunk.
    pub fn new(chunk_count: usize, retry_limit: u32) -> Self {
        Self {
            remaining: (0..chunk_count).collect(),
            attempt: 1,
            retry_limit,
        }
    }

    /// Chunk indices to send this round, in payload order.
    pub fn remaining(&self) -> &[usize] {
        &self.remaining
    }

    /// Current round, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Plan the next round from a missing-chunks error.
    ///
    /// Reported filenames are matched by substring against the original
    /// chunk URLs; the first match wins and unmatched names are dropped.
    pub fn plan_retry(&mut self, chunks: &[Chunk], err: &ResponseError) -> RetryDecision {
        if self.attempt > self.retry_limit {
            return RetryDecision::Exhausted;
        }
        self.attempt += 1;

        let Some(names) = err.reported_chunks() else {
            return RetryDecision::NoChunkDetail;
        };

        let mut indices: Vec<usize> = names
            .iter()
            .filter_map(|name| chunks.iter().position(|c| c.url.contains(name.as_str())))
            .collect();
        indices.sort_unstable();
        indices.dedup();

        if indices.is_empty() {
            return RetryDecision::NoMatchingChunks;
        }

        self.remaining = indices;
        RetryDecision::Retry
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Uploads chunks and drives the status check and retry rounds.
pub struct ChunkUploader<'a, T: ChunkTransport + ?Sized> {
    transport: &'a T,
    retry_limit: u32,
}

impl<'a, T: ChunkTransport + ?Sized> ChunkUploader<'a, T> {
    pub fn new(transport: &'a T, retry_limit: u32) -> Self {
        Self {
            transport,
            retry_limit,
        }
    }

    /// Upload every chunk, then run `status_check` with the asset id.
    ///
    /// Only missing-chunks errors from the status check lead to another
    /// round. Transport failures and every other error end the upload.
    pub async fn upload<R, F, Fut>(
        &self,
        asset_id: &str,
        chunks: &[Chunk],
        status_check: F,
    ) -> ApiResult<R>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = ApiResult<R>>,
    {
        let mut state = UploadAttempt::new(chunks.len(), self.retry_limit);

        loop {
            debug!(
                asset_id = %asset_id,
                attempt = state.attempt(),
                chunks = state.remaining().len(),
                "Uploading chunks"
            );

            for &index in state.remaining() {
                let chunk = &chunks[index];
                if let Err(e) = self.transport.put_chunk(chunk).await {
                    error!(asset_id = %asset_id, index, "Chunk upload failed: {}", e);
                    return Err(e);
                }
            }

            let err = match status_check(asset_id.to_string()).await {
                Ok(result) => {
                    info!(asset_id = %asset_id, attempt = state.attempt(), "Upload complete");
                    return Ok(result);
                }
                Err(ApiError::Response(err)) if err.kind == ErrorKind::MissingChunks => err,
                Err(e) => return Err(e),
            };

            match state.plan_retry(chunks, &err) {
                RetryDecision::Retry => {
                    record_retry_round();
                    warn!(
                        asset_id = %asset_id,
                        attempt = state.attempt(),
                        chunks = ?state.remaining(),
                        "Re-uploading chunks reported missing or bad"
                    );
                }
                decision => {
                    error!(
                        asset_id = %asset_id,
                        attempt = state.attempt(),
                        ?decision,
                        "Giving up on upload: {}",
                        err.message
                    );
                    return Err(ApiError::Response(err));
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Records every chunk index it is asked to send.
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<usize>>,
        fail_on: Option<usize>,
    }

    impl RecordingTransport {
        fn failing_on(index: usize) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_on: Some(index),
            }
        }

        fn sent(&self) -> Vec<usize> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChunkTransport for RecordingTransport {
        async fn put_chunk(&self, chunk: &Chunk) -> ApiResult<()> {
            self.sent.lock().unwrap().push(chunk.index);
            if self.fail_on == Some(chunk.index) {
                return Err(ApiError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset",
                )));
            }
            Ok(())
        }
    }

    /// Status check answers, consumed one per call.
    struct Script {
        answers: Mutex<VecDeque<ApiResult<Value>>>,
        calls: Mutex<u32>,
    }

    impl Script {
        fn new(answers: Vec<ApiResult<Value>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                calls: Mutex::new(0),
            }
        }

        fn next(&self) -> ApiResult<Value> {
            *self.calls.lock().unwrap() += 1;
            let mut answers = self.answers.lock().unwrap();
            if answers.len() > 1 {
                answers.pop_front().unwrap()
            } else {
                clone_answer(answers.front().unwrap())
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    fn clone_answer(answer: &ApiResult<Value>) -> ApiResult<Value> {
        match answer {
            Ok(v) => Ok(v.clone()),
            Err(ApiError::Response(e)) => Err(ApiError::Response(e.clone())),
            Err(e) => Err(ApiError::validation(e.to_string())),
        }
    }

    fn missing(body: Value) -> ApiResult<Value> {
        Err(classify(400, body).into())
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("https://uploads.example.com/asset/chunk_{:02}?sig=x", i))
            .collect()
    }

    fn chunks(n: usize) -> Vec<Chunk> {
        let payload = Bytes::from(vec![7u8; n * 4]);
        split_into_chunks(&payload, &urls(n), 4).unwrap()
    }

    async fn run(
        transport: &RecordingTransport,
        chunks: &[Chunk],
        retry_limit: u32,
        script: &Script,
    ) -> ApiResult<Value> {
        ChunkUploader::new(transport, retry_limit)
            .upload("asset-1", chunks, |_id| {
                let answer = script.next();
                async move { answer }
            })
            .await
    }

    #[test]
    fn test_split_into_chunks() {
        let payload = Bytes::from((0u8..25).collect::<Vec<_>>());
        let chunks = split_into_chunks(&payload, &urls(3), 10).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!((chunks[0].start, chunks[0].end), (0, 10));
        assert_eq!((chunks[2].start, chunks[2].end), (20, 25));
        assert_eq!(chunks[2].len(), 5);
        assert_eq!(chunks[1].data[0], 10);
        assert_eq!(chunks[1].url, urls(3)[1]);
    }

    #[test]
    fn test_split_exact_multiple() {
        let payload = Bytes::from(vec![0u8; 20]);
        let chunks = split_into_chunks(&payload, &urls(2), 10).unwrap();
        assert_eq!(chunks[1].len(), 10);
    }

    #[test]
    fn test_split_rejects_url_count_mismatch() {
        let payload = Bytes::from(vec![0u8; 25]);
        assert!(split_into_chunks(&payload, &urls(2), 10).unwrap_err().is_validation());
        assert!(split_into_chunks(&payload, &urls(4), 10).unwrap_err().is_validation());
    }

    #[test]
    fn test_split_empty_payload() {
        let chunks = split_into_chunks(&Bytes::new(), &[], 10).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_plan_retry_respects_limit() {
        let chunks = chunks(2);
        let err = classify(400, json!({"missing_chunks": ["chunk_01"]}));

        let mut state = UploadAttempt::new(2, 0);
        assert_eq!(state.plan_retry(&chunks, &err), RetryDecision::Exhausted);

        let mut state = UploadAttempt::new(2, 1);
        assert_eq!(state.plan_retry(&chunks, &err), RetryDecision::Retry);
        assert_eq!(state.remaining(), &[1]);
        assert_eq!(state.attempt(), 2);
        assert_eq!(state.plan_retry(&chunks, &err), RetryDecision::Exhausted);
    }

    #[test]
    fn test_plan_retry_orders_by_payload_position() {
        let chunks = chunks(4);
        let err = classify(
            400,
            json!({
                "missing_chunks": ["chunk_03", "chunk_01"],
                "bad_chunks": ["chunk_01", "chunk_00"]
            }),
        );
        let mut state = UploadAttempt::new(4, 3);
        assert_eq!(state.plan_retry(&chunks, &err), RetryDecision::Retry);
        assert_eq!(state.remaining(), &[0, 1, 3]);
    }

    #[test]
    fn test_plan_retry_without_chunk_list() {
        let chunks = chunks(2);
        let err = classify(400, json!({"missing_chunks": "all"}));
        assert_eq!(err.kind, ErrorKind::MissingChunks);

        let mut state = UploadAttempt::new(2, 3);
        assert_eq!(state.plan_retry(&chunks, &err), RetryDecision::NoChunkDetail);
    }

    #[tokio::test]
    async fn test_uploads_all_chunks_then_checks_status() {
        let transport = RecordingTransport::default();
        let script = Script::new(vec![Ok(json!({"status": "uploaded"}))]);

        let result = run(&transport, &chunks(3), 3, &script).await.unwrap();

        assert_eq!(result, json!({"status": "uploaded"}));
        assert_eq!(transport.sent(), vec![0, 1, 2]);
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test]
    async fn test_zero_chunks_still_checks_status() {
        let transport = RecordingTransport::default();
        let script = Script::new(vec![Ok(json!({"status": "uploaded"}))]);

        run(&transport, &[], 3, &script).await.unwrap();

        assert!(transport.sent().is_empty());
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test]
    async fn test_reuploads_only_reported_chunks() {
        let transport = RecordingTransport::default();
        let script = Script::new(vec![
            missing(json!({"missing_chunks": ["chunk_02"], "bad_chunks": ["chunk_00"]})),
            Ok(json!({"status": "uploaded"})),
        ]);

        run(&transport, &chunks(3), 3, &script).await.unwrap();

        assert_eq!(transport.sent(), vec![0, 1, 2, 0, 2]);
        assert_eq!(script.calls(), 2);
    }

    #[tokio::test]
    async fn test_retry_rounds_are_bounded() {
        let transport = RecordingTransport::default();
        let script = Script::new(vec![missing(json!({"missing_chunks": ["chunk_01"]}))]);

        let err = run(&transport, &chunks(3), 3, &script).await.unwrap_err();

        assert!(err.is_missing_chunks());
        // one full round plus three selective rounds
        assert_eq!(script.calls(), 4);
        assert_eq!(transport.sent(), vec![0, 1, 2, 1, 1, 1]);
    }

    #[tokio::test]
    async fn test_retry_set_never_grows() {
        let transport = RecordingTransport::default();
        let script = Script::new(vec![
            missing(json!({"missing_chunks": ["chunk_00", "chunk_01", "chunk_99"]})),
            missing(json!({"missing_chunks": ["chunk_01"]})),
            Ok(json!({"status": "uploaded"})),
        ]);

        run(&transport, &chunks(3), 3, &script).await.unwrap();

        assert_eq!(transport.sent(), vec![0, 1, 2, 0, 1, 1]);
    }

    #[tokio::test]
    async fn test_unmatched_names_fail_immediately() {
        let transport = RecordingTransport::default();
        let script = Script::new(vec![missing(json!({"missing_chunks": ["nope"]}))]);

        let err = run(&transport, &chunks(2), 3, &script).await.unwrap_err();

        assert!(err.is_missing_chunks());
        assert_eq!(script.calls(), 1);
        assert_eq!(transport.sent(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_empty_chunk_list_fails_immediately() {
        let transport = RecordingTransport::default();
        let script = Script::new(vec![missing(json!({"missing_chunks": [], "bad_chunks": []}))]);

        let err = run(&transport, &chunks(2), 3, &script).await.unwrap_err();

        assert!(err.is_missing_chunks());
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test]
    async fn test_other_errors_propagate_unchanged() {
        let transport = RecordingTransport::default();
        let script = Script::new(vec![Err(classify(401, json!("nope")).into())]);

        let err = run(&transport, &chunks(2), 3, &script).await.unwrap_err();

        assert_eq!(err.kind(), Some(ErrorKind::Unauthorized));
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_stops_upload() {
        let transport = RecordingTransport::failing_on(1);
        let script = Script::new(vec![Ok(json!({"status": "uploaded"}))]);

        let err = run(&transport, &chunks(3), 3, &script).await.unwrap_err();

        assert!(matches!(err, ApiError::Io(_)));
        assert_eq!(transport.sent(), vec![0, 1]);
        assert_eq!(script.calls(), 0);
    }
}
