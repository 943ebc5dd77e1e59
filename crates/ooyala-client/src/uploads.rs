//! Upload routes.
//!
//! Content goes up in two phases: the service hands out one pre-signed URL per
//! chunk, then the asset is marked `uploaded` once every chunk is in place.
//! Replacing content follows the same flow under `/replacement`.

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, info};

use ooyala_models::{ReplacementRequest, RequestBody, RequestDescriptor, UploadStatus};

use crate::client::{require_non_empty, OoyalaClient, RequestGateway};
use crate::error::{ApiError, ApiResult};
use crate::upload::{split_into_chunks, ChunkUploader};

impl OoyalaClient {
    /// Pre-signed chunk URLs for a new asset's content.
    pub async fn get_upload_urls(&self, id: &str) -> ApiResult<Vec<String>> {
        require_non_empty(id, "id")?;
        self.send(RequestDescriptor::get(format!("/v2/assets/{}/uploading_urls", id)))
            .await?
            .json()
    }

    /// Pre-signed chunk URLs for replacement content.
    pub async fn get_replacement_upload_urls(&self, id: &str) -> ApiResult<Vec<String>> {
        require_non_empty(id, "id")?;
        self.send(RequestDescriptor::get(format!(
            "/v2/assets/{}/replacement/uploading_urls",
            id
        )))
        .await?
        .json()
    }

    /// Mark the asset's content as uploaded.
    pub async fn set_upload_status(&self, id: &str) -> ApiResult<Value> {
        require_non_empty(id, "id")?;
        self.put_upload_status(format!("/v2/assets/{}/upload_status", id))
            .await
    }

    /// Mark the asset's replacement content as uploaded.
    pub async fn set_replacement_upload_status(&self, id: &str) -> ApiResult<Value> {
        require_non_empty(id, "id")?;
        self.put_upload_status(format!("/v2/assets/{}/replacement/upload_status", id))
            .await
    }

    async fn put_upload_status(&self, route: String) -> ApiResult<Value> {
        let request =
            RequestDescriptor::put(route).with_body(RequestBody::json(&UploadStatus::uploaded())?);
        Ok(self.send(request).await?.body)
    }

    /// Announce replacement content of `file_size` bytes.
    pub async fn create_replacement(&self, id: &str, file_size: u64) -> ApiResult<Value> {
        require_non_empty(id, "id")?;
        if file_size == 0 {
            return Err(ApiError::validation("Invalid 'file_size': must be positive"));
        }

        let body = ReplacementRequest {
            file_size,
            chunk_size: self.config().chunk_size as u64,
        };
        let request = RequestDescriptor::post(format!("/v2/assets/{}/replacement", id))
            .with_body(RequestBody::json(&body)?);
        Ok(self.send(request).await?.body)
    }

    // =========================================================================
    // Chunked uploads
    // =========================================================================

    /// Upload `payload` to `urls`, then mark the asset uploaded.
    pub async fn upload_asset(
        &self,
        id: &str,
        urls: &[String],
        payload: impl Into<Bytes>,
    ) -> ApiResult<Value> {
        require_non_empty(id, "id")?;
        let payload = payload.into();
        let chunks = split_into_chunks(&payload, urls, self.config().chunk_size)?;

        ChunkUploader::new(self, self.config().retry_limit)
            .upload(id, &chunks, move |id| async move {
                self.set_upload_status(&id).await
            })
            .await
    }

    /// Upload replacement `payload` to `urls`, then mark the replacement uploaded.
    pub async fn upload_replacement_asset(
        &self,
        id: &str,
        urls: &[String],
        payload: impl Into<Bytes>,
    ) -> ApiResult<Value> {
        require_non_empty(id, "id")?;
        let payload = payload.into();
        let chunks = split_into_chunks(&payload, urls, self.config().chunk_size)?;

        ChunkUploader::new(self, self.config().retry_limit)
            .upload(id, &chunks, move |id| async move {
                self.set_replacement_upload_status(&id).await
            })
            .await
    }

    /// Fetch upload URLs for an existing asset and upload its content.
    pub async fn upload_full_asset(&self, id: &str, payload: impl Into<Bytes>) -> ApiResult<Value> {
        require_non_empty(id, "embed_code")?;
        let payload = payload.into();

        let urls = self.get_upload_urls(id).await?;
        debug!(embed_code = %id, urls = urls.len(), bytes = payload.len(), "Starting upload");

        let status = self.upload_asset(id, &urls, payload).await?;
        info!(embed_code = %id, "Asset content uploaded");
        Ok(status)
    }

    /// Announce, fetch replacement URLs, and upload new content for an asset.
    pub async fn replace_full_asset(
        &self,
        id: &str,
        payload: impl Into<Bytes>,
    ) -> ApiResult<Value> {
        require_non_empty(id, "id")?;
        let payload = payload.into();

        self.create_replacement(id, payload.len() as u64).await?;
        let urls = self.get_replacement_upload_urls(id).await?;
        debug!(
            embed_code = %id,
            urls = urls.len(),
            bytes = payload.len(),
            "Starting replacement upload"
        );

        let status = self.upload_replacement_asset(id, &urls, payload).await?;
        info!(embed_code = %id, "Asset content replaced");
        Ok(status)
    }
}
