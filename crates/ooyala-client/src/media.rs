//! Thumbnail and closed caption routes.

use bytes::Bytes;
use serde_json::Value;

use ooyala_models::{PreviewImageSelection, RequestBody, RequestDescriptor};

use crate::client::{require_non_empty, OoyalaClient, RequestGateway};
use crate::error::{ApiError, ApiResult};

/// Content type of preview image uploads.
pub const THUMBNAIL_CONTENT_TYPE: &str = "multipart/mixed";

/// Content type of closed caption uploads (DFXP / TTML documents).
pub const CLOSED_CAPTIONS_CONTENT_TYPE: &str = "text/html";

impl OoyalaClient {
    /// Preview images generated from the asset's frames.
    pub async fn get_thumbnails(&self, id: &str) -> ApiResult<Value> {
        require_non_empty(id, "id")?;
        let request = RequestDescriptor::get(format!("/v2/assets/{}/generated_preview_images", id));
        Ok(self.send(request).await?.body)
    }

    /// Use the last uploaded image as the primary preview.
    pub async fn set_uploaded_thumbnail(&self, id: &str) -> ApiResult<Value> {
        self.set_primary_preview(id, &PreviewImageSelection::UploadedFile)
            .await
    }

    /// Use the frame generated at `time` seconds as the primary preview.
    pub async fn set_generated_thumbnail(&self, id: &str, time: f64) -> ApiResult<Value> {
        self.set_primary_preview(id, &PreviewImageSelection::Generated { time })
            .await
    }

    async fn set_primary_preview(
        &self,
        id: &str,
        selection: &PreviewImageSelection,
    ) -> ApiResult<Value> {
        require_non_empty(id, "id")?;
        let request = RequestDescriptor::put(format!("/v2/assets/{}/primary_preview_image", id))
            .with_body(RequestBody::json(selection)?);
        Ok(self.send(request).await?.body)
    }

    /// Upload a preview image file. The raw image bytes are signed as-is.
    pub async fn upload_thumbnail(&self, id: &str, image: impl Into<Bytes>) -> ApiResult<Value> {
        require_non_empty(id, "id")?;
        let image = image.into();
        if image.is_empty() {
            return Err(ApiError::validation("Invalid 'image': must not be empty"));
        }

        let request = RequestDescriptor::post(format!("/v2/assets/{}/preview_image_files", id))
            .with_body(image)
            .with_content_type(THUMBNAIL_CONTENT_TYPE);
        Ok(self.send(request).await?.body)
    }

    /// Upload a closed caption document.
    pub async fn upload_closed_captions(&self, id: &str, captions: &str) -> ApiResult<Value> {
        require_non_empty(id, "id")?;
        require_non_empty(captions, "captions")?;

        let request = RequestDescriptor::put(format!("/v2/assets/{}/closed_captions", id))
            .with_body(captions)
            .with_content_type(CLOSED_CAPTIONS_CONTENT_TYPE);
        Ok(self.send(request).await?.body)
    }
}
