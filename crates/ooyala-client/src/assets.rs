//! Asset routes.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info_span, Instrument};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use validator::Validate;

use ooyala_models::{Asset, AssetPatch, NewAsset, QueryParams, RequestDescriptor};

use crate::client::{require_non_empty, OoyalaClient, RequestGateway};
use crate::error::{ApiError, ApiResult};

/// Related data fetched up front on search and detail calls.
pub const DEFAULT_INCLUDE: &str = "metadata,labels,player,primary_preview_image";

/// Oldest assets first.
pub const DEFAULT_ORDER_BY: &str = "created_at ascending";

/// A failed [`OoyalaClient::sync_asset`] call.
///
/// `asset` holds the remote asset when the create or update step had already
/// succeeded, so the caller can record its embed code.
#[derive(Debug, Error)]
#[error("Asset sync failed: {source}")]
pub struct SyncError {
    pub source: ApiError,
    pub asset: Option<Asset>,
}

impl From<ApiError> for SyncError {
    fn from(source: ApiError) -> Self {
        Self {
            source,
            asset: None,
        }
    }
}

/// Full asset view: details plus streams and source file info.
#[derive(Debug, Clone)]
pub struct FullAssetDetails {
    pub asset: Asset,
    pub streams: Value,
    pub source: Value,
}

// =============================================================================
// Body normalization
// =============================================================================

/// Strip diacritics so `Café Déjà vu` is sent as `Cafe Deja vu`.
///
/// Letters without a canonical decomposition pass through unchanged.
pub fn latinize(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).nfc().collect()
}

/// Decode then re-encode a hosted-at URL so it is escaped exactly once.
///
/// Values that do not parse as an absolute URL are sent as given.
pub fn normalize_hosted_at(raw: &str) -> String {
    let decoded = urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    match url::Url::parse(&decoded) {
        Ok(url) => url.to_string(),
        Err(_) => raw.to_string(),
    }
}

fn hosted_at_value(hosted_at: Option<&str>) -> Value {
    match hosted_at {
        Some(raw) if !raw.is_empty() => Value::from(normalize_hosted_at(raw)),
        _ => Value::Null,
    }
}

fn new_asset_body(asset: &NewAsset, chunk_size: usize) -> ApiResult<Value> {
    let mut body = match serde_json::to_value(asset)? {
        Value::Object(obj) => obj,
        _ => Map::new(),
    };
    body.insert("name".to_string(), Value::from(latinize(&asset.name)));
    body.insert("description".to_string(), Value::from(latinize(&asset.description)));
    body.insert("asset_type".to_string(), Value::from("video"));
    body.insert("chunk_size".to_string(), Value::from(chunk_size as u64));
    body.insert("hosted_at".to_string(), hosted_at_value(asset.hosted_at.as_deref()));
    Ok(Value::Object(body))
}

/// `hosted_at` is always sent; `null` clears it.
fn patch_body(patch: &AssetPatch) -> ApiResult<Value> {
    let mut body = match serde_json::to_value(patch)? {
        Value::Object(obj) => obj,
        _ => Map::new(),
    };
    if let Some(name) = &patch.name {
        body.insert("name".to_string(), Value::from(latinize(name)));
    }
    if let Some(description) = &patch.description {
        body.insert("description".to_string(), Value::from(latinize(description)));
    }
    body.insert("hosted_at".to_string(), hosted_at_value(patch.hosted_at.as_deref()));
    Ok(Value::Object(body))
}

impl OoyalaClient {
    /// Search assets. Caller parameters override the default ordering and includes.
    pub async fn search_assets(&self, params: QueryParams) -> ApiResult<Vec<Asset>> {
        let request = RequestDescriptor::get("/v2/assets")
            .with_param("orderby", DEFAULT_ORDER_BY)
            .with_param("include", DEFAULT_INCLUDE)
            .with_params(params);

        let assets: Vec<Asset> = self.send(request).await?.items()?;
        debug!(found = assets.len(), "Asset search done");
        Ok(assets)
    }

    pub async fn get_asset(&self, id: &str) -> ApiResult<Asset> {
        require_non_empty(id, "id")?;
        let request = RequestDescriptor::get(format!("/v2/assets/{}", id))
            .with_param("include", DEFAULT_INCLUDE);
        self.send(request).await?.json()
    }

    /// Create a video asset. The service answers with the new `embed_code`.
    pub async fn create_asset(&self, asset: &NewAsset) -> ApiResult<Asset> {
        asset.validate()?;

        let body = new_asset_body(asset, self.config().chunk_size)?;
        let request = RequestDescriptor::post("/v2/assets").with_body(body);
        let created: Asset = self.send(request).await?.json()?;
        debug!(embed_code = %created.embed_code, "Asset created");
        Ok(created)
    }

    pub async fn update_asset(&self, id: &str, patch: &AssetPatch) -> ApiResult<Asset> {
        require_non_empty(id, "id")?;
        let request = RequestDescriptor::patch(format!("/v2/assets/{}", id))
            .with_body(patch_body(patch)?);
        self.send(request).await?.json()
    }

    pub async fn delete_asset(&self, id: &str) -> ApiResult<Value> {
        require_non_empty(id, "id")?;
        let request = RequestDescriptor::delete(format!("/v2/assets/{}", id));
        Ok(self.send(request).await?.body)
    }

    // =========================================================================
    // Sub-resources
    // =========================================================================

    pub async fn get_asset_metadata(&self, id: &str) -> ApiResult<Value> {
        require_non_empty(id, "id")?;
        let request = RequestDescriptor::get(format!("/v2/assets/{}/metadata", id));
        Ok(self.send(request).await?.body)
    }

    /// Merge `metadata` into the asset's existing metadata.
    pub async fn set_asset_metadata(
        &self,
        id: &str,
        metadata: &Map<String, Value>,
    ) -> ApiResult<Value> {
        require_non_empty(id, "id")?;
        let request = RequestDescriptor::patch(format!("/v2/assets/{}/metadata", id))
            .with_body(Value::Object(metadata.clone()));
        Ok(self.send(request).await?.body)
    }

    /// Replace the asset's metadata entirely.
    pub async fn replace_asset_metadata(
        &self,
        id: &str,
        metadata: &Map<String, Value>,
    ) -> ApiResult<Value> {
        require_non_empty(id, "id")?;
        let request = RequestDescriptor::put(format!("/v2/assets/{}/metadata", id))
            .with_body(Value::Object(metadata.clone()));
        Ok(self.send(request).await?.body)
    }

    pub async fn get_asset_player(&self, id: &str) -> ApiResult<Value> {
        self.get_sub_resource(id, "player").await
    }

    pub async fn get_asset_source(&self, id: &str) -> ApiResult<Value> {
        self.get_sub_resource(id, "source_file_info").await
    }

    pub async fn get_asset_streams(&self, id: &str) -> ApiResult<Value> {
        self.get_sub_resource(id, "streams").await
    }

    async fn get_sub_resource(&self, id: &str, resource: &str) -> ApiResult<Value> {
        require_non_empty(id, "id")?;
        let request = RequestDescriptor::get(format!("/v2/assets/{}/{}", id, resource));
        Ok(self.send(request).await?.body)
    }

    /// Details, then streams, then source file info. Calls run one after another.
    pub async fn get_full_asset_details(&self, id: &str) -> ApiResult<FullAssetDetails> {
        let asset = self.get_asset(id).await?;
        let streams = self.get_asset_streams(id).await?;
        let source = self.get_asset_source(id).await?;
        Ok(FullAssetDetails {
            asset,
            streams,
            source,
        })
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Update in place when the embed code is known, otherwise create.
    pub async fn create_or_update_asset(&self, asset: &NewAsset) -> ApiResult<Asset> {
        asset.validate()?;
        match asset.embed_code.as_deref() {
            Some(id) if !id.is_empty() => self.update_asset(id, &AssetPatch::from(asset)).await,
            _ => self.create_asset(asset).await,
        }
    }

    /// Create or update the asset, then push its metadata and labels.
    ///
    /// Always resolves to the remote asset from the first step.
    pub async fn sync_asset(&self, asset: &NewAsset) -> Result<Asset, SyncError> {
        let span = info_span!("ooyala_sync_asset", name = %asset.name);
        self.sync_asset_inner(asset).instrument(span).await
    }

    async fn sync_asset_inner(&self, asset: &NewAsset) -> Result<Asset, SyncError> {
        let remote = self.create_or_update_asset(asset).await?;

        let id = match asset.embed_code.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => remote.embed_code.clone(),
        };

        match self
            .sync_asset_content(&id, asset.metadata.as_ref(), &asset.labels)
            .await
        {
            Ok(()) => {
                debug!(embed_code = %id, "Asset sync complete");
                Ok(remote)
            }
            Err(source) => Err(SyncError {
                source,
                asset: Some(remote),
            }),
        }
    }

    /// Set metadata when given, then create missing labels and assign them.
    pub async fn sync_asset_content(
        &self,
        id: &str,
        metadata: Option<&Map<String, Value>>,
        labels: &[String],
    ) -> ApiResult<()> {
        require_non_empty(id, "embed_code")?;

        if let Some(metadata) = metadata {
            self.set_asset_metadata(id, metadata).await?;
        }

        if labels.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = self
            .sync_labels(labels)
            .await?
            .into_iter()
            .map(|label| label.id)
            .collect();
        if !ids.is_empty() {
            self.add_asset_labels(id, &ids).await?;
        }
        Ok(())
    }
}
