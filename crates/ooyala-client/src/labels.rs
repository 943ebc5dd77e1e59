//! Label routes.
//!
//! Labels are addressed by id, or by their full slash-separated path through
//! the `by_full_path` routes.

use serde::de::Error as _;
use serde_json::Value;
use tracing::debug;

use ooyala_models::{Label, RequestDescriptor};

use crate::client::{require_non_empty, OoyalaClient, RequestGateway};
use crate::error::{ApiError, ApiResult};

fn by_full_path(name: &str) -> String {
    format!("/v2/labels/by_full_path/{}", urlencoding::encode(name))
}

fn require_labels(labels: &[String], field: &str) -> ApiResult<()> {
    for label in labels {
        require_non_empty(label, field)?;
    }
    Ok(())
}

impl OoyalaClient {
    pub async fn list_labels(&self) -> ApiResult<Vec<Label>> {
        self.send(RequestDescriptor::get("/v2/labels")).await?.items()
    }

    /// Look up a label by full path. `None` when the service returns no items.
    pub async fn get_label_by_path(&self, name: &str) -> ApiResult<Option<Label>> {
        require_non_empty(name, "name")?;
        let labels: Vec<Label> = self
            .send(RequestDescriptor::get(by_full_path(name)))
            .await?
            .items()?;
        Ok(labels.into_iter().next())
    }

    /// Create a label (and any missing parents) by full path.
    pub async fn create_label(&self, name: &str) -> ApiResult<Label> {
        require_non_empty(name, "name")?;
        let labels: Vec<Label> = self
            .send(RequestDescriptor::post(by_full_path(name)))
            .await?
            .json()?;
        labels.into_iter().next().ok_or_else(|| {
            ApiError::Json(serde_json::Error::custom(format!(
                "label creation for '{}' returned no labels",
                name
            )))
        })
    }

    pub async fn delete_label(&self, id: &str) -> ApiResult<Value> {
        require_non_empty(id, "id")?;
        Ok(self
            .send(RequestDescriptor::delete(format!("/v2/labels/{}", id)))
            .await?
            .body)
    }

    /// Resolve label paths to labels, creating the ones that do not exist yet.
    ///
    /// Existing labels come first in service order, followed by the created
    /// ones in request order. No label appears twice.
    pub async fn sync_labels(&self, names: &[String]) -> ApiResult<Vec<Label>> {
        require_labels(names, "labels")?;

        let existing = self.list_labels().await?;
        let mut synced: Vec<Label> = existing
            .iter()
            .filter(|label| names.contains(&label.full_name))
            .cloned()
            .collect();

        let mut missing: Vec<&String> = Vec::new();
        for name in names {
            if !existing.iter().any(|label| &label.full_name == name) && !missing.contains(&name) {
                missing.push(name);
            }
        }

        debug!(existing = synced.len(), missing = missing.len(), "Syncing labels");

        for name in missing {
            let created = self.create_label(name).await?;
            if !synced.iter().any(|label| label.id == created.id) {
                synced.push(created);
            }
        }

        Ok(synced)
    }

    /// Sync the label paths, then make them the asset's only labels.
    pub async fn sync_asset_labels(&self, id: &str, names: &[String]) -> ApiResult<Vec<Label>> {
        require_non_empty(id, "id")?;
        let ids: Vec<String> = self
            .sync_labels(names)
            .await?
            .into_iter()
            .map(|label| label.id)
            .collect();
        self.replace_asset_labels(id, &ids).await
    }

    // =========================================================================
    // Asset labels
    // =========================================================================

    pub async fn get_asset_labels(&self, id: &str) -> ApiResult<Vec<Label>> {
        require_non_empty(id, "id")?;
        self.send(RequestDescriptor::get(format!("/v2/assets/{}/labels", id)))
            .await?
            .items()
    }

    /// Add labels to an asset, keeping the ones it already has.
    pub async fn add_asset_labels(&self, id: &str, label_ids: &[String]) -> ApiResult<Vec<Label>> {
        require_non_empty(id, "id")?;
        require_labels(label_ids, "labels")?;
        let request = RequestDescriptor::post(format!("/v2/assets/{}/labels", id))
            .with_body(Value::from(label_ids.to_vec()));
        self.send(request).await?.items()
    }

    /// Replace all of an asset's labels.
    pub async fn replace_asset_labels(
        &self,
        id: &str,
        label_ids: &[String],
    ) -> ApiResult<Vec<Label>> {
        require_non_empty(id, "id")?;
        require_labels(label_ids, "labels")?;
        let request = RequestDescriptor::put(format!("/v2/assets/{}/labels", id))
            .with_body(Value::from(label_ids.to_vec()));
        self.send(request).await?.items()
    }

    pub async fn remove_all_asset_labels(&self, id: &str) -> ApiResult<()> {
        require_non_empty(id, "id")?;
        self.send(RequestDescriptor::delete(format!("/v2/assets/{}/labels", id)))
            .await?;
        Ok(())
    }

    /// Remove labels one at a time; stops at the first failure.
    pub async fn remove_asset_labels(&self, id: &str, label_ids: &[String]) -> ApiResult<()> {
        require_non_empty(id, "id")?;
        require_labels(label_ids, "labels")?;
        for label_id in label_ids {
            self.remove_asset_label(id, label_id).await?;
        }
        Ok(())
    }

    pub async fn remove_asset_label(&self, id: &str, label_id: &str) -> ApiResult<()> {
        require_non_empty(id, "id")?;
        require_non_empty(label_id, "label_id")?;
        self.send(RequestDescriptor::delete(format!(
            "/v2/assets/{}/labels/{}",
            id, label_id
        )))
        .await?;
        Ok(())
    }
}
