//! Label models.

use serde::{Deserialize, Serialize};

/// A label in the account's label tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Slash-separated path from the root, e.g. `/News/Local`
    #[serde(default)]
    pub full_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Paged list response (`{"items": [...], "next_page": "..."}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemsPage<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page: Option<String>,
}

impl<T> Default for ItemsPage<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_page: None,
        }
    }
}
