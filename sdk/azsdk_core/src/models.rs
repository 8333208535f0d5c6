//! Common types shared across all azsdk crates.

use serde::{Deserialize, Serialize};

/// One page of a list response.
///
/// ARM and Key Vault list operations return `{"value": [...], "nextLink": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,

    #[serde(rename = "nextLink", default, skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
}
