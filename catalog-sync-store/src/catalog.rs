//! JSON catalog export format.
//!
//! A catalog export is a single JSON object with one array per table:
//!
//! ```json
//! {
//!   "categories": [{ "id": "…", "name": "Bikes" }],
//!   "listings": [ … ],
//!   "threads": [ … ],
//!   "users": [ … ]
//! }
//! ```
//!
//! Missing arrays are treated as empty.

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::StoreError;
use catalog_sync_shared::{Listing, Thread, UserProfile};

/// Category lookup row. Sub-categories share the same table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogExport {
    pub categories: Vec<Category>,
    pub listings: Vec<Listing>,
    pub threads: Vec<Thread>,
    pub users: Vec<UserProfile>,
}

impl CatalogExport {
    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json(&raw)
    }

    /// Write the export as pretty JSON. The file is replaced through a
    /// sibling temp file, so readers never see a partial catalog.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let raw = serde_json::to_vec_pretty(self)?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}
