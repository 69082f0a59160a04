//! Builder inputs: the tracker catalog and the page report.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use tp_core::model::AppId;

/// Error type for snapshot building.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Tracker {app_id} references unknown category '{category}'")]
    UnknownCategory { app_id: AppId, category: String },
    #[error("Category '{0}' is listed twice")]
    DuplicateCategory(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCategory {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTracker {
    pub id: AppId,
    #[serde(default)]
    pub name: String,
    pub cat: String,
}

/// Every tracker the extension knows about, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerCatalog {
    #[serde(default)]
    pub categories: Vec<CatalogCategory>,
    #[serde(default)]
    pub trackers: Vec<CatalogTracker>,
}

impl TrackerCatalog {
    pub fn from_json(text: &str) -> Result<Self, BuildError> {
        let catalog: Self = serde_json::from_str(text)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check that category ids are unique and every tracker's category exists.
    pub fn validate(&self) -> Result<(), BuildError> {
        let mut ids = HashSet::new();
        for category in &self.categories {
            if !ids.insert(category.id.as_str()) {
                return Err(BuildError::DuplicateCategory(category.id.clone()));
            }
        }
        for tracker in &self.trackers {
            if !ids.contains(tracker.cat.as_str()) {
                return Err(BuildError::UnknownCategory {
                    app_id: tracker.id,
                    category: tracker.cat.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn tracker(&self, app_id: AppId) -> Option<&CatalogTracker> {
        self.trackers.iter().find(|t| t.id == app_id)
    }
}

/// What the content script saw on the current page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReport {
    #[serde(rename = "pageHost", default)]
    pub page_host: String,
    /// Detected tracker ids in detection order; repeats are allowed.
    #[serde(default)]
    pub trackers: Vec<AppId>,
}

impl PageReport {
    pub fn from_json(text: &str) -> Result<Self, BuildError> {
        Ok(serde_json::from_str(text)?)
    }
}
