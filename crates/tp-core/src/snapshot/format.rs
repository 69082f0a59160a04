//! Panel snapshot wire format
//!
//! This is the JSON the snapshot collaborator delivers once per panel session
//! and the shape of every patch handed back to the UI. Field names follow the
//! panel UI exactly, which is why some are camelCase and some are not.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::model::{AppId, FeatureFlags, SelectedAppIds, SitePolicy};

/// Full panel state as exchanged with the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct PanelSnapshot {
    pub summary: SummaryWire,
    #[serde(default)]
    pub blocking: BlockingWire,
    #[serde(default)]
    pub settings: SettingsWire,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct SummaryWire {
    #[serde(rename = "pageHost", default)]
    pub page_host: String,
    #[serde(default)]
    pub site_whitelist: Vec<String>,
    #[serde(default)]
    pub site_blacklist: Vec<String>,
    #[serde(default)]
    pub paused_blocking: bool,
    #[serde(rename = "sitePolicy", default)]
    #[ts(type = "false | 1 | 2")]
    pub site_policy: SitePolicy,
}

/// Site-scoped slice: trackers seen on the page plus per-site overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct BlockingWire {
    #[serde(default)]
    pub categories: Vec<CategoryWire>,
    #[serde(default)]
    pub selected_app_ids: SelectedAppIds,
    #[serde(default)]
    pub site_specific_unblocks: BTreeMap<String, Vec<AppId>>,
    #[serde(default)]
    pub site_specific_blocks: BTreeMap<String, Vec<AppId>>,
}

/// Global slice: every known tracker plus the feature switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct SettingsWire {
    #[serde(default)]
    pub categories: Vec<CategoryWire>,
    #[serde(flatten)]
    pub features: FeatureFlags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct CategoryWire {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub num_total: u32,
    #[serde(default)]
    pub num_blocked: u32,
    #[serde(default)]
    pub trackers: Vec<TrackerWire>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct TrackerWire {
    pub id: AppId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "catId", default)]
    pub cat_id: String,
    #[serde(rename = "shouldShow", default = "shown")]
    pub should_show: bool,
    #[serde(default)]
    pub blocked: bool,
    /// Only rendered in the site tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub ss_allowed: Option<bool>,
    /// Only rendered in the site tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub ss_blocked: Option<bool>,
}

fn shown() -> bool {
    true
}

// =============================================================================
// Patch
// =============================================================================

/// Changed slices of a [`PanelSnapshot`]; absent slices are unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Patch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub summary: Option<SummaryWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub blocking: Option<BlockingPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub settings: Option<SettingsPatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct BlockingPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub categories: Option<Vec<CategoryWire>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub selected_app_ids: Option<SelectedAppIds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub site_specific_unblocks: Option<BTreeMap<String, Vec<AppId>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub site_specific_blocks: Option<BTreeMap<String, Vec<AppId>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub categories: Option<Vec<CategoryWire>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub enable_anti_tracking: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub enable_ad_block: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub enable_smart_block: Option<bool>,
}

impl Patch {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.blocking.is_none() && self.settings.is_none()
    }
}
