//! In-memory data model for the panel engine
//!
//! The engine keeps a single tracker table. A tracker that appears both on the
//! current page and in the global list, under the same category, is one row
//! with two scope records, so the "site tree" and "global tree" the UI renders
//! are views over the same rows rather than two copies kept in step by hand.
//!
//! Every listing of a tracker keeps a row of its own otherwise: a hidden
//! duplicate, or a tracker the two trees file under different categories.
//! Cross-scope mirroring therefore resolves its target by id, never by row.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ts_rs::TS;

use crate::host::resolve_site_key;

// =============================================================================
// Identifiers
// =============================================================================

/// Stable numeric tracker id.
///
/// The site tree ships ids as strings and the global tree as numbers; both
/// deserialize to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, TS)]
#[serde(transparent)]
pub struct AppId(pub u32);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for AppId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for AppId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        let value = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => n,
            Raw::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| serde::de::Error::custom(format!("invalid tracker id '{s}'")))?,
        };
        u32::try_from(value)
            .map(AppId)
            .map_err(|_| serde::de::Error::custom(format!("tracker id {value} out of range")))
    }
}

// =============================================================================
// Site Policy
// =============================================================================

/// Whole-site blanket policy derived from the white/black lists.
///
/// On the wire this is `false`, `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SitePolicy {
    #[default]
    None,
    Restricted,
    Whitelisted,
}

impl SitePolicy {
    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Restricted => 1,
            Self::Whitelisted => 2,
        }
    }
}

impl Serialize for SitePolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_bool(false),
            other => serializer.serialize_u8(other.code()),
        }
    }
}

impl<'de> Deserialize<'de> for SitePolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Code(u8),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(false) | Raw::Code(0) => Ok(Self::None),
            Raw::Code(1) => Ok(Self::Restricted),
            Raw::Code(2) => Ok(Self::Whitelisted),
            Raw::Flag(true) => Err(serde::de::Error::custom("sitePolicy cannot be `true`")),
            Raw::Code(code) => Err(serde::de::Error::custom(format!("unknown sitePolicy {code}"))),
        }
    }
}

// =============================================================================
// Scopes and Flags
// =============================================================================

/// Which view of the tracker table a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Site,
    Global,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Site => f.write_str("site"),
            Self::Global => f.write_str("global"),
        }
    }
}

/// Tracker state on the current host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SiteFlags {
    pub shown: bool,
    pub blocked: bool,
    /// Trusted on this site only.
    pub ss_allowed: bool,
    /// Restricted on this site only.
    pub ss_blocked: bool,
}

impl SiteFlags {
    /// Effective blocked state counted by the site tally.
    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.blocked || self.ss_blocked
    }

    #[inline]
    pub fn has_override(&self) -> bool {
        self.ss_allowed || self.ss_blocked
    }
}

/// Tracker state in the global list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlobalFlags {
    pub shown: bool,
    pub blocked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tracker {
    pub id: AppId,
    pub name: String,
    /// Present when the tracker was seen on the current page.
    pub site: Option<SiteFlags>,
    /// Present when the tracker is part of the global list.
    pub global: Option<GlobalFlags>,
}

impl Tracker {
    pub fn is_shown(&self, scope: Scope) -> bool {
        match scope {
            Scope::Site => self.site.is_some_and(|f| f.shown),
            Scope::Global => self.global.is_some_and(|f| f.shown),
        }
    }

    /// Effective blocked state in `scope`, if the tracker exists there.
    pub fn blocked_in(&self, scope: Scope) -> Option<bool> {
        match scope {
            Scope::Site => self.site.map(|f| f.is_blocked()),
            Scope::Global => self.global.map(|f| f.blocked),
        }
    }

    /// Whether this row carries a record for `scope`, shown or not.
    pub fn has_record(&self, scope: Scope) -> bool {
        match scope {
            Scope::Site => self.site.is_some(),
            Scope::Global => self.global.is_some(),
        }
    }

    /// Whether the plain `blocked` flag is set on a shown record in either
    /// scope. `None` when the row has no shown record.
    /// A site restrict (`ss_blocked`) does not count.
    pub fn blocked_anywhere(&self) -> Option<bool> {
        let site = self.site.filter(|f| f.shown).map(|f| f.blocked);
        let global = self.global.filter(|f| f.shown).map(|f| f.blocked);
        match (site, global) {
            (None, None) => None,
            (site, global) => Some(site == Some(true) || global == Some(true)),
        }
    }
}

// =============================================================================
// Categories
// =============================================================================

/// Aggregate counts of one category within one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub num_total: u32,
    pub num_blocked: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub site: Option<Tally>,
    pub global: Option<Tally>,
    pub trackers: Vec<Tracker>,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            site: None,
            global: None,
            trackers: Vec::new(),
        }
    }

    pub fn tally(&self, scope: Scope) -> Option<&Tally> {
        match scope {
            Scope::Site => self.site.as_ref(),
            Scope::Global => self.global.as_ref(),
        }
    }

    pub fn tally_mut(&mut self, scope: Scope) -> Option<&mut Tally> {
        match scope {
            Scope::Site => self.site.as_mut(),
            Scope::Global => self.global.as_mut(),
        }
    }

    /// Count shown, effectively blocked trackers in `scope` by full scan.
    pub fn recount(&self, scope: Scope) -> u32 {
        let count = self
            .trackers
            .iter()
            .filter(|t| t.is_shown(scope) && t.blocked_in(scope) == Some(true))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Index of the shown tracker `app_id` in `scope`.
    pub fn position(&self, app_id: AppId, scope: Scope) -> Option<usize> {
        self.trackers
            .iter()
            .position(|t| t.id == app_id && t.is_shown(scope))
    }

    /// Whether this category belongs to the `scope` view.
    pub fn in_scope(&self, scope: Scope) -> bool {
        self.tally(scope).is_some()
    }
}

/// Every category known to the panel, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerTable {
    pub categories: Vec<Category>,
}

impl TrackerTable {
    pub fn category_index(&self, cat_id: &str) -> Option<usize> {
        self.categories.iter().position(|c| c.id == cat_id)
    }

    /// Locate the shown tracker `(cat_id, app_id)` in `scope`.
    pub fn locate(&self, cat_id: &str, app_id: AppId, scope: Scope) -> Option<(usize, usize)> {
        let ci = self.category_index(cat_id)?;
        let ti = self.categories[ci].position(app_id, scope)?;
        Some((ci, ti))
    }

    /// Locate the shown tracker `app_id` in `scope`, whatever its category.
    pub fn locate_by_id(&self, app_id: AppId, scope: Scope) -> Option<(usize, usize)> {
        self.categories
            .iter()
            .enumerate()
            .find_map(|(ci, c)| c.position(app_id, scope).map(|ti| (ci, ti)))
    }

    /// First row of `app_id`, in display order.
    pub fn tracker(&self, app_id: AppId) -> Option<&Tracker> {
        self.categories
            .iter()
            .flat_map(|c| c.trackers.iter())
            .find(|t| t.id == app_id)
    }

    pub fn trackers(&self) -> impl Iterator<Item = &Tracker> {
        self.categories.iter().flat_map(|c| c.trackers.iter())
    }

    /// [`Tracker::blocked_anywhere`] over every row of `app_id`.
    pub fn blocked_anywhere(&self, app_id: AppId) -> Option<bool> {
        self.trackers()
            .filter(|t| t.id == app_id)
            .filter_map(Tracker::blocked_anywhere)
            .reduce(|a, b| a || b)
    }

    /// [`TrackerTable::blocked_anywhere`] for every id in the table, in one pass.
    pub fn blocked_by_id(&self) -> BTreeMap<AppId, Option<bool>> {
        let mut by_id: BTreeMap<AppId, Option<bool>> = BTreeMap::new();
        for tracker in self.trackers() {
            let entry = by_id.entry(tracker.id).or_insert(None);
            if let Some(blocked) = tracker.blocked_anywhere() {
                *entry = Some(entry.unwrap_or(false) || blocked);
            }
        }
        by_id
    }

    /// First shown row of each id in `scope`.
    pub fn shown_rows(&self, scope: Scope) -> HashMap<AppId, (usize, usize)> {
        let mut rows = HashMap::new();
        for (ci, category) in self.categories.iter().enumerate() {
            for (ti, tracker) in category.trackers.iter().enumerate() {
                if tracker.is_shown(scope) {
                    rows.entry(tracker.id).or_insert((ci, ti));
                }
            }
        }
        rows
    }
}

// =============================================================================
// Site Summary
// =============================================================================

/// Host-level state of the page the panel was opened on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteSummary {
    pub page_host: String,
    pub site_whitelist: Vec<String>,
    pub site_blacklist: Vec<String>,
    pub paused_blocking: bool,
    pub site_policy: SitePolicy,
}

impl SiteSummary {
    /// Normalized key of the current page host.
    pub fn site_key(&self) -> String {
        resolve_site_key(&self.page_host)
    }

    pub fn is_trusted(&self) -> bool {
        let key = self.site_key();
        self.site_whitelist.iter().any(|h| *h == key)
    }

    pub fn is_restricted(&self) -> bool {
        let key = self.site_key();
        self.site_blacklist.iter().any(|h| *h == key)
    }

    /// Policy implied by the current list membership.
    pub fn derive_site_policy(&self) -> SitePolicy {
        if self.is_trusted() {
            SitePolicy::Whitelisted
        } else if self.is_restricted() {
            SitePolicy::Restricted
        } else {
            SitePolicy::None
        }
    }
}

// =============================================================================
// Overrides and Selected Ids
// =============================================================================

/// Durable per-host trust/restrict lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct SiteOverrides {
    #[serde(default)]
    pub site_specific_unblocks: BTreeMap<String, Vec<AppId>>,
    #[serde(default)]
    pub site_specific_blocks: BTreeMap<String, Vec<AppId>>,
}

impl SiteOverrides {
    /// Record a per-tracker decision for `host`.
    ///
    /// The id is added to the unblock list when trusted, to the block list when
    /// restricted, and removed from whichever list no longer applies. Hosts
    /// left with an empty list are dropped.
    pub fn record(&mut self, host: &str, app_id: AppId, trust: bool, restrict: bool) {
        update_host_list(&mut self.site_specific_unblocks, host, app_id, trust);
        update_host_list(&mut self.site_specific_blocks, host, app_id, restrict);
    }

    pub fn unblocks_for(&self, host: &str) -> &[AppId] {
        self.site_specific_unblocks
            .get(host)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn blocks_for(&self, host: &str) -> &[AppId] {
        self.site_specific_blocks
            .get(host)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.site_specific_unblocks.is_empty() && self.site_specific_blocks.is_empty()
    }
}

fn update_host_list(
    lists: &mut BTreeMap<String, Vec<AppId>>,
    host: &str,
    app_id: AppId,
    present: bool,
) {
    if present {
        let list = lists.entry(host.to_string()).or_default();
        if !list.contains(&app_id) {
            list.push(app_id);
        }
    } else if let Some(list) = lists.get_mut(host) {
        list.retain(|id| *id != app_id);
        if list.is_empty() {
            lists.remove(host);
        }
    }
}

/// Compact block-list index: `appId -> 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(transparent)]
pub struct SelectedAppIds(pub BTreeMap<AppId, u8>);

impl SelectedAppIds {
    pub fn set(&mut self, app_id: AppId, selected: bool) {
        if selected {
            self.0.insert(app_id, 1);
        } else {
            self.0.remove(&app_id);
        }
    }

    pub fn contains(&self, app_id: AppId) -> bool {
        self.0.contains_key(&app_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl FromIterator<AppId> for SelectedAppIds {
    fn from_iter<I: IntoIterator<Item = AppId>>(iter: I) -> Self {
        Self(iter.into_iter().map(|id| (id, 1)).collect())
    }
}

// =============================================================================
// Feature Flags
// =============================================================================

/// Panel feature switches, independent of tracker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct FeatureFlags {
    #[serde(default = "enabled")]
    pub enable_anti_tracking: bool,
    #[serde(default = "enabled")]
    pub enable_ad_block: bool,
    #[serde(default = "enabled")]
    pub enable_smart_block: bool,
}

fn enabled() -> bool {
    true
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_anti_tracking: true,
            enable_ad_block: true,
            enable_smart_block: true,
        }
    }
}

impl FeatureFlags {
    pub fn get(&self, feature: Feature) -> bool {
        match feature {
            Feature::AntiTracking => self.enable_anti_tracking,
            Feature::AdBlock => self.enable_ad_block,
            Feature::SmartBlock => self.enable_smart_block,
        }
    }

    pub fn set(&mut self, feature: Feature, value: bool) {
        match feature {
            Feature::AntiTracking => self.enable_anti_tracking = value,
            Feature::AdBlock => self.enable_ad_block = value,
            Feature::SmartBlock => self.enable_smart_block = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    #[serde(rename = "enable_anti_tracking")]
    AntiTracking,
    #[serde(rename = "enable_ad_block")]
    AdBlock,
    #[serde(rename = "enable_smart_block")]
    SmartBlock,
}

// =============================================================================
// Panel State
// =============================================================================

/// Everything one panel session knows about blocking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelState {
    pub summary: SiteSummary,
    pub table: TrackerTable,
    pub overrides: SiteOverrides,
    pub selected_app_ids: SelectedAppIds,
    pub features: FeatureFlags,
}

impl PanelState {
    /// Bring `selected_app_ids` in line with the tracker's flags.
    ///
    /// `fallback` is used when no row of the tracker is shown in either scope.
    pub fn sync_selected(&mut self, app_id: AppId, fallback: bool) {
        let blocked = self.table.blocked_anywhere(app_id).unwrap_or(fallback);
        self.selected_app_ids.set(app_id, blocked);
    }
}
