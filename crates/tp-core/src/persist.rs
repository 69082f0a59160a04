//! Outbound persistence messages
//!
//! After each transition the engine publishes the persisted fields it touched
//! through a [`PersistSink`]. Delivery is fire-and-forget: the sink returns
//! nothing and the engine never learns whether the write landed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::model::{AppId, PanelState, SelectedAppIds};

bitflags::bitflags! {
    /// Persisted fields carried by one `setPanelData` message.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PersistFields: u16 {
        const SITE_WHITELIST = 1 << 0;
        const SITE_BLACKLIST = 1 << 1;
        const PAUSED_BLOCKING = 1 << 2;
        const SELECTED_APP_IDS = 1 << 3;
        const SITE_SPECIFIC_UNBLOCKS = 1 << 4;
        const SITE_SPECIFIC_BLOCKS = 1 << 5;
        const ENABLE_ANTI_TRACKING = 1 << 6;
        const ENABLE_AD_BLOCK = 1 << 7;
        const ENABLE_SMART_BLOCK = 1 << 8;

        /// Written by every site policy toggle
        const SITE_POLICY = Self::SITE_WHITELIST.bits()
            | Self::SITE_BLACKLIST.bits()
            | Self::PAUSED_BLOCKING.bits();
        /// Written by per-tracker and bulk commands
        const TRACKER_POLICY = Self::SELECTED_APP_IDS.bits()
            | Self::SITE_SPECIFIC_UNBLOCKS.bits()
            | Self::SITE_SPECIFIC_BLOCKS.bits();
        const FEATURES = Self::ENABLE_ANTI_TRACKING.bits()
            | Self::ENABLE_AD_BLOCK.bits()
            | Self::ENABLE_SMART_BLOCK.bits();
    }
}

/// Payload of `setPanelData`: any subset of the durable panel fields.
///
/// The same shape is what the background store hands back on reload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct PersistedFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub site_whitelist: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub site_blacklist: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub paused_blocking: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub selected_app_ids: Option<SelectedAppIds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub site_specific_unblocks: Option<BTreeMap<String, Vec<AppId>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub site_specific_blocks: Option<BTreeMap<String, Vec<AppId>>>,
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

impl PersistedFields {
    /// Copy the requested fields out of `state`.
    pub fn capture(state: &PanelState, fields: PersistFields) -> Self {
        let pick = |flag: PersistFields| fields.contains(flag);
        Self {
            site_whitelist: pick(PersistFields::SITE_WHITELIST)
                .then(|| state.summary.site_whitelist.clone()),
            site_blacklist: pick(PersistFields::SITE_BLACKLIST)
                .then(|| state.summary.site_blacklist.clone()),
            paused_blocking: pick(PersistFields::PAUSED_BLOCKING)
                .then_some(state.summary.paused_blocking),
            selected_app_ids: pick(PersistFields::SELECTED_APP_IDS)
                .then(|| state.selected_app_ids.clone()),
            site_specific_unblocks: pick(PersistFields::SITE_SPECIFIC_UNBLOCKS)
                .then(|| state.overrides.site_specific_unblocks.clone()),
            site_specific_blocks: pick(PersistFields::SITE_SPECIFIC_BLOCKS)
                .then(|| state.overrides.site_specific_blocks.clone()),
            enable_anti_tracking: pick(PersistFields::ENABLE_ANTI_TRACKING)
                .then_some(state.features.enable_anti_tracking),
            enable_ad_block: pick(PersistFields::ENABLE_AD_BLOCK)
                .then_some(state.features.enable_ad_block),
            enable_smart_block: pick(PersistFields::ENABLE_SMART_BLOCK)
                .then_some(state.features.enable_smart_block),
        }
    }

    /// Which fields this message carries.
    pub fn fields(&self) -> PersistFields {
        let mut fields = PersistFields::empty();
        fields.set(PersistFields::SITE_WHITELIST, self.site_whitelist.is_some());
        fields.set(PersistFields::SITE_BLACKLIST, self.site_blacklist.is_some());
        fields.set(PersistFields::PAUSED_BLOCKING, self.paused_blocking.is_some());
        fields.set(PersistFields::SELECTED_APP_IDS, self.selected_app_ids.is_some());
        fields.set(PersistFields::SITE_SPECIFIC_UNBLOCKS, self.site_specific_unblocks.is_some());
        fields.set(PersistFields::SITE_SPECIFIC_BLOCKS, self.site_specific_blocks.is_some());
        fields.set(PersistFields::ENABLE_ANTI_TRACKING, self.enable_anti_tracking.is_some());
        fields.set(PersistFields::ENABLE_AD_BLOCK, self.enable_ad_block.is_some());
        fields.set(PersistFields::ENABLE_SMART_BLOCK, self.enable_smart_block.is_some());
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

// =============================================================================
// Sinks
// =============================================================================

/// The background store, as seen from the engine.
pub trait PersistSink {
    /// Deliver one `setPanelData` message. Must not block on delivery.
    fn set_panel_data(&mut self, fields: PersistedFields);
}

impl<S: PersistSink + ?Sized> PersistSink for &mut S {
    fn set_panel_data(&mut self, fields: PersistedFields) {
        (**self).set_panel_data(fields);
    }
}

/// Drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PersistSink for NullSink {
    fn set_panel_data(&mut self, _fields: PersistedFields) {}
}

/// Keeps every message in order of publication.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub messages: Vec<PersistedFields>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&mut self) -> Vec<PersistedFields> {
        std::mem::take(&mut self.messages)
    }

    pub fn last(&self) -> Option<&PersistedFields> {
        self.messages.last()
    }
}

impl PersistSink for RecordingSink {
    fn set_panel_data(&mut self, fields: PersistedFields) {
        self.messages.push(fields);
    }
}

/// Capture `fields` from `state` and hand them to the sink.
pub(crate) fn publish(sink: &mut dyn PersistSink, state: &PanelState, fields: PersistFields) {
    if fields.is_empty() {
        return;
    }
    log::debug!("setPanelData {:?}", fields);
    sink.set_panel_data(PersistedFields::capture(state, fields));
}
