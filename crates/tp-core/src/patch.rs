//! Patch assembly
//!
//! Handlers report which slices of the state they touched; the dispatcher
//! renders only those slices into the [`Patch`] returned to the UI.

use crate::model::{PanelState, Scope};
use crate::snapshot::{render_summary, render_tree, BlockingPatch, Patch, SettingsPatch};

bitflags::bitflags! {
    /// State slices changed by a command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Slices: u8 {
        const SUMMARY = 1 << 0;
        const SITE_CATEGORIES = 1 << 1;
        const GLOBAL_CATEGORIES = 1 << 2;
        const SELECTED_APP_IDS = 1 << 3;
        const SITE_OVERRIDES = 1 << 4;
        const FEATURES = 1 << 5;

        const BLOCKING = Self::SITE_CATEGORIES.bits()
            | Self::SELECTED_APP_IDS.bits()
            | Self::SITE_OVERRIDES.bits();
        const SETTINGS = Self::GLOBAL_CATEGORIES.bits() | Self::FEATURES.bits();
    }
}

impl Patch {
    /// Render the `slices` of `state` into a patch.
    pub fn capture(state: &PanelState, slices: Slices) -> Self {
        let summary = slices
            .contains(Slices::SUMMARY)
            .then(|| render_summary(&state.summary));

        let blocking = slices.intersects(Slices::BLOCKING).then(|| BlockingPatch {
            categories: slices
                .contains(Slices::SITE_CATEGORIES)
                .then(|| render_tree(&state.table, Scope::Site)),
            selected_app_ids: slices
                .contains(Slices::SELECTED_APP_IDS)
                .then(|| state.selected_app_ids.clone()),
            site_specific_unblocks: slices
                .contains(Slices::SITE_OVERRIDES)
                .then(|| state.overrides.site_specific_unblocks.clone()),
            site_specific_blocks: slices
                .contains(Slices::SITE_OVERRIDES)
                .then(|| state.overrides.site_specific_blocks.clone()),
        });

        let features = slices.contains(Slices::FEATURES).then_some(state.features);
        let settings = slices.intersects(Slices::SETTINGS).then(|| SettingsPatch {
            categories: slices
                .contains(Slices::GLOBAL_CATEGORIES)
                .then(|| render_tree(&state.table, Scope::Global)),
            enable_anti_tracking: features.map(|f| f.enable_anti_tracking),
            enable_ad_block: features.map(|f| f.enable_ad_block),
            enable_smart_block: features.map(|f| f.enable_smart_block),
        });

        Self { summary, blocking, settings }
    }
}
