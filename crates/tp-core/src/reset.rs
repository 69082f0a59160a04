//! Factory reset of all blocking state
//!
//! Category and tracker identities survive; every flag, count, override,
//! selected id and site list is cleared. This is the only command that
//! persists every field.

use crate::model::{PanelState, SitePolicy};
use crate::options::EngineOptions;
use crate::patch::Slices;
use crate::persist::{publish, PersistFields, PersistSink};

pub fn reset_all(state: &mut PanelState, options: &EngineOptions, sink: &mut dyn PersistSink) -> Slices {
    for category in &mut state.table.categories {
        for tally in [category.site.as_mut(), category.global.as_mut()].into_iter().flatten() {
            tally.num_blocked = 0;
        }
        for tracker in &mut category.trackers {
            if let Some(flags) = tracker.site.as_mut() {
                flags.blocked = false;
                flags.ss_allowed = false;
                flags.ss_blocked = false;
            }
            if let Some(flags) = tracker.global.as_mut() {
                flags.blocked = false;
            }
        }
    }

    state.overrides = Default::default();
    state.selected_app_ids.clear();

    let summary = &mut state.summary;
    summary.site_whitelist.clear();
    summary.site_blacklist.clear();
    summary.paused_blocking = false;
    summary.site_policy = SitePolicy::None;

    state.features = options.reset_features;

    log::debug!("reset all blocking state");
    publish(sink, state, PersistFields::all());
    Slices::all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AppId, Category, GlobalFlags, Scope, SiteFlags, Tally, Tracker};
    use crate::persist::RecordingSink;

    #[test]
    fn test_reset_clears_everything() {
        let mut category = Category::new("ads", "Advertising");
        category.trackers.push(Tracker {
            id: AppId(1),
            name: "a".into(),
            site: Some(SiteFlags { shown: true, blocked: true, ss_allowed: false, ss_blocked: true }),
            global: Some(GlobalFlags { shown: true, blocked: true }),
        });
        category.trackers.push(Tracker {
            id: AppId(2),
            name: "b".into(),
            site: Some(SiteFlags { shown: false, blocked: true, ..Default::default() }),
            global: None,
        });
        category.site = Some(Tally { num_total: 2, num_blocked: 1 });
        category.global = Some(Tally { num_total: 1, num_blocked: 1 });

        let mut state = PanelState::default();
        state.summary.page_host = "example.com".into();
        state.summary.site_blacklist.push("example.com".into());
        state.summary.site_whitelist.push("other.com".into());
        state.summary.site_policy = SitePolicy::Restricted;
        state.summary.paused_blocking = true;
        state.table.categories.push(category);
        state.overrides.record("example.com", AppId(1), false, true);
        state.selected_app_ids.set(AppId(1), true);
        state.features.enable_ad_block = false;

        let mut sink = RecordingSink::new();
        let slices = reset_all(&mut state, &EngineOptions::default(), &mut sink);
        assert_eq!(slices, Slices::all());

        let category = &state.table.categories[0];
        assert_eq!(category.trackers.len(), 2);
        assert_eq!(category.site.unwrap(), Tally { num_total: 2, num_blocked: 0 });
        assert_eq!(category.recount(Scope::Site), 0);
        assert_eq!(category.trackers[0].blocked_anywhere(), Some(false));
        // Hidden rows are cleared too
        assert!(!category.trackers[1].site.unwrap().blocked);
        assert!(state.overrides.is_empty());
        assert!(state.selected_app_ids.is_empty());
        assert!(state.summary.site_whitelist.is_empty() && state.summary.site_blacklist.is_empty());
        assert!(!state.summary.paused_blocking);
        assert!(state.features.enable_ad_block);

        assert_eq!(sink.messages.len(), 1);
        assert_eq!(sink.messages[0].fields(), PersistFields::all());
    }
}
