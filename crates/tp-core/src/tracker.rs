//! Per-tracker trust, restrict and block
//!
//! A miss on either tree (unknown category, unknown id, or a hidden tracker)
//! only skips that tree's update. Override lists and the selected-id index
//! are still brought up to date.

use crate::command::{GlobalTrackerPolicy, SiteTrackerPolicy};
use crate::delta::{apply_delta, delta};
use crate::model::{Category, PanelState, Scope, SiteFlags, SitePolicy};
use crate::patch::Slices;
use crate::persist::{publish, PersistFields, PersistSink};
use crate::site_policy::reset_trust_restrict_pause;

// =============================================================================
// Tally-Tracking Updates
// =============================================================================

impl Category {
    /// Update the site flags of tracker `index`, moving the site tally by the
    /// change in effective blocked state.
    pub(crate) fn update_site(&mut self, index: usize, update: impl FnOnce(&mut SiteFlags)) {
        let Self { site, trackers, .. } = self;
        let Some(flags) = trackers.get_mut(index).and_then(|t| t.site.as_mut()) else {
            return;
        };
        let before = flags.is_blocked();
        update(flags);
        let change = delta(before, flags.is_blocked());
        if flags.shown {
            if let Some(tally) = site.as_mut() {
                tally.num_blocked = apply_delta(tally.num_blocked, change);
            }
        }
    }

    /// Set the global blocked flag of tracker `index`, moving the global tally.
    pub(crate) fn set_global_blocked(&mut self, index: usize, blocked: bool) {
        let Self { global, trackers, .. } = self;
        let Some(flags) = trackers.get_mut(index).and_then(|t| t.global.as_mut()) else {
            return;
        };
        let change = delta(flags.blocked, blocked);
        flags.blocked = blocked;
        if flags.shown {
            if let Some(tally) = global.as_mut() {
                tally.num_blocked = apply_delta(tally.num_blocked, change);
            }
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Trust, restrict or block one tracker on the current site.
pub fn set_site_tracker_policy(
    state: &mut PanelState,
    policy: &SiteTrackerPolicy,
    sink: &mut dyn PersistSink,
) -> Slices {
    let app_id = policy.app_id;
    let block = policy.block;
    let restrict = policy.restrict;
    let mut trust = policy.trust;
    if trust && restrict {
        log::warn!("tracker {} both trusted and restricted; keeping restrict", app_id);
        trust = false;
    }

    let mut slices = Slices::SITE_OVERRIDES | Slices::SELECTED_APP_IDS;

    match state.table.locate(&policy.cat_id, app_id, Scope::Site) {
        Some((ci, ti)) => {
            state.table.categories[ci].update_site(ti, |flags| {
                flags.ss_allowed = trust;
                flags.ss_blocked = restrict;
                flags.blocked = block;
            });
            slices |= Slices::SITE_CATEGORIES;
        }
        None => log::debug!("site tracker {}/{} not shown; skipping", policy.cat_id, app_id),
    }

    // Trust and restrict are site-only; a plain block also applies globally
    if !trust && !restrict {
        if let Some((ci, ti)) = state.table.locate_by_id(app_id, Scope::Global) {
            state.table.categories[ci].set_global_blocked(ti, block);
            slices |= Slices::GLOBAL_CATEGORIES;
        }
    }

    let host = state.summary.site_key();
    if host.is_empty() {
        log::debug!("no page host; site overrides for {} left unchanged", app_id);
    } else {
        state.overrides.record(&host, app_id, trust, restrict);
    }
    state.sync_selected(app_id, block);

    let site_policy = state.summary.site_policy;
    let agrees = (trust && site_policy == SitePolicy::Whitelisted)
        || (restrict && site_policy == SitePolicy::Restricted);
    if !agrees {
        slices |= reset_trust_restrict_pause(state, sink);
    }

    publish(sink, state, PersistFields::TRACKER_POLICY);
    slices
}

/// Block or unblock one tracker in the global list.
pub fn set_global_tracker_policy(
    state: &mut PanelState,
    policy: &GlobalTrackerPolicy,
    sink: &mut dyn PersistSink,
) -> Slices {
    let app_id = policy.app_id;
    let block = policy.block;
    let mut slices = Slices::SELECTED_APP_IDS;

    match state.table.locate(&policy.cat_id, app_id, Scope::Global) {
        Some((ci, ti)) => {
            state.table.categories[ci].set_global_blocked(ti, block);
            slices |= Slices::GLOBAL_CATEGORIES;
        }
        None => log::debug!("global tracker {}/{} not shown; skipping", policy.cat_id, app_id),
    }

    // A site-specific override always wins over a global change
    if let Some((ci, ti)) = state.table.locate_by_id(app_id, Scope::Site) {
        let category = &mut state.table.categories[ci];
        let overridden = category.trackers[ti].site.is_some_and(|f| f.has_override());
        if !overridden {
            category.update_site(ti, |flags| flags.blocked = block);
            slices |= Slices::SITE_CATEGORIES;
        }
    }

    state.sync_selected(app_id, block);
    publish(sink, state, PersistFields::SELECTED_APP_IDS);
    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AppId, GlobalFlags, Tally, Tracker};
    use crate::persist::RecordingSink;

    fn tracker(id: u32, site: Option<SiteFlags>, global: Option<GlobalFlags>) -> Tracker {
        Tracker { id: AppId(id), name: format!("t{id}"), site, global }
    }

    fn shown_site(blocked: bool) -> Option<SiteFlags> {
        Some(SiteFlags { shown: true, blocked, ..Default::default() })
    }

    fn shown_global(blocked: bool) -> Option<GlobalFlags> {
        Some(GlobalFlags { shown: true, blocked })
    }

    fn state() -> PanelState {
        let mut category = Category::new("ads", "Advertising");
        category.trackers = vec![
            tracker(1, shown_site(false), shown_global(false)),
            tracker(2, shown_site(true), shown_global(true)),
            tracker(3, None, shown_global(false)),
        ];
        category.site = Some(Tally { num_total: 2, num_blocked: 1 });
        category.global = Some(Tally { num_total: 3, num_blocked: 1 });

        let mut state = PanelState::default();
        state.summary.page_host = "example.com".into();
        state.table.categories.push(category);
        state.selected_app_ids.set(AppId(2), true);
        state
    }

    fn site_policy(app_id: u32, trust: bool, restrict: bool, block: bool) -> SiteTrackerPolicy {
        SiteTrackerPolicy { app_id: AppId(app_id), cat_id: "ads".into(), trust, restrict, block }
    }

    #[test]
    fn test_update_site_ignores_hidden_for_tally() {
        let mut category = Category::new("x", "X");
        category.site = Some(Tally { num_total: 1, num_blocked: 0 });
        category.trackers.push(tracker(9, Some(SiteFlags::default()), None));
        category.update_site(0, |f| f.blocked = true);
        assert_eq!(category.site.unwrap().num_blocked, 0);
        assert!(category.trackers[0].site.unwrap().blocked);
    }

    #[test]
    fn test_block_mirrors_to_global() {
        let mut state = state();
        let mut sink = RecordingSink::new();
        let slices = set_site_tracker_policy(&mut state, &site_policy(1, false, false, true), &mut sink);

        let category = &state.table.categories[0];
        assert_eq!(category.site.unwrap().num_blocked, 2);
        assert_eq!(category.global.unwrap().num_blocked, 2);
        assert!(state.selected_app_ids.contains(AppId(1)));
        assert!(slices.contains(Slices::SITE_CATEGORIES | Slices::GLOBAL_CATEGORIES));

        let message = sink.last().unwrap();
        assert_eq!(message.fields(), PersistFields::TRACKER_POLICY);
    }

    #[test]
    fn test_restrict_stays_on_site() {
        let mut state = state();
        set_site_tracker_policy(&mut state, &site_policy(1, false, true, false), &mut RecordingSink::new());

        let category = &state.table.categories[0];
        let flags = category.trackers[0].site.unwrap();
        assert!(flags.ss_blocked && !flags.ss_allowed);
        assert_eq!(category.site.unwrap().num_blocked, 2);
        assert_eq!(category.global.unwrap().num_blocked, 1);
        assert_eq!(state.overrides.blocks_for("example.com"), &[AppId(1)]);
        assert!(!state.selected_app_ids.contains(AppId(1)));
    }

    #[test]
    fn test_trust_keeps_id_selected_while_globally_blocked() {
        let mut state = state();
        set_site_tracker_policy(&mut state, &site_policy(2, true, false, false), &mut RecordingSink::new());

        let category = &state.table.categories[0];
        assert_eq!(category.site.unwrap().num_blocked, 0);
        assert!(category.trackers[1].global.unwrap().blocked);
        assert!(state.selected_app_ids.contains(AppId(2)));
        assert_eq!(state.overrides.unblocks_for("example.com"), &[AppId(2)]);
    }

    #[test]
    fn test_trust_and_restrict_together_keeps_restrict() {
        let mut state = state();
        set_site_tracker_policy(&mut state, &site_policy(1, true, true, false), &mut RecordingSink::new());
        let flags = state.table.categories[0].trackers[0].site.unwrap();
        assert!(flags.ss_blocked && !flags.ss_allowed);
        assert!(state.overrides.unblocks_for("example.com").is_empty());
    }

    #[test]
    fn test_site_miss_still_records_override() {
        let mut state = state();
        let slices = set_site_tracker_policy(&mut state, &site_policy(3, false, true, false), &mut RecordingSink::new());
        assert!(!slices.contains(Slices::SITE_CATEGORIES));
        assert_eq!(state.overrides.blocks_for("example.com"), &[AppId(3)]);
        assert_eq!(state.table.categories[0].site.unwrap().num_blocked, 1);
    }

    #[test]
    fn test_matching_site_policy_is_kept() {
        let mut state = state();
        state.summary.site_whitelist.push("example.com".into());
        state.summary.site_policy = SitePolicy::Whitelisted;
        let mut sink = RecordingSink::new();

        set_site_tracker_policy(&mut state, &site_policy(1, true, false, false), &mut sink);
        assert_eq!(state.summary.site_policy, SitePolicy::Whitelisted);
        assert_eq!(sink.messages.len(), 1);

        set_site_tracker_policy(&mut state, &site_policy(1, false, false, true), &mut sink);
        assert_eq!(state.summary.site_policy, SitePolicy::None);
        assert!(state.summary.site_whitelist.is_empty());
        // Site policy message followed by the tracker message
        assert_eq!(sink.messages.len(), 3);
        assert_eq!(sink.messages[1].fields(), PersistFields::SITE_POLICY);
    }

    #[test]
    fn test_global_block_mirrors_to_plain_site_tracker() {
        let mut state = state();
        let mut sink = RecordingSink::new();
        let policy = GlobalTrackerPolicy { app_id: AppId(1), cat_id: "ads".into(), block: true };
        set_global_tracker_policy(&mut state, &policy, &mut sink);

        let category = &state.table.categories[0];
        assert!(category.trackers[0].site.unwrap().blocked);
        assert_eq!(category.site.unwrap().num_blocked, 2);
        assert_eq!(category.global.unwrap().num_blocked, 2);
        assert_eq!(sink.last().unwrap().fields(), PersistFields::SELECTED_APP_IDS);
    }

    #[test]
    fn test_global_change_skips_overridden_site_tracker() {
        let mut state = state();
        state.table.categories[0].update_site(0, |f| f.ss_allowed = true);
        let policy = GlobalTrackerPolicy { app_id: AppId(1), cat_id: "ads".into(), block: true };
        let slices = set_global_tracker_policy(&mut state, &policy, &mut RecordingSink::new());

        let category = &state.table.categories[0];
        assert!(!category.trackers[0].site.unwrap().blocked);
        assert_eq!(category.site.unwrap().num_blocked, 1);
        assert!(!slices.contains(Slices::SITE_CATEGORIES));
        assert!(state.selected_app_ids.contains(AppId(1)));
    }

    #[test]
    fn test_global_unblock_of_unknown_tracker_drops_selection() {
        let mut state = state();
        state.selected_app_ids.set(AppId(77), true);
        let policy = GlobalTrackerPolicy { app_id: AppId(77), cat_id: "ads".into(), block: false };
        let slices = set_global_tracker_policy(&mut state, &policy, &mut RecordingSink::new());
        assert_eq!(slices, Slices::SELECTED_APP_IDS);
        assert!(!state.selected_app_ids.contains(AppId(77)));
    }
}
