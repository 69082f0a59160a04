//! Block or unblock every visible tracker in a scope
//!
//! Tallies move through the same per-tracker deltas the single-tracker
//! handlers use, for both scopes; no category is rescanned.

use std::collections::BTreeSet;

use crate::command::BulkSetAll;
use crate::model::{AppId, Category, PanelState, Scope};
use crate::patch::Slices;
use crate::persist::{publish, PersistFields, PersistSink};
use crate::site_policy::reset_trust_restrict_pause;

fn targeted(category: &Category, scope: Scope, category_id: Option<&str>) -> bool {
    category.in_scope(scope) && category_id.map_or(true, |id| category.id == id)
}

/// Apply a bulk block/unblock.
pub fn bulk_set_all(state: &mut PanelState, command: &BulkSetAll, sink: &mut dyn PersistSink) -> Slices {
    let block = command.block;
    let category_id = command.category_id.as_deref();

    // Ids whose selected entry must be re-derived
    let mut affected: BTreeSet<AppId> = BTreeSet::new();
    // Site trackers a bulk block stripped of trust/restrict
    let mut touched: Vec<AppId> = Vec::new();
    let mut slices = Slices::SITE_CATEGORIES | Slices::SITE_OVERRIDES | Slices::SELECTED_APP_IDS;

    match command.scope {
        Scope::Site => {
            for category in state.table.categories.iter_mut() {
                if !targeted(category, Scope::Site, category_id) {
                    continue;
                }
                for ti in 0..category.trackers.len() {
                    if !category.trackers[ti].is_shown(Scope::Site) {
                        continue;
                    }
                    category.update_site(ti, |flags| {
                        flags.blocked = block;
                        if block {
                            flags.ss_allowed = false;
                            flags.ss_blocked = false;
                        }
                    });
                    let id = category.trackers[ti].id;
                    affected.insert(id);
                    if block {
                        touched.push(id);
                    }
                }
            }
            // The global listing may sit in another category, or another row
            if block {
                let global_rows = state.table.shown_rows(Scope::Global);
                for app_id in &touched {
                    if let Some(&(ci, ti)) = global_rows.get(app_id) {
                        state.table.categories[ci].set_global_blocked(ti, true);
                        slices |= Slices::GLOBAL_CATEGORIES;
                    }
                }
            }
        }
        Scope::Global => {
            slices |= Slices::GLOBAL_CATEGORIES;
            for category in state.table.categories.iter_mut() {
                let global = targeted(category, Scope::Global, category_id);
                let site = targeted(category, Scope::Site, category_id);
                for ti in 0..category.trackers.len() {
                    let tracker = &category.trackers[ti];
                    let id = tracker.id;
                    let in_global = global && tracker.is_shown(Scope::Global);
                    let in_site = site
                        && tracker.is_shown(Scope::Site)
                        && !tracker.site.is_some_and(|f| f.has_override());
                    if in_global {
                        category.set_global_blocked(ti, block);
                        affected.insert(id);
                    }
                    if in_site {
                        category.update_site(ti, |flags| flags.blocked = block);
                        affected.insert(id);
                    }
                }
            }
        }
    }

    let host = state.summary.site_key();
    if !host.is_empty() {
        for app_id in &touched {
            state.overrides.record(&host, *app_id, false, false);
        }
    }

    let blocked_by_id = state.table.blocked_by_id();
    for app_id in &affected {
        let blocked = blocked_by_id.get(app_id).copied().flatten().unwrap_or(block);
        state.selected_app_ids.set(*app_id, blocked);
    }

    log::debug!(
        "bulk {} {} ({}): {} trackers",
        if block { "block" } else { "unblock" },
        command.scope,
        category_id.unwrap_or("all categories"),
        affected.len()
    );

    if command.scope == Scope::Site {
        slices |= reset_trust_restrict_pause(state, sink);
    }

    publish(sink, state, PersistFields::TRACKER_POLICY);
    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GlobalFlags, SiteFlags, SitePolicy, Tally, Tracker};
    use crate::persist::RecordingSink;

    fn tracker(id: u32, site: Option<SiteFlags>, global: Option<GlobalFlags>) -> Tracker {
        Tracker { id: AppId(id), name: format!("t{id}"), site, global }
    }

    fn site(shown: bool, blocked: bool, ss_allowed: bool, ss_blocked: bool) -> Option<SiteFlags> {
        Some(SiteFlags { shown, blocked, ss_allowed, ss_blocked })
    }

    fn global(shown: bool, blocked: bool) -> Option<GlobalFlags> {
        Some(GlobalFlags { shown, blocked })
    }

    fn state() -> PanelState {
        let mut ads = Category::new("ads", "Advertising");
        ads.trackers = vec![
            tracker(1, site(true, false, true, false), global(true, false)),
            tracker(2, site(true, false, false, true), global(true, false)),
            tracker(3, site(false, false, false, false), global(true, false)),
            tracker(4, None, global(true, false)),
        ];
        ads.site = Some(Tally { num_total: 3, num_blocked: 1 });
        ads.global = Some(Tally { num_total: 4, num_blocked: 0 });

        let mut analytics = Category::new("analytics", "Analytics");
        analytics.trackers = vec![tracker(5, site(true, false, false, false), global(true, false))];
        analytics.site = Some(Tally { num_total: 1, num_blocked: 0 });
        analytics.global = Some(Tally { num_total: 1, num_blocked: 0 });

        let mut state = PanelState::default();
        state.summary.page_host = "example.com".into();
        state.table.categories = vec![ads, analytics];
        state.overrides.record("example.com", AppId(1), true, false);
        state.overrides.record("example.com", AppId(2), false, true);
        state
    }

    fn bulk(scope: Scope, block: bool, category_id: Option<&str>) -> BulkSetAll {
        BulkSetAll { scope, block, category_id: category_id.map(str::to_string) }
    }

    fn assert_counts_match(state: &PanelState) {
        for category in &state.table.categories {
            for scope in [Scope::Site, Scope::Global] {
                if let Some(tally) = category.tally(scope) {
                    assert_eq!(tally.num_blocked, category.recount(scope), "{} {}", category.id, scope);
                }
            }
        }
    }

    #[test]
    fn test_site_block_clears_overrides() {
        let mut state = state();
        let mut sink = RecordingSink::new();
        bulk_set_all(&mut state, &bulk(Scope::Site, true, None), &mut sink);

        let ads = &state.table.categories[0];
        let one = ads.trackers[0].site.unwrap();
        assert!(one.blocked && !one.ss_allowed && !one.ss_blocked);
        assert_eq!(ads.site.unwrap().num_blocked, 2);
        assert_eq!(state.table.categories[1].site.unwrap().num_blocked, 1);
        // Hidden site tracker untouched
        assert!(!ads.trackers[2].site.unwrap().blocked);
        assert!(state.overrides.is_empty());
        assert_counts_match(&state);
    }

    #[test]
    fn test_site_block_mirrors_to_global() {
        let mut state = state();
        bulk_set_all(&mut state, &bulk(Scope::Site, true, None), &mut RecordingSink::new());

        let ads = &state.table.categories[0];
        assert_eq!(ads.global.unwrap().num_blocked, 2);
        assert!(!ads.trackers[3].global.unwrap().blocked);
        for id in [1, 2, 5] {
            assert!(state.selected_app_ids.contains(AppId(id)));
        }
        assert!(!state.selected_app_ids.contains(AppId(4)));
        assert_counts_match(&state);
    }

    #[test]
    fn test_site_unblock_keeps_overrides_and_global() {
        let mut state = state();
        bulk_set_all(&mut state, &bulk(Scope::Site, true, None), &mut RecordingSink::new());
        state.overrides.record("example.com", AppId(5), false, true);
        state.table.categories[1].update_site(0, |f| f.ss_blocked = true);

        bulk_set_all(&mut state, &bulk(Scope::Site, false, None), &mut RecordingSink::new());
        let analytics = &state.table.categories[1];
        assert!(analytics.trackers[0].site.unwrap().ss_blocked);
        assert_eq!(analytics.site.unwrap().num_blocked, 1);
        assert_eq!(state.overrides.blocks_for("example.com"), &[AppId(5)]);
        // Global flags are only mirrored on block
        assert!(analytics.trackers[0].global.unwrap().blocked);
        assert!(state.selected_app_ids.contains(AppId(5)));
        assert_counts_match(&state);
    }

    #[test]
    fn test_site_bulk_resets_site_policy() {
        let mut state = state();
        state.summary.site_whitelist.push("example.com".into());
        state.summary.site_policy = SitePolicy::Whitelisted;
        let mut sink = RecordingSink::new();

        let slices = bulk_set_all(&mut state, &bulk(Scope::Site, true, None), &mut sink);
        assert!(slices.contains(Slices::SUMMARY));
        assert_eq!(state.summary.site_policy, SitePolicy::None);
        assert_eq!(sink.messages.len(), 2);
        assert_eq!(sink.last().unwrap().fields(), PersistFields::TRACKER_POLICY);
    }

    #[test]
    fn test_global_block_respects_site_overrides() {
        let mut state = state();
        let mut sink = RecordingSink::new();
        let slices = bulk_set_all(&mut state, &bulk(Scope::Global, true, None), &mut sink);
        assert!(!slices.contains(Slices::SUMMARY));

        let ads = &state.table.categories[0];
        assert_eq!(ads.global.unwrap().num_blocked, 4);
        // Trusted and restricted site trackers keep their own blocked flag
        assert!(!ads.trackers[0].site.unwrap().blocked);
        assert!(!ads.trackers[1].site.unwrap().blocked);
        assert!(state.table.categories[1].trackers[0].site.unwrap().blocked);
        assert_eq!(state.overrides.unblocks_for("example.com"), &[AppId(1)]);
        assert_eq!(state.selected_app_ids.len(), 5);
        assert_eq!(sink.messages.len(), 1);
        assert_counts_match(&state);
    }

    #[test]
    fn test_category_filter() {
        let mut state = state();
        bulk_set_all(&mut state, &bulk(Scope::Global, true, Some("analytics")), &mut RecordingSink::new());
        assert_eq!(state.table.categories[0].global.unwrap().num_blocked, 0);
        assert_eq!(state.table.categories[1].global.unwrap().num_blocked, 1);
        assert_eq!(state.table.categories[1].site.unwrap().num_blocked, 1);
        assert_eq!(state.selected_app_ids.len(), 1);

        bulk_set_all(&mut state, &bulk(Scope::Global, false, Some("missing")), &mut RecordingSink::new());
        assert_eq!(state.selected_app_ids.len(), 1);
        assert_counts_match(&state);
    }

    #[test]
    fn test_site_category_filter() {
        let mut state = state();
        state.summary.site_whitelist.push("example.com".into());
        state.summary.site_policy = SitePolicy::Whitelisted;
        let mut sink = RecordingSink::new();

        let slices = bulk_set_all(&mut state, &bulk(Scope::Site, true, Some("analytics")), &mut sink);

        let analytics = &state.table.categories[1];
        assert!(analytics.trackers[0].site.unwrap().blocked);
        assert!(analytics.trackers[0].global.unwrap().blocked);
        assert_eq!(analytics.site.unwrap().num_blocked, 1);
        assert_eq!(analytics.global.unwrap().num_blocked, 1);

        // Other categories keep their site flags, overrides and global flags
        let ads = &state.table.categories[0];
        assert!(ads.trackers[0].site.unwrap().ss_allowed);
        assert!(ads.trackers[1].site.unwrap().ss_blocked);
        assert!(!ads.trackers[0].site.unwrap().blocked);
        assert_eq!(ads.site.unwrap().num_blocked, 1);
        assert_eq!(ads.global.unwrap().num_blocked, 0);
        assert!(ads.trackers.iter().all(|t| !t.global.unwrap().blocked));
        assert_eq!(state.overrides.unblocks_for("example.com"), &[AppId(1)]);
        assert_eq!(state.overrides.blocks_for("example.com"), &[AppId(2)]);

        assert_eq!(state.selected_app_ids.len(), 1);
        assert!(state.selected_app_ids.contains(AppId(5)));

        // Trusted site becomes untrusted
        assert!(slices.contains(Slices::SUMMARY | Slices::GLOBAL_CATEGORIES));
        assert!(state.summary.site_whitelist.is_empty());
        assert_eq!(state.summary.site_policy, SitePolicy::None);
        assert_eq!(sink.messages.len(), 2);
        assert_eq!(sink.messages[0].fields(), PersistFields::SITE_POLICY);
        assert_counts_match(&state);
    }

    #[test]
    fn test_site_block_mirrors_by_id_across_categories() {
        let mut state = state();
        // Tracker 6 is filed under analytics on this site but under ads globally
        state.table.categories[0].trackers.push(tracker(6, None, global(true, false)));
        state.table.categories[0].global = Some(Tally { num_total: 5, num_blocked: 0 });
        state.table.categories[1].trackers.push(tracker(6, site(true, false, false, false), None));
        state.table.categories[1].site = Some(Tally { num_total: 2, num_blocked: 0 });

        bulk_set_all(&mut state, &bulk(Scope::Site, true, Some("analytics")), &mut RecordingSink::new());

        let ads = &state.table.categories[0];
        assert!(ads.trackers[4].global.unwrap().blocked);
        assert_eq!(ads.global.unwrap().num_blocked, 1);
        assert!(!ads.trackers[0].global.unwrap().blocked);
        assert_eq!(state.table.categories[1].site.unwrap().num_blocked, 2);
        assert!(state.selected_app_ids.contains(AppId(6)));
        assert!(state.check_invariants().is_empty());
    }
}
