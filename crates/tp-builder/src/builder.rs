use std::collections::{BTreeMap, HashSet};

use tp_core::model::{AppId, FeatureFlags, SiteSummary};
use tp_core::snapshot::{BlockingWire, CategoryWire, SettingsWire, SummaryWire, TrackerWire};
use tp_core::{resolve_site_key, PanelSnapshot, PersistedFields};

use crate::catalog::{BuildError, CatalogTracker, PageReport, TrackerCatalog};

pub struct BuildStats {
    pub global_trackers: usize,
    pub site_trackers: usize,
    pub hidden_duplicates: usize,
    pub unknown_detections: usize,
}

/// Assemble the snapshot a panel opens with.
pub fn build_snapshot(
    stored: &PersistedFields,
    catalog: &TrackerCatalog,
    page: &PageReport,
) -> Result<PanelSnapshot, BuildError> {
    build_snapshot_with_stats(stored, catalog, page).map(|(snapshot, _)| snapshot)
}

pub fn build_snapshot_with_stats(
    stored: &PersistedFields,
    catalog: &TrackerCatalog,
    page: &PageReport,
) -> Result<(PanelSnapshot, BuildStats), BuildError> {
    catalog.validate()?;

    let selected = stored.selected_app_ids.clone().unwrap_or_default();
    let unblocks = stored.site_specific_unblocks.clone().unwrap_or_default();
    let blocks = stored.site_specific_blocks.clone().unwrap_or_default();
    let host = resolve_site_key(&page.page_host);

    let mut stats = BuildStats {
        global_trackers: catalog.trackers.len(),
        site_trackers: 0,
        hidden_duplicates: 0,
        unknown_detections: 0,
    };

    // Global tree: the whole catalog
    let global_categories = catalog
        .categories
        .iter()
        .map(|category| {
            let trackers = catalog
                .trackers
                .iter()
                .filter(|t| t.cat == category.id)
                .map(|t| TrackerWire {
                    id: t.id,
                    name: t.name.clone(),
                    cat_id: t.cat.clone(),
                    should_show: true,
                    blocked: selected.contains(t.id),
                    ss_allowed: None,
                    ss_blocked: None,
                })
                .collect();
            tree_category(&category.id, &category.name, trackers)
        })
        .collect();

    // Site tree: detections resolved against the catalog, in detection order
    let trusted = host_list(&unblocks, &host);
    let restricted = host_list(&blocks, &host);
    let mut seen = HashSet::new();
    let mut detected: Vec<(&CatalogTracker, bool)> = Vec::new();
    for &app_id in &page.trackers {
        let Some(tracker) = catalog.tracker(app_id) else {
            log::warn!("detected tracker {} is not in the catalog; skipping", app_id);
            stats.unknown_detections += 1;
            continue;
        };
        let first = seen.insert(app_id);
        if !first {
            stats.hidden_duplicates += 1;
        }
        detected.push((tracker, first));
    }
    stats.site_trackers = seen.len();

    let site_categories = catalog
        .categories
        .iter()
        .filter_map(|category| {
            let trackers: Vec<TrackerWire> = detected
                .iter()
                .filter(|(t, _)| t.cat == category.id)
                .map(|&(t, shown)| {
                    let ss_blocked = restricted.contains(&t.id);
                    let ss_allowed = trusted.contains(&t.id) && !ss_blocked;
                    if ss_blocked && trusted.contains(&t.id) {
                        log::warn!("tracker {} both trusted and restricted on '{}'", t.id, host);
                    }
                    TrackerWire {
                        id: t.id,
                        name: t.name.clone(),
                        cat_id: t.cat.clone(),
                        should_show: shown,
                        blocked: selected.contains(t.id),
                        ss_allowed: Some(ss_allowed),
                        ss_blocked: Some(ss_blocked),
                    }
                })
                .collect();
            (!trackers.is_empty()).then(|| tree_category(&category.id, &category.name, trackers))
        })
        .collect();

    let features = FeatureFlags {
        enable_anti_tracking: stored.enable_anti_tracking.unwrap_or(true),
        enable_ad_block: stored.enable_ad_block.unwrap_or(true),
        enable_smart_block: stored.enable_smart_block.unwrap_or(true),
    };

    let summary = SiteSummary {
        page_host: page.page_host.clone(),
        site_whitelist: stored.site_whitelist.clone().unwrap_or_default(),
        site_blacklist: stored.site_blacklist.clone().unwrap_or_default(),
        paused_blocking: stored.paused_blocking.unwrap_or(false),
        ..Default::default()
    };
    let site_policy = summary.derive_site_policy();

    log::debug!(
        "built snapshot for '{}': {} global, {} on page",
        host,
        stats.global_trackers,
        stats.site_trackers
    );

    let snapshot = PanelSnapshot {
        summary: SummaryWire {
            page_host: summary.page_host,
            site_whitelist: summary.site_whitelist,
            site_blacklist: summary.site_blacklist,
            paused_blocking: summary.paused_blocking,
            site_policy,
        },
        blocking: BlockingWire {
            categories: site_categories,
            selected_app_ids: selected,
            site_specific_unblocks: unblocks,
            site_specific_blocks: blocks,
        },
        settings: SettingsWire { categories: global_categories, features },
    };
    Ok((snapshot, stats))
}

fn host_list<'a>(lists: &'a BTreeMap<String, Vec<AppId>>, host: &str) -> &'a [AppId] {
    lists.get(host).map(Vec::as_slice).unwrap_or_default()
}

/// `num_total` counts every listing, hidden duplicates included; `num_blocked`
/// only the shown ones.
fn tree_category(id: &str, name: &str, trackers: Vec<TrackerWire>) -> CategoryWire {
    let num_total = trackers.len();
    let num_blocked = trackers
        .iter()
        .filter(|t| t.should_show && (t.blocked || t.ss_blocked.unwrap_or(false)))
        .count();
    CategoryWire {
        id: id.to_string(),
        name: name.to_string(),
        num_total: u32::try_from(num_total).unwrap_or(u32::MAX),
        num_blocked: u32::try_from(num_blocked).unwrap_or(u32::MAX),
        trackers,
    }
}
