//! Snapshot loading and rendering
//!
//! Loading folds the site tree and the global tree into one tracker table.
//! A site listing joins the first row of the same id in the same category
//! that has no site record yet; anything else (a hidden duplicate, a tracker
//! filed under another category on this site) gets a row of its own, so every
//! listing survives and renders back out where it came from.

use std::collections::HashMap;

use crate::model::{
    AppId, Category, GlobalFlags, PanelState, Scope, SiteFlags, SiteOverrides, SiteSummary,
    Tally, Tracker, TrackerTable,
};
use super::format::*;

/// Error type for snapshot loading.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Category without id (name: '{0}')")]
    MissingCategoryId(String),
}

/// Parse and load a JSON snapshot.
pub fn load_snapshot_json(text: &str) -> Result<PanelState, SnapshotError> {
    let snapshot: PanelSnapshot = serde_json::from_str(text)?;
    PanelState::from_snapshot(snapshot)
}

impl PanelState {
    /// Build the in-memory state from a snapshot.
    ///
    /// Counts are recomputed from the tracker flags; snapshot counts that
    /// disagree are logged and replaced.
    pub fn from_snapshot(snapshot: PanelSnapshot) -> Result<Self, SnapshotError> {
        let PanelSnapshot { summary, blocking, settings } = snapshot;

        let mut builder = TableBuilder::default();
        for category in settings.categories {
            builder.add_category(category, Scope::Global)?;
        }
        for category in blocking.categories {
            builder.add_category(category, Scope::Site)?;
        }
        let table = builder.finish();

        let mut summary = SiteSummary {
            page_host: summary.page_host,
            site_whitelist: summary.site_whitelist,
            site_blacklist: summary.site_blacklist,
            paused_blocking: summary.paused_blocking,
            site_policy: summary.site_policy,
        };
        let key = summary.site_key();
        if summary.is_trusted() && summary.is_restricted() {
            log::warn!("host '{}' is both trusted and restricted; keeping trust", key);
            summary.site_blacklist.retain(|h| *h != key);
        }
        let derived = summary.derive_site_policy();
        if derived != summary.site_policy {
            log::warn!(
                "sitePolicy {:?} disagrees with site lists for '{}'; using {:?}",
                summary.site_policy,
                key,
                derived
            );
            summary.site_policy = derived;
        }

        Ok(Self {
            summary,
            table,
            overrides: SiteOverrides {
                site_specific_unblocks: blocking.site_specific_unblocks,
                site_specific_blocks: blocking.site_specific_blocks,
            },
            selected_app_ids: blocking.selected_app_ids,
            features: settings.features,
        })
    }

    /// Render the full snapshot back out.
    pub fn to_snapshot(&self) -> PanelSnapshot {
        PanelSnapshot {
            summary: render_summary(&self.summary),
            blocking: BlockingWire {
                categories: render_tree(&self.table, Scope::Site),
                selected_app_ids: self.selected_app_ids.clone(),
                site_specific_unblocks: self.overrides.site_specific_unblocks.clone(),
                site_specific_blocks: self.overrides.site_specific_blocks.clone(),
            },
            settings: SettingsWire {
                categories: render_tree(&self.table, Scope::Global),
                features: self.features,
            },
        }
    }
}

pub fn render_summary(summary: &SiteSummary) -> SummaryWire {
    SummaryWire {
        page_host: summary.page_host.clone(),
        site_whitelist: summary.site_whitelist.clone(),
        site_blacklist: summary.site_blacklist.clone(),
        paused_blocking: summary.paused_blocking,
        site_policy: summary.site_policy,
    }
}

/// Render the `scope` view of the table as the UI's category tree.
pub fn render_tree(table: &TrackerTable, scope: Scope) -> Vec<CategoryWire> {
    table
        .categories
        .iter()
        .filter_map(|category| {
            let tally = category.tally(scope)?;
            let trackers = category
                .trackers
                .iter()
                .filter_map(|tracker| render_tracker(tracker, &category.id, scope))
                .collect();
            Some(CategoryWire {
                id: category.id.clone(),
                name: category.name.clone(),
                num_total: tally.num_total,
                num_blocked: tally.num_blocked,
                trackers,
            })
        })
        .collect()
}

fn render_tracker(tracker: &Tracker, cat_id: &str, scope: Scope) -> Option<TrackerWire> {
    let (should_show, blocked, ss_allowed, ss_blocked) = match scope {
        Scope::Site => {
            let flags = tracker.site?;
            (flags.shown, flags.blocked, Some(flags.ss_allowed), Some(flags.ss_blocked))
        }
        Scope::Global => {
            let flags = tracker.global?;
            (flags.shown, flags.blocked, None, None)
        }
    };
    Some(TrackerWire {
        id: tracker.id,
        name: tracker.name.clone(),
        cat_id: cat_id.to_string(),
        should_show,
        blocked,
        ss_allowed,
        ss_blocked,
    })
}

// =============================================================================
// Table Builder
// =============================================================================

#[derive(Default)]
struct TableBuilder {
    table: TrackerTable,
    /// (category index, tracker id) -> rows of that id in the category
    rows: HashMap<(usize, AppId), Vec<usize>>,
    /// Tally values the snapshot claimed, for drift reporting.
    claimed: Vec<(usize, Scope, u32)>,
}

impl TableBuilder {
    fn add_category(&mut self, wire: CategoryWire, scope: Scope) -> Result<(), SnapshotError> {
        if wire.id.is_empty() {
            return Err(SnapshotError::MissingCategoryId(wire.name));
        }

        let ci = match self.table.category_index(&wire.id) {
            Some(ci) => ci,
            None => {
                self.table.categories.push(Category::new(wire.id.clone(), wire.name.clone()));
                self.table.categories.len() - 1
            }
        };

        let category = &mut self.table.categories[ci];
        let tally = Tally { num_total: wire.num_total, num_blocked: 0 };
        match scope {
            Scope::Site => category.site = Some(tally),
            Scope::Global => category.global = Some(tally),
        }
        self.claimed.push((ci, scope, wire.num_blocked));

        for tracker in wire.trackers {
            if !tracker.cat_id.is_empty() && tracker.cat_id != wire.id {
                log::debug!(
                    "tracker {} lists catId '{}' but sits in '{}'",
                    tracker.id,
                    tracker.cat_id,
                    wire.id
                );
            }
            self.add_tracker(ci, tracker, scope);
        }
        Ok(())
    }

    fn add_tracker(&mut self, ci: usize, wire: TrackerWire, scope: Scope) {
        let trackers = &mut self.table.categories[ci].trackers;
        let rows = self.rows.entry((ci, wire.id)).or_default();

        let free = rows.iter().copied().find(|&ti| !trackers[ti].has_record(scope));
        let ti = match free {
            Some(ti) => ti,
            None => {
                if !rows.is_empty() {
                    log::debug!("tracker {} listed again in {} tree; keeping its own row", wire.id, scope);
                }
                trackers.push(Tracker {
                    id: wire.id,
                    name: wire.name.clone(),
                    site: None,
                    global: None,
                });
                rows.push(trackers.len() - 1);
                trackers.len() - 1
            }
        };

        let tracker = &mut trackers[ti];
        match scope {
            Scope::Site => {
                let mut flags = SiteFlags {
                    shown: wire.should_show,
                    blocked: wire.blocked,
                    ss_allowed: wire.ss_allowed.unwrap_or(false),
                    ss_blocked: wire.ss_blocked.unwrap_or(false),
                };
                if flags.ss_allowed && flags.ss_blocked {
                    log::warn!("tracker {} is both trusted and restricted; keeping restrict", wire.id);
                    flags.ss_allowed = false;
                }
                tracker.site = Some(flags);
            }
            Scope::Global => {
                tracker.global = Some(GlobalFlags { shown: wire.should_show, blocked: wire.blocked });
            }
        }
    }

    fn finish(mut self) -> TrackerTable {
        for category in &mut self.table.categories {
            for scope in [Scope::Site, Scope::Global] {
                let count = category.recount(scope);
                if let Some(tally) = category.tally_mut(scope) {
                    tally.num_blocked = count;
                }
            }
        }
        for (ci, scope, claimed) in self.claimed {
            let category = &self.table.categories[ci];
            if let Some(tally) = category.tally(scope) {
                if tally.num_blocked != claimed {
                    log::warn!(
                        "category '{}' ({}) claimed {} blocked, flags say {}",
                        category.id,
                        scope,
                        claimed,
                        tally.num_blocked
                    );
                }
            }
        }
        self.table
    }
}
