//! Consistency checks over a panel state
//!
//! Handlers maintain these incrementally; this module rescans everything and
//! reports what does not hold. Used by tests, the CLI and the optional
//! post-command verification.

use crate::model::{AppId, PanelState, Scope};

/// One broken consistency rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("category '{category}' ({scope}) records {recorded} blocked, scan finds {actual}")]
    CountDrift {
        category: String,
        scope: Scope,
        recorded: u32,
        actual: u32,
    },
    #[error("tracker {0} is both trusted and restricted on this site")]
    OverrideConflict(AppId),
    #[error("host '{0}' is both whitelisted and blacklisted")]
    HostConflict(String),
    #[error("tracker {app_id} blocked={blocked} but selected={selected}")]
    SelectionOutOfSync {
        app_id: AppId,
        blocked: bool,
        selected: bool,
    },
}

impl PanelState {
    /// Rescan the state and list every violated invariant.
    pub fn check_invariants(&self) -> Vec<Violation> {
        let mut violations = Vec::new();

        for category in &self.table.categories {
            for scope in [Scope::Site, Scope::Global] {
                if let Some(tally) = category.tally(scope) {
                    let actual = category.recount(scope);
                    if tally.num_blocked != actual {
                        violations.push(Violation::CountDrift {
                            category: category.id.clone(),
                            scope,
                            recorded: tally.num_blocked,
                            actual,
                        });
                    }
                }
            }
        }

        for tracker in self.table.trackers() {
            if tracker.site.is_some_and(|f| f.ss_allowed && f.ss_blocked) {
                violations.push(Violation::OverrideConflict(tracker.id));
            }
        }

        // Selection follows the id, across all of its rows
        for (app_id, blocked) in self.table.blocked_by_id() {
            let Some(blocked) = blocked else {
                continue;
            };
            let selected = self.selected_app_ids.contains(app_id);
            if blocked != selected {
                violations.push(Violation::SelectionOutOfSync { app_id, blocked, selected });
            }
        }

        for host in &self.summary.site_whitelist {
            if self.summary.site_blacklist.contains(host) {
                violations.push(Violation::HostConflict(host.clone()));
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, GlobalFlags, SiteFlags, Tally, Tracker};

    #[test]
    fn test_clean_state_has_no_violations() {
        assert!(PanelState::default().check_invariants().is_empty());
    }

    #[test]
    fn test_reports_each_kind() {
        let mut category = Category::new("ads", "Advertising");
        category.site = Some(Tally { num_total: 1, num_blocked: 0 });
        category.trackers.push(Tracker {
            id: AppId(1),
            name: "a".into(),
            site: Some(SiteFlags { shown: true, blocked: true, ss_allowed: true, ss_blocked: true }),
            global: Some(GlobalFlags { shown: false, blocked: false }),
        });

        let mut state = PanelState::default();
        state.table.categories.push(category);
        state.summary.site_whitelist.push("a.com".into());
        state.summary.site_blacklist.push("a.com".into());

        let violations = state.check_invariants();
        assert_eq!(violations.len(), 4);
        assert!(violations.contains(&Violation::OverrideConflict(AppId(1))));
        assert!(violations.contains(&Violation::HostConflict("a.com".into())));
        assert!(violations.contains(&Violation::CountDrift {
            category: "ads".into(),
            scope: Scope::Site,
            recorded: 0,
            actual: 1,
        }));
        assert!(violations.contains(&Violation::SelectionOutOfSync {
            app_id: AppId(1),
            blocked: true,
            selected: false,
        }));
    }
}
