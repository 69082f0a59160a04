//! Whole-site trust, restrict and pause
//!
//! Trust and restrict are list memberships of the normalized page host. A
//! host is in at most one of the two lists; toggling one side always removes
//! it from the other and lifts a pause.

use crate::model::{PanelState, SitePolicy};
use crate::patch::Slices;
use crate::persist::{publish, PersistFields, PersistSink};

/// Trust the current site, or untrust it if already trusted.
pub fn toggle_trust(state: &mut PanelState, sink: &mut dyn PersistSink) -> Slices {
    toggle_listed(state, sink, SitePolicy::Whitelisted)
}

/// Restrict the current site, or lift the restriction if already restricted.
pub fn toggle_restrict(state: &mut PanelState, sink: &mut dyn PersistSink) -> Slices {
    toggle_listed(state, sink, SitePolicy::Restricted)
}

/// Flip the pause flag. The site lists are left alone.
pub fn toggle_pause(state: &mut PanelState, sink: &mut dyn PersistSink) -> Slices {
    state.summary.paused_blocking = !state.summary.paused_blocking;
    log::debug!("paused_blocking -> {}", state.summary.paused_blocking);
    publish(sink, state, PersistFields::SITE_POLICY);
    Slices::SUMMARY
}

/// Undo whichever blanket policy is active on the current site.
///
/// Called after a per-tracker or bulk decision that contradicts the blanket
/// policy. Trust is undone before restrict; a pause still standing afterwards
/// is lifted as well. Returns no slices when nothing was active.
pub fn reset_trust_restrict_pause(state: &mut PanelState, sink: &mut dyn PersistSink) -> Slices {
    let mut slices = Slices::empty();
    if state.summary.is_trusted() {
        slices |= toggle_trust(state, sink);
    } else if state.summary.is_restricted() {
        slices |= toggle_restrict(state, sink);
    }
    if state.summary.paused_blocking {
        slices |= toggle_pause(state, sink);
    }
    slices
}

fn toggle_listed(state: &mut PanelState, sink: &mut dyn PersistSink, policy: SitePolicy) -> Slices {
    let key = state.summary.site_key();
    if key.is_empty() {
        log::warn!("no page host; ignoring {:?} toggle", policy);
        return Slices::empty();
    }

    let summary = &mut state.summary;
    let (own, other) = match policy {
        SitePolicy::Restricted => (&mut summary.site_blacklist, &mut summary.site_whitelist),
        _ => (&mut summary.site_whitelist, &mut summary.site_blacklist),
    };

    let listed = own.iter().any(|h| *h == key);
    if listed {
        own.retain(|h| *h != key);
    } else {
        other.retain(|h| *h != key);
        own.push(key.clone());
    }
    summary.paused_blocking = false;
    summary.site_policy = if listed { SitePolicy::None } else { policy };

    log::debug!("site '{}' policy -> {:?}", key, summary.site_policy);
    publish(sink, state, PersistFields::SITE_POLICY);
    Slices::SUMMARY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::RecordingSink;

    fn state_for(host: &str) -> PanelState {
        let mut state = PanelState::default();
        state.summary.page_host = host.to_string();
        state
    }

    #[test]
    fn test_toggle_trust_moves_host_from_blacklist() {
        let mut state = state_for("https://www.example.com");
        state.summary.site_blacklist.push("example.com".into());
        state.summary.site_policy = SitePolicy::Restricted;
        state.summary.paused_blocking = true;
        let mut sink = RecordingSink::new();

        let slices = toggle_trust(&mut state, &mut sink);
        assert_eq!(slices, Slices::SUMMARY);
        assert_eq!(state.summary.site_whitelist, vec!["example.com".to_string()]);
        assert!(state.summary.site_blacklist.is_empty());
        assert!(!state.summary.paused_blocking);
        assert_eq!(state.summary.site_policy, SitePolicy::Whitelisted);

        assert_eq!(sink.messages.len(), 1);
        assert_eq!(sink.messages[0].fields(), PersistFields::SITE_POLICY);
    }

    #[test]
    fn test_toggle_twice_restores_lists() {
        let mut state = state_for("example.com");
        state.summary.site_whitelist.push("other.com".into());
        let before = state.summary.clone();
        let mut sink = RecordingSink::new();

        toggle_restrict(&mut state, &mut sink);
        assert_eq!(state.summary.site_policy, SitePolicy::Restricted);
        toggle_restrict(&mut state, &mut sink);
        assert_eq!(state.summary, before);

        toggle_pause(&mut state, &mut sink);
        toggle_pause(&mut state, &mut sink);
        assert_eq!(state.summary, before);
        assert_eq!(sink.messages.len(), 4);
    }

    #[test]
    fn test_toggle_pause_keeps_policy() {
        let mut state = state_for("example.com");
        state.summary.site_whitelist.push("example.com".into());
        state.summary.site_policy = SitePolicy::Whitelisted;

        toggle_pause(&mut state, &mut RecordingSink::new());
        assert!(state.summary.paused_blocking);
        assert_eq!(state.summary.site_policy, SitePolicy::Whitelisted);
    }

    #[test]
    fn test_reset_with_nothing_active_is_silent() {
        let mut state = state_for("example.com");
        let mut sink = RecordingSink::new();
        assert!(reset_trust_restrict_pause(&mut state, &mut sink).is_empty());
        assert!(sink.messages.is_empty());
    }

    #[test]
    fn test_reset_lifts_pause_without_policy() {
        let mut state = state_for("example.com");
        state.summary.paused_blocking = true;
        let mut sink = RecordingSink::new();
        assert_eq!(reset_trust_restrict_pause(&mut state, &mut sink), Slices::SUMMARY);
        assert!(!state.summary.paused_blocking);
        assert_eq!(sink.messages.len(), 1);
    }

    #[test]
    fn test_reset_undoes_trust_and_pause_together() {
        let mut state = state_for("example.com");
        state.summary.site_whitelist.push("example.com".into());
        state.summary.site_policy = SitePolicy::Whitelisted;
        state.summary.paused_blocking = true;
        let mut sink = RecordingSink::new();

        reset_trust_restrict_pause(&mut state, &mut sink);
        assert!(state.summary.site_whitelist.is_empty());
        assert!(!state.summary.paused_blocking);
        assert_eq!(state.summary.site_policy, SitePolicy::None);
        // Untrusting already lifted the pause
        assert_eq!(sink.messages.len(), 1);
    }

    #[test]
    fn test_toggle_without_host_is_ignored() {
        let mut state = state_for("");
        let mut sink = RecordingSink::new();
        assert!(toggle_trust(&mut state, &mut sink).is_empty());
        assert!(state.summary.site_whitelist.is_empty());
        assert!(sink.messages.is_empty());
    }
}
