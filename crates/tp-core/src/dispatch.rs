//! Command dispatch and panel sessions
//!
//! [`dispatch`] is total: unknown names and undecodable payloads produce an
//! empty patch. Each call runs to completion before returning; persistence
//! messages go out through the sink as the handlers finish.

use serde_json::Value;

use crate::bulk::bulk_set_all;
use crate::command::{Command, CommandError, ToggleFeature};
use crate::model::{Feature, PanelState};
use crate::options::EngineOptions;
use crate::patch::Slices;
use crate::persist::{publish, PersistFields, PersistSink};
use crate::reset::reset_all;
use crate::site_policy::{toggle_pause, toggle_restrict, toggle_trust};
use crate::snapshot::{Patch, PanelSnapshot, SnapshotError};
use crate::tracker::{set_global_tracker_policy, set_site_tracker_policy};

/// Apply one decoded command to `state` and return the changed slices.
pub fn apply(
    state: &mut PanelState,
    command: &Command,
    options: &EngineOptions,
    sink: &mut dyn PersistSink,
) -> Patch {
    log::debug!("apply {:?}", command);

    let slices = match command {
        Command::ToggleSiteTrust => toggle_trust(state, sink),
        Command::ToggleSiteRestrict => toggle_restrict(state, sink),
        Command::TogglePause => toggle_pause(state, sink),
        Command::ToggleFeature(toggle) => toggle_feature(state, toggle, sink),
        Command::SetSiteTrackerPolicy(policy) => set_site_tracker_policy(state, policy, sink),
        Command::SetGlobalTrackerPolicy(policy) => set_global_tracker_policy(state, policy, sink),
        Command::BulkSetAll(bulk) => bulk_set_all(state, bulk, sink),
        Command::ResetAll => reset_all(state, options, sink),
    };

    if options.verify_counts {
        for violation in state.check_invariants() {
            log::warn!("after {}: {}", command.name(), violation);
        }
    }

    Patch::capture(state, slices)
}

/// Decode and apply a command envelope.
pub fn dispatch(
    name: &str,
    payload: Value,
    state: &mut PanelState,
    options: &EngineOptions,
    sink: &mut dyn PersistSink,
) -> Patch {
    match Command::parse(name, payload) {
        Ok(command) => apply(state, &command, options, sink),
        Err(CommandError::UnknownCommand(name)) => {
            log::debug!("ignoring unknown command '{}'", name);
            Patch::default()
        }
        Err(err) => {
            log::warn!("{}", err);
            Patch::default()
        }
    }
}

fn toggle_feature(state: &mut PanelState, toggle: &ToggleFeature, sink: &mut dyn PersistSink) -> Slices {
    let value = toggle
        .enabled
        .unwrap_or_else(|| !state.features.get(toggle.feature));
    state.features.set(toggle.feature, value);

    let field = match toggle.feature {
        Feature::AntiTracking => PersistFields::ENABLE_ANTI_TRACKING,
        Feature::AdBlock => PersistFields::ENABLE_AD_BLOCK,
        Feature::SmartBlock => PersistFields::ENABLE_SMART_BLOCK,
    };
    publish(sink, state, field);
    Slices::FEATURES
}

// =============================================================================
// Session
// =============================================================================

/// One open panel: the authoritative state plus its persistence sink.
pub struct Session<S: PersistSink> {
    state: PanelState,
    options: EngineOptions,
    sink: S,
}

impl<S: PersistSink> Session<S> {
    pub fn new(state: PanelState, options: EngineOptions, sink: S) -> Self {
        Self { state, options, sink }
    }

    /// Open a session on a freshly delivered snapshot.
    pub fn from_snapshot(
        snapshot: PanelSnapshot,
        options: EngineOptions,
        sink: S,
    ) -> Result<Self, SnapshotError> {
        Ok(Self::new(PanelState::from_snapshot(snapshot)?, options, sink))
    }

    pub fn dispatch(&mut self, name: &str, payload: Value) -> Patch {
        dispatch(name, payload, &mut self.state, &self.options, &mut self.sink)
    }

    pub fn apply(&mut self, command: &Command) -> Patch {
        apply(&mut self.state, command, &self.options, &mut self.sink)
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        self.state.to_snapshot()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_parts(self) -> (PanelState, S) {
        (self.state, self.sink)
    }
}
