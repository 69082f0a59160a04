//! TrackPanel Core Library
//!
//! This crate provides the state engine behind the privacy panel: it takes a
//! snapshot of the trackers seen on the current page and globally, applies
//! one user command, and returns the changed slices of state while mirroring
//! the durable fields to the background store.
//!
//! # Architecture
//!
//! Commands are run to completion one at a time against an explicit
//! [`PanelState`]. Aggregate counts are maintained with per-tracker deltas,
//! never by rescanning a category. Persistence is an outbound,
//! fire-and-forget message per transition.
//!
//! # Modules
//!
//! - `model`: Tracker table, site summary, overrides and selected ids
//! - `delta`: Incremental counter adjustment
//! - `host`: Page host normalization
//! - `site_policy`: Whole-site trust, restrict and pause
//! - `tracker`: Per-tracker command handlers
//! - `bulk`: Block/unblock everything in a scope
//! - `reset`: Factory reset
//! - `command`: Command decoding
//! - `dispatch`: Dispatcher and sessions
//! - `patch`: Rendering changed slices for the UI
//! - `snapshot`: JSON wire format and loader
//! - `persist`: Outbound persistence messages
//! - `invariants`: Consistency checks
//! - `options`: Engine options

pub mod model;
pub mod delta;
pub mod host;
pub mod site_policy;
pub mod tracker;
pub mod bulk;
pub mod reset;
pub mod command;
pub mod dispatch;
pub mod patch;
pub mod snapshot;
pub mod persist;
pub mod invariants;
pub mod options;

// Re-export commonly used types
pub use command::{Command, CommandError};
pub use dispatch::{apply, dispatch, Session};
pub use host::resolve_site_key;
pub use invariants::Violation;
pub use model::{AppId, PanelState, Scope, SitePolicy};
pub use options::EngineOptions;
pub use persist::{NullSink, PersistFields, PersistSink, PersistedFields, RecordingSink};
pub use snapshot::{load_snapshot_json, PanelSnapshot, Patch, SnapshotError};
