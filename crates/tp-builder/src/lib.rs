//! TrackPanel Snapshot Builder
//!
//! This crate materializes the panel snapshot from what the background keeps
//! between sessions: the persisted fields, the tracker catalog and the list of
//! trackers detected on the current page. Category trees and counts are
//! always recomputed here, never stored.

pub mod catalog;
pub mod builder;

pub use builder::{build_snapshot, build_snapshot_with_stats, BuildStats};
pub use catalog::{BuildError, CatalogCategory, CatalogTracker, PageReport, TrackerCatalog};
