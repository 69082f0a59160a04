//! Panel snapshot format and loader
//!
//! This module provides the JSON wire format exchanged with the panel UI and
//! the loader that folds it into the engine's tracker table.

mod format;
mod loader;

pub use format::*;
pub use loader::*;
