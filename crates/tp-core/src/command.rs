//! Panel commands
//!
//! The UI sends a command name plus a JSON payload. Names are matched
//! exactly; payload fields that are absent default to `false` / `None`.

use serde::Deserialize;
use serde_json::Value;

use crate::model::{AppId, Feature, Scope};

/// Error type for command decoding.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Invalid payload for {command}: {source}")]
    InvalidPayload {
        command: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// One user intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ToggleSiteTrust,
    ToggleSiteRestrict,
    TogglePause,
    ToggleFeature(ToggleFeature),
    SetSiteTrackerPolicy(SiteTrackerPolicy),
    SetGlobalTrackerPolicy(GlobalTrackerPolicy),
    BulkSetAll(BulkSetAll),
    ResetAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToggleFeature {
    pub feature: Feature,
    /// Explicit value; the flag is flipped when absent.
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SiteTrackerPolicy {
    pub app_id: AppId,
    pub cat_id: String,
    #[serde(default)]
    pub trust: bool,
    #[serde(default)]
    pub restrict: bool,
    #[serde(default)]
    pub block: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GlobalTrackerPolicy {
    pub app_id: AppId,
    pub cat_id: String,
    #[serde(default)]
    pub block: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BulkSetAll {
    pub scope: Scope,
    #[serde(default)]
    pub block: bool,
    /// Restrict the command to one category.
    #[serde(default)]
    pub category_id: Option<String>,
}

impl Command {
    pub const NAMES: [&'static str; 8] = [
        "ToggleSiteTrust",
        "ToggleSiteRestrict",
        "TogglePause",
        "ToggleFeature",
        "SetSiteTrackerPolicy",
        "SetGlobalTrackerPolicy",
        "BulkSetAll",
        "ResetAll",
    ];

    /// Decode a command envelope.
    pub fn parse(name: &str, payload: Value) -> Result<Self, CommandError> {
        match name {
            "ToggleSiteTrust" => Ok(Self::ToggleSiteTrust),
            "ToggleSiteRestrict" => Ok(Self::ToggleSiteRestrict),
            "TogglePause" => Ok(Self::TogglePause),
            "ResetAll" => Ok(Self::ResetAll),
            "ToggleFeature" => decode("ToggleFeature", payload).map(Self::ToggleFeature),
            "SetSiteTrackerPolicy" => {
                decode("SetSiteTrackerPolicy", payload).map(Self::SetSiteTrackerPolicy)
            }
            "SetGlobalTrackerPolicy" => {
                decode("SetGlobalTrackerPolicy", payload).map(Self::SetGlobalTrackerPolicy)
            }
            "BulkSetAll" => decode("BulkSetAll", payload).map(Self::BulkSetAll),
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ToggleSiteTrust => "ToggleSiteTrust",
            Self::ToggleSiteRestrict => "ToggleSiteRestrict",
            Self::TogglePause => "TogglePause",
            Self::ToggleFeature(_) => "ToggleFeature",
            Self::SetSiteTrackerPolicy(_) => "SetSiteTrackerPolicy",
            Self::SetGlobalTrackerPolicy(_) => "SetGlobalTrackerPolicy",
            Self::BulkSetAll(_) => "BulkSetAll",
            Self::ResetAll => "ResetAll",
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(command: &'static str, payload: Value) -> Result<T, CommandError> {
    serde_json::from_value(payload).map_err(|source| CommandError::InvalidPayload { command, source })
}
