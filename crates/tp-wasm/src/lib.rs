//! WebAssembly bindings for TrackPanel
//!
//! Values cross the boundary as plain JS objects in the snapshot wire format;
//! they are converted through `JSON.stringify`/`JSON.parse` on the JS side and
//! `serde_json` on ours.

mod console;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use tp_builder::{build_snapshot_with_stats, PageReport, TrackerCatalog};
use tp_core::{
    resolve_site_key, Command, EngineOptions, PanelSnapshot, PersistSink, PersistedFields, Session,
};

// =============================================================================
// JSON Bridge
// =============================================================================

fn to_json(value: &JsValue) -> Result<serde_json::Value, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(serde_json::Value::Null);
    }
    let text: String = js_sys::JSON::stringify(value)?.into();
    serde_json::from_str(&text).map_err(|e| JsValue::from_str(&format!("Invalid JSON: {}", e)))
}

fn from_js<T: serde::de::DeserializeOwned>(value: &JsValue, what: &str) -> Result<T, JsValue> {
    serde_json::from_value(to_json(value)?)
        .map_err(|e| JsValue::from_str(&format!("Invalid {}: {}", what, e)))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let text = serde_json::to_string(value)
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize: {}", e)))?;
    js_sys::JSON::parse(&text)
}

// =============================================================================
// Persistence
// =============================================================================

/// Forwards persistence messages to a JS `setPanelData(fields)` callback.
struct JsSink {
    callback: Option<js_sys::Function>,
}

impl PersistSink for JsSink {
    fn set_panel_data(&mut self, fields: PersistedFields) {
        let Some(callback) = &self.callback else {
            return;
        };
        // Delivery failures are logged and dropped; the panel state stays authoritative
        let result = to_js(&fields).and_then(|message| callback.call1(&JsValue::NULL, &message));
        if let Err(err) = result {
            log::warn!("setPanelData failed: {:?}", err);
        }
    }
}

// =============================================================================
// Panel Session
// =============================================================================

#[wasm_bindgen]
pub struct PanelSession {
    session: Session<JsSink>,
}

#[wasm_bindgen]
impl PanelSession {
    /// Open a session on a snapshot object. `set_panel_data` receives every
    /// persistence message.
    #[wasm_bindgen(constructor)]
    pub fn new(snapshot: JsValue, set_panel_data: Option<js_sys::Function>) -> Result<PanelSession, JsValue> {
        let snapshot: PanelSnapshot = from_js(&snapshot, "snapshot")?;
        let sink = JsSink { callback: set_panel_data };
        let session = Session::from_snapshot(snapshot, EngineOptions::default(), sink)
            .map_err(|e| JsValue::from_str(&format!("Failed to load snapshot: {}", e)))?;
        Ok(Self { session })
    }

    /// Run one command and return the patch of changed slices.
    ///
    /// Unknown commands and bad payloads yield an empty patch.
    pub fn dispatch(&mut self, name: &str, payload: JsValue) -> Result<JsValue, JsValue> {
        let payload = to_json(&payload)?;
        let patch = self.session.dispatch(name, payload);
        to_js(&patch)
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.snapshot())
    }

    /// Current invariant violations, as messages. Empty when consistent.
    pub fn violations(&self) -> js_sys::Array {
        self.session
            .state()
            .check_invariants()
            .iter()
            .map(|v| JsValue::from_str(&v.to_string()))
            .collect()
    }
}

#[wasm_bindgen]
pub fn command_names() -> js_sys::Array {
    Command::NAMES.iter().map(|name| JsValue::from_str(name)).collect()
}

/// Build a panel snapshot from stored settings, the catalog and a page report.
#[wasm_bindgen]
pub fn build_panel_snapshot(stored: JsValue, catalog: JsValue, page: JsValue) -> Result<JsValue, JsValue> {
    let stored: PersistedFields = from_js(&stored, "stored settings")?;
    let catalog: TrackerCatalog = from_js(&catalog, "catalog")?;
    let page: PageReport = from_js(&page, "page report")?;

    let (snapshot, stats) = build_snapshot_with_stats(&stored, &catalog, &page)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    let js_result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&js_result, &"snapshot".into(), &to_js(&snapshot)?);
    let _ = js_sys::Reflect::set(&js_result, &"globalTrackers".into(), &JsValue::from(stats.global_trackers as u32));
    let _ = js_sys::Reflect::set(&js_result, &"siteTrackers".into(), &JsValue::from(stats.site_trackers as u32));
    let _ = js_sys::Reflect::set(&js_result, &"hiddenDuplicates".into(), &JsValue::from(stats.hidden_duplicates as u32));
    let _ = js_sys::Reflect::set(&js_result, &"unknownDetections".into(), &JsValue::from(stats.unknown_detections as u32));
    Ok(js_result.into())
}

#[wasm_bindgen]
pub fn resolve_site_key_js(page_host: &str) -> String {
    resolve_site_key(page_host)
}

/// Route `log` output to the browser console at `level` ("warn" by default).
#[wasm_bindgen]
pub fn init_logging(level: Option<String>) {
    console::install(console::parse_level(level.as_deref().unwrap_or("warn")));
}
