use std::fs;

use serde::Deserialize;
use serde_json::Value;

use tp_core::{EngineOptions, PanelState, RecordingSink, Session, Violation};

/// One entry of a replay script.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayStep {
    pub command: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Default)]
pub struct ReplayReport {
    pub steps: usize,
    pub empty_patches: usize,
    pub persist_messages: usize,
    /// (step index, command name, violation)
    pub violations: Vec<(usize, String, Violation)>,
}

pub fn load_script(path: &str) -> Result<Vec<ReplayStep>, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    serde_json::from_str(&text).map_err(|e| format!("Invalid replay script '{}': {}", path, e))
}

/// Run `steps` in order, checking invariants after each one.
pub fn replay(
    state: PanelState,
    options: EngineOptions,
    steps: &[ReplayStep],
    verbose: bool,
) -> (PanelState, ReplayReport) {
    let mut session = Session::new(state, options, RecordingSink::new());
    let mut report = ReplayReport::default();

    for (index, step) in steps.iter().enumerate() {
        let patch = session.dispatch(&step.command, step.payload.clone());
        let messages = session.sink_mut().take();

        report.steps += 1;
        report.persist_messages += messages.len();
        if patch.is_empty() {
            report.empty_patches += 1;
        }

        if verbose {
            println!(
                "  [{}] {} -> {} persist message(s){}",
                index,
                step.command,
                messages.len(),
                if patch.is_empty() { ", empty patch" } else { "" }
            );
        }

        for violation in session.state().check_invariants() {
            report.violations.push((index, step.command.clone(), violation));
        }
    }

    let (state, _) = session.into_parts();
    (state, report)
}
