//! TrackPanel CLI
//!
//! CLI tool for building panel snapshots, applying and replaying commands,
//! and checking snapshot consistency.

mod replay;

use std::fs;
use std::path::Path;
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde::Serialize;
use ts_rs::TS;

use tp_builder::{build_snapshot_with_stats, PageReport, TrackerCatalog};
use tp_core::{
    load_snapshot_json, EngineOptions, PanelSnapshot, PanelState, Patch, PersistedFields,
    RecordingSink, Session,
};

#[derive(Parser)]
#[command(name = "tp-cli")]
#[command(about = "TrackPanel snapshot and command tools")]
struct Cli {
    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply one command to a snapshot and print the patch
    Apply {
        /// Snapshot file
        #[arg(short, long)]
        snapshot: String,

        /// Command name, e.g. SetSiteTrackerPolicy
        #[arg(short = 'c', long = "command")]
        name: String,

        /// Command payload as JSON
        #[arg(short, long, default_value = "null")]
        payload: String,

        /// Write the updated snapshot here
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Replay a JSON list of commands, checking invariants after each
    Replay {
        /// Snapshot file
        #[arg(short, long)]
        snapshot: String,

        /// Script file: [{"command": ..., "payload": ...}, ...]
        #[arg(short = 'x', long)]
        script: String,

        /// Write the final snapshot here
        #[arg(short, long)]
        output: Option<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check a snapshot's counts, overrides and selected ids
    Check {
        /// Snapshot file
        #[arg(short, long)]
        snapshot: String,
    },

    /// Build a snapshot from stored settings, the catalog and a page report
    Build {
        /// Persisted panel fields
        #[arg(long)]
        stored: String,

        /// Tracker catalog
        #[arg(long)]
        catalog: String,

        /// Page report (pageHost + detected tracker ids)
        #[arg(long)]
        page: String,

        /// Output snapshot file
        #[arg(short, long, default_value = "snapshot.json")]
        output: String,
    },

    /// Export TypeScript definitions of the wire types
    Types {
        /// Output directory
        #[arg(short, long, default_value = "bindings")]
        out_dir: String,
    },
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level.as_str()))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Commands::Apply { snapshot, name, payload, output } => {
            cmd_apply(&snapshot, &name, &payload, output.as_deref())
        }
        Commands::Replay { snapshot, script, output, verbose } => {
            cmd_replay(&snapshot, &script, output.as_deref(), verbose)
        }
        Commands::Check { snapshot } => cmd_check(&snapshot),
        Commands::Build { stored, catalog, page, output } => {
            cmd_build(&stored, &catalog, &page, &output)
        }
        Commands::Types { out_dir } => cmd_types(&out_dir),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn read(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))
}

fn load_state(path: &str) -> Result<PanelState, String> {
    load_snapshot_json(&read(path)?).map_err(|e| format!("'{}': {}", path, e))
}

fn write_json<T: Serialize>(path: &str, value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize: {}", e))?;
    fs::write(path, text).map_err(|e| format!("Failed to write '{}': {}", path, e))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize: {}", e))?;
    println!("{}", text);
    Ok(())
}

fn cmd_apply(snapshot: &str, command: &str, payload: &str, output: Option<&str>) -> Result<(), String> {
    let state = load_state(snapshot)?;
    let payload: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| format!("Invalid payload JSON: {}", e))?;

    let mut session = Session::new(state, EngineOptions::default(), RecordingSink::new());
    let patch: Patch = session.dispatch(command, payload);

    println!("Patch:");
    print_json(&patch)?;

    let messages = session.sink_mut().take();
    println!("setPanelData ({} message(s)):", messages.len());
    for message in &messages {
        print_json(message)?;
    }

    if let Some(output) = output {
        write_json(output, &session.snapshot())?;
        println!("Wrote updated snapshot to '{}'", output);
    }
    Ok(())
}

fn cmd_replay(snapshot: &str, script: &str, output: Option<&str>, verbose: bool) -> Result<(), String> {
    let state = load_state(snapshot)?;
    let steps = replay::load_script(script)?;

    let start = Instant::now();
    let options = EngineOptions { verify_counts: false, ..Default::default() };
    let (state, report) = replay::replay(state, options, &steps, verbose);
    let elapsed = start.elapsed();

    println!("Replayed {} command(s) from '{}'", report.steps, script);
    println!("  Empty patches:   {}", report.empty_patches);
    println!("  Persist msgs:    {}", report.persist_messages);
    println!("  Violations:      {}", report.violations.len());
    println!("  Time:            {:.2}ms", elapsed.as_secs_f64() * 1000.0);

    for (index, command, violation) in &report.violations {
        println!("  [{}] {}: {}", index, command, violation);
    }

    if let Some(output) = output {
        write_json(output, &state.to_snapshot())?;
        println!("Wrote final snapshot to '{}'", output);
    }

    if report.violations.is_empty() {
        Ok(())
    } else {
        Err(format!("{} invariant violation(s)", report.violations.len()))
    }
}

fn cmd_check(snapshot: &str) -> Result<(), String> {
    let state = load_state(snapshot)?;

    let trackers = state.table.trackers().count();
    println!("Snapshot '{}'", snapshot);
    println!("  Host:        {}", state.summary.site_key());
    println!("  Site policy: {:?}", state.summary.site_policy);
    println!("  Categories:  {}", state.table.categories.len());
    println!("  Trackers:    {}", trackers);
    println!("  Selected:    {}", state.selected_app_ids.len());

    let violations = state.check_invariants();
    if violations.is_empty() {
        println!("OK");
        return Ok(());
    }
    for violation in &violations {
        println!("  {}", violation);
    }
    Err(format!("{} invariant violation(s)", violations.len()))
}

fn cmd_build(stored: &str, catalog: &str, page: &str, output: &str) -> Result<(), String> {
    let stored: PersistedFields = serde_json::from_str(&read(stored)?)
        .map_err(|e| format!("Invalid stored settings '{}': {}", stored, e))?;
    let catalog = TrackerCatalog::from_json(&read(catalog)?).map_err(|e| e.to_string())?;
    let page = PageReport::from_json(&read(page)?).map_err(|e| e.to_string())?;

    let (snapshot, stats) =
        build_snapshot_with_stats(&stored, &catalog, &page).map_err(|e| e.to_string())?;

    PanelState::from_snapshot(snapshot.clone())
        .map_err(|e| format!("Generated snapshot failed to load: {}", e))?;
    write_json(output, &snapshot)?;

    println!("Built snapshot for '{}' to '{}'", page.page_host, output);
    println!("  Global trackers:   {}", stats.global_trackers);
    println!("  Site trackers:     {}", stats.site_trackers);
    println!("  Hidden duplicates: {}", stats.hidden_duplicates);
    println!("  Unknown detected:  {}", stats.unknown_detections);
    Ok(())
}

fn cmd_types(out_dir: &str) -> Result<(), String> {
    let dir = Path::new(out_dir);
    fs::create_dir_all(dir).map_err(|e| format!("Failed to create '{}': {}", out_dir, e))?;

    PanelSnapshot::export_all_to(dir).map_err(|e| e.to_string())?;
    Patch::export_all_to(dir).map_err(|e| e.to_string())?;
    PersistedFields::export_all_to(dir).map_err(|e| e.to_string())?;

    println!("Exported TypeScript bindings to '{}'", out_dir);
    Ok(())
}
