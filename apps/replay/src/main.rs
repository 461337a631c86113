//! Replay a recorded contact session through a surface.
//!
//! Every target of the session gets the reference recognizers registered on
//! it; each delivered gesture is printed to stdout as one JSON line.
//!
//! Usage:
//!   tactus-replay --settings apps/replay/sessions/settings.json --session apps/replay/sessions/tap_then_drag.json

mod session;

use anyhow::{Context as _, Result};
use clap::Parser;
use serde::Serialize;
use session::{RecognizerEntry, Session};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tactus_config::{Aggregation, Settings};
use tactus_recognition::{Configuration, Gesture, GestureEvent, RecognitionRegistry, Recognizer};
use tactus_recognizers::{DragRecognizer, HoldRecognizer, TapRecognizer};
use tactus_surface::{Surface, TickSummary};
use tactus_targets::{Role, TargetId};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tactus-replay", about = "Replay a recorded contact session and print recognized gestures")]
struct Cli {
    /// Settings JSON file. Defaults are used when omitted.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Session JSON file: targets, recognizers and contact batches.
    #[arg(long)]
    session: PathBuf,

    /// Aggregation mode; overrides the settings file, required without one.
    #[arg(long)]
    aggregation: Option<Aggregation>,
}

/// One printed gesture.
#[derive(Serialize)]
struct Line<'a> {
    timestamp_ms: u64,
    target: &'a str,
    recognizer: &'a str,
    event: &'a str,
    group: String,
    payload: &'a serde_json::Value,
}

type Names = Arc<HashMap<TargetId, String>>;

fn print_gesture<E: GestureEvent>(names: &Names) -> impl Fn(&Gesture<E>) + Send + Sync + 'static {
    let names = Arc::clone(names);
    move |gesture| {
        let line = Line {
            timestamp_ms: gesture.timestamp_ms,
            target: names
                .get(&gesture.target)
                .map(String::as_str)
                .unwrap_or("?"),
            recognizer: gesture.recognizer,
            event: gesture.event.name(),
            group: gesture.group.to_string(),
            payload: &gesture.payload,
        };
        match serde_json::to_string(&line) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize gesture"),
        }
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let settings = match (&cli.settings, cli.aggregation) {
        (Some(path), aggregation) => {
            let settings = Settings::load(path)
                .with_context(|| format!("failed to load settings {}", path.display()))?;
            match aggregation {
                Some(aggregation) => settings.with_aggregation(aggregation),
                None => settings,
            }
        }
        (None, Some(aggregation)) => Settings::new(aggregation),
        (None, None) => anyhow::bail!("either --settings or --aggregation is required"),
    };
    Ok(settings)
}

fn configure<C: Clone + Send + Sync + 'static>(
    entry: &RecognizerEntry<C>,
    local_role: Option<Role>,
) -> Configuration {
    let mut configuration = Configuration::new(entry.config.clone());
    if entry.exclusive {
        configuration = configuration.exclusive();
    }
    if let Some(role) = local_role {
        configuration = configuration.with_local_role(role);
    }
    configuration
}

fn register_all<R: Recognizer>(
    registry: &RecognitionRegistry,
    configuration: &Configuration,
    priority: Option<i32>,
    targets: &[TargetId],
    names: &Names,
) -> Result<()> {
    if let Some(priority) = priority {
        registry
            .set_priority::<R>(configuration, priority)
            .with_context(|| format!("failed to set priority of {}", R::NAME))?;
    }
    for target in targets {
        for event in R::Event::ALL {
            registry.register::<R, _>(
                configuration,
                *event,
                *target,
                print_gesture::<R::Event>(names),
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tactus=debug")),
        )
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    let session = Session::load(&cli.session)?;
    tracing::info!(
        session = %cli.session.display(),
        targets = session.targets.len(),
        batches = session.batches.len(),
        aggregation = %settings.aggregation,
        "Replaying session"
    );

    let registry = Arc::new(RecognitionRegistry::new());
    let mut surface = Surface::new(settings, Arc::clone(&registry)).context("invalid settings")?;

    let mut names = HashMap::new();
    let mut targets = Vec::new();
    for target in &session.targets {
        let id = surface.add_target(Arc::new(target.rect));
        names.insert(id, target.name.clone());
        targets.push(id);
    }
    let names: Names = Arc::new(names);

    let recognizers = &session.recognizers;
    if let Some(entry) = &recognizers.tap {
        let configuration = configure(entry, None);
        register_all::<TapRecognizer>(
            &registry,
            &configuration,
            entry.priority,
            &targets,
            &names,
        )?;
    }
    if let Some(entry) = &recognizers.hold {
        let configuration = configure(entry, None);
        register_all::<HoldRecognizer>(
            &registry,
            &configuration,
            entry.priority,
            &targets,
            &names,
        )?;
    }
    if let Some(entry) = &recognizers.drag {
        let configuration = configure(entry, Some(Role::Initial));
        register_all::<DragRecognizer>(
            &registry,
            &configuration,
            entry.priority,
            &targets,
            &names,
        )?;
    }

    let mut total = TickSummary::default();
    for batch in &session.batches {
        let summary = surface
            .refresh(batch)
            .with_context(|| format!("surface failed at {} ms", batch.timestamp_ms))?;
        accumulate(&mut total, summary);
    }

    // Let pending timers fire and lifted groups expire.
    while let Some(deadline) = surface.next_deadline() {
        accumulate(&mut total, surface.advance_to(deadline));
    }
    let settle_ms = session
        .end_ms()
        .saturating_add(surface.settings().trace_time_gap_ms)
        .saturating_add(1);
    accumulate(&mut total, surface.advance_to(settle_ms));

    tracing::info!(
        groups_created = total.groups_created,
        groups_destroyed = total.groups_destroyed,
        traces_resurrected = total.traces_resurrected,
        timers_fired = total.timers_fired,
        "Replay finished"
    );
    Ok(())
}

fn accumulate(total: &mut TickSummary, summary: TickSummary) {
    total.groups_processed += summary.groups_processed;
    total.groups_created += summary.groups_created;
    total.groups_destroyed += summary.groups_destroyed;
    total.traces_resurrected += summary.traces_resurrected;
    total.timers_fired += summary.timers_fired;
}
