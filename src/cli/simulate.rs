use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use geolocation_permissions::{metrics, BrokerConfig, PermissionEventKind};
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::info;

use super::output::OutputFormat;
use crate::scenario::{load_scenario_from_path, run_scenario, EventRecord, ScenarioReport};

#[derive(Args, Clone, Debug)]
pub struct SimulateArgs {
    /// Scenario file (JSON or YAML)
    #[arg(value_name = "SCENARIO")]
    pub scenario: PathBuf,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Append the broker's Prometheus metrics after the report
    #[arg(long)]
    pub metrics: bool,
}

pub async fn cmd_simulate(
    args: SimulateArgs,
    config: BrokerConfig,
    output: OutputFormat,
) -> Result<()> {
    let scenario = load_scenario_from_path(&args.scenario)
        .with_context(|| format!("loading scenario {}", args.scenario.display()))?;
    info!(
        path = %args.scenario.display(),
        tabs = scenario.tabs.len(),
        steps = scenario.steps.len(),
        "running scenario"
    );

    let report = run_scenario(&scenario, config).await?;

    match output {
        OutputFormat::Json => {
            let rendered = if args.pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{}", rendered);
        }
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&report)?),
        OutputFormat::Human => print_human(&report),
    }

    if args.metrics {
        print!("{}", render_metrics()?);
    }
    Ok(())
}

fn render_metrics() -> Result<String> {
    let registry = Registry::new();
    metrics::register_metrics(&registry);
    let mut buf = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buf)
        .context("encoding metrics")?;
    Ok(String::from_utf8(buf)?)
}

fn print_human(report: &ScenarioReport) {
    println!(
        "Scenario: {}",
        report.name.as_deref().unwrap_or("(unnamed)")
    );
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("Events:");
    for event in &report.events {
        println!("  {} {}", event.at, describe(event));
    }
    println!();

    for tab in &report.tabs {
        let status = if tab.closed { " (closed)" } else { "" };
        println!("Tab {}{}", tab.name, status);
        println!("  Prompts shown: {}", join(tab.prompts.iter()));
        println!("  Prompts hidden: {}", tab.hide_prompts);
        if let Some(state) = &tab.state {
            let in_progress = state
                .in_progress
                .as_ref()
                .map(|origin| origin.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("  In progress: {}", in_progress);
            println!("  Queued: {}", join(state.queued.iter()));
            for (origin, allow) in &state.temporary {
                println!("  Temporary: {} = {}", origin, allow);
            }
        }
        for doc in &tab.documents {
            let decisions: Vec<String> =
                doc.decisions.iter().map(|allow| allow.to_string()).collect();
            println!(
                "  Document {} ({}): [{}]",
                doc.name,
                doc.origin,
                decisions.join(", ")
            );
        }
        println!();
    }

    println!("Remembered:");
    if report.remembered.is_empty() {
        println!("  (none)");
    }
    for (origin, allow) in &report.remembered {
        println!("  {} = {}", origin, allow);
    }
}

fn describe(event: &EventRecord) -> String {
    let tab = event.tab.as_deref().unwrap_or("*");
    let what = match &event.kind {
        PermissionEventKind::TabOpened => "tab opened".to_string(),
        PermissionEventKind::TabClosed => "tab closed".to_string(),
        PermissionEventKind::PromptShown { origin } => format!("prompt shown for {}", origin),
        PermissionEventKind::RequestQueued { origin } => format!("queued {}", origin),
        PermissionEventKind::RequestDropped { origin } => {
            format!("dropped {} (queue full)", origin)
        }
        PermissionEventKind::Resolved {
            origin,
            allow,
            source,
        } => format!(
            "{} {} ({})",
            if *allow { "allowed" } else { "denied" },
            origin,
            source.as_str()
        ),
        PermissionEventKind::StaleAnswerDiscarded { origin } => {
            format!("stale answer for {} discarded", origin)
        }
        PermissionEventKind::Reset => "temporary decisions reset".to_string(),
        PermissionEventKind::RememberedCleared { origin: Some(origin) } => {
            format!("forgot {}", origin)
        }
        PermissionEventKind::RememberedCleared { origin: None } => {
            "forgot all origins".to_string()
        }
    };
    format!("[{}] {}", tab, what)
}

fn join<T: ToString>(items: impl Iterator<Item = T>) -> String {
    let items: Vec<String> = items.map(|item| item.to_string()).collect();
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}
