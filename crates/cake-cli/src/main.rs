//! # cake
//!
//! CLI for the Cake scenario runner: list stored scenarios, replay
//! them against a page fixture (locally or through the in-process
//! bridge), and move scenarios in and out via the export format.
//!
//! ## Usage
//!
//! ```bash
//! # List stored scenarios
//! cake list
//!
//! # Run one scenario against a page fixture
//! cake run --scenario <id> --page fixtures/login.json
//!
//! # Run everything through the bridge, recording history
//! cake run --all --page fixtures/login.json --bridge --history runs.jsonl
//!
//! # Move scenarios between stores
//! cake export --output scenarios.json
//! cake import scenarios.json
//! ```

use anyhow::{Context, Result, bail};
use cake_bridge::{BridgeDriver, ChannelTransport, PageResponder};
use cake_core::{
    FileScenarioStore, LocalDriver, MemoryPage, PageDriver, RunHistory, ScenarioStore, TestRunner,
};
use cake_proto::{RunStatus, StepAction, StepStatus, TestRunResult, TestScenario};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Scenario runner for Cake test suites.
#[derive(Parser, Debug)]
#[command(name = "cake")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path of the scenario store document.
    #[arg(long, global = true, default_value = "cake-e2e-data.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stored scenarios.
    List,

    /// Run scenarios against a page fixture.
    Run {
        /// Id of the scenario to run.
        #[arg(long, conflicts_with = "all")]
        scenario: Option<String>,

        /// Run every stored scenario.
        #[arg(long)]
        all: bool,

        /// Page fixture JSON to run against.
        #[arg(long)]
        page: PathBuf,

        /// Route execution through the in-process bridge instead of
        /// the local driver.
        #[arg(long)]
        bridge: bool,

        /// Append finished runs to this JSONL history file.
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Export all scenarios as JSON.
    Export {
        /// Write to a file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Import scenarios from an export file.
    Import {
        /// The export file to read.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = FileScenarioStore::open(&cli.store)
        .with_context(|| format!("failed to open store at {}", cli.store.display()))?;

    match cli.command {
        Command::List => list(&store).await,
        Command::Run {
            scenario,
            all,
            page,
            bridge,
            history,
        } => run(store, scenario, all, &page, bridge, history).await,
        Command::Export { output } => export(&store, output).await,
        Command::Import { file } => import(&store, &file).await,
    }
}

async fn list(store: &FileScenarioStore) -> Result<()> {
    let data = store.load().await?;
    if data.scenarios.is_empty() {
        println!("{}", "No scenarios stored yet".yellow());
        return Ok(());
    }

    println!("{}\n", "Stored scenarios:".bold());
    for scenario in &data.scenarios {
        println!(
            "  {}  {} {}",
            scenario.id.cyan(),
            scenario.name.bold(),
            status_badge(scenario)
        );
        println!(
            "      {}",
            format!(
                "{} step{}, {} run{}{}",
                scenario.steps.len(),
                plural(scenario.steps.len()),
                scenario.run_count,
                plural(scenario.run_count as usize),
                if scenario.tags.is_empty() {
                    String::new()
                } else {
                    format!(", tags: {}", scenario.tags.join(", "))
                }
            )
            .dimmed()
        );
    }
    println!(
        "\n  {}",
        format!(
            "Total: {} scenario{}",
            data.scenarios.len(),
            plural(data.scenarios.len())
        )
        .dimmed()
    );
    Ok(())
}

async fn run(
    store: FileScenarioStore,
    scenario: Option<String>,
    all: bool,
    page_path: &Path,
    bridge: bool,
    history: Option<PathBuf>,
) -> Result<()> {
    let fixture = std::fs::read_to_string(page_path)
        .with_context(|| format!("failed to read page fixture {}", page_path.display()))?;
    let page = MemoryPage::from_json(&fixture).context("failed to parse page fixture")?;

    let ids: Vec<String> = if all {
        store
            .load()
            .await?
            .scenarios
            .iter()
            .map(|s| s.id.clone())
            .collect()
    } else if let Some(id) = scenario {
        vec![id]
    } else {
        bail!("pass --scenario <id> or --all");
    };

    if ids.is_empty() {
        bail!("no scenarios to run");
    }
    tracing::debug!(count = ids.len(), bridge, "starting scenario runs");

    let driver: Arc<dyn PageDriver> = if bridge {
        let (transport, receiver) = ChannelTransport::pair();
        let responder = PageResponder::new(Arc::new(page));
        tokio::spawn(async move { responder.serve(receiver).await });
        Arc::new(BridgeDriver::new(Arc::new(transport)))
    } else {
        Arc::new(LocalDriver::new(Arc::new(page)))
    };

    let mut runner = TestRunner::new(Arc::new(store), driver).on_progress(Box::new(
        |number, total, step| {
            println!(
                "  {} {}",
                format!("[{number}/{total}]").dimmed(),
                describe_action(&step.action)
            );
        },
    ));
    if let Some(path) = history {
        runner = runner.with_history(RunHistory::new(path));
    }

    println!(
        "\n{} {}",
        "Cake scenario runner".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    if bridge {
        println!("{}", "Executing through the bridge".dimmed());
    }

    let mut worst = RunStatus::Passed;
    for id in &ids {
        println!("\n{} {}", "▶".cyan(), id.bold());
        let run = match runner.run_scenario(id).await {
            Ok(run) => run,
            Err(err) => {
                eprintln!("{} {}", "Error:".red().bold(), err);
                std::process::exit(1);
            }
        };
        print_run(&run);
        worst = match (worst, run.status) {
            (_, RunStatus::Cancelled) | (RunStatus::Cancelled, _) => RunStatus::Cancelled,
            (_, RunStatus::Failed) | (RunStatus::Failed, _) => RunStatus::Failed,
            _ => RunStatus::Passed,
        };
    }

    match worst {
        RunStatus::Passed => Ok(()),
        RunStatus::Cancelled => std::process::exit(2),
        RunStatus::Failed => std::process::exit(1),
    }
}

fn print_run(run: &TestRunResult) {
    for result in &run.step_results {
        let mark = match result.status {
            StepStatus::Passed => "✓".green(),
            StepStatus::Failed => "✗".red(),
            StepStatus::Skipped => "~".yellow(),
        };
        let mut line = format!(
            "  {mark} {} {}",
            result.step_type,
            format!("({}ms)", result.duration_ms).dimmed()
        );
        if let Some(error) = &result.error {
            line.push_str(&format!("  {}", error.red()));
        }
        println!("{line}");
    }

    let summary = format!(
        "{} — {} passed, {} failed, {} skipped in {}ms",
        run.status,
        run.passed_steps,
        run.failed_steps,
        run.skipped_steps(),
        run.duration_ms
    );
    let summary = match run.status {
        RunStatus::Passed => summary.green(),
        RunStatus::Failed => summary.red(),
        RunStatus::Cancelled => summary.yellow(),
    };
    println!("  {summary}");
}

async fn export(store: &FileScenarioStore, output: Option<PathBuf>) -> Result<()> {
    let json = store.export().await?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{}", format!("Exported to {}", path.display()).dimmed());
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn import(store: &FileScenarioStore, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let count = store.import(&json).await?;
    println!("Imported {count} scenario{}", plural(count));
    Ok(())
}

fn status_badge(scenario: &TestScenario) -> colored::ColoredString {
    use cake_proto::ScenarioStatus::*;
    let label = format!("[{}]", scenario.status);
    match scenario.status {
        Passed => label.green(),
        Failed => label.red(),
        Running => label.blue(),
        Ready => label.cyan(),
        Draft => label.dimmed(),
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

fn describe_action(action: &StepAction) -> String {
    match action {
        StepAction::Click { target } => format!("click {}", target.selector),
        StepAction::Input { target, value } => format!("input {} = {value:?}", target.selector),
        StepAction::Assert { target, assertion } => {
            format!("assert {} {}", target.selector, assertion.kind.label())
        }
        StepAction::Navigate { url } => format!("navigate {url}"),
        StepAction::Wait { duration_ms } => format!("wait {duration_ms}ms"),
    }
}
