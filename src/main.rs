use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use archon::adm;
use archon::orchestration::{PhaseEvent, PhaseExecutionReport, PhaseStatus};
use archon::workflow::ValidationOutcome;
use archon::{alog, AnalyzerProvider, Config, Error, ExecuteOptions, Result};

/// Archon - TOGAF ADM multi-agent phase orchestrator
#[derive(Parser, Debug)]
#[command(name = "archon")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    ARCHON_DEBUG=1  Enable debug logging (alternative to --debug)")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.archon/archon.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Execute a registered phase
    Run {
        /// Phase name, e.g. "Phase A"
        phase: String,

        /// JSON file holding an object merged into the phase context
        #[arg(long)]
        context: Option<PathBuf>,

        /// Also run one consolidated task through the whole team
        #[arg(long)]
        collaborative: bool,

        /// Skip the phase workflow graph
        #[arg(long)]
        no_workflow: bool,

        /// Override the configured validation iteration cap
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Write the execution log to this file
        #[arg(long)]
        log: Option<PathBuf>,

        /// Write the insights report (summary, recommendations, team performance) to this file
        #[arg(long)]
        insights: Option<PathBuf>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List registered phases with their teams and steps
    Phases,

    /// Show the configuration file
    Config {
        /// Write the default configuration if none exists
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    archon::log::init_with_debug(cli.debug);

    match cli.command {
        Command::Run {
            phase,
            context,
            collaborative,
            no_workflow,
            max_iterations,
            log,
            insights,
            json,
        } => {
            let options = ExecuteOptions {
                use_workflow: !no_workflow,
                use_collaborative_team: collaborative,
                cancel: None,
            };
            let outputs = RunOutputs {
                log: log.as_deref(),
                insights: insights.as_deref(),
                json,
            };
            run_phase(&phase, context.as_deref(), options, max_iterations, outputs)
        }
        Command::Phases => run_phases(),
        Command::Config { init } => run_config(init),
    }
}

fn load_context(path: Option<&Path>) -> Result<Map<String, Value>> {
    let Some(path) = path else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(&fs::read_to_string(path)?)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::Validation(format!(
            "context file {} must hold a JSON object",
            path.display()
        ))),
    }
}

/// Where `run` sends its results besides the terminal.
struct RunOutputs<'a> {
    log: Option<&'a Path>,
    insights: Option<&'a Path>,
    json: bool,
}

fn run_phase(
    phase: &str,
    context: Option<&Path>,
    options: ExecuteOptions,
    max_iterations: Option<u32>,
    outputs: RunOutputs<'_>,
) -> Result<()> {
    let RunOutputs { log, insights, json } = outputs;
    let mut config = Config::load()?;
    if let Some(n) = max_iterations {
        config.max_iterations = n;
    }
    let context = load_context(context)?;
    alog!(
        "Run command: phase={:?}, workflow={}, collaborative={}, max_iterations={}",
        phase,
        options.use_workflow,
        options.use_collaborative_team,
        config.max_iterations
    );

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(async {
        let (tx, mut rx) = mpsc::channel(64);
        let orchestrator = adm::standard_orchestrator(Arc::new(AnalyzerProvider), &config)?;
        let orchestrator = if json {
            drop(tx);
            orchestrator
        } else {
            orchestrator.with_events(tx)
        };

        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                print_event(&event);
            }
        });

        let report = orchestrator.execute_phase(phase, context, options).await?;
        if let Some(path) = log {
            orchestrator.save_execution_log(path)?;
        }
        if let Some(path) = insights {
            fs::write(path, serde_json::to_string_pretty(&orchestrator.insights_report())?)?;
            alog!("Insights report saved to {}", path.display());
        }
        drop(orchestrator);
        let _ = printer.await;
        Ok::<_, Error>(report)
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_event(event: &PhaseEvent) {
    match event {
        PhaseEvent::PhaseStarted { phase } => println!("Running {}", phase),
        PhaseEvent::StepStarted { step, .. } => println!("  > {}", step),
        PhaseEvent::StepCompleted { step, agent, .. } => println!("    {} done ({})", step, agent),
        PhaseEvent::StepFailed { step, error, .. } => println!("    {} failed: {}", step, error),
        PhaseEvent::ValidationEvaluated {
            iteration,
            passed,
            forced,
            ..
        } => {
            let verdict = match (*passed, *forced) {
                (true, _) => "passed",
                (false, true) => "forced through",
                (false, false) => "retrying",
            };
            println!("    validation #{}: {}", iteration, verdict);
        }
        PhaseEvent::PhaseCompleted { .. } => {}
    }
}

fn format_status(status: PhaseStatus) -> &'static str {
    match status {
        PhaseStatus::Completed => "Completed",
        PhaseStatus::Partial => "Partial",
        PhaseStatus::Failed => "Failed",
    }
}

fn format_validation(validation: ValidationOutcome) -> String {
    match validation {
        ValidationOutcome::NotReached => "not reached".to_string(),
        ValidationOutcome::Passed { iterations } => format!("passed after {} iteration(s)", iterations),
        ValidationOutcome::ForcedAfterCap { iterations } => {
            format!("forced after {} iteration(s)", iterations)
        }
        ValidationOutcome::Unresolved { iterations } => {
            format!("unresolved after {} iteration(s)", iterations)
        }
    }
}

fn print_report(report: &PhaseExecutionReport) {
    let modes: Vec<String> = report.execution_modes.iter().map(|m| m.to_string()).collect();
    println!();
    println!("  Phase:       {}", report.phase);
    println!("  Status:      {}", format_status(report.status));
    println!("  Modes:       {}", modes.join(", "));
    println!("  Validation:  {}", format_validation(report.validation));
    println!("  Duration:    {}ms", report.duration_ms);

    if !report.recommendations.is_empty() {
        println!();
        println!("Recommendations:");
        for rec in &report.recommendations {
            println!("  - {}", rec);
        }
    }
    if !report.errors.is_empty() {
        println!();
        println!("Errors:");
        for err in &report.errors {
            println!("  - {}", err);
        }
    }
}

fn run_phases() -> Result<()> {
    let config = Config::load()?;
    let orchestrator = adm::standard_orchestrator(Arc::new(AnalyzerProvider), &config)?;

    for name in orchestrator.phase_names() {
        println!("{}", name);
        if let Some(team) = orchestrator.team(name) {
            let lead = team.lead().map(|a| a.id());
            println!("  Team: {}", team.name());
            for agent in team.agents() {
                let marker = if Some(agent.id()) == lead { " (lead)" } else { "" };
                println!("    {}{}: {}", agent.name(), marker, agent.capabilities());
            }
        }
        if let Some(graph) = orchestrator.workflow(name) {
            let steps: Vec<&str> = graph.steps().iter().map(|s| s.name.as_str()).collect();
            println!("  Steps: {}", steps.join(" -> "));
            if let Some(gate) = graph.validation_gate() {
                println!("  Retry: {} -> {}", graph.validation_step(), gate.retry);
            }
        }
    }
    Ok(())
}

fn run_config(init: bool) -> Result<()> {
    let path = Config::config_path()?;
    if init && !path.exists() {
        Config::default().save()?;
        println!("Wrote default configuration to {}", path.display());
    }
    let config = Config::load()?;
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
