//! easy-exp - experiment runner CLI
//!
//! ## Commands
//!
//! - `run`: evaluate a model on a math dataset, optionally resuming a run
//! - `history`: print the result records of a tracked run
//! - `runs`: list tracked runs of a project

mod settings;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use easy_exp_core::{ResultRecord, RunConfig, RunController, RunReport};
use easy_exp_llm::OpenAiChatClient;
use easy_exp_math::{
    JsonDataset, MathProblem, MathStep, ProblemMetric, ProblemModel, DEFAULT_JUDGE_MODEL,
    DEFAULT_SOLVER_MODEL,
};
use easy_exp_tracking::{FsTracker, RunHistory, RunId, RunRecord, RunRef, Tracker};

use settings::{parse_config_pair, Settings};

#[derive(Parser)]
#[command(name = "easy-exp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resumable experiment runs for LLM agents", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Settings file (default: ./easy-exp.toml if present)
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    /// Root of the local tracking store
    #[arg(long, global = true, env = "EASY_EXP_TRACKING_DIR")]
    tracking_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the math benchmark over a JSON dataset
    Run(RunArgs),

    /// Print the result records of a tracked run
    History {
        /// Run id to read
        run_id: String,

        /// Project the run belongs to (default: [run].project)
        #[arg(short, long)]
        project: Option<String>,
    },

    /// List tracked runs of a project, newest first
    Runs {
        /// Project to list (default: [run].project)
        #[arg(short, long)]
        project: Option<String>,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct RunArgs {
    /// Path to the dataset (JSON array of problems)
    #[arg(short, long)]
    dataset: PathBuf,

    /// Tracking project
    #[arg(short, long)]
    project: Option<String>,

    /// Run name
    #[arg(short, long)]
    name: Option<String>,

    /// Extra run configuration, repeatable (`key=value`)
    #[arg(short, long = "config", value_parser = parse_config_pair)]
    config: Vec<(String, Value)>,

    /// Do not open a tracking session
    #[arg(long)]
    no_track: bool,

    /// Resume from an earlier run id
    #[arg(long)]
    restore_from: Option<String>,

    /// Print step output instead of capturing it per item
    #[arg(long)]
    no_capture: bool,

    /// Model that solves the problems
    #[arg(long)]
    solver_model: Option<String>,

    /// Model that judges the answers
    #[arg(long)]
    judge_model: Option<String>,

    /// Item field used to match restored results (default: position)
    #[arg(long)]
    key_field: Option<String>,

    /// Working directory for exp_log/ and error.log
    #[arg(long, default_value = ".")]
    workdir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    easy_exp_core::init_tracing(cli.json, level);

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let settings = Settings::load(cli.config_file.as_deref(), &cwd)?;
    let tracking_dir = settings.tracking_dir(cli.tracking_dir.as_deref());

    match cli.command {
        Commands::Run(args) => cmd_run(&settings, &tracking_dir, args).await.map(|_| ()),
        Commands::History { run_id, project } => {
            let tracker = FsTracker::new(&tracking_dir, settings.account())?;
            let project = project_or_default(project, &settings)?;
            cmd_history(&tracker, &project, &run_id).await
        }
        Commands::Runs { project } => {
            let tracker = FsTracker::new(&tracking_dir, settings.account())?;
            let project = project_or_default(project, &settings)?;
            cmd_runs(&tracker, &project).await
        }
    }
}

fn project_or_default(project: Option<String>, settings: &Settings) -> Result<String> {
    match project.or_else(|| settings.run.project.clone()) {
        Some(p) => Ok(p),
        None => bail!("No project given (use --project or [run].project in easy-exp.toml)"),
    }
}

/// Merge flags over the settings file into a run configuration.
fn build_run_config(settings: &Settings, args: &RunArgs) -> Result<RunConfig> {
    let project = project_or_default(args.project.clone(), settings)?;
    let Some(name) = args.name.clone().or_else(|| settings.run.name.clone()) else {
        bail!("No run name given (use --name or [run].name in easy-exp.toml)");
    };

    let mut config = settings.run.config.clone();
    config.insert("solver_model".to_string(), Value::from(solver_model(settings, args)));
    config.insert("judge_model".to_string(), Value::from(judge_model(args)));
    for (key, value) in &args.config {
        config.insert(key.clone(), value.clone());
    }

    let tracking = !args.no_track && settings.run.tracking.unwrap_or(true);
    let capture = !args.no_capture && settings.run.capture_output.unwrap_or(true);
    let mut run = RunConfig::new(project, name)
        .with_config(config)
        .with_tracking(tracking)
        .with_capture_output(capture)
        .with_workdir(&args.workdir);
    if let Some(id) = args.restore_from.as_ref().or(settings.run.restore_from.as_ref()) {
        run = run.with_restore_from(id.clone());
    }
    Ok(run)
}

fn solver_model(settings: &Settings, args: &RunArgs) -> String {
    args.solver_model
        .clone()
        .or_else(|| settings.llm.default_model.clone())
        .unwrap_or_else(|| DEFAULT_SOLVER_MODEL.to_string())
}

fn judge_model(args: &RunArgs) -> String {
    args.judge_model
        .clone()
        .unwrap_or_else(|| DEFAULT_JUDGE_MODEL.to_string())
}

/// Evaluate the math benchmark
async fn cmd_run(settings: &Settings, tracking_dir: &Path, args: RunArgs) -> Result<RunReport> {
    let mut dataset: JsonDataset<MathProblem> = JsonDataset::from_json(&args.dataset)
        .with_context(|| format!("Failed to load dataset {}", args.dataset.display()))?;
    if let Some(field) = &args.key_field {
        dataset = dataset.with_key_field(field.clone());
    }
    let digest = dataset.digest().context("Failed to digest dataset")?;
    let config = build_run_config(settings, &args)?.with_dataset_digest(digest);

    let tracker: Option<Arc<dyn Tracker>> = if config.tracking || config.restore_from.is_some() {
        Some(Arc::new(FsTracker::new(tracking_dir, settings.account())?))
    } else {
        None
    };

    let client = Arc::new(OpenAiChatClient::new(settings.llm.clone())?);
    let model = ProblemModel::with_model(client.clone(), solver_model(settings, &args));
    let mut metric = ProblemMetric::with_model(client, judge_model(&args));

    let mut runner = RunController::open(config, tracker).await?;
    if let Some(run) = runner.tracked_run() {
        println!("Tracking run: {run}");
    }

    let cancel = runner.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    let result = runner.run(&dataset, &MathStep, &model, &mut metric).await;
    interrupt.abort();
    let report = result?;
    runner.close().await?;

    info!(
        total = report.total,
        recorded = report.metrics.recorded(),
        failed = report.metrics.failed,
        cancelled = report.cancelled,
        "run finished"
    );
    println!(
        "Accuracy: {:.4} ({}/{}), average time {:.2}s, average cost {:.6}",
        metric.accuracy(),
        metric.correct_count(),
        metric.count(),
        metric.average_time(),
        metric.average_cost()
    );
    Ok(report)
}

/// Print the records of a tracked run
async fn cmd_history(tracker: &FsTracker, project: &str, run_id: &str) -> Result<()> {
    let run = RunRef::new(tracker.account(), project, RunId(run_id.to_string()));
    let records = load_history(tracker, &run).await?;
    print!("{}", render_history(&records));
    Ok(())
}

async fn load_history(history: &dyn RunHistory, run: &RunRef) -> Result<Vec<ResultRecord>> {
    let rows = history
        .history(run)
        .await
        .with_context(|| format!("Failed to read history of {run}"))?;
    Ok(rows.iter().map(ResultRecord::from_history_row).collect())
}

fn render_history(records: &[ResultRecord]) -> String {
    let mut out = String::new();
    for (step, record) in records.iter().enumerate() {
        let json = serde_json::to_string(record).unwrap_or_else(|e| format!("<{e}>"));
        out.push_str(&format!("{step:>5}  {json}\n"));
    }
    out
}

/// List runs of a project
async fn cmd_runs(tracker: &FsTracker, project: &str) -> Result<()> {
    let mut runs = tracker
        .list_runs(tracker.account(), project)
        .await
        .context("Failed to list runs")?;
    runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    if runs.is_empty() {
        println!("No runs for project {project}");
        return Ok(());
    }
    print!("{}", render_runs(&runs));
    Ok(())
}

fn render_runs(runs: &[RunRecord]) -> String {
    let mut out = String::new();
    for record in runs {
        out.push_str(&format!(
            "{}  {:<10} {}  {}\n",
            record.run.run_id,
            record.status.to_string(),
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.metadata.name
        ));
    }
    out
}
