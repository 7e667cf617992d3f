//! datadesk CLI: operator surface for the dataset and model registry.
//!
//! Every subcommand prints its result as pretty JSON on stdout.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// datadesk: datasets, analyses, and models behind one audited job ledger
#[derive(Parser, Debug)]
#[command(name = "datadesk", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Extra configuration file, applied over all other sources
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name recorded as the actor in the audit log
    #[arg(long)]
    actor: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Manage tags
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },
    /// Manage data schemas
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
    /// Register, validate, and profile datasets
    Dataset {
        #[command(subcommand)]
        action: DatasetAction,
    },
    /// Analysis templates and runs
    Analysis {
        #[command(subcommand)]
        action: AnalysisAction,
    },
    /// Models, versions, training, and prediction
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Enqueue and execute jobs
    Job {
        #[command(subcommand)]
        action: JobAction,
    },
    /// Read the audit log
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default workspace configuration file
    Init,
    /// Show the resolved configuration
    Show,
}

#[derive(clap::Subcommand, Debug)]
enum TagAction {
    /// Create a tag
    Create {
        name: String,
        /// dataset, analysis, or ml_task
        #[arg(short, long, default_value = "dataset")]
        category: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// List tags
    List {
        #[arg(short, long)]
        category: Option<String>,
    },
}

#[derive(clap::Subcommand, Debug)]
enum SchemaAction {
    /// Create a schema from a JSON or TOML definition file
    Create {
        /// Tag the schema belongs to
        #[arg(long)]
        tag: i64,
        file: PathBuf,
    },
    /// Show a schema with its fields
    Show { id: i64 },
    /// List schemas
    List {
        #[arg(long)]
        tag: Option<i64>,
    },
}

#[derive(clap::Subcommand, Debug)]
enum DatasetAction {
    /// Register a dataset
    Register {
        name: String,
        #[arg(long)]
        tag: i64,
        #[arg(long)]
        schema: Option<i64>,
        #[arg(short, long, default_value = "")]
        description: String,
        /// csv_upload, external_system, or manual
        #[arg(long, default_value = "csv_upload")]
        source_type: String,
        #[arg(long, default_value = "")]
        source_info: String,
    },
    /// Attach a file to a dataset
    AddFile {
        dataset: i64,
        path: PathBuf,
        /// File format; guessed from the extension when omitted
        #[arg(short, long)]
        format: Option<String>,
        #[arg(short, long, default_value = "0")]
        position: i64,
    },
    /// Validate a dataset against its schema
    Validate { id: i64 },
    /// Compute and store a dataset's profile
    Profile { id: i64 },
    /// Show a dataset with its files and profile
    Show { id: i64 },
    /// List datasets
    List {
        #[arg(long)]
        tag: Option<i64>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Archive a dataset
    Archive { id: i64 },
}

#[derive(clap::Subcommand, Debug)]
enum AnalysisAction {
    /// Create an analysis template
    Template {
        name: String,
        /// Registry key of the analysis, e.g. builtin.value_counts
        #[arg(short, long)]
        key: Option<String>,
        #[arg(long)]
        tag: Option<i64>,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Parameter specs as a JSON array
        #[arg(long)]
        params_schema: Option<String>,
    },
    /// Create a pending analysis run
    RunCreate {
        template: i64,
        dataset: i64,
        /// Parameters as a JSON object
        #[arg(short, long)]
        params: Option<String>,
    },
    /// Execute a pending analysis run now
    Run { id: i64 },
    /// Show an analysis run
    Show { id: i64 },
    /// List analysis templates
    Templates,
    /// List analysis runs, newest first
    Runs {
        #[arg(long)]
        dataset: Option<i64>,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ModelAction {
    /// Create a model
    Create {
        name: String,
        #[arg(long)]
        tag: i64,
        #[arg(long, default_value = "classification")]
        task_type: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Create the model inactive
        #[arg(long)]
        inactive: bool,
    },
    /// Activate (or with --off, deactivate) a model
    Activate {
        id: i64,
        #[arg(long)]
        off: bool,
    },
    /// Create a model version and its pending training run
    Version {
        model: i64,
        version: String,
        #[arg(long)]
        dataset: Option<i64>,
        /// Hyperparameters as a JSON object
        #[arg(long)]
        hyperparams: Option<String>,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Train a model version now
    Train { version: i64 },
    /// Deprecate a ready model version
    Deprecate { version: i64 },
    /// Predict with a version or with a tag's active model
    Predict {
        #[arg(long)]
        version: Option<i64>,
        #[arg(long)]
        tag: Option<String>,
        /// Input rows as a JSON array
        #[arg(short, long, default_value = "[]")]
        inputs: String,
    },
    /// List models
    List {
        #[arg(long)]
        tag: Option<i64>,
    },
    /// List the versions of a model, newest first
    Versions { model: i64 },
}

#[derive(clap::Subcommand, Debug)]
enum JobAction {
    /// Enqueue a job
    Create {
        /// analysis_run or ml_training
        kind: String,
        target: i64,
        #[arg(short, long)]
        priority: Option<i64>,
        #[arg(long)]
        queue: Option<String>,
    },
    /// Execute a pending job
    Run { id: i64 },
    /// Cancel a pending or running job
    Cancel { id: i64 },
    /// List pending jobs of a queue in run order
    Pending {
        #[arg(long)]
        queue: Option<String>,
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Execute pending jobs of a queue one after another
    Drain {
        #[arg(long)]
        queue: Option<String>,
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show a job
    Show { id: i64 },
    /// List jobs, newest first
    List {
        /// pending, running, success, failed, or canceled
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        queue: Option<String>,
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[derive(clap::Subcommand, Debug)]
enum AuditAction {
    /// List audit entries, newest first
    List {
        #[arg(short, long)]
        event: Option<String>,
        /// Restrict to one record, e.g. dataset:3
        #[arg(short, long)]
        target: Option<String>,
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Resolve workspace
    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let (mut config, problems) = commands::load_config(&workspace, cli.config.as_deref())?;
    if let Some(actor) = &cli.actor {
        config.audit.default_actor = Some(actor.clone());
    }

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error".to_string(),
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    // Human-readable layer for stderr (always active)
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let mut _guard = None;
    let json_layer = match datadesk_core::config::log_dir() {
        Some(log_dir) if config.logging.json_file => {
            let _ = std::fs::create_dir_all(&log_dir);
            let file_appender = tracing_appender::rolling::daily(&log_dir, "datadesk.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            _guard = Some(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_filter(EnvFilter::new("debug")),
            )
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    for problem in &problems {
        tracing::warn!("Configuration problem: {problem}");
    }

    commands::handle_command(cli.command, &workspace, &config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dataset_register() {
        let cli = Cli::try_parse_from([
            "datadesk", "-w", "/tmp/ws", "dataset", "register", "iris", "--tag", "1", "--schema",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.workspace, PathBuf::from("/tmp/ws"));
        match cli.command {
            Commands::Dataset {
                action:
                    DatasetAction::Register {
                        name,
                        tag,
                        schema,
                        source_type,
                        ..
                    },
            } => {
                assert_eq!(name, "iris");
                assert_eq!(tag, 1);
                assert_eq!(schema, Some(2));
                assert_eq!(source_type, "csv_upload");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_job_drain_defaults() {
        let cli = Cli::try_parse_from(["datadesk", "-vv", "job", "drain"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Job {
                action: JobAction::Drain { queue, limit },
            } => {
                assert_eq!(queue, None);
                assert_eq!(limit, 50);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_kebab_case_subcommands() {
        assert!(Cli::try_parse_from(["datadesk", "dataset", "add-file", "1", "a.csv"]).is_ok());
        assert!(Cli::try_parse_from(["datadesk", "analysis", "run-create", "1", "2"]).is_ok());
        assert!(Cli::try_parse_from(["datadesk", "model", "predict", "--tag", "churn"]).is_ok());
        assert!(Cli::try_parse_from(["datadesk", "model", "versions", "3"]).is_ok());
        assert!(Cli::try_parse_from(["datadesk", "analysis", "runs", "--dataset", "1"]).is_ok());
        assert!(Cli::try_parse_from(["datadesk", "job", "list", "--status", "failed"]).is_ok());
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["datadesk"]).is_err());
        assert!(Cli::try_parse_from(["datadesk", "dataset", "validate"]).is_err());
    }
}
