//! radbias CLI: measure gender bias in chest X-ray disease predictions.
//!
//! Each invocation is one session: load ground truth, score images, join,
//! then report or simulate.

mod commands;
mod render;

use clap::Parser;
use radbias_core::{ModelKind, RadbiasError};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// radbias: gender-bias analysis for chest X-ray classifiers
#[derive(Parser, Debug)]
#[command(name = "radbias", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path (applied on top of every other layer)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

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
    /// Profile a ground-truth dataset (missing values, duplicates, disease by gender)
    Profile {
        /// Ground-truth file (csv, tsv, json, jsonl)
        #[arg(short, long)]
        ground_truth: PathBuf,
        /// Disease label column
        #[arg(long)]
        disease: Option<String>,
        /// Gender column
        #[arg(long)]
        gender: Option<String>,
        /// Age column for per-cell age statistics
        #[arg(long)]
        age: Option<String>,
    },
    /// Score images, join against ground truth and report fairness metrics
    Analyze {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Re-apply per-gender thresholds and report the resulting bias
    Simulate {
        #[command(flatten)]
        pipeline: PipelineArgs,
        /// Female decision threshold
        #[arg(long)]
        female: Option<f64>,
        /// Male decision threshold
        #[arg(long)]
        male: Option<f64>,
    },
    /// Live summary of the stored predictions
    Summary {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default configuration file in the workspace
    Init,
    /// Show the resolved configuration
    Show,
}

/// Inputs shared by every command that runs the pipeline.
#[derive(clap::Args, Debug, Clone)]
struct PipelineArgs {
    /// Model output table (csv, tsv, json, jsonl) keyed by image id
    #[arg(short, long)]
    scores: PathBuf,

    /// Ground-truth file (csv, tsv, json, jsonl)
    #[arg(short, long)]
    ground_truth: Option<PathBuf>,

    /// Model that produced the scores
    #[arg(short, long, value_enum, default_value_t = ModelArg::Classifier)]
    model: ModelArg,

    /// Images to score; every id in the score table when omitted
    #[arg(long, num_args = 1..)]
    images: Vec<PathBuf>,

    /// Ground-truth image id column
    #[arg(long)]
    image_id: Option<String>,

    /// Ground-truth disease label column
    #[arg(long)]
    disease: Option<String>,

    /// Ground-truth gender column
    #[arg(long)]
    gender: Option<String>,

    /// Global decision threshold used when scoring
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Image id column of the score table
    #[arg(long, default_value = "image_id")]
    score_id: String,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ModelArg {
    Classifier,
    Agent,
}

impl From<ModelArg> for ModelKind {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Classifier => ModelKind::Classifier,
            ModelArg::Agent => ModelKind::Agent,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "radbias", "radbias")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "radbias.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let output = if cli.json {
        commands::Output::Json
    } else {
        commands::Output::Text
    };
    match commands::handle_command(cli.command, &workspace, cli.config.as_deref(), output).await {
        // Input errors: one line on stderr, exit code 2.
        Err(e)
            if e.downcast_ref::<RadbiasError>()
                .is_some_and(RadbiasError::is_user_facing) =>
        {
            tracing::debug!(error = %e, "Rejected input");
            eprintln!("Error: {e}");
            drop(guard);
            std::process::exit(2);
        }
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_simulate() {
        let cli = Cli::try_parse_from([
            "radbias", "simulate", "-s", "scores.csv", "-g", "gt.csv", "--gender", "Patient Gender",
            "--female", "0.3", "--male", "0.6", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Simulate {
                pipeline,
                female,
                male,
            } => {
                assert_eq!(pipeline.gender.as_deref(), Some("Patient Gender"));
                assert_eq!(pipeline.model, ModelArg::Classifier);
                assert_eq!(female, Some(0.3));
                assert_eq!(male, Some(0.6));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_agent_with_images() {
        let cli = Cli::try_parse_from([
            "radbias", "summary", "-s", "out.jsonl", "-m", "agent", "--images", "a.png", "b.png",
        ])
        .unwrap();
        let Commands::Summary { pipeline } = cli.command else {
            panic!("expected summary");
        };
        assert_eq!(ModelKind::from(pipeline.model), ModelKind::Agent);
        assert_eq!(pipeline.images.len(), 2);
        assert!(pipeline.ground_truth.is_none());
    }

    #[test]
    fn test_verbose_counts() {
        let cli = Cli::try_parse_from(["radbias", "-vv", "config", "show"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Show
            }
        ));
    }
}
