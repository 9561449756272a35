//! Subcommand handlers.

use crate::{Commands, ConfigAction, PipelineArgs, render};
use radbias_core::config::workspace_config_path;
use radbias_core::inference::{BatchReport, ImageFailure};
use radbias_core::{
    CanonicalGender, DataSource, DataSourceType, ImageInput, Outcome, RadbiasConfig,
    ScoreColumns, ScoreTableModel, Session, Table,
};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Text,
    Json,
}

/// A JSON result with the images that could not be scored alongside it.
#[derive(Serialize)]
struct WithFailures<'a, T> {
    #[serde(flatten)]
    result: &'a T,
    failures: &'a [ImageFailure],
}

pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_path: Option<&Path>,
    output: Output,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace, config_path),
        Commands::Profile {
            ground_truth,
            disease,
            gender,
            age,
        } => {
            let config = resolve_config(workspace, config_path, None)?;
            let mut session = Session::create(config);
            let source = ground_truth_source(&ground_truth, &session.config)?;
            session.load_ground_truth(source.as_ref()).await?;
            session.select_columns(None, disease, gender);
            report(session.profile(age.as_deref())?, &[], output, render::profile)
        }
        Commands::Analyze { pipeline } => {
            let (mut session, batch) = run_pipeline(workspace, config_path, &pipeline).await?;
            if output == Output::Text {
                print!("{}", render::batch_report(&batch));
            }
            let analysis = session.analyze()?;
            report(analysis, session.failures(), output, render::analysis)
        }
        Commands::Simulate {
            pipeline,
            female,
            male,
        } => {
            let (mut session, _) = run_pipeline(workspace, config_path, &pipeline).await?;
            // Genders come from the ground truth, so join before simulating.
            if let Outcome::Pending(reason) = session.analyze()? {
                tracing::warn!(reason, "Simulating without back-filled genders");
            }
            let mut thresholds = session.config.analysis.threshold_map()?;
            if let Some(t) = female {
                thresholds.set(CanonicalGender::F, t)?;
            }
            if let Some(t) = male {
                thresholds.set(CanonicalGender::M, t)?;
            }
            let outcome = session.simulate(&thresholds);
            report(outcome, session.failures(), output, render::simulation)
        }
        Commands::Summary { pipeline } => {
            let (mut session, _) = run_pipeline(workspace, config_path, &pipeline).await?;
            if session.ground_truth().is_some() {
                session.analyze()?;
            }
            report(session.summary(), session.failures(), output, render::summary)
        }
    }
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(dir) = config_path.parent() {
                std::fs::create_dir_all(dir)?;
            }

            let toml_str = toml::to_string_pretty(&RadbiasConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = resolve_config(workspace, config_path, None)?;
            if config_path.is_none() && !radbias_core::config::config_exists(Some(workspace)) {
                eprintln!(
                    "No configuration file found; showing defaults. \
                     Run `radbias config init` to create one."
                );
            }
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

/// Print a result, or the reason it is pending, followed by failed images.
fn report<T: Serialize>(
    outcome: Outcome<T>,
    failures: &[ImageFailure],
    output: Output,
    text: impl FnOnce(&T) -> String,
) -> anyhow::Result<()> {
    match (outcome, output) {
        (Outcome::Ready(result), Output::Json) => {
            let payload = WithFailures {
                result: &result,
                failures,
            };
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        (Outcome::Pending(reason), Output::Json) => {
            let payload = serde_json::json!({ "pending": reason, "failures": failures });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        (Outcome::Ready(result), Output::Text) => {
            print!("{}{}", text(&result), render::failures(failures));
        }
        (Outcome::Pending(reason), Output::Text) => {
            print!("{reason}\n{}", render::failures(failures));
        }
    }
    Ok(())
}

/// Layered configuration plus an optional explicit file and threshold.
pub fn resolve_config(
    workspace: &Path,
    config_path: Option<&Path>,
    threshold: Option<f64>,
) -> anyhow::Result<RadbiasConfig> {
    let loaded = match config_path {
        Some(path) => radbias_core::config::load_config_with_file(Some(workspace), path),
        None => radbias_core::load_config(Some(workspace), None),
    };
    let mut config = loaded.map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    if let Some(t) = threshold {
        config.analysis.decision_threshold = t;
        config.validate()?;
    }
    Ok(config)
}

/// Ground-truth source for a path, honoring the configured delimiter and sheet.
fn ground_truth_source(path: &Path, config: &RadbiasConfig) -> anyhow::Result<Box<dyn DataSource>> {
    Ok(DataSourceType::from_path(path, config.data.delimiter)?
        .with_sheet(config.data.sheet.clone())
        .into_source())
}

async fn load_table(path: &Path, delimiter: char) -> anyhow::Result<Table> {
    let source = DataSourceType::from_path(path, delimiter)?.into_source();
    Ok(source.load(None).await?)
}

/// Image ids in score-table order, first occurrence only.
pub fn score_ids(scores: &Table, id_column: &str) -> anyhow::Result<Vec<ImageInput>> {
    let mut seen = HashSet::new();
    Ok(scores
        .column_values(id_column)?
        .into_iter()
        .flatten()
        .filter(|id| seen.insert(*id))
        .map(ImageInput::new)
        .collect())
}

/// Build a session: ground truth, column choices, then one inference batch.
async fn run_pipeline(
    workspace: &Path,
    config_path: Option<&Path>,
    args: &PipelineArgs,
) -> anyhow::Result<(Session, BatchReport)> {
    let config = resolve_config(workspace, config_path, args.threshold)?;
    let delimiter = config.data.delimiter;
    let mut session = Session::create(config);

    if let Some(path) = &args.ground_truth {
        let source = ground_truth_source(path, &session.config)?;
        session.load_ground_truth(source.as_ref()).await?;
    }
    session.select_columns(
        args.image_id.clone(),
        args.disease.clone(),
        args.gender.clone(),
    );

    let scores = load_table(&args.scores, delimiter).await?;
    let columns = ScoreColumns {
        image_id: args.score_id.clone(),
        ..ScoreColumns::default()
    };
    let model = ScoreTableModel::from_table(&scores, args.model.into(), &columns)?
        .with_name(args.scores.display().to_string());

    let images = if args.images.is_empty() {
        score_ids(&scores, &args.score_id)?
    } else {
        args.images.iter().map(|p| ImageInput::from_path(p)).collect()
    };

    let batch = session
        .predict(&model, &images, |progress| {
            tracing::debug!(
                current = progress.current,
                total = progress.total,
                percent = progress.percent(),
                "Scoring"
            );
        })
        .await?;
    Ok((session, batch))
}
