//! Inference collaborator contract and the batch runner.
//!
//! The models themselves live outside this crate. A [`DiseaseModel`] only
//! needs to turn an image into a [`ModelOutput`]; [`ScoreTableModel`] serves
//! outputs that were computed elsewhere and exported as a table.

use crate::data::Table;
use crate::error::RadbiasError;
use crate::store::{ModelOutput, PredictionRecord, PredictionStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Model selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// CNN classifier producing a disease probability.
    #[default]
    Classifier,
    /// Vision-language agent producing text, or a probability when configured to.
    Agent,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classifier => f.write_str("classifier"),
            Self::Agent => f.write_str("agent"),
        }
    }
}

/// An uploaded image, identified by its file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInput {
    pub id: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl ImageInput {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: None,
        }
    }

    /// Use the file name as the image id, as uploads do.
    pub fn from_path(path: &Path) -> Self {
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            id,
            path: Some(path.to_path_buf()),
        }
    }
}

/// A model that scores chest X-ray images.
#[async_trait]
pub trait DiseaseModel: Send + Sync {
    fn kind(&self) -> ModelKind;

    fn name(&self) -> &str;

    /// Run the model on one image. `threshold` turns a probability into a
    /// binary decision.
    async fn infer(&self, image: &ImageInput, threshold: f64) -> Result<ModelOutput, RadbiasError>;
}

/// Column names of a score table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreColumns {
    pub image_id: String,
    pub probability: String,
    pub response: String,
}

impl Default for ScoreColumns {
    fn default() -> Self {
        Self {
            image_id: "image_id".to_string(),
            probability: "probability".to_string(),
            response: "response".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct ScoreRow {
    probability: Option<String>,
    response: Option<String>,
}

/// Serves precomputed model outputs keyed by image id.
#[derive(Debug, Clone)]
pub struct ScoreTableModel {
    kind: ModelKind,
    name: String,
    rows: HashMap<String, ScoreRow>,
}

impl ScoreTableModel {
    /// Index a score table. The classifier needs a probability column; the
    /// agent needs a probability or a response column. Later rows never
    /// replace an earlier row for the same id.
    pub fn from_table(
        table: &Table,
        kind: ModelKind,
        columns: &ScoreColumns,
    ) -> Result<Self, RadbiasError> {
        let id_idx = table.column_index(&columns.image_id)?;
        let prob_idx = table.column_index(&columns.probability).ok();
        let resp_idx = table.column_index(&columns.response).ok();

        match kind {
            ModelKind::Classifier if prob_idx.is_none() => {
                return Err(RadbiasError::invalid_column(&columns.probability, &table.columns));
            }
            ModelKind::Agent if prob_idx.is_none() && resp_idx.is_none() => {
                return Err(RadbiasError::invalid_column(&columns.response, &table.columns));
            }
            _ => {}
        }

        let mut rows = HashMap::new();
        for r in 0..table.row_count() {
            let Some(id) = table.cell(r, id_idx) else {
                continue;
            };
            rows.entry(id.to_string()).or_insert_with(|| ScoreRow {
                probability: prob_idx.and_then(|i| table.cell(r, i)).map(String::from),
                response: resp_idx.and_then(|i| table.cell(r, i)).map(String::from),
            });
        }

        Ok(Self {
            kind,
            name: format!("score-table:{kind}"),
            rows,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn parse_probability(raw: &str) -> Result<f64, RadbiasError> {
    let p: f64 = raw
        .trim()
        .parse()
        .map_err(|_| RadbiasError::inference(format!("Probability '{raw}' is not a number")))?;
    if !(0.0..=1.0).contains(&p) {
        return Err(RadbiasError::inference(format!(
            "Probability {p} is outside [0, 1]"
        )));
    }
    Ok(p)
}

#[async_trait]
impl DiseaseModel for ScoreTableModel {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn infer(&self, image: &ImageInput, threshold: f64) -> Result<ModelOutput, RadbiasError> {
        let row = self
            .rows
            .get(&image.id)
            .ok_or_else(|| RadbiasError::inference(format!("No model output for '{}'", image.id)))?;

        match (self.kind, &row.probability, &row.response) {
            (_, Some(raw), _) => Ok(ModelOutput::scored(parse_probability(raw)?, threshold)),
            (ModelKind::Agent, None, Some(text)) => Ok(ModelOutput::described(text.clone())),
            _ => Err(RadbiasError::inference(format!(
                "Model output for '{}' is empty",
                image.id
            ))),
        }
    }
}

/// Progress of a batch, reported after each image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub current: usize,
    pub total: usize,
}

impl BatchProgress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            100
        } else {
            (self.current * 100 / self.total) as u8
        }
    }
}

/// An image the model could not process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFailure {
    pub image_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub model: String,
    pub kind: ModelKind,
    pub processed: usize,
    pub succeeded: usize,
    pub failures: Vec<ImageFailure>,
}

/// Run a model over images in upload order, appending one record per
/// successful image to the store.
///
/// A failing image is recorded in the report and the batch moves on.
pub async fn run_batch<F>(
    store: &mut PredictionStore,
    model: &dyn DiseaseModel,
    images: &[ImageInput],
    threshold: f64,
    mut on_progress: F,
) -> Result<BatchReport, RadbiasError>
where
    F: FnMut(BatchProgress),
{
    if !(0.0..=1.0).contains(&threshold) {
        return Err(RadbiasError::InvalidThreshold {
            group: "global".to_string(),
            value: threshold,
        });
    }

    let total = images.len();
    let mut report = BatchReport {
        model: model.name().to_string(),
        kind: model.kind(),
        processed: 0,
        succeeded: 0,
        failures: Vec::new(),
    };
    tracing::info!(model = model.name(), total, threshold, "Starting inference batch");

    for (i, image) in images.iter().enumerate() {
        match model.infer(image, threshold).await {
            Ok(output) => {
                tracing::debug!(image = %image.id, prediction = output.label(), "Image processed");
                store.append(PredictionRecord::new(image.id.clone(), output));
                report.succeeded += 1;
            }
            Err(e) => {
                tracing::warn!(image = %image.id, error = %e, "Inference failed");
                report.failures.push(ImageFailure {
                    image_id: image.id.clone(),
                    message: e.to_string(),
                });
            }
        }
        report.processed += 1;
        on_progress(BatchProgress {
            current: i + 1,
            total,
        });
    }

    tracing::info!(
        succeeded = report.succeeded,
        failed = report.failures.len(),
        "Inference batch finished"
    );
    Ok(report)
}
