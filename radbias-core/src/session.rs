//! Session context: the state one user builds up across interactions.
//!
//! Every component call goes through a [`Session`]; nothing is process-wide.
//! Two sessions never share a prediction store or ground-truth table.

use crate::config::RadbiasConfig;
use crate::data::profile::{DatasetProfile, profile};
use crate::data::{DataSource, Table};
use crate::error::RadbiasError;
use crate::inference::{
    BatchProgress, BatchReport, DiseaseModel, ImageFailure, ImageInput, run_batch,
};
use crate::join::{JoinSpec, JoinedRecord, LabelAccuracy, accuracy_by_label, join, resolved_genders};
use crate::metrics::{FairnessReport, LiveSummary, fairness_report, live_summary};
use crate::simulate::{SimulationOutcome, ThresholdMap, simulate};
use crate::store::PredictionStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of a pipeline step that may be waiting on user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ready(T),
    /// Nothing was computed; the reason is meant for display.
    Pending(&'static str),
}

impl<T> Outcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Pending(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

pub const NO_GROUND_TRUTH: &str = "No ground-truth data loaded yet.";
pub const NO_PREDICTIONS: &str = "No prediction data available yet. Generate predictions first.";
pub const NO_COLUMNS: &str = "Select the image id and disease columns first.";
pub const NO_PROFILE_COLUMNS: &str = "Select the disease and gender columns first.";

/// Columns chosen by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSelection {
    pub image_id: Option<String>,
    pub disease: Option<String>,
    pub gender: Option<String>,
}

impl ColumnSelection {
    /// A join spec, once both required columns are chosen.
    pub fn join_spec(&self) -> Option<JoinSpec> {
        let spec = JoinSpec::new(self.image_id.clone()?, self.disease.clone()?);
        Some(match &self.gender {
            Some(g) => spec.with_gender(g.clone()),
            None => spec,
        })
    }
}

/// Everything the bias-analysis view shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub joined: Vec<JoinedRecord>,
    pub accuracy_by_label: BTreeMap<String, LabelAccuracy>,
    pub fairness: FairnessReport,
}

/// Session-scoped state.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: uuid::Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub config: RadbiasConfig,
    store: PredictionStore,
    ground_truth: Option<Table>,
    selection: ColumnSelection,
    failures: Vec<ImageFailure>,
}

impl Session {
    /// Start a session. Column defaults come from the configuration.
    pub fn create(config: RadbiasConfig) -> Self {
        let selection = ColumnSelection {
            image_id: config.columns.image_id.clone(),
            disease: config.columns.disease.clone(),
            gender: config.columns.gender.clone(),
        };
        let session = Self {
            id: uuid::Uuid::new_v4(),
            created_at: chrono::Utc::now(),
            config,
            store: PredictionStore::new(),
            ground_truth: None,
            selection,
            failures: Vec::new(),
        };
        tracing::debug!(session = %session.id, "Session created");
        session
    }

    /// Clear predictions, ground truth and failures; keep the configuration.
    pub fn reset(&mut self) {
        *self = Self::create(self.config.clone());
    }

    pub fn store(&self) -> &PredictionStore {
        &self.store
    }

    pub fn ground_truth(&self) -> Option<&Table> {
        self.ground_truth.as_ref()
    }

    pub fn selection(&self) -> &ColumnSelection {
        &self.selection
    }

    pub fn failures(&self) -> &[ImageFailure] {
        &self.failures
    }

    /// Replace the ground-truth table. On error the previous table is kept.
    pub async fn load_ground_truth(
        &mut self,
        source: &dyn DataSource,
    ) -> Result<&Table, RadbiasError> {
        let table = source.load(self.config.data.max_rows).await?;
        tracing::info!(
            session = %self.id,
            location = %source.source_info().location,
            rows = table.row_count(),
            "Ground truth loaded"
        );
        Ok(self.ground_truth.insert(table))
    }

    pub fn set_ground_truth(&mut self, table: Table) {
        self.ground_truth = Some(table);
    }

    /// Remember column choices. `None` leaves a choice unchanged.
    pub fn select_columns(
        &mut self,
        image_id: Option<String>,
        disease: Option<String>,
        gender: Option<String>,
    ) {
        if image_id.is_some() {
            self.selection.image_id = image_id;
        }
        if disease.is_some() {
            self.selection.disease = disease;
        }
        if gender.is_some() {
            self.selection.gender = gender;
        }
    }

    /// Run a model over uploaded images with the configured global threshold.
    pub async fn predict<F>(
        &mut self,
        model: &dyn DiseaseModel,
        images: &[ImageInput],
        on_progress: F,
    ) -> Result<BatchReport, RadbiasError>
    where
        F: FnMut(BatchProgress),
    {
        let threshold = self.config.analysis.decision_threshold;
        let report = run_batch(&mut self.store, model, images, threshold, on_progress).await?;
        self.failures.extend(report.failures.iter().cloned());
        Ok(report)
    }

    /// Join predictions to ground truth and compute every fairness statistic.
    ///
    /// When a gender column is selected, the store's genders are back-filled
    /// from the join.
    pub fn analyze(&mut self) -> Result<Outcome<Analysis>, RadbiasError> {
        let Some(table) = &self.ground_truth else {
            return Ok(Outcome::Pending(NO_GROUND_TRUTH));
        };
        if self.store.is_empty() {
            return Ok(Outcome::Pending(NO_PREDICTIONS));
        }
        let Some(spec) = self.selection.join_spec() else {
            return Ok(Outcome::Pending(NO_COLUMNS));
        };

        let joined = join(self.store.all(), table, &spec)?;
        if spec.gender_col.is_some() {
            let updated = self.store.backfill_gender(&resolved_genders(&joined));
            tracing::debug!(updated, "Back-filled genders from ground truth");
        }

        Ok(Outcome::Ready(Analysis {
            accuracy_by_label: accuracy_by_label(&joined),
            fairness: fairness_report(&joined),
            joined,
        }))
    }

    /// Simulate per-group thresholds over the stored predictions.
    pub fn simulate(&self, thresholds: &ThresholdMap) -> Outcome<SimulationOutcome> {
        if self.store.is_empty() {
            return Outcome::Pending(NO_PREDICTIONS);
        }
        Outcome::Ready(simulate(self.store.all(), thresholds))
    }

    /// Profile the ground-truth table for exploration.
    pub fn profile(&self, age_col: Option<&str>) -> Result<Outcome<DatasetProfile>, RadbiasError> {
        let Some(table) = &self.ground_truth else {
            return Ok(Outcome::Pending(NO_GROUND_TRUTH));
        };
        let (Some(disease), Some(gender)) = (&self.selection.disease, &self.selection.gender) else {
            return Ok(Outcome::Pending(NO_PROFILE_COLUMNS));
        };
        Ok(Outcome::Ready(profile(table, disease, gender, age_col)?))
    }

    /// Live summary over the store.
    pub fn summary(&self) -> Outcome<LiveSummary> {
        if self.store.is_empty() {
            return Outcome::Pending(NO_PREDICTIONS);
        }
        Outcome::Ready(live_summary(self.store.all()))
    }
}
