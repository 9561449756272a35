//! # radbias-core: gender-bias measurement for chest X-ray classifiers
//!
//! The pipeline runs leaves first:
//! 1. **Labels**: free-text gender and disease labels to a fixed vocabulary
//! 2. **Store**: session-scoped, append-only prediction records
//! 3. **Join**: left join of predictions to ground truth on a chosen key
//! 4. **Metrics**: detection rates, confusion matrix, demographic parity, equalized odds
//! 5. **Simulate**: per-group decision thresholds fed back into the metrics
//!
//! A [`Session`] owns the state and drives the pipeline; model inference is an
//! external collaborator behind [`DiseaseModel`].

// Foundation
pub mod config;
pub mod error;

// Pipeline
pub mod join;
pub mod labels;
pub mod metrics;
pub mod simulate;
pub mod store;

// Collaborators & state
pub mod data;
pub mod inference;
pub mod session;

// Re-exports
pub use config::{RadbiasConfig, load_config};
pub use data::{DataSource, DataSourceType, Table};
pub use error::RadbiasError;
pub use inference::{DiseaseModel, ImageInput, ModelKind, ScoreColumns, ScoreTableModel};
pub use join::{JoinSpec, JoinedRecord, join};
pub use labels::{CanonicalGender, canonicalize_disease, canonicalize_gender};
pub use metrics::{BiasVerdict, FairnessReport, GroupMetrics, group_metrics};
pub use session::{Outcome, Session};
pub use simulate::{ThresholdMap, apply_thresholds};
pub use store::{ModelOutput, PredictionRecord, PredictionStore};
