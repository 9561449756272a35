//! Per-group threshold simulation for bias mitigation what-ifs.

use crate::error::RadbiasError;
use crate::labels::CanonicalGender;
use crate::metrics::{BiasAssessment, GroupMetrics, gender_bias, gender_detection};
use crate::store::{ModelOutput, PredictionRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Decision thresholds keyed by gender. Every stored value is within `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<CanonicalGender, f64>",
    into = "BTreeMap<CanonicalGender, f64>"
)]
pub struct ThresholdMap {
    thresholds: BTreeMap<CanonicalGender, f64>,
}

impl ThresholdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Female and male thresholds; `Unknown` keeps its original predictions.
    pub fn by_gender(female: f64, male: f64) -> Result<Self, RadbiasError> {
        Self::new()
            .with(CanonicalGender::F, female)?
            .with(CanonicalGender::M, male)
    }

    pub fn with(mut self, group: CanonicalGender, threshold: f64) -> Result<Self, RadbiasError> {
        self.set(group, threshold)?;
        Ok(self)
    }

    pub fn set(&mut self, group: CanonicalGender, threshold: f64) -> Result<(), RadbiasError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(RadbiasError::InvalidThreshold {
                group: group.to_string(),
                value: threshold,
            });
        }
        self.thresholds.insert(group, threshold);
        Ok(())
    }

    pub fn get(&self, group: CanonicalGender) -> Option<f64> {
        self.thresholds.get(&group).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalGender, f64)> + '_ {
        self.thresholds.iter().map(|(g, t)| (*g, *t))
    }
}

impl TryFrom<BTreeMap<CanonicalGender, f64>> for ThresholdMap {
    type Error = RadbiasError;

    fn try_from(thresholds: BTreeMap<CanonicalGender, f64>) -> Result<Self, Self::Error> {
        thresholds
            .into_iter()
            .try_fold(Self::new(), |map, (group, t)| map.with(group, t))
    }
}

impl From<ThresholdMap> for BTreeMap<CanonicalGender, f64> {
    fn from(map: ThresholdMap) -> Self {
        map.thresholds
    }
}

/// Re-derive binary predictions under per-group thresholds.
///
/// Returns a new vector; the input is never modified. Records without a
/// probability, or whose group has no threshold, are copied unchanged.
pub fn apply_thresholds(
    records: &[PredictionRecord],
    thresholds: &ThresholdMap,
) -> Vec<PredictionRecord> {
    records
        .iter()
        .map(|record| match (&record.output, thresholds.get(record.gender)) {
            (ModelOutput::Scored { probability, .. }, Some(threshold)) => PredictionRecord {
                output: ModelOutput::scored(*probability, threshold),
                ..record.clone()
            },
            _ => record.clone(),
        })
        .collect()
}

/// Adjusted predictions with the metrics recomputed on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub thresholds: ThresholdMap,
    pub adjusted: Vec<PredictionRecord>,
    pub by_gender: BTreeMap<CanonicalGender, GroupMetrics>,
    pub bias: BiasAssessment,
    /// Records whose binary prediction changed.
    pub flipped: usize,
}

pub fn simulate(records: &[PredictionRecord], thresholds: &ThresholdMap) -> SimulationOutcome {
    let adjusted = apply_thresholds(records, thresholds);
    let flipped = records
        .iter()
        .zip(&adjusted)
        .filter(|(before, after)| {
            before.output.binary_prediction() != after.output.binary_prediction()
        })
        .count();
    let by_gender = gender_detection(&adjusted);
    let bias = gender_bias(&by_gender);

    tracing::info!(
        records = records.len(),
        flipped,
        difference = bias.difference,
        verdict = %bias.verdict,
        "Simulated thresholds"
    );

    SimulationOutcome {
        thresholds: thresholds.clone(),
        adjusted,
        by_gender,
        bias,
        flipped,
    }
}
