//! Session-scoped prediction store.

use crate::labels::{CanonicalGender, DISEASE_DETECTED, NO_DISEASE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Output of a single model invocation on one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelOutput {
    /// A disease probability together with the binary decision taken on it.
    Scored { probability: f64, prediction: u8 },
    /// A free-text description; no metric can be derived from it.
    Described { text: String },
}

impl ModelOutput {
    /// Score a probability against a decision threshold.
    pub fn scored(probability: f64, threshold: f64) -> Self {
        Self::Scored {
            probability,
            prediction: u8::from(probability >= threshold),
        }
    }

    pub fn described(text: impl Into<String>) -> Self {
        Self::Described { text: text.into() }
    }

    pub fn probability(&self) -> Option<f64> {
        match self {
            Self::Scored { probability, .. } => Some(*probability),
            Self::Described { .. } => None,
        }
    }

    pub fn binary_prediction(&self) -> Option<u8> {
        match self {
            Self::Scored { prediction, .. } => Some(*prediction),
            Self::Described { .. } => None,
        }
    }

    /// Whether the output is a positive binary prediction.
    pub fn is_positive(&self) -> bool {
        self.binary_prediction() == Some(1)
    }

    /// The prediction rendered as a label string.
    pub fn label(&self) -> &str {
        match self {
            Self::Scored { prediction: 1, .. } => DISEASE_DETECTED,
            Self::Scored { .. } => NO_DISEASE,
            Self::Described { text } => text,
        }
    }
}

/// One row per (image, model invocation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub image_id: String,
    #[serde(default)]
    pub gender: CanonicalGender,
    pub output: ModelOutput,
}

impl PredictionRecord {
    pub fn new(image_id: impl Into<String>, output: ModelOutput) -> Self {
        Self {
            image_id: image_id.into(),
            gender: CanonicalGender::Unknown,
            output,
        }
    }

    pub fn with_gender(mut self, gender: CanonicalGender) -> Self {
        self.gender = gender;
        self
    }
}

/// Append-only table of inference results, in upload order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionStore {
    records: Vec<PredictionRecord>,
}

impl PredictionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: PredictionRecord) {
        self.records.push(record);
    }

    pub fn all(&self) -> &[PredictionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn reset(&mut self) {
        self.records.clear();
    }

    /// Fill in the gender of stored records from a join result.
    ///
    /// Records whose id is not in `genders` are left untouched. Returns the
    /// number of records updated.
    pub fn backfill_gender(&mut self, genders: &HashMap<String, CanonicalGender>) -> usize {
        let mut updated = 0;
        for record in &mut self.records {
            if let Some(gender) = genders.get(&record.image_id) {
                if record.gender != *gender {
                    record.gender = *gender;
                    updated += 1;
                }
            }
        }
        updated
    }
}
