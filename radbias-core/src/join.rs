//! Left join of predictions against a ground-truth table.

use crate::data::Table;
use crate::error::RadbiasError;
use crate::labels::{self, CanonicalGender};
use crate::store::{ModelOutput, PredictionRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Which ground-truth columns to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    /// Column matched against each prediction's `image_id`.
    pub image_id_col: String,
    /// Column holding the free-text disease label.
    pub disease_col: String,
    /// Optional column used to back-fill each prediction's gender.
    #[serde(default)]
    pub gender_col: Option<String>,
}

impl JoinSpec {
    pub fn new(image_id_col: impl Into<String>, disease_col: impl Into<String>) -> Self {
        Self {
            image_id_col: image_id_col.into(),
            disease_col: disease_col.into(),
            gender_col: None,
        }
    }

    pub fn with_gender(mut self, gender_col: impl Into<String>) -> Self {
        self.gender_col = Some(gender_col.into());
        self
    }
}

/// A prediction with its ground truth, if any was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRecord {
    pub image_id: String,
    pub gender: CanonicalGender,
    pub output: ModelOutput,
    /// Canonicalized disease label; `None` when no ground-truth row matched.
    pub true_label: Option<String>,
    /// Label equality after case and whitespace normalization; `None`
    /// without ground truth.
    pub correct: Option<bool>,
}

impl JoinedRecord {
    pub fn has_truth(&self) -> bool {
        self.true_label.is_some()
    }

    /// Ground truth as a binary disease indicator.
    pub fn truth_is_positive(&self) -> Option<bool> {
        self.true_label.as_deref().map(|l| !labels::is_no_disease(l))
    }
}

/// Join predictions to ground truth.
///
/// Every prediction appears exactly once in the output, in input order. When
/// several ground-truth rows share a key the first one wins.
pub fn join(
    predictions: &[PredictionRecord],
    ground_truth: &Table,
    spec: &JoinSpec,
) -> Result<Vec<JoinedRecord>, RadbiasError> {
    let id_idx = ground_truth.column_index(&spec.image_id_col)?;
    let disease_idx = ground_truth.column_index(&spec.disease_col)?;
    let gender_idx = spec
        .gender_col
        .as_deref()
        .map(|c| ground_truth.column_index(c))
        .transpose()?;

    let mut first_row: HashMap<&str, usize> = HashMap::new();
    let mut duplicates = 0usize;
    for r in 0..ground_truth.row_count() {
        if let Some(key) = ground_truth.cell(r, id_idx) {
            if first_row.contains_key(key) {
                duplicates += 1;
            } else {
                first_row.insert(key, r);
            }
        }
    }
    if duplicates > 0 {
        tracing::warn!(
            duplicates,
            column = %spec.image_id_col,
            "Ground truth has repeated join keys; using the first row for each"
        );
    }

    let mut unmatched = 0usize;
    let joined: Vec<JoinedRecord> = predictions
        .iter()
        .map(|prediction| {
            let row = first_row.get(prediction.image_id.as_str()).copied();
            if row.is_none() {
                unmatched += 1;
            }

            let true_label = row
                .and_then(|r| ground_truth.cell(r, disease_idx))
                .map(labels::canonicalize_disease);
            let gender = match (row, gender_idx) {
                (Some(r), Some(g)) => ground_truth
                    .cell(r, g)
                    .map(labels::canonicalize_gender)
                    .unwrap_or(prediction.gender),
                _ => prediction.gender,
            };
            let correct = true_label
                .as_deref()
                .map(|truth| labels::labels_match(prediction.output.label(), truth));

            JoinedRecord {
                image_id: prediction.image_id.clone(),
                gender,
                output: prediction.output.clone(),
                true_label,
                correct,
            }
        })
        .collect();

    tracing::debug!(
        predictions = predictions.len(),
        unmatched,
        "Joined predictions to ground truth"
    );
    Ok(joined)
}

/// Genders resolved by a join, keyed by image id, for back-filling the store.
pub fn resolved_genders(joined: &[JoinedRecord]) -> HashMap<String, CanonicalGender> {
    joined
        .iter()
        .map(|r| (r.image_id.clone(), r.gender))
        .collect()
}

/// Share of correct predictions for one true label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelAccuracy {
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
}

/// Mean correctness per true label. Rows without ground truth are skipped.
pub fn accuracy_by_label(joined: &[JoinedRecord]) -> BTreeMap<String, LabelAccuracy> {
    let mut out: BTreeMap<String, LabelAccuracy> = BTreeMap::new();
    for record in joined {
        let (Some(label), Some(correct)) = (&record.true_label, record.correct) else {
            continue;
        };
        let entry = out.entry(label.clone()).or_insert(LabelAccuracy {
            total: 0,
            correct: 0,
            accuracy: 0.0,
        });
        entry.total += 1;
        entry.correct += usize::from(correct);
    }
    for entry in out.values_mut() {
        entry.accuracy = entry.correct as f64 / entry.total as f64;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::{DISEASE_DETECTED, NO_DISEASE};
    use pretty_assertions::assert_eq;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    fn ground_truth() -> Table {
        Table::new(
            vec!["Image Index".into(), "Finding Labels".into(), "Patient Gender".into()],
            vec![
                vec![s("a.png"), s("No Finding"), s("F")],
                vec![s("b.png"), s("Pneumonia"), s("M")],
                vec![s("dup.png"), s("Pneumonia"), s("F")],
                vec![s("dup.png"), s("No Finding"), s("M")],
                vec![s("nolabel.png"), None, s("M")],
            ],
        )
    }

    fn spec() -> JoinSpec {
        JoinSpec::new("Image Index", "Finding Labels").with_gender("Patient Gender")
    }

    #[test]
    fn test_join_left_preserving() {
        let preds = vec![
            PredictionRecord::new("a.png", ModelOutput::scored(0.2, 0.5)),
            PredictionRecord::new("missing.png", ModelOutput::scored(0.9, 0.5)),
            PredictionRecord::new("b.png", ModelOutput::scored(0.9, 0.5)),
        ];
        let joined = join(&preds, &ground_truth(), &spec()).unwrap();
        assert_eq!(joined.len(), preds.len());

        assert_eq!(joined[0].true_label.as_deref(), Some(NO_DISEASE));
        assert_eq!(joined[0].correct, Some(true));
        assert_eq!(joined[0].gender, CanonicalGender::F);

        assert_eq!(joined[1].true_label, None);
        assert_eq!(joined[1].correct, None);
        assert_eq!(joined[1].gender, CanonicalGender::Unknown);

        // "Disease Detected" never string-matches a named disease.
        assert_eq!(joined[2].true_label.as_deref(), Some("Pneumonia"));
        assert_eq!(joined[2].output.label(), DISEASE_DETECTED);
        assert_eq!(joined[2].correct, Some(false));
        assert_eq!(joined[2].truth_is_positive(), Some(true));
    }

    #[test]
    fn test_join_duplicate_key_first_row_wins() {
        let preds = vec![PredictionRecord::new("dup.png", ModelOutput::scored(0.9, 0.5))];
        let joined = join(&preds, &ground_truth(), &spec()).unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].true_label.as_deref(), Some("Pneumonia"));
        assert_eq!(joined[0].gender, CanonicalGender::F);
    }

    #[test]
    fn test_join_matched_row_without_label() {
        let preds = vec![PredictionRecord::new("nolabel.png", ModelOutput::scored(0.1, 0.5))];
        let joined = join(&preds, &ground_truth(), &spec()).unwrap();
        assert_eq!(joined[0].true_label, None);
        assert_eq!(joined[0].gender, CanonicalGender::M);
    }

    #[test]
    fn test_join_described_output_compares_text() {
        let preds = vec![
            PredictionRecord::new("b.png", ModelOutput::described(" pneumonia ")),
            PredictionRecord::new("a.png", ModelOutput::described("Cardiomegaly")),
        ];
        let joined = join(&preds, &ground_truth(), &JoinSpec::new("Image Index", "Finding Labels"))
            .unwrap();
        assert_eq!(joined[0].correct, Some(true));
        assert_eq!(joined[1].correct, Some(false));
        assert_eq!(joined[0].gender, CanonicalGender::Unknown);
    }

    #[test]
    fn test_join_invalid_column() {
        let preds = vec![PredictionRecord::new("a.png", ModelOutput::scored(0.2, 0.5))];
        let err = join(&preds, &ground_truth(), &JoinSpec::new("Image_ID", "Finding Labels"))
            .unwrap_err();
        assert!(
            matches!(err, RadbiasError::InvalidColumn { ref column, .. } if column == "Image_ID")
        );

        let err = join(
            &preds,
            &ground_truth(),
            &JoinSpec::new("Image Index", "Finding Labels").with_gender("Sex"),
        )
        .unwrap_err();
        assert!(matches!(err, RadbiasError::InvalidColumn { .. }));
    }

    #[test]
    fn test_join_empty_inputs() {
        let joined = join(&[], &ground_truth(), &spec()).unwrap();
        assert!(joined.is_empty());

        let empty = Table::new(vec!["Image Index".into(), "Finding Labels".into()], Vec::new());
        let preds = vec![PredictionRecord::new("a.png", ModelOutput::scored(0.2, 0.5))];
        let joined = join(&preds, &empty, &JoinSpec::new("Image Index", "Finding Labels")).unwrap();
        assert_eq!(joined.len(), 1);
        assert!(!joined[0].has_truth());
    }

    #[test]
    fn test_accuracy_by_label() {
        let preds = vec![
            PredictionRecord::new("a.png", ModelOutput::scored(0.2, 0.5)),
            PredictionRecord::new("a.png", ModelOutput::scored(0.7, 0.5)),
            PredictionRecord::new("b.png", ModelOutput::scored(0.9, 0.5)),
            PredictionRecord::new("zzz.png", ModelOutput::scored(0.9, 0.5)),
        ];
        let joined = join(&preds, &ground_truth(), &spec()).unwrap();
        let by_label = accuracy_by_label(&joined);
        assert_eq!(by_label.len(), 2);
        assert_eq!(by_label[NO_DISEASE].total, 2);
        assert_eq!(by_label[NO_DISEASE].accuracy, 0.5);
        assert_eq!(by_label["Pneumonia"].accuracy, 0.0);
    }

    #[test]
    fn test_resolved_genders() {
        let preds = vec![PredictionRecord::new("b.png", ModelOutput::scored(0.9, 0.5))];
        let joined = join(&preds, &ground_truth(), &spec()).unwrap();
        let genders = resolved_genders(&joined);
        assert_eq!(genders["b.png"], CanonicalGender::M);
    }
}
