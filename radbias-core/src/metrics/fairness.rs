//! Ground-truth fairness statistics: confusion matrix, classification
//! metrics, demographic parity and equalized odds.
//!
//! Only joined records that have both a true label and a scored output take
//! part. Every ratio follows the zero-denominator convention of
//! [`rate`](super::group::rate).

use super::group::rate;
use crate::join::JoinedRecord;
use crate::labels::{CanonicalGender, NO_DISEASE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Axis order of the confusion matrix, for both truth (rows) and prediction
/// (columns).
pub const CONFUSION_LABELS: [&str; 2] = [NO_DISEASE, "Disease"];

/// 2x2 counts indexed `[truth][predicted]`, `0` = No Disease, `1` = Disease.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub counts: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    pub fn record(&mut self, truth: bool, predicted: bool) {
        self.counts[usize::from(truth)][usize::from(predicted)] += 1;
    }

    pub fn true_negatives(&self) -> usize {
        self.counts[0][0]
    }

    pub fn false_positives(&self) -> usize {
        self.counts[0][1]
    }

    pub fn false_negatives(&self) -> usize {
        self.counts[1][0]
    }

    pub fn true_positives(&self) -> usize {
        self.counts[1][1]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Binary metrics with Disease as the positive class.
    pub fn classification(&self) -> ClassificationMetrics {
        let tp = self.true_positives();
        let precision = rate(tp, tp + self.false_positives());
        let recall = rate(tp, tp + self.false_negatives());
        let f1_score = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        ClassificationMetrics {
            accuracy: rate(tp + self.true_negatives(), self.total()),
            precision,
            recall,
            f1_score,
        }
    }
}

/// Classification metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

/// Ground-truth conditioned rates for one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupRates {
    pub count: usize,
    /// Share of the group predicted positive.
    pub selection_rate: f64,
    pub true_positive_rate: f64,
    pub false_positive_rate: f64,
}

impl GroupRates {
    fn from_matrix(matrix: &ConfusionMatrix) -> Self {
        let tp = matrix.true_positives();
        let fp = matrix.false_positives();
        Self {
            count: matrix.total(),
            selection_rate: rate(tp + fp, matrix.total()),
            true_positive_rate: rate(tp, tp + matrix.false_negatives()),
            false_positive_rate: rate(fp, fp + matrix.true_negatives()),
        }
    }
}

/// Fairness statistics over a joined record set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FairnessReport {
    /// Records with ground truth and a scored output.
    pub evaluated: usize,
    /// Records left out for lack of either.
    pub skipped: usize,
    pub demographic_parity_difference: f64,
    pub equalized_odds_difference: f64,
    pub by_group: BTreeMap<CanonicalGender, GroupRates>,
    pub confusion_matrix: ConfusionMatrix,
    pub classification: ClassificationMetrics,
}

/// Max minus min, `0.0` for no values.
fn spread(values: impl Iterator<Item = f64>) -> f64 {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if min.is_finite() && max.is_finite() {
        max - min
    } else {
        0.0
    }
}

/// Max minus min of the positive-prediction rate across groups.
pub fn demographic_parity_difference(by_group: &BTreeMap<CanonicalGender, GroupRates>) -> f64 {
    spread(by_group.values().map(|g| g.selection_rate))
}

/// Larger of the true-positive-rate and false-positive-rate spreads across
/// groups.
pub fn equalized_odds_difference(by_group: &BTreeMap<CanonicalGender, GroupRates>) -> f64 {
    let tpr = spread(by_group.values().map(|g| g.true_positive_rate));
    let fpr = spread(by_group.values().map(|g| g.false_positive_rate));
    tpr.max(fpr)
}

/// Compute every ground-truth statistic in one pass.
pub fn fairness_report(records: &[JoinedRecord]) -> FairnessReport {
    let mut overall = ConfusionMatrix::default();
    let mut per_group: BTreeMap<CanonicalGender, ConfusionMatrix> = BTreeMap::new();
    let mut evaluated = 0usize;

    for record in records {
        let (Some(truth), Some(prediction)) =
            (record.truth_is_positive(), record.output.binary_prediction())
        else {
            continue;
        };
        let predicted = prediction == 1;
        overall.record(truth, predicted);
        per_group
            .entry(record.gender)
            .or_default()
            .record(truth, predicted);
        evaluated += 1;
    }

    let by_group: BTreeMap<CanonicalGender, GroupRates> = per_group
        .iter()
        .map(|(g, m)| (*g, GroupRates::from_matrix(m)))
        .collect();

    let report = FairnessReport {
        evaluated,
        skipped: records.len() - evaluated,
        demographic_parity_difference: demographic_parity_difference(&by_group),
        equalized_odds_difference: equalized_odds_difference(&by_group),
        classification: overall.classification(),
        confusion_matrix: overall,
        by_group,
    };
    tracing::debug!(
        evaluated = report.evaluated,
        skipped = report.skipped,
        dp = report.demographic_parity_difference,
        eo = report.equalized_odds_difference,
        "Computed fairness report"
    );
    report
}
