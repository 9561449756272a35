//! Live summary of the prediction store, no ground truth required.

use super::group::{BiasAssessment, GroupMetrics, gender_bias, gender_detection};
use crate::labels::CanonicalGender;
use crate::store::PredictionRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSummary {
    pub total_predictions: usize,
    /// Count of each prediction label ("Disease Detected", "No Disease", or
    /// free text).
    pub distribution: BTreeMap<String, usize>,
    pub female: GroupMetrics,
    pub male: GroupMetrics,
    pub bias: BiasAssessment,
    /// Probabilities in store order; `None` for text-only outputs.
    pub probabilities: Vec<Option<f64>>,
}

pub fn live_summary(records: &[PredictionRecord]) -> LiveSummary {
    let mut distribution: BTreeMap<String, usize> = BTreeMap::new();
    for record in records {
        *distribution.entry(record.output.label().to_string()).or_insert(0) += 1;
    }

    let by_gender = gender_detection(records);
    let group = |g: CanonicalGender| by_gender.get(&g).copied().unwrap_or_default();

    LiveSummary {
        total_predictions: records.len(),
        distribution,
        female: group(CanonicalGender::F),
        male: group(CanonicalGender::M),
        bias: gender_bias(&by_gender),
        probabilities: records.iter().map(|r| r.output.probability()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::{DISEASE_DETECTED, NO_DISEASE};
    use crate::metrics::BiasVerdict;
    use crate::store::ModelOutput;

    #[test]
    fn test_live_summary() {
        let records = vec![
            PredictionRecord::new("a", ModelOutput::scored(0.9, 0.5))
                .with_gender(CanonicalGender::F),
            PredictionRecord::new("b", ModelOutput::scored(0.2, 0.5))
                .with_gender(CanonicalGender::F),
            PredictionRecord::new("c", ModelOutput::scored(0.6, 0.5))
                .with_gender(CanonicalGender::M),
            PredictionRecord::new("d", ModelOutput::described("Atelectasis")),
        ];
        let summary = live_summary(&records);
        assert_eq!(summary.total_predictions, 4);
        assert_eq!(summary.distribution[DISEASE_DETECTED], 2);
        assert_eq!(summary.distribution[NO_DISEASE], 1);
        assert_eq!(summary.distribution["Atelectasis"], 1);
        assert_eq!(summary.female.detection_rate, 0.5);
        assert_eq!(summary.male.detection_rate, 1.0);
        assert_eq!(summary.bias.difference, 0.5);
        assert_eq!(summary.bias.verdict, BiasVerdict::Significant);
        assert_eq!(summary.probabilities, vec![Some(0.9), Some(0.2), Some(0.6), None]);
    }

    #[test]
    fn test_live_summary_empty() {
        let summary = live_summary(&[]);
        assert_eq!(summary.total_predictions, 0);
        assert!(summary.distribution.is_empty());
        assert_eq!(summary.female, GroupMetrics::default());
        assert_eq!(summary.bias.difference, 0.0);
    }
}
