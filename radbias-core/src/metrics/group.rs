//! Group-conditioned detection rates and the bias-difference advisory.

use crate::labels::CanonicalGender;
use crate::store::PredictionRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Rate differences above this are flagged as significant.
pub const BIAS_SIGNIFICANCE_THRESHOLD: f64 = 0.10;

/// `numerator / denominator`, or `0.0` when the denominator is zero.
pub fn rate(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Counts and detection rate for one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupMetrics {
    pub total: usize,
    pub positive_count: usize,
    pub detection_rate: f64,
}

impl GroupMetrics {
    pub fn new(total: usize, positive_count: usize) -> Self {
        Self {
            total,
            positive_count,
            detection_rate: rate(positive_count, total),
        }
    }
}

/// Count records and positives per group.
///
/// Only groups that occur in `records` appear in the result; an empty input
/// yields an empty map.
pub fn group_metrics<R, K, G, P>(
    records: &[R],
    group_of: G,
    is_positive: P,
) -> BTreeMap<K, GroupMetrics>
where
    K: Ord,
    G: Fn(&R) -> K,
    P: Fn(&R) -> bool,
{
    let mut counts: BTreeMap<K, (usize, usize)> = BTreeMap::new();
    for record in records {
        let entry = counts.entry(group_of(record)).or_insert((0, 0));
        entry.0 += 1;
        if is_positive(record) {
            entry.1 += 1;
        }
    }
    counts
        .into_iter()
        .map(|(k, (total, positives))| (k, GroupMetrics::new(total, positives)))
        .collect()
}

/// Detection rate per canonical gender over scored predictions.
///
/// Text-only outputs carry no binary decision and are left out of the counts.
pub fn gender_detection(records: &[PredictionRecord]) -> BTreeMap<CanonicalGender, GroupMetrics> {
    let scored: Vec<&PredictionRecord> = records
        .iter()
        .filter(|r| r.output.binary_prediction().is_some())
        .collect();
    group_metrics(&scored, |r| r.gender, |r| r.output.is_positive())
}

/// Advisory label for a rate difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasVerdict {
    Significant,
    Acceptable,
}

impl BiasVerdict {
    pub fn from_difference(difference: f64) -> Self {
        if difference > BIAS_SIGNIFICANCE_THRESHOLD {
            Self::Significant
        } else {
            Self::Acceptable
        }
    }
}

impl fmt::Display for BiasVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Significant => f.write_str("significant"),
            Self::Acceptable => f.write_str("acceptable"),
        }
    }
}

/// Absolute detection-rate difference between two groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasAssessment {
    pub group_a: String,
    pub group_b: String,
    pub rate_a: f64,
    pub rate_b: f64,
    pub difference: f64,
    pub verdict: BiasVerdict,
}

/// Compare two groups. A group missing from `metrics` counts as rate 0.
pub fn bias_difference<K>(
    metrics: &BTreeMap<K, GroupMetrics>,
    group_a: &K,
    group_b: &K,
) -> BiasAssessment
where
    K: Ord + fmt::Display,
{
    let rate_of = |k: &K| metrics.get(k).map_or(0.0, |m| m.detection_rate);
    let rate_a = rate_of(group_a);
    let rate_b = rate_of(group_b);
    let difference = (rate_a - rate_b).abs();
    BiasAssessment {
        group_a: group_a.to_string(),
        group_b: group_b.to_string(),
        rate_a,
        rate_b,
        difference,
        verdict: BiasVerdict::from_difference(difference),
    }
}

/// The female-versus-male comparison shown throughout the dashboard.
pub fn gender_bias(metrics: &BTreeMap<CanonicalGender, GroupMetrics>) -> BiasAssessment {
    bias_difference(metrics, &CanonicalGender::F, &CanonicalGender::M)
}
