//! Fairness metrics engine.

pub mod fairness;
pub mod group;
pub mod summary;

pub use fairness::{
    CONFUSION_LABELS, ClassificationMetrics, ConfusionMatrix, FairnessReport, GroupRates,
    demographic_parity_difference, equalized_odds_difference, fairness_report,
};
pub use group::{
    BIAS_SIGNIFICANCE_THRESHOLD, BiasAssessment, BiasVerdict, GroupMetrics, bias_difference,
    gender_bias, gender_detection, group_metrics, rate,
};
pub use summary::{LiveSummary, live_summary};
