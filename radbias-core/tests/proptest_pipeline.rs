//! Property-based tests for the bias pipeline.

use proptest::prelude::*;
use radbias_core::labels::{FEMALE_KEYWORDS, MALE_KEYWORDS};
use radbias_core::metrics::{
    GroupRates, demographic_parity_difference, equalized_odds_difference, gender_detection,
};
use radbias_core::{
    CanonicalGender, JoinSpec, ModelOutput, PredictionRecord, Table, ThresholdMap,
    apply_thresholds, canonicalize_gender, join,
};
use std::collections::BTreeMap;

fn gender_strategy() -> impl Strategy<Value = CanonicalGender> {
    prop_oneof![
        Just(CanonicalGender::F),
        Just(CanonicalGender::M),
        Just(CanonicalGender::Unknown),
    ]
}

fn record_strategy() -> impl Strategy<Value = PredictionRecord> {
    ("[a-z]{1,6}", 0.0f64..=1.0, gender_strategy()).prop_map(|(id, p, gender)| {
        PredictionRecord::new(id, ModelOutput::scored(p, 0.5)).with_gender(gender)
    })
}

proptest! {
    /// Canonicalization never leaves the three-value vocabulary, whatever the input.
    #[test]
    fn canonical_gender_is_closed(label in ".{0,24}") {
        let g = canonicalize_gender(&label);
        prop_assert!(CanonicalGender::ALL.contains(&g));
    }

    /// Listed keywords resolve to their group regardless of case and padding.
    #[test]
    fn gender_keywords_ignore_case(idx in 0usize..4, upper in any::<bool>(), pad in 0usize..3) {
        let spaces = " ".repeat(pad);
        let render = |k: &str| {
            let k = if upper { k.to_uppercase() } else { k.to_string() };
            format!("{spaces}{k}{spaces}")
        };
        prop_assert_eq!(canonicalize_gender(&render(MALE_KEYWORDS[idx])), CanonicalGender::M);
        prop_assert_eq!(canonicalize_gender(&render(FEMALE_KEYWORDS[idx])), CanonicalGender::F);
    }

    /// Detection rates stay within [0, 1].
    #[test]
    fn detection_rates_bounded(records in prop::collection::vec(record_strategy(), 0..40)) {
        for metrics in gender_detection(&records).values() {
            prop_assert!((0.0..=1.0).contains(&metrics.detection_rate));
            prop_assert!(metrics.positive_count <= metrics.total);
        }
    }

    /// A left join never drops or duplicates prediction rows.
    #[test]
    fn join_preserves_prediction_count(
        records in prop::collection::vec(record_strategy(), 0..30),
        keys in prop::collection::vec("[a-z]{1,6}", 0..30),
    ) {
        let rows = keys
            .iter()
            .map(|k| vec![Some(k.clone()), Some("Pneumonia".to_string())])
            .collect();
        let gt = Table::new(vec!["id".into(), "label".into()], rows);
        let joined = join(&records, &gt, &JoinSpec::new("id", "label")).unwrap();
        prop_assert_eq!(joined.len(), records.len());
        for (j, r) in joined.iter().zip(&records) {
            prop_assert_eq!(&j.image_id, &r.image_id);
            prop_assert_eq!(j.true_label.is_some(), keys.contains(&r.image_id));
        }
    }

    /// Re-applying the same thresholds changes nothing.
    #[test]
    fn apply_thresholds_idempotent(
        records in prop::collection::vec(record_strategy(), 0..30),
        f in 0.0f64..=1.0,
        m in 0.0f64..=1.0,
    ) {
        let thresholds = ThresholdMap::by_gender(f, m).unwrap();
        let once = apply_thresholds(&records, &thresholds);
        let twice = apply_thresholds(&once, &thresholds);
        prop_assert_eq!(once, twice);
    }

    /// Parity and odds differences are non-negative and at most one.
    #[test]
    fn fairness_differences_bounded(
        rates in prop::collection::vec((0.0f64..=1.0, 0.0f64..=1.0, 0.0f64..=1.0), 0..4),
    ) {
        let by_group: BTreeMap<CanonicalGender, GroupRates> = CanonicalGender::ALL
            .into_iter()
            .zip(rates)
            .map(|(g, (s, tpr, fpr))| {
                (g, GroupRates {
                    count: 1,
                    selection_rate: s,
                    true_positive_rate: tpr,
                    false_positive_rate: fpr,
                })
            })
            .collect();
        let dp = demographic_parity_difference(&by_group);
        let eo = equalized_odds_difference(&by_group);
        prop_assert!((0.0..=1.0).contains(&dp));
        prop_assert!((0.0..=1.0).contains(&eo));
    }
}
