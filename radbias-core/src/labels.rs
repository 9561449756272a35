//! Label canonicalization for free-text gender and disease columns.
//!
//! Matching is substring based, not token based: `"normaldensity"` counts as a
//! negative finding. Gender labels that spell out a keyword exactly (`"femme"`,
//! `"woman"`) resolve to that keyword's class before the substring pass, which
//! checks the male set first.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Keywords that classify a gender label as male. Checked before the female set.
pub const MALE_KEYWORDS: &[&str] = &["m", "male", "man", "masculin"];

/// Keywords that classify a gender label as female.
pub const FEMALE_KEYWORDS: &[&str] = &["f", "female", "woman", "femme"];

/// Keywords that mark a disease label as a negative finding.
pub const NO_DISEASE_KEYWORDS: &[&str] = &[
    "no finding",
    "none",
    "negative",
    "normal",
    "0",
    "false",
    "no disease",
];

/// Canonical negative disease label.
pub const NO_DISEASE: &str = "No Disease";

/// Label rendered for a positive binary classifier prediction.
pub const DISEASE_DETECTED: &str = "Disease Detected";

/// Canonical gender group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum CanonicalGender {
    F,
    M,
    #[default]
    Unknown,
}

impl CanonicalGender {
    pub const ALL: [CanonicalGender; 3] = [Self::F, Self::M, Self::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::F => "F",
            Self::M => "M",
            Self::Unknown => "Unknown",
        }
    }

    /// Parse one of the canonical labels exactly (`"M"`, `"F"`, `"Unknown"`).
    ///
    /// Use [`canonicalize_gender`] for free text.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "F" => Some(Self::F),
            "M" => Some(Self::M),
            "Unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for CanonicalGender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

/// Map a free-text gender label onto `M`, `F` or `Unknown`.
pub fn canonicalize_gender(text: &str) -> CanonicalGender {
    let normalized = text.trim().to_lowercase();
    if MALE_KEYWORDS.contains(&normalized.as_str()) {
        return CanonicalGender::M;
    }
    if FEMALE_KEYWORDS.contains(&normalized.as_str()) {
        return CanonicalGender::F;
    }
    if contains_any(&normalized, MALE_KEYWORDS) {
        return CanonicalGender::M;
    }
    if contains_any(&normalized, FEMALE_KEYWORDS) {
        return CanonicalGender::F;
    }
    CanonicalGender::Unknown
}

/// Map a free-text disease label onto `"No Disease"` or the original text.
///
/// The positive class keeps the caller's text verbatim, including case and
/// surrounding whitespace.
pub fn canonicalize_disease(text: &str) -> String {
    let normalized = text.trim().to_lowercase();
    if contains_any(&normalized, NO_DISEASE_KEYWORDS) {
        NO_DISEASE.to_string()
    } else {
        text.to_string()
    }
}

/// Whether a canonical disease label is the negative class.
pub fn is_no_disease(label: &str) -> bool {
    label == NO_DISEASE
}

/// Case- and whitespace-insensitive label comparison used for correctness.
pub fn labels_match(predicted: &str, truth: &str) -> bool {
    predicted.trim().to_lowercase() == truth.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_tables() {
        assert_eq!(MALE_KEYWORDS.len(), 4);
        assert_eq!(FEMALE_KEYWORDS.len(), 4);
        assert!(NO_DISEASE_KEYWORDS.contains(&"no finding"));
        assert!(NO_DISEASE_KEYWORDS.contains(&"0"));
        // Every keyword is already normalized.
        for kw in MALE_KEYWORDS
            .iter()
            .chain(FEMALE_KEYWORDS)
            .chain(NO_DISEASE_KEYWORDS)
        {
            assert_eq!(kw.trim().to_lowercase(), *kw);
        }
    }

    #[test]
    fn test_gender_examples() {
        assert_eq!(canonicalize_gender("Male"), CanonicalGender::M);
        assert_eq!(canonicalize_gender("M"), CanonicalGender::M);
        assert_eq!(canonicalize_gender("femme"), CanonicalGender::F);
        assert_eq!(canonicalize_gender("Woman"), CanonicalGender::F);
        assert_eq!(canonicalize_gender(""), CanonicalGender::Unknown);
        assert_eq!(canonicalize_gender("  F  "), CanonicalGender::F);
        assert_eq!(canonicalize_gender("other"), CanonicalGender::Unknown);
    }

    #[test]
    fn test_gender_exact_keyword_wins() {
        assert_eq!(canonicalize_gender("Female"), CanonicalGender::F);
        assert_eq!(canonicalize_gender("WOMAN"), CanonicalGender::F);
        assert_eq!(canonicalize_gender("masculin"), CanonicalGender::M);
    }

    #[test]
    fn test_gender_substring_male_precedence() {
        // Neither is an exact keyword; both contain "m".
        assert_eq!(canonicalize_gender("female patient"), CanonicalGender::M);
        assert_eq!(canonicalize_gender("feminine"), CanonicalGender::M);
        assert_eq!(canonicalize_gender("sex: f"), CanonicalGender::F);
    }

    #[test]
    fn test_disease_examples() {
        assert_eq!(canonicalize_disease("No Finding"), NO_DISEASE);
        assert_eq!(canonicalize_disease("Negative"), NO_DISEASE);
        assert_eq!(canonicalize_disease("0"), NO_DISEASE);
        assert_eq!(canonicalize_disease("  FALSE "), NO_DISEASE);
        assert_eq!(canonicalize_disease("Pneumonia"), "Pneumonia");
    }

    #[test]
    fn test_disease_positive_keeps_original_text() {
        assert_eq!(canonicalize_disease(" Cardiomegaly "), " Cardiomegaly ");
        assert_eq!(canonicalize_disease("EDEMA"), "EDEMA");
    }

    #[test]
    fn test_disease_substring_semantics() {
        assert_eq!(canonicalize_disease("normaldensity"), NO_DISEASE);
        assert_eq!(canonicalize_disease("Effusion|Mass 10mm"), NO_DISEASE);
    }

    #[test]
    fn test_labels_match_normalizes() {
        assert!(labels_match(" No Disease", "no disease "));
        assert!(!labels_match(DISEASE_DETECTED, "Pneumonia"));
    }

    #[test]
    fn test_gender_label_roundtrip() {
        for g in CanonicalGender::ALL {
            assert_eq!(CanonicalGender::from_label(g.as_str()), Some(g));
        }
        assert_eq!(CanonicalGender::from_label("male"), None);
    }
}
