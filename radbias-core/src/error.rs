//! Error types for the radbias-core crate.

use thiserror::Error;

/// Top-level error type for bias-analysis operations.
///
/// None of these are fatal to a session: callers surface them as a message
/// and keep the rest of the session state usable.
#[derive(Debug, Error)]
pub enum RadbiasError {
    #[error("Data load error: {0}")]
    DataLoad(String),

    #[error("Invalid column: '{column}' (available: {available})")]
    InvalidColumn { column: String, available: String },

    #[error("Invalid threshold for {group}: {value} (must be within [0, 1])")]
    InvalidThreshold { group: String, value: f64 },

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RadbiasError {
    pub fn data_load(msg: impl Into<String>) -> Self {
        Self::DataLoad(msg.into())
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build an `InvalidColumn` error listing the columns that do exist.
    pub fn invalid_column(column: impl Into<String>, available: &[String]) -> Self {
        let available = if available.is_empty() {
            "none".to_string()
        } else {
            available.join(", ")
        };
        Self::InvalidColumn {
            column: column.into(),
            available,
        }
    }

    /// Whether the error came from user input rather than the model or the
    /// configuration.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::DataLoad(_) | Self::InvalidColumn { .. } | Self::InvalidThreshold { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_column_lists_available() {
        let err = RadbiasError::invalid_column("Image", &["id".into(), "label".into()]);
        assert_eq!(
            err.to_string(),
            "Invalid column: 'Image' (available: id, label)"
        );
        assert!(err.is_user_facing());
    }

    #[test]
    fn test_invalid_column_empty_table() {
        let err = RadbiasError::invalid_column("Image", &[]);
        assert!(err.to_string().contains("available: none"));
    }

    #[test]
    fn test_inference_and_config_not_user_facing() {
        assert!(!RadbiasError::inference("model crashed").is_user_facing());
        assert!(!RadbiasError::config("bad layer").is_user_facing());
        assert!(RadbiasError::data_load("missing file").is_user_facing());
    }
}
