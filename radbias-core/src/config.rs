//! Configuration for radbias.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/radbias/config.toml` and/or `.radbias/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::RadbiasError;
use crate::simulate::ThresholdMap;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadbiasConfig {
    /// Decision thresholds.
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Ground-truth ingestion.
    #[serde(default)]
    pub data: DataConfig,
    /// Default column selection.
    #[serde(default)]
    pub columns: ColumnDefaults,
}

/// Decision thresholds used for prediction and simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Global threshold applied when the classifier scores an image.
    #[serde(default = "default_threshold")]
    pub decision_threshold: f64,
    /// Initial female threshold on the simulation page.
    #[serde(default = "default_threshold")]
    pub female_threshold: f64,
    /// Initial male threshold on the simulation page.
    #[serde(default = "default_threshold")]
    pub male_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            decision_threshold: default_threshold(),
            female_threshold: default_threshold(),
            male_threshold: default_threshold(),
        }
    }
}

impl AnalysisConfig {
    /// Per-group thresholds from the configured values.
    pub fn threshold_map(&self) -> Result<ThresholdMap, RadbiasError> {
        ThresholdMap::by_gender(self.female_threshold, self.male_threshold)
    }
}

fn default_threshold() -> f64 {
    0.5
}

/// Ground-truth ingestion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// CSV field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Load at most this many rows.
    #[serde(default)]
    pub max_rows: Option<usize>,
    /// Worksheet read from spreadsheet files; the first sheet when unset.
    #[serde(default)]
    pub sheet: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            max_rows: None,
            sheet: None,
        }
    }
}

fn default_delimiter() -> char {
    ','
}

/// Column names remembered between interactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefaults {
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub disease: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

impl RadbiasConfig {
    /// Reject thresholds outside `[0, 1]` and non-ASCII delimiters.
    pub fn validate(&self) -> Result<(), RadbiasError> {
        let thresholds = [
            ("decision_threshold", self.analysis.decision_threshold),
            ("female_threshold", self.analysis.female_threshold),
            ("male_threshold", self.analysis.male_threshold),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(RadbiasError::config(format!(
                    "analysis.{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if !self.data.delimiter.is_ascii() {
            return Err(RadbiasError::config(format!(
                "data.delimiter must be ASCII, got '{}'",
                self.data.delimiter
            )));
        }
        Ok(())
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "radbias", "radbias")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".radbias").join("config.toml")
}

fn layered(workspace: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(RadbiasConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // RADBIAS_ANALYSIS__DECISION_THRESHOLD, RADBIAS_COLUMNS__IMAGE_ID, etc.
    figment.merge(Env::prefixed("RADBIAS_").split("__"))
}

fn extract(figment: Figment) -> Result<RadbiasConfig, RadbiasError> {
    let config: RadbiasConfig = figment
        .extract()
        .map_err(|e| RadbiasError::config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `RADBIAS_`)
/// 3. Workspace-local config (`.radbias/config.toml`)
/// 4. User config (`~/.config/radbias/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&RadbiasConfig>,
) -> Result<RadbiasConfig, RadbiasError> {
    let mut figment = layered(workspace);
    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }
    extract(figment)
}

/// Like [`load_config`], with one more TOML file on top of every layer.
/// Keys the file leaves out keep their layered value.
pub fn load_config_with_file(
    workspace: Option<&Path>,
    file: &Path,
) -> Result<RadbiasConfig, RadbiasError> {
    if !file.exists() {
        return Err(RadbiasError::config(format!(
            "Config file not found: {}",
            file.display()
        )));
    }
    extract(layered(workspace).merge(Toml::file(file)))
}

/// Check whether a config file exists at the user or workspace level.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RadbiasConfig::default();
        assert_eq!(config.analysis.decision_threshold, 0.5);
        assert_eq!(config.analysis.female_threshold, 0.5);
        assert_eq!(config.data.delimiter, ',');
        assert!(config.data.max_rows.is_none());
        assert!(config.columns.image_id.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let mut config = RadbiasConfig::default();
        config.columns.image_id = Some("Image Index".into());
        config.analysis.male_threshold = 0.3;
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: RadbiasConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: RadbiasConfig = toml::from_str("[analysis]\nmale_threshold = 0.4\n").unwrap();
        assert_eq!(parsed.analysis.male_threshold, 0.4);
        assert_eq!(parsed.analysis.female_threshold, 0.5);
        assert_eq!(parsed.data.delimiter, ',');
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = RadbiasConfig::default();
        config.analysis.female_threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("female_threshold"));
    }

    #[test]
    fn test_load_workspace_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = workspace_config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "[analysis]\ndecision_threshold = 0.35\n\n[columns]\ngender = \"Patient Gender\"\n",
        )
        .unwrap();

        assert!(config_exists(Some(dir.path())));
        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.analysis.decision_threshold, 0.35);
        assert_eq!(config.columns.gender.as_deref(), Some("Patient Gender"));
        let thresholds = config.analysis.threshold_map().unwrap();
        assert_eq!(thresholds.get(crate::CanonicalGender::F), Some(0.5));
    }

    #[test]
    fn test_explicit_file_keeps_workspace_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = workspace_config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[analysis]\nfemale_threshold = 0.3\n").unwrap();
        let extra = dir.path().join("extra.toml");
        std::fs::write(&extra, "[columns]\ndisease = \"Finding Labels\"\n").unwrap();

        let config = load_config_with_file(Some(dir.path()), &extra).unwrap();
        assert_eq!(config.analysis.female_threshold, 0.3);
        assert_eq!(config.columns.disease.as_deref(), Some("Finding Labels"));

        let missing = dir.path().join("missing.toml");
        assert!(load_config_with_file(Some(dir.path()), &missing).is_err());
    }

    #[test]
    fn test_load_invalid_workspace_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = workspace_config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[analysis]\nmale_threshold = 3.0\n").unwrap();
        assert!(matches!(
            load_config(Some(dir.path()), None),
            Err(RadbiasError::Config(_))
        ));
    }
}
