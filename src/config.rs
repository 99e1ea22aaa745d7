//! Runtime settings: an optional TOML file, then environment overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::output::ReportFormat;
use crate::parsers::{ReaderChoice, READER_ENV};

/// Environment variable holding the explanation service key
pub const API_KEY_ENV: &str = "PGX_GUARD_API_KEY";
/// Environment variable overriding the patient identifier
pub const PATIENT_ID_ENV: &str = "PGX_GUARD_PATIENT_ID";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Fixed patient identifier; when unset each file's stem is used
    pub patient_id: Option<String>,
    pub reader: ReaderChoice,
    /// Worker threads for batch runs (0 = one per CPU)
    pub threads: usize,
    pub output_dir: PathBuf,
    pub format: ReportFormat,
    pub explainer: ExplainerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            patient_id: None,
            reader: ReaderChoice::Auto,
            threads: 0,
            output_dir: PathBuf::from("./reports"),
            format: ReportFormat::Json,
            explainer: ExplainerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExplainerSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ExplainerSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Load settings from `path` if given, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(reader) = ReaderChoice::from_env_value(lookup(READER_ENV).as_deref()) {
            self.reader = reader;
        }
        if let Some(patient_id) = lookup(PATIENT_ID_ENV).filter(|v| !v.trim().is_empty()) {
            self.patient_id = Some(patient_id);
        }
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.trim().is_empty()) {
            self.explainer.api_key = Some(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("pgx.toml");
        fs::write(
            &path,
            "patient_id = \"P-42\"\nreader = \"plain\"\nformat = \"tsv\"\n\n[explainer]\nmodel = \"local\"\n",
        )?;

        let settings = Settings::from_file(&path)?;
        assert_eq!(settings.patient_id.as_deref(), Some("P-42"));
        assert_eq!(settings.format, ReportFormat::Tsv);
        assert_eq!(settings.reader, ReaderChoice::Plain);
        assert_eq!(settings.explainer.model, "local");
        assert_eq!(settings.explainer.timeout_secs, 30);
        assert_eq!(settings.output_dir, PathBuf::from("./reports"));
        Ok(())
    }

    #[test]
    fn test_env_overrides() -> Result<()> {
        let env: HashMap<&str, &str> = HashMap::from([
            (READER_ENV, "structured"),
            (API_KEY_ENV, "secret"),
            (PATIENT_ID_ENV, "  "),
        ]);
        let mut settings = Settings::default();
        settings.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.reader, ReaderChoice::Structured);
        assert_eq!(settings.explainer.api_key.as_deref(), Some("secret"));
        assert_eq!(settings.patient_id, None);
        Ok(())
    }

    #[test]
    fn test_invalid_reader_is_ignored() {
        let mut settings = Settings::default();
        settings.reader = ReaderChoice::Plain;
        settings.apply_env(|key| (key == READER_ENV).then(|| "bam".to_string()));
        assert_eq!(settings.reader, ReaderChoice::Plain);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Settings::from_file(Path::new("/nonexistent/pgx.toml")).is_err());
    }
}
