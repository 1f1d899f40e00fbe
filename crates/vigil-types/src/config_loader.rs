/// Config file and patient file loading with validation.
///
/// Reads the YAML config, fills unspecified sections with defaults, and
/// validates the result before anything else starts. Patient records are
/// loaded from YAML or JSON depending on the file extension.
use std::collections::HashSet;
use std::path::Path;

use crate::config::*;
use crate::errors::VigilError;
use crate::records::{PatientRecord, RoutingAction};

/// Loads and validates configuration and patient input.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<VigilConfig, VigilError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VigilError::Config(format!("failed to read {}: {e}", path.display())))?;
        let config: VigilConfig = if content.trim().is_empty() {
            VigilConfig::default()
        } else {
            serde_yaml::from_str(&content).map_err(|e| {
                VigilError::Config(format!("failed to parse {}: {e}", path.display()))
            })?
        };
        Self::validate(&config)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Load a config file if one was given, otherwise validated defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<VigilConfig, VigilError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let config = VigilConfig::default();
                Self::validate(&config)?;
                Ok(config)
            }
        }
    }

    /// Validate the config for internal consistency.
    ///
    /// Checks:
    /// - Reviewer name is non-empty
    /// - The risk policy never auto-approves high or critical recommendations
    /// - Generator temperature and token budget are in range
    /// - LLM models are non-empty and fallbacks don't repeat the primary or each other
    pub fn validate(config: &VigilConfig) -> Result<(), VigilError> {
        if config.reviewer.trim().is_empty() {
            return Err(VigilError::Config("reviewer must not be empty".to_string()));
        }
        Self::validate_risk_policy(config)?;
        Self::validate_generator(&config.generator)?;
        Ok(())
    }

    /// Load a patient record from a `.yaml`/`.yml` or `.json` file.
    pub fn load_patient(path: &Path) -> Result<PatientRecord, VigilError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VigilError::Config(format!("failed to read {}: {e}", path.display())))?;

        let patient: PatientRecord = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| {
                VigilError::Config(format!("failed to parse {}: {e}", path.display()))
            })?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| {
                VigilError::Config(format!("failed to parse {}: {e}", path.display()))
            })?,
            other => {
                return Err(VigilError::Config(format!(
                    "unsupported patient file extension {:?} for {} (expected json, yaml or yml)",
                    other.unwrap_or(""),
                    path.display()
                )));
            }
        };

        if patient.patient_id.trim().is_empty() {
            return Err(VigilError::Config(format!(
                "{}: patient_id must not be empty",
                path.display()
            )));
        }
        if patient.name.trim().is_empty() {
            return Err(VigilError::Config(format!(
                "{}: patient name must not be empty",
                path.display()
            )));
        }

        Ok(patient)
    }

    fn validate_risk_policy(config: &VigilConfig) -> Result<(), VigilError> {
        for (level, action) in &config.risk_policy {
            if level.demands_human() && *action == RoutingAction::AutoApprove {
                return Err(VigilError::Config(format!(
                    "risk_policy: '{level}' recommendations must require confirmation"
                )));
            }
        }
        Ok(())
    }

    fn validate_generator(generator: &GeneratorConfig) -> Result<(), VigilError> {
        if !(0.0..=2.0).contains(&generator.temperature) {
            return Err(VigilError::Config(format!(
                "generator.temperature must be between 0.0 and 2.0 (got {})",
                generator.temperature
            )));
        }
        if generator.max_tokens == 0 {
            return Err(VigilError::Config(
                "generator.max_tokens must be positive (got 0)".to_string(),
            ));
        }
        if generator.primary_model().trim().is_empty() {
            return Err(VigilError::Config(
                "generator.model must not be empty".to_string(),
            ));
        }

        let mut seen: HashSet<ProviderKind> = HashSet::new();
        seen.insert(generator.provider);
        for fallback in &generator.fallbacks {
            if !seen.insert(fallback.provider) {
                return Err(VigilError::Config(format!(
                    "generator.fallbacks: provider '{}' is listed more than once",
                    fallback.provider
                )));
            }
            if fallback.model.trim().is_empty() {
                return Err(VigilError::Config(format!(
                    "generator.fallbacks: model for '{}' must not be empty",
                    fallback.provider
                )));
            }
        }
        Ok(())
    }
}
