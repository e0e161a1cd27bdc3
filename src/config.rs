//! Run configuration - endpoint, model, timeout, processing cap and paths
//!
//! Values come from the environment (after `.env` is loaded by the binary)
//! and can be overridden by CLI flags. The resulting `MergeConfig` is handed
//! to the client and orchestrator at construction.

use crate::error::{MergeError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_MODEL: &str = "llama3.1:8b";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_INPUT_DIR: &str = "input_contacts";
pub const DEFAULT_OUTPUT_FILE: &str = "merged_contacts.csv";

/// What to do with fields the merge service returns that no input row carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldPolicy {
    /// Keep every returned field.
    #[default]
    Trust,
    /// Drop returned fields absent from every input row of the group.
    RestrictToInput,
}

impl FromStr for FieldPolicy {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "trust" => Ok(FieldPolicy::Trust),
            "restrict-to-input" | "restrict" => Ok(FieldPolicy::RestrictToInput),
            other => Err(MergeError::Config(format!("Unknown field policy: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
    /// Stop attempting merges after this many successful ones.
    pub max_groups: Option<usize>,
    pub field_policy: FieldPolicy,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_groups: None,
            field_policy: FieldPolicy::Trust,
        }
    }
}

impl MergeConfig {
    /// Read `MERGE_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(endpoint) = lookup("MERGE_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Some(model) = lookup("MERGE_MODEL") {
            config.model = model;
        }
        if let Some(secs) = lookup("MERGE_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(parse_number("MERGE_TIMEOUT_SECS", &secs)?);
        }
        if let Some(cap) = lookup("MERGE_MAX_GROUPS") {
            config.max_groups = Some(parse_number("MERGE_MAX_GROUPS", &cap)? as usize);
        }
        if let Some(policy) = lookup("MERGE_FIELD_POLICY") {
            config.field_policy = policy.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(MergeError::Config("Merge endpoint must not be empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(MergeError::Config("Model identifier must not be empty".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(MergeError::Config("Timeout must be greater than zero".to_string()));
        }
        Ok(())
    }
}

fn parse_number(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| MergeError::Config(format!("{} must be a non-negative integer ({}): {}", name, raw, e)))
}

/// Where to read sources from and where to write the merged table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPaths {
    pub input_dir: PathBuf,
    pub output_file: PathBuf,
}

impl Default for RunPaths {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_file: PathBuf::from(DEFAULT_OUTPUT_FILE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MergeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_groups, None);
        assert_eq!(config.field_policy, FieldPolicy::Trust);
    }

    #[test]
    fn test_env_overrides() {
        let config = MergeConfig::from_lookup(lookup(&[
            ("MERGE_MODEL", "mistral"),
            ("MERGE_TIMEOUT_SECS", "5"),
            ("MERGE_MAX_GROUPS", "3"),
            ("MERGE_FIELD_POLICY", "restrict_to_input"),
        ]))
        .unwrap();
        assert_eq!(config.model, "mistral");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_groups, Some(3));
        assert_eq!(config.field_policy, FieldPolicy::RestrictToInput);
    }

    #[test]
    fn test_bad_values_are_config_errors() {
        let err = MergeConfig::from_lookup(lookup(&[("MERGE_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, MergeError::Config(_)));
        let err = MergeConfig::from_lookup(lookup(&[("MERGE_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(matches!(err, MergeError::Config(_)));
        assert!("sometimes".parse::<FieldPolicy>().is_err());
    }
}
