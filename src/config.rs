//! Pipeline configuration.
//!
//! Read from `MEDIATAG_*` environment variables. Every key has a default
//! except the pinning JWT, which is only needed by the hosted pinning client.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::{GatePolicy, GatePolicyError};
use crate::storage::PINATA_API_URL;

pub const DEFAULT_DETECTOR_URL: &str = "http://localhost:8000";
pub const DEFAULT_GATEWAY_URL: &str = "https://gateway.pinata.cloud";
pub const DEFAULT_RECORDS_URL: &str = "http://localhost:5000/api/tags";
pub const DEFAULT_AUDIT_DIR: &str = ".mediatag/audit";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Policy(#[from] GatePolicyError),
}

/// How accepted items are committed to the record store and ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistrationGranularity {
    /// One tag and one ledger registration per accepted item.
    #[default]
    PerItem,
    /// One combined tag and ledger registration for all accepted items.
    PerBatch,
}

impl RegistrationGranularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationGranularity::PerItem => "per-item",
            RegistrationGranularity::PerBatch => "per-batch",
        }
    }
}

impl fmt::Display for RegistrationGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-item" | "item" => Ok(RegistrationGranularity::PerItem),
            "per-batch" | "batch" => Ok(RegistrationGranularity::PerBatch),
            other => Err(format!("expected per-item or per-batch, got {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub detector_url: String,
    pub pinning_url: String,
    pub pinning_jwt: Option<String>,
    pub gateway_url: String,
    pub records_url: String,
    /// Directory holding in-flight audit trails.
    pub audit_dir: PathBuf,
    pub gate_policy: GatePolicy,
    pub registration: RegistrationGranularity,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detector_url: DEFAULT_DETECTOR_URL.to_string(),
            pinning_url: PINATA_API_URL.to_string(),
            pinning_jwt: None,
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            records_url: DEFAULT_RECORDS_URL.to_string(),
            audit_dir: PathBuf::from(DEFAULT_AUDIT_DIR),
            gate_policy: GatePolicy::default(),
            registration: RegistrationGranularity::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset or empty keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let gate_policy = GatePolicy::new(
            parse_key(&get, "MEDIATAG_AUTHENTIC_MIN", defaults.gate_policy.authentic_min)?,
            parse_key(&get, "MEDIATAG_INCONCLUSIVE_MIN", defaults.gate_policy.inconclusive_min)?,
            parse_key(&get, "MEDIATAG_BLOCK_MAX", defaults.gate_policy.block_max)?,
        )?;

        Ok(Self {
            detector_url: get("MEDIATAG_DETECTOR_URL").unwrap_or(defaults.detector_url),
            pinning_url: get("MEDIATAG_PINNING_URL").unwrap_or(defaults.pinning_url),
            pinning_jwt: get("MEDIATAG_PINNING_JWT"),
            gateway_url: get("MEDIATAG_GATEWAY_URL").unwrap_or(defaults.gateway_url),
            records_url: get("MEDIATAG_RECORDS_URL").unwrap_or(defaults.records_url),
            audit_dir: get("MEDIATAG_AUDIT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.audit_dir),
            gate_policy,
            registration: parse_key(&get, "MEDIATAG_REGISTRATION", defaults.registration)?,
        })
    }

    pub fn with_registration(mut self, registration: RegistrationGranularity) -> Self {
        self.registration = registration;
        self
    }

    pub fn with_gate_policy(mut self, policy: GatePolicy) -> Self {
        self.gate_policy = policy;
        self
    }
}

fn parse_key<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.gate_policy, GatePolicy::default());
        assert_eq!(config.registration, RegistrationGranularity::PerItem);
        assert_eq!(config.pinning_url, PINATA_API_URL);
        assert!(config.pinning_jwt.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("MEDIATAG_DETECTOR_URL", "https://detect.example"),
            ("MEDIATAG_PINNING_JWT", "secret"),
            ("MEDIATAG_AUDIT_DIR", "/tmp/audit"),
            ("MEDIATAG_INCONCLUSIVE_MIN", "60"),
            ("MEDIATAG_REGISTRATION", "per-batch"),
            ("MEDIATAG_GATEWAY_URL", ""),
        ]))
        .unwrap();

        assert_eq!(config.detector_url, "https://detect.example");
        assert_eq!(config.pinning_jwt.as_deref(), Some("secret"));
        assert_eq!(config.audit_dir, PathBuf::from("/tmp/audit"));
        assert_eq!(config.gate_policy.inconclusive_min, 60);
        assert_eq!(config.registration, RegistrationGranularity::PerBatch);
        assert_eq!(config.gateway_url, DEFAULT_GATEWAY_URL);
    }

    #[test]
    fn test_invalid_values() {
        let err = PipelineConfig::from_lookup(lookup(&[("MEDIATAG_BLOCK_MAX", "fifty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "MEDIATAG_BLOCK_MAX"));

        let err = PipelineConfig::from_lookup(lookup(&[("MEDIATAG_BLOCK_MAX", "75")])).unwrap_err();
        assert!(matches!(err, ConfigError::Policy(_)));

        let err = PipelineConfig::from_lookup(lookup(&[("MEDIATAG_REGISTRATION", "sometimes")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
