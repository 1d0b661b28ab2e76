// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Configuration loader for [`ConsentServices`](crate::services::ConsentServices).
//!
//! Supports two load strategies:
//!
//! 1. **TOML file**: [`load_config`] reads and deserialises a TOML file into
//!    a [`ConsentConfig`] struct.
//! 2. **Environment variables**: [`load_config_from_env`] reads
//!    `CONSENTKIT_`-prefixed environment variables and constructs a
//!    [`ConsentConfig`].
//!
//! # File format
//!
//! ```toml
//! new_version_status    = "draft"   # "draft" | "active" | "archived"
//! reject_unknown_scopes = false
//! log_filter            = "info"
//! data_file             = "/var/lib/consentkit/store.json"
//! ```
//!
//! # Environment variables
//!
//! | Variable                           | Type    | Default   |
//! |------------------------------------|---------|-----------|
//! | `CONSENTKIT_NEW_VERSION_STATUS`    | string  | "draft"   |
//! | `CONSENTKIT_REJECT_UNKNOWN_SCOPES` | boolean | false     |
//! | `CONSENTKIT_LOG_FILTER`            | string  | "info"    |
//! | `CONSENTKIT_DATA_FILE`             | path    | unset     |

// Only compile this module when the "config-loader" feature is enabled.
#![cfg(feature = "config-loader")]

use std::fs;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::types::PolicyStatus;

// ---------------------------------------------------------------------------
// ConsentConfig
// ---------------------------------------------------------------------------

/// Flat configuration struct for service construction and process setup.
///
/// Distinct from the service-level [`Config`]: it also carries
/// process-level settings (log filter, data file) that the services never
/// see.  Use [`Into<Config>`] to convert after loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentConfig {
    /// Status given to new policy versions when the caller supplies none.
    #[serde(default)]
    pub new_version_status: PolicyStatus,

    /// Reject grant requests that name scopes the policy does not offer.
    #[serde(default)]
    pub reject_unknown_scopes: bool,

    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// JSON store path for file-backed deployments.
    #[serde(default)]
    pub data_file: Option<String>,
}

fn default_log_filter() -> String {
    "info".to_owned()
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            new_version_status:    PolicyStatus::Draft,
            reject_unknown_scopes: false,
            log_filter:            default_log_filter(),
            data_file:             None,
        }
    }
}

impl From<ConsentConfig> for Config {
    fn from(config: ConsentConfig) -> Self {
        Config {
            new_version_status: config.new_version_status,
            reject_unknown_scopes: config.reject_unknown_scopes,
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors that can occur while loading or parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required file could not be opened.
    #[error("failed to read config file \"{path}\": {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The TOML content could not be deserialised.
    #[error("failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// A field could not be parsed to its expected type.
    #[error("field \"{field}\": cannot parse \"{value}\": {reason}")]
    ParseField {
        field: String,
        value: String,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// TOML loader
// ---------------------------------------------------------------------------

/// Load a [`ConsentConfig`] from a TOML file.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or if the TOML
/// content does not match the expected schema.
///
/// # Example
///
/// ```rust,no_run
/// use consentkit_core::config_loader::load_config;
///
/// let config = load_config("/etc/consentkit/consentkit.toml").unwrap();
/// println!("New versions start as: {}", config.new_version_status);
/// ```
pub fn load_config(path: &str) -> Result<ConsentConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_owned(),
        source,
    })?;
    parse_config(&content)
}

/// Parse a [`ConsentConfig`] from TOML text.
pub fn parse_config(content: &str) -> Result<ConsentConfig, ConfigError> {
    Ok(toml::from_str::<ConsentConfig>(content)?)
}

// ---------------------------------------------------------------------------
// Environment variable loader
// ---------------------------------------------------------------------------

/// Load a [`ConsentConfig`] from `CONSENTKIT_`-prefixed environment variables.
///
/// Unset variables fall back to their defaults.
///
/// # Errors
///
/// Returns a [`ConfigError::ParseField`] if any variable is set to a value
/// that cannot be parsed.
pub fn load_config_from_env() -> Result<ConsentConfig, ConfigError> {
    load_config_with(|key| std::env::var(key).ok())
}

/// Build a [`ConsentConfig`] from an arbitrary key lookup.
///
/// [`load_config_from_env`] passes the process environment; tests pass a map.
pub fn load_config_with<F>(lookup: F) -> Result<ConsentConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let new_version_status = match lookup("CONSENTKIT_NEW_VERSION_STATUS") {
        Some(val) => val.parse::<PolicyStatus>().map_err(|err| ConfigError::ParseField {
            field: "CONSENTKIT_NEW_VERSION_STATUS".into(),
            value: val.clone(),
            reason: err.to_string(),
        })?,
        None => PolicyStatus::Draft,
    };

    let reject_unknown_scopes =
        read_bool(&lookup, "CONSENTKIT_REJECT_UNKNOWN_SCOPES", false)?;

    let log_filter = lookup("CONSENTKIT_LOG_FILTER")
        .filter(|val| !val.trim().is_empty())
        .unwrap_or_else(default_log_filter);

    let data_file = lookup("CONSENTKIT_DATA_FILE").filter(|val| !val.trim().is_empty());

    Ok(ConsentConfig {
        new_version_status,
        reject_unknown_scopes,
        log_filter,
        data_file,
    })
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn read_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => match val.trim().to_ascii_lowercase().as_str() {
            "true"  | "1" | "yes" | "on"  => Ok(true),
            "false" | "0" | "no"  | "off" => Ok(false),
            other => Err(ConfigError::ParseField {
                field: key.to_owned(),
                value: other.to_owned(),
                reason: "expected one of: true/false, 1/0, yes/no, on/off".into(),
            }),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_toml_defaults_fill_missing_fields() {
        let config = parse_config("reject_unknown_scopes = true").unwrap();
        assert!(config.reject_unknown_scopes);
        assert_eq!(config.new_version_status, PolicyStatus::Draft);
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.data_file, None);
    }

    #[test]
    fn test_toml_status_is_lowercase() {
        let config = parse_config("new_version_status = \"active\"").unwrap();
        assert_eq!(config.new_version_status, PolicyStatus::Active);
        assert!(parse_config("new_version_status = \"live\"").is_err());
    }

    #[test]
    fn test_env_lookup_parses_every_field() {
        let config = load_config_with(lookup_from(&[
            ("CONSENTKIT_NEW_VERSION_STATUS", "Active"),
            ("CONSENTKIT_REJECT_UNKNOWN_SCOPES", "yes"),
            ("CONSENTKIT_LOG_FILTER", "consentkit_core=debug"),
            ("CONSENTKIT_DATA_FILE", "/tmp/store.json"),
        ]))
        .unwrap();
        assert_eq!(config.new_version_status, PolicyStatus::Active);
        assert!(config.reject_unknown_scopes);
        assert_eq!(config.log_filter, "consentkit_core=debug");
        assert_eq!(config.data_file.as_deref(), Some("/tmp/store.json"));

        let service_config: Config = config.into();
        assert!(service_config.reject_unknown_scopes);
    }

    #[test]
    fn test_env_lookup_rejects_bad_values() {
        let err = load_config_with(lookup_from(&[("CONSENTKIT_REJECT_UNKNOWN_SCOPES", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseField { .. }));

        let err = load_config_with(lookup_from(&[("CONSENTKIT_NEW_VERSION_STATUS", "retired")]))
            .unwrap_err();
        assert!(err.to_string().contains("CONSENTKIT_NEW_VERSION_STATUS"));
    }

    #[test]
    fn test_empty_lookup_yields_defaults() {
        let config = load_config_with(|_| None).unwrap();
        assert_eq!(config, ConsentConfig::default());
    }
}
