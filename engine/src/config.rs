//! Engine configuration module.
//!
//! This module loads engine-wide defaults from environment variables.
//!
//! # Environment Variables
//!
//! - `ENGINE_BATCH_SIZE`: streaming target batch size (default: `1024`)
//! - `ENGINE_QUERY_TIMEOUT_MS`: per-query timeout, `0` disables (default: `0`)
//! - `ENGINE_PARTIAL_RESULTS_ON_TIMEOUT`: return what was computed when a query
//!   times out (default: `false`)
//! - `ENGINE_FAIL_SILENTLY_ON_FILTER_ERROR`: drop rows whose filter errors
//!   instead of failing the query (default: `true`)
//! - `ENGINE_INDEX_TREE`: `avl`, `scapegoat` or `unbalanced` (default: `avl`)
//! - `ENGINE_SCAPEGOAT_ALPHA`: scapegoat balance factor in (0.5, 1.0)
//!   (default: `0.75`)
//!
//! # Invariants
//!
//! - `batch_size` is always at least 1
//! - `scapegoat_alpha` is always strictly between 0.5 and 1.0

use std::time::Duration;

use crate::query::{DEFAULT_BATCH_SIZE, QueryOptions};
use crate::storage::TripleStore;
use crate::storage::tree::{ScapegoatBalance, TreeKind};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub batch_size: usize,
    /// `None` means queries never time out.
    pub query_timeout: Option<Duration>,
    pub partial_results_on_timeout: bool,
    pub fail_silently_on_filter_error: bool,
    /// Tree kind backing new stores' indexes.
    pub index_tree: TreeKind,
    pub scapegoat_alpha: f64,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable is missing.
    MissingEnvVar(String),
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEnvVar(name) => {
                write!(f, "missing required environment variable: {name}")
            }
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: Self::DEFAULT_BATCH_SIZE,
            query_timeout: None,
            partial_results_on_timeout: false,
            fail_silently_on_filter_error: true,
            index_tree: TreeKind::Avl,
            scapegoat_alpha: Self::DEFAULT_SCAPEGOAT_ALPHA,
        }
    }
}

impl EngineConfig {
    /// Default streaming batch size.
    pub const DEFAULT_BATCH_SIZE: usize = DEFAULT_BATCH_SIZE;
    /// Default scapegoat balance factor.
    pub const DEFAULT_SCAPEGOAT_ALPHA: f64 = ScapegoatBalance::DEFAULT_ALPHA;

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is set to an unparseable or
    /// out-of-range value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary lookup.
    ///
    /// Unset variables (`None`) take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            batch_size: load_batch_size(&lookup)?,
            query_timeout: load_timeout(&lookup)?,
            partial_results_on_timeout: load_bool(
                &lookup,
                "ENGINE_PARTIAL_RESULTS_ON_TIMEOUT",
                defaults.partial_results_on_timeout,
            )?,
            fail_silently_on_filter_error: load_bool(
                &lookup,
                "ENGINE_FAIL_SILENTLY_ON_FILTER_ERROR",
                defaults.fail_silently_on_filter_error,
            )?,
            index_tree: load_index_tree(&lookup)?,
            scapegoat_alpha: load_alpha(&lookup)?,
        })
    }

    /// Per-query options seeded from this configuration.
    #[must_use]
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions::default()
            .with_batch_size(self.batch_size)
            .with_timeout(self.query_timeout)
            .with_partial_results_on_timeout(self.partial_results_on_timeout)
            .with_fail_silently_on_filter_error(self.fail_silently_on_filter_error)
    }

    /// An empty store indexed with the configured tree kind.
    #[must_use]
    pub fn new_store(&self) -> TripleStore {
        TripleStore::with_index(self.index_tree, self.scapegoat_alpha)
    }
}

fn invalid(name: &str, message: String) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_owned(),
        message,
    }
}

fn load_batch_size(lookup: &impl Fn(&str) -> Option<String>) -> Result<usize, ConfigError> {
    const NAME: &str = "ENGINE_BATCH_SIZE";
    match lookup(NAME) {
        Some(value) => match value.trim().parse::<usize>() {
            Ok(size) if size > 0 => Ok(size),
            _ => Err(invalid(NAME, format!("'{value}' is not a positive integer"))),
        },
        None => Ok(EngineConfig::DEFAULT_BATCH_SIZE),
    }
}

fn load_timeout(lookup: &impl Fn(&str) -> Option<String>) -> Result<Option<Duration>, ConfigError> {
    const NAME: &str = "ENGINE_QUERY_TIMEOUT_MS";
    match lookup(NAME) {
        Some(value) => match value.trim().parse::<u64>() {
            Ok(0) => Ok(None),
            Ok(ms) => Ok(Some(Duration::from_millis(ms))),
            Err(_) => Err(invalid(NAME, format!("'{value}' is not a number of milliseconds"))),
        },
        None => Ok(None),
    }
}

fn load_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(name) {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(invalid(name, format!("'{value}' is not true or false"))),
        },
        None => Ok(default),
    }
}

fn load_index_tree(lookup: &impl Fn(&str) -> Option<String>) -> Result<TreeKind, ConfigError> {
    const NAME: &str = "ENGINE_INDEX_TREE";
    lookup(NAME).map_or(Ok(TreeKind::Avl), |value| {
        value.trim().parse().map_err(|message| invalid(NAME, message))
    })
}

fn load_alpha(lookup: &impl Fn(&str) -> Option<String>) -> Result<f64, ConfigError> {
    const NAME: &str = "ENGINE_SCAPEGOAT_ALPHA";
    match lookup(NAME) {
        Some(value) => match value.trim().parse::<f64>() {
            Ok(alpha) if alpha > 0.5 && alpha < 1.0 => Ok(alpha),
            _ => Err(invalid(NAME, format!("'{value}' is not between 0.5 and 1.0"))),
        },
        None => Ok(EngineConfig::DEFAULT_SCAPEGOAT_ALPHA),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = EngineConfig::from_lookup(lookup(&[])).expect("defaults should load");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.batch_size, 1024);
        assert_eq!(config.query_timeout, None);
        assert!(config.fail_silently_on_filter_error);
        assert_eq!(config.index_tree, TreeKind::Avl);
    }

    #[test]
    fn test_all_variables_parsed() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("ENGINE_BATCH_SIZE", "16"),
            ("ENGINE_QUERY_TIMEOUT_MS", "250"),
            ("ENGINE_PARTIAL_RESULTS_ON_TIMEOUT", "true"),
            ("ENGINE_FAIL_SILENTLY_ON_FILTER_ERROR", "FALSE"),
            ("ENGINE_INDEX_TREE", "Scapegoat"),
            ("ENGINE_SCAPEGOAT_ALPHA", "0.6"),
        ]))
        .expect("valid config should load");

        assert_eq!(config.batch_size, 16);
        assert_eq!(config.query_timeout, Some(Duration::from_millis(250)));
        assert!(config.partial_results_on_timeout);
        assert!(!config.fail_silently_on_filter_error);
        assert_eq!(config.index_tree, TreeKind::Scapegoat);
        assert!((config.scapegoat_alpha - 0.6).abs() < f64::EPSILON);

        let options = config.query_options();
        assert_eq!(options.batch_size, 16);
        assert_eq!(options.timeout, Some(Duration::from_millis(250)));
        assert!(options.partial_results_on_timeout);
        assert!(!options.fail_silently_on_filter_error);
        assert_eq!(config.new_store().index_kind(), TreeKind::Scapegoat);
    }

    #[test]
    fn test_zero_timeout_disables() {
        let config = EngineConfig::from_lookup(lookup(&[("ENGINE_QUERY_TIMEOUT_MS", "0")]))
            .expect("zero timeout should load");
        assert_eq!(config.query_timeout, None);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for (name, value) in [
            ("ENGINE_BATCH_SIZE", "0"),
            ("ENGINE_BATCH_SIZE", "lots"),
            ("ENGINE_QUERY_TIMEOUT_MS", "-5"),
            ("ENGINE_PARTIAL_RESULTS_ON_TIMEOUT", "maybe"),
            ("ENGINE_INDEX_TREE", "redblack"),
            ("ENGINE_SCAPEGOAT_ALPHA", "0.5"),
            ("ENGINE_SCAPEGOAT_ALPHA", "1.2"),
        ] {
            let error = EngineConfig::from_lookup(lookup(&[(name, value)]))
                .expect_err("invalid value should fail");
            assert!(
                matches!(&error, ConfigError::InvalidValue { name: n, .. } if n == name),
                "{name}={value} gave {error}"
            );
        }
    }

    #[test]
    fn test_config_error_display_missing() {
        let error = ConfigError::MissingEnvVar("TEST_VAR".to_string());
        assert_eq!(
            error.to_string(),
            "missing required environment variable: TEST_VAR"
        );
    }

    #[test]
    fn test_config_error_display_invalid() {
        let error = ConfigError::InvalidValue {
            name: "TEST_VAR".to_string(),
            message: "bad value".to_string(),
        };
        assert_eq!(error.to_string(), "invalid value for TEST_VAR: bad value");
    }
}
