//! Reconciler configuration loaded from environment variables.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `CAIRN_RECONCILE_TIMEOUT_SECS` | `60` | Per-key deadline for fan-out runs |
//! | `CAIRN_RECONCILE_CONCURRENCY` | `8` | Keys reconciled at once by fan-out runs |
//! | `CAIRN_LOG_FORMAT` | `pretty` | `json` or `pretty` |
//! | `CAIRN_STORAGE_LOCATIONS` | `[]` | JSON array of `{name, platform, root}` |

use std::time::Duration;

use cairn_core::{LogFormat, StaticStorageLocations, StorageLocation};

use crate::error::{CatalogError, Result};

/// Default per-key reconciliation timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default fan-out concurrency.
pub const DEFAULT_CONCURRENCY: usize = 8;

const ENV_TIMEOUT_SECS: &str = "CAIRN_RECONCILE_TIMEOUT_SECS";
const ENV_CONCURRENCY: &str = "CAIRN_RECONCILE_CONCURRENCY";
const ENV_LOG_FORMAT: &str = "CAIRN_LOG_FORMAT";
const ENV_STORAGE_LOCATIONS: &str = "CAIRN_STORAGE_LOCATIONS";

/// Reconciler settings.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Deadline for each key in a fan-out run.
    pub timeout: Duration,
    /// Maximum number of keys reconciled at once.
    pub concurrency: usize,
    /// Log output format.
    pub log_format: LogFormat,
    /// Known storage locations.
    pub storage_locations: Vec<StorageLocation>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            log_format: LogFormat::default(),
            storage_locations: Vec::new(),
        }
    }
}

impl ReconcilerConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidInput`] if a variable is malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to its value.
    ///
    /// Values are trimmed. Unset or blank variables take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidInput`] if a variable is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        let mut config = Self::default();

        if let Some(secs) = env.u64(ENV_TIMEOUT_SECS)? {
            if secs == 0 {
                return Err(CatalogError::InvalidInput(format!(
                    "{ENV_TIMEOUT_SECS} must be greater than 0"
                )));
            }
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(concurrency) = env.usize(ENV_CONCURRENCY)? {
            if concurrency == 0 {
                return Err(CatalogError::InvalidInput(format!(
                    "{ENV_CONCURRENCY} must be greater than 0"
                )));
            }
            config.concurrency = concurrency;
        }

        if let Some(format) = env.string(ENV_LOG_FORMAT) {
            config.log_format = format
                .parse()
                .map_err(|e| CatalogError::InvalidInput(format!("{ENV_LOG_FORMAT}: {e}")))?;
        }

        if let Some(json) = env.string(ENV_STORAGE_LOCATIONS) {
            config.storage_locations = serde_json::from_str(&json).map_err(|e| {
                CatalogError::InvalidInput(format!(
                    "{ENV_STORAGE_LOCATIONS} must be a JSON array of storage locations: {e}"
                ))
            })?;
        }

        Ok(config)
    }

    /// Builds a resolver over the configured storage locations.
    #[must_use]
    pub fn storage_resolver(&self) -> StaticStorageLocations {
        self.storage_locations.iter().cloned().collect()
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn u64(&self, name: &str) -> Result<Option<u64>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<u64>()
            .map(Some)
            .map_err(|e| CatalogError::InvalidInput(format!("{name} must be a u64: {e}")))
    }

    fn usize(&self, name: &str) -> Result<Option<usize>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<usize>()
            .map(Some)
            .map_err(|e| CatalogError::InvalidInput(format!("{name} must be a usize: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use cairn_core::{StorageLocationResolver, StoragePlatform};

    fn load(vars: &[(&str, &str)]) -> Result<ReconcilerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ReconcilerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.storage_locations.is_empty());
    }

    #[test]
    fn values_are_trimmed_and_parsed() {
        let config = load(&[
            (ENV_TIMEOUT_SECS, " 5 "),
            (ENV_CONCURRENCY, "2"),
            (ENV_LOG_FORMAT, "json"),
        ])
        .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[(ENV_TIMEOUT_SECS, "   ")]).unwrap();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn zero_and_garbage_are_rejected() {
        for vars in [
            [(ENV_TIMEOUT_SECS, "0")],
            [(ENV_CONCURRENCY, "0")],
            [(ENV_TIMEOUT_SECS, "soon")],
            [(ENV_LOG_FORMAT, "xml")],
            [(ENV_STORAGE_LOCATIONS, "{not json")],
        ] {
            let err = load(&vars).unwrap_err();
            assert!(matches!(err, CatalogError::InvalidInput(_)), "{vars:?}");
        }
    }

    #[tokio::test]
    async fn storage_locations_feed_the_resolver() {
        let config = load(&[(
            ENV_STORAGE_LOCATIONS,
            r#"[{"name":"S3_MANAGED","platform":"s3","root":"managed"}]"#,
        )])
        .unwrap();
        let resolver = config.storage_resolver();
        let location = resolver.resolve("S3_MANAGED").await.unwrap();
        assert_eq!(location.platform, StoragePlatform::S3);
        assert_eq!(location.root, "managed");
    }
}
