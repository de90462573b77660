//! # Gateway Configuration
//!
//! Configuration is resolved once, at startup, into an immutable [`GatewayConfig`]
//! that is then shared (`Arc`) by every request. Nothing in here is mutated after
//! construction and there is no process-wide singleton.
//!
//! Raw values come from a flat [`Settings`] map, which can be filled from the
//! process environment, from a JSON object, or from any iterator of key/value
//! pairs (convenient in tests). Resolution never fails: an invalid value is
//! logged and replaced by its default so a typo cannot take the service down.
//!
//! ## Recognized keys
//!
//! - `UMLGATE_SAFE_MODE`: `unsafe`, `safe` or `secure` (default `secure`).
//! - `UMLGATE_INCLUDE_WHITELIST`: path of a newline-delimited pattern file.
//! - `UMLGATE_INCLUDE_WHITELIST_0`, `_1`, ...: inline whitelist patterns.
//! - `UMLGATE_STDLIB_LIBRARIES`: comma-separated bundled library names.
//! - `UMLGATE_SANITIZE`: sanitize diagrams before rendering (default `true`).
//! - `UMLGATE_RENDER_TIMEOUT_MS`: per-render deadline (default 20000).
//! - `UMLGATE_RENDER_WORKERS`: dedicated render threads.
//! - `UMLGATE_RENDER_QUEUE`: tasks allowed to wait beyond the busy workers.

use crate::{
    harness::PoolConfig,
    safe_mode::SafeMode,
    sanitizer::StdlibRegistry,
    whitelist::{Whitelist, load_whitelist},
};
use anyhow::{Result, anyhow};
use serde_json::Value;
use std::{collections::BTreeMap, fmt::Display, str::FromStr, time::Duration};

pub const SAFE_MODE_KEY: &str = "UMLGATE_SAFE_MODE";
pub const INCLUDE_WHITELIST_KEY: &str = "UMLGATE_INCLUDE_WHITELIST";
pub const STDLIB_LIBRARIES_KEY: &str = "UMLGATE_STDLIB_LIBRARIES";
pub const SANITIZE_KEY: &str = "UMLGATE_SANITIZE";
pub const RENDER_TIMEOUT_KEY: &str = "UMLGATE_RENDER_TIMEOUT_MS";
pub const RENDER_WORKERS_KEY: &str = "UMLGATE_RENDER_WORKERS";
pub const RENDER_QUEUE_KEY: &str = "UMLGATE_RENDER_QUEUE";

/// Flat string settings, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the process environment. Variables that are not valid
    /// Unicode are skipped.
    pub fn from_env() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    /// Builds settings from a JSON object. Strings are taken as-is, other scalars
    /// are stringified, `null` entries are dropped.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| anyhow!("configuration must be a JSON object, got: {}", value))?;

        let mut settings = Settings::new();
        for (key, value) in object {
            match value {
                Value::Null => {}
                Value::String(s) => settings.insert(key.clone(), s.clone()),
                Value::Bool(_) | Value::Number(_) => {
                    settings.insert(key.clone(), value.to_string())
                }
                Value::Array(_) | Value::Object(_) => {
                    return Err(anyhow!(
                        "configuration key '{}' must be a scalar, got: {}",
                        key,
                        value
                    ));
                }
            }
        }
        Ok(settings)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style [`Settings::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Entries of `overrides` replace entries of `self`.
    pub fn merged(mut self, overrides: Settings) -> Self {
        self.values.extend(overrides.values);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parses `key`, logging and returning `None` when the value is invalid.
    pub fn parsed<T>(&self, key: &str) -> Option<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.get(key)?;
        match raw.trim().parse::<T>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring invalid value '{}' for {}: {}", raw, key, e);
                None
            }
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Settings
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Everything a [`crate::DiagramGateway`] needs, resolved once.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub safe_mode: SafeMode,
    pub whitelist: Whitelist,
    pub stdlib: StdlibRegistry,
    /// Run the directive sanitizer before rendering.
    pub sanitize: bool,
    pub pool: PoolConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            safe_mode: SafeMode::default(),
            whitelist: Whitelist::default(),
            stdlib: StdlibRegistry::default(),
            sanitize: true,
            pool: PoolConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Resolves the configuration from raw settings. Total: invalid values fall
    /// back to defaults with a warning.
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = PoolConfig::default();

        let workers = match settings.parsed::<usize>(RENDER_WORKERS_KEY) {
            Some(0) => {
                tracing::warn!(
                    "{} must be at least 1, using {}",
                    RENDER_WORKERS_KEY,
                    defaults.workers
                );
                defaults.workers
            }
            Some(n) => n,
            None => defaults.workers,
        };
        let queue_capacity = settings
            .parsed::<usize>(RENDER_QUEUE_KEY)
            .unwrap_or(workers * PoolConfig::QUEUE_PER_WORKER);
        let default_timeout = settings
            .parsed::<u64>(RENDER_TIMEOUT_KEY)
            .map(Duration::from_millis)
            .unwrap_or(defaults.default_timeout);

        let stdlib = match settings.get(STDLIB_LIBRARIES_KEY) {
            Some(list) => StdlibRegistry::from_list(list),
            None => StdlibRegistry::default(),
        };

        let config = Self {
            safe_mode: settings.parsed(SAFE_MODE_KEY).unwrap_or_default(),
            whitelist: load_whitelist(settings),
            stdlib,
            sanitize: settings.parsed(SANITIZE_KEY).unwrap_or(true),
            pool: PoolConfig {
                workers,
                queue_capacity,
                default_timeout,
            },
        };

        tracing::info!(
            "Resolved gateway config: safe_mode={}, whitelist_entries={}, stdlib_libraries={}, \
             sanitize={}, workers={}, queue={}, timeout={}ms",
            config.safe_mode,
            config.whitelist.len(),
            config.stdlib.len(),
            config.sanitize,
            config.pool.workers,
            config.pool.queue_capacity,
            config.pool.default_timeout.as_millis()
        );
        config
    }

    pub fn with_safe_mode(mut self, safe_mode: SafeMode) -> Self {
        self.safe_mode = safe_mode;
        self
    }

    pub fn with_whitelist(mut self, whitelist: Whitelist) -> Self {
        self.whitelist = whitelist;
        self
    }

    pub fn with_stdlib(mut self, stdlib: StdlibRegistry) -> Self {
        self.stdlib = stdlib;
        self
    }

    pub fn with_sanitize(mut self, sanitize: bool) -> Self {
        self.sanitize = sanitize;
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_settings_yield_defaults() {
        let config = GatewayConfig::from_settings(&Settings::new());
        assert_eq!(config.safe_mode, SafeMode::Secure);
        assert!(config.whitelist.is_empty());
        assert!(config.sanitize);
        assert_eq!(config.pool.default_timeout, PoolConfig::default().default_timeout);
        assert!(config.stdlib.contains("azure"));
    }

    #[test]
    fn test_settings_override_defaults() {
        let settings = Settings::new()
            .with(SAFE_MODE_KEY, "safe")
            .with(RENDER_WORKERS_KEY, "3")
            .with(RENDER_QUEUE_KEY, "1")
            .with(RENDER_TIMEOUT_KEY, "250")
            .with(SANITIZE_KEY, "false")
            .with(STDLIB_LIBRARIES_KEY, "acme, Widgets");
        let config = GatewayConfig::from_settings(&settings);

        assert_eq!(config.safe_mode, SafeMode::Safe);
        assert_eq!(config.pool.workers, 3);
        assert_eq!(config.pool.queue_capacity, 1);
        assert_eq!(config.pool.default_timeout, Duration::from_millis(250));
        assert!(!config.sanitize);
        assert!(config.stdlib.contains("widgets"));
        assert!(!config.stdlib.contains("azure"));
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let settings = Settings::new()
            .with(SAFE_MODE_KEY, "paranoid")
            .with(RENDER_WORKERS_KEY, "0")
            .with(RENDER_TIMEOUT_KEY, "soon");
        let config = GatewayConfig::from_settings(&settings);

        assert_eq!(config.safe_mode, SafeMode::Secure);
        assert_eq!(config.pool.workers, PoolConfig::default().workers);
        assert_eq!(config.pool.default_timeout, PoolConfig::default().default_timeout);
    }

    #[test]
    fn test_queue_defaults_scale_with_workers() {
        let config = GatewayConfig::from_settings(&Settings::new().with(RENDER_WORKERS_KEY, "2"));
        assert_eq!(config.pool.queue_capacity, 2 * PoolConfig::QUEUE_PER_WORKER);
    }

    #[test]
    fn test_settings_from_json_stringifies_scalars() {
        let settings = Settings::from_json(&json!({
            "UMLGATE_SAFE_MODE": "unsafe",
            "UMLGATE_RENDER_WORKERS": 2,
            "UMLGATE_SANITIZE": false,
            "UMLGATE_INCLUDE_WHITELIST": null
        }))
        .unwrap();

        assert_eq!(settings.get(SAFE_MODE_KEY), Some("unsafe"));
        assert_eq!(settings.get(RENDER_WORKERS_KEY), Some("2"));
        assert_eq!(settings.get(SANITIZE_KEY), Some("false"));
        assert!(!settings.contains(INCLUDE_WHITELIST_KEY));
    }

    #[test]
    fn test_settings_from_json_rejects_non_objects_and_nested_values() {
        assert!(Settings::from_json(&json!(["a"])).is_err());
        assert!(Settings::from_json(&json!({"k": {"nested": 1}})).is_err());
    }

    #[test]
    fn test_default_matches_empty_settings() {
        let config = GatewayConfig::default();
        assert_eq!(config.safe_mode, SafeMode::Secure);
        assert!(config.sanitize);
        assert_eq!(config.pool, PoolConfig::default());
    }

    #[test]
    fn test_merged_prefers_overrides() {
        let base = Settings::new().with("A", "1").with("B", "2");
        let merged = base.merged(Settings::new().with("B", "3"));
        assert_eq!(merged.get("A"), Some("1"));
        assert_eq!(merged.get("B"), Some("3"));
        assert_eq!(merged.len(), 2);
    }
}
