//! Pool configuration from environment variables and TOML files.
//!
//! Environment values are read from `GG_MEMPOOL_*` variables. Missing or
//! invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `GG_MEMPOOL_GRANULARITY` | 512 | Allocation granularity (bytes, power of two) |
//! | `GG_MEMPOOL_SEARCH_WINDOW` | 16 | Free chunks examined per allocation (0 = all) |
//! | `GG_MEMPOOL_GROWTH_FACTOR` | 1.0 | Over-allocation factor for new segments |
//! | `GG_MEMPOOL_GPU_LIMIT` | unset | Device pool limit (`"2GiB"`, `"50%"`, bytes) |
//! | `GG_MEMPOOL_PINNED_LIMIT` | unset | Pinned pool limit |
//! | `GG_MEMPOOL_LOG_LEVEL` | `info` | `EnvFilter` directive |
//! | `GG_MEMPOOL_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `GG_MEMPOOL_LOG_FILE` | unset | Write logs to this file instead of stderr |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::{normalize_granularity, LimitSpec, PoolConfig, DEFAULT_GRANULARITY};
use crate::telemetry::{LogConfig, LogFormat};

const DEFAULT_SEARCH_WINDOW: usize = 16;

/// Settings for every pool a registry creates.
///
/// ```toml
/// [device]
/// granularity = 512
/// search_window = 0      # exhaustive
/// limit = "80%"
///
/// [pinned]
/// limit = "1GiB"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    pub device: PoolConfig,
    pub pinned: PoolConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid pool config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl RegistryConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

/// Everything loaded from the environment.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub pools: RegistryConfig,
    pub log: LogConfig,
}

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveConfig {
    pub granularity: usize,
    /// 0 means exhaustive.
    pub search_window: usize,
    pub growth_factor: f64,
    pub gpu_limit: Option<String>,
    pub pinned_limit: Option<String>,
    pub log_level: String,
    pub log_format: String,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a finite `f64` env var, returning `default` on missing or invalid.
fn parse_f64(key: &str, default: f64) -> f64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a limit env var. Unparseable limits are treated as unset.
fn parse_limit(key: &str) -> Option<LimitSpec> {
    std::env::var(key).ok().and_then(|val| val.parse().ok())
}

fn load_pool_config(limit_key: &str) -> PoolConfig {
    let granularity = normalize_granularity(parse_usize("GG_MEMPOOL_GRANULARITY", DEFAULT_GRANULARITY));
    let window = parse_usize("GG_MEMPOOL_SEARCH_WINDOW", DEFAULT_SEARCH_WINDOW);
    let growth_factor = parse_f64("GG_MEMPOOL_GROWTH_FACTOR", 1.0).max(1.0);
    PoolConfig {
        granularity,
        search_window: (window > 0).then_some(window),
        growth_factor,
        limit: parse_limit(limit_key),
    }
}

fn load_log_config() -> LogConfig {
    let defaults = LogConfig::default();
    let format = match std::env::var("GG_MEMPOOL_LOG_FORMAT").as_deref() {
        Ok("pretty") => LogFormat::Pretty,
        Ok("json") => LogFormat::Json,
        _ => defaults.format,
    };
    let level = std::env::var("GG_MEMPOOL_LOG_LEVEL")
        .ok()
        .filter(|l| !l.trim().is_empty())
        .unwrap_or(defaults.level);
    let output_path = std::env::var_os("GG_MEMPOOL_LOG_FILE").map(PathBuf::from);
    LogConfig { format, level, output_path }
}

/// Load all configuration from environment variables.
pub fn load() -> EnvConfig {
    EnvConfig {
        pools: RegistryConfig {
            device: load_pool_config("GG_MEMPOOL_GPU_LIMIT"),
            pinned: load_pool_config("GG_MEMPOOL_PINNED_LIMIT"),
        },
        log: load_log_config(),
    }
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        let device = &self.pools.device;
        EffectiveConfig {
            granularity: device.granularity,
            search_window: device.search_window.unwrap_or(0),
            growth_factor: device.growth_factor,
            gpu_limit: device.limit.map(|l| l.to_string()),
            pinned_limit: self.pools.pinned.limit.map(|l| l.to_string()),
            log_level: self.log.level.clone(),
            log_format: match self.log.format {
                LogFormat::Json => "json".to_string(),
                LogFormat::Pretty => "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid cross-test pollution.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "GG_MEMPOOL_GRANULARITY",
        "GG_MEMPOOL_SEARCH_WINDOW",
        "GG_MEMPOOL_GROWTH_FACTOR",
        "GG_MEMPOOL_GPU_LIMIT",
        "GG_MEMPOOL_PINNED_LIMIT",
        "GG_MEMPOOL_LOG_LEVEL",
        "GG_MEMPOOL_LOG_FORMAT",
        "GG_MEMPOOL_LOG_FILE",
    ];

    fn clear_env_vars() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn test_defaults_are_sensible() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let cfg = load();
        assert_eq!(cfg.pools.device, PoolConfig::default());
        assert_eq!(cfg.pools.pinned, PoolConfig::default());
        assert_eq!(cfg.log.level, LogConfig::default().level);
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert!(cfg.log.output_path.is_none());
    }

    #[test]
    fn test_env_vars_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("GG_MEMPOOL_GRANULARITY", "1024");
        std::env::set_var("GG_MEMPOOL_SEARCH_WINDOW", "0");
        std::env::set_var("GG_MEMPOOL_GROWTH_FACTOR", "1.5");
        std::env::set_var("GG_MEMPOOL_GPU_LIMIT", "2GiB");
        std::env::set_var("GG_MEMPOOL_PINNED_LIMIT", "25%");
        std::env::set_var("GG_MEMPOOL_LOG_FORMAT", "pretty");
        std::env::set_var("GG_MEMPOOL_LOG_LEVEL", "gg_mempool=debug");
        let cfg = load();
        assert_eq!(cfg.pools.device.granularity, 1024);
        assert_eq!(cfg.pools.device.search_window, None);
        assert_eq!(cfg.pools.device.growth_factor, 1.5);
        assert_eq!(cfg.pools.device.limit, Some(LimitSpec::Bytes(2 << 30)));
        assert_eq!(cfg.pools.pinned.limit, Some(LimitSpec::Fraction(0.25)));
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        assert_eq!(cfg.log.level, "gg_mempool=debug");
        clear_env_vars();
    }

    #[test]
    fn test_invalid_env_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("GG_MEMPOOL_GRANULARITY", "lots");
        std::env::set_var("GG_MEMPOOL_SEARCH_WINDOW", "-3");
        std::env::set_var("GG_MEMPOOL_GROWTH_FACTOR", "NaN");
        std::env::set_var("GG_MEMPOOL_GPU_LIMIT", "most of it");
        std::env::set_var("GG_MEMPOOL_LOG_FORMAT", "xml");
        let cfg = load();
        assert_eq!(cfg.pools.device, PoolConfig::default());
        assert_eq!(cfg.log.format, LogFormat::Json);
        clear_env_vars();
    }

    #[test]
    fn test_granularity_and_growth_floors() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("GG_MEMPOOL_GRANULARITY", "0");
        std::env::set_var("GG_MEMPOOL_GROWTH_FACTOR", "0.25");
        let cfg = load();
        assert_eq!(cfg.pools.device.granularity, 1);
        assert_eq!(cfg.pools.device.growth_factor, 1.0);

        std::env::set_var("GG_MEMPOOL_GRANULARITY", "600");
        let cfg = load();
        assert_eq!(cfg.pools.device.granularity, 1024);
        clear_env_vars();
    }

    #[test]
    fn test_effective_config_contains_all_fields() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("GG_MEMPOOL_GPU_LIMIT", "50%");
        let eff = load().effective_config();
        assert_eq!(eff.granularity, 512);
        assert_eq!(eff.search_window, 16);
        assert_eq!(eff.gpu_limit.as_deref(), Some("50%"));
        assert_eq!(eff.pinned_limit, None);
        assert_eq!(eff.log_format, "json");
        let json = serde_json::to_string(&eff).unwrap();
        assert!(json.contains("\"granularity\":512"));
        clear_env_vars();
    }

    #[test]
    fn test_toml_config_partial_tables() {
        let cfg = RegistryConfig::from_toml_str(
            r#"
            [device]
            search_window = 1
            limit = "512MiB"

            [pinned]
            granularity = 4096
            "#,
        )
        .unwrap();
        assert_eq!(cfg.device.search_window, Some(1));
        assert_eq!(cfg.device.limit, Some(LimitSpec::Bytes(512 << 20)));
        assert_eq!(cfg.device.granularity, DEFAULT_GRANULARITY);
        assert_eq!(cfg.pinned.granularity, 4096);
        assert_eq!(cfg.pinned.limit, None);
    }

    #[test]
    fn test_toml_config_rejects_unknown_tables() {
        let err = RegistryConfig::from_toml_str("[gpu]\nlimit = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mempool.toml");
        std::fs::write(&path, "[device]\ngrowth_factor = 2.0\nlimit = 1073741824\n").unwrap();
        let cfg = RegistryConfig::from_file(&path).unwrap();
        assert_eq!(cfg.device.growth_factor, 2.0);
        assert_eq!(cfg.device.limit, Some(LimitSpec::Bytes(1 << 30)));

        let missing = RegistryConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }
}
