//! Configuration file reading and parsing.
//!
//! This module handles locating, reading, and parsing INI-format configuration files,
//! with support for command-line overrides.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use configparser::ini::Ini;
use thiserror::Error;

use super::{CacheConfig, Config, IdentityConfig, MergeConfig, StoreConfig};

// =============================================================================
// Constants - Default Values
// =============================================================================

const DEFAULT_STORE_PATH: &str = "./.tsync";
const DEFAULT_STORE_ID: &str = "default";
const DEFAULT_STORE_VERSION: u32 = 1;
const DEFAULT_CACHE_DIR_ENTRIES: usize = 1024;
const DEFAULT_MERGE_MAX_RETRIES: u32 = 10;
const DEFAULT_MERGE_RETRY_MIN_DELAY_MS: u64 = 100;
const DEFAULT_MERGE_RETRY_MAX_DELAY_MS: u64 = 1000;
const DEFAULT_IDENTITY_NAME: &str = "unknown";

const ENV_CONFIG_FILE: &str = "TSYNC_CONFIG_FILE";
const DEFAULT_CONFIG_FILENAME: &str = ".tsyncconfig";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid value '{value}' for '{key}'{}: {message}", location(.path))]
    InvalidValue {
        path: Option<PathBuf>,
        key: String,
        value: String,
        message: String,
    },

    #[error("invalid override key '{key}': {message}")]
    InvalidOverrideKey { key: String, message: String },
}

fn location(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" in {}", p.display()),
        None => String::new(),
    }
}

/// Result type for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// =============================================================================
// ConfigSource
// =============================================================================

/// Specifies how to locate and layer configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    /// Explicit config file path from CLI. If specified and doesn't exist, error.
    /// If None, fall back to TSYNC_CONFIG_FILE env var, then ~/.tsyncconfig.
    pub config_file: Option<PathBuf>,

    /// Individual key=value overrides (applied last).
    /// Keys use dot-notation: "store.path", "merge.max_retries"
    pub overrides: Vec<(String, String)>,
}

// =============================================================================
// Config File Resolution
// =============================================================================

/// Information about how the config file was resolved.
#[derive(Debug)]
struct ResolvedConfigFile {
    path: Option<PathBuf>,
    /// Set if the env var pointed to a nonexistent file.
    warning: Option<String>,
}

/// Resolve which config file to use based on the ConfigSource and environment.
fn resolve_config_file(source: &ConfigSource) -> Result<ResolvedConfigFile> {
    if let Some(ref path) = source.config_file {
        if path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(path.clone()),
                warning: None,
            });
        }
        return Err(ConfigError::FileNotFound(path.clone()));
    }

    if let Ok(env_path) = env::var(ENV_CONFIG_FILE) {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(path),
                warning: None,
            });
        }
        // Warn but continue with defaults
        return Ok(ResolvedConfigFile {
            path: None,
            warning: Some(format!(
                "config file specified by {} does not exist: {}",
                ENV_CONFIG_FILE, env_path
            )),
        });
    }

    if let Some(home) = home_dir() {
        let default_path = home.join(DEFAULT_CONFIG_FILENAME);
        if default_path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(default_path),
                warning: None,
            });
        }
    }

    Ok(ResolvedConfigFile {
        path: None,
        warning: None,
    })
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

// =============================================================================
// Default Config
// =============================================================================

/// Create a Config with all default values.
fn default_config() -> Config {
    Config {
        store: StoreConfig {
            path: PathBuf::from(DEFAULT_STORE_PATH),
            store_id: DEFAULT_STORE_ID.to_string(),
            version: DEFAULT_STORE_VERSION,
        },
        cache: CacheConfig {
            dir_entries: Some(DEFAULT_CACHE_DIR_ENTRIES),
        },
        merge: MergeConfig {
            max_retries: DEFAULT_MERGE_MAX_RETRIES,
            retry_min_delay_ms: DEFAULT_MERGE_RETRY_MIN_DELAY_MS,
            retry_max_delay_ms: DEFAULT_MERGE_RETRY_MAX_DELAY_MS,
        },
        identity: IdentityConfig {
            name: env::var("USER")
                .ok()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_IDENTITY_NAME.to_string()),
        },
    }
}

// =============================================================================
// Value Parsing
// =============================================================================

fn parse_number<T: FromStr>(path: Option<&Path>, key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        path: path.map(Path::to_path_buf),
        key: key.to_string(),
        value: value.to_string(),
        message: e.to_string(),
    })
}

/// Parse a cache capacity. `0` and `none` disable the cache.
fn parse_capacity(path: Option<&Path>, key: &str, value: &str) -> Result<Option<usize>> {
    if value.trim().eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let n: usize = parse_number(path, key, value)?;
    Ok((n > 0).then_some(n))
}

/// Apply one `section.key = value` setting. Both INI files and command-line
/// overrides go through here.
fn apply_setting(
    config: &mut Config,
    path: Option<&Path>,
    section: &str,
    key: &str,
    value: &str,
) -> Result<()> {
    let full_key = format!("{}.{}", section, key);

    match (section, key) {
        ("store", "path") => config.store.path = PathBuf::from(value.trim()),
        ("store", "store_id") => config.store.store_id = value.trim().to_string(),
        ("store", "version") => {
            let version: u32 = parse_number(path, &full_key, value)?;
            if version < 1 {
                return Err(ConfigError::InvalidValue {
                    path: path.map(Path::to_path_buf),
                    key: full_key,
                    value: value.to_string(),
                    message: "version must be at least 1".to_string(),
                });
            }
            config.store.version = version;
        }
        ("cache", "dir_entries") => {
            config.cache.dir_entries = parse_capacity(path, &full_key, value)?
        }
        ("merge", "max_retries") => {
            config.merge.max_retries = parse_number(path, &full_key, value)?
        }
        ("merge", "retry_min_delay_ms") => {
            config.merge.retry_min_delay_ms = parse_number(path, &full_key, value)?
        }
        ("merge", "retry_max_delay_ms") => {
            config.merge.retry_max_delay_ms = parse_number(path, &full_key, value)?
        }
        ("identity", "name") => config.identity.name = value.trim().to_string(),
        _ => {
            return Err(ConfigError::InvalidOverrideKey {
                key: full_key,
                message: "unknown parameter".to_string(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// INI Parsing
// =============================================================================

/// Apply an INI file's contents to a Config, layering on top of existing values.
fn apply_ini_to_config(config: &mut Config, ini: &Ini, path: Option<&Path>) -> Result<()> {
    let Some(map) = ini.get_map() else {
        return Ok(());
    };

    let mut sections: Vec<_> = map.into_iter().collect();
    sections.sort_by(|a, b| a.0.cmp(&b.0));

    for (section, keys) in sections {
        let mut keys: Vec<_> = keys.into_iter().collect();
        keys.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, value) in keys {
            let Some(value) = value else {
                continue;
            };
            apply_setting(config, path, &section, &key, &value)?;
        }
    }
    Ok(())
}

/// Load and parse an INI file.
fn load_ini(path: &Path) -> Result<Ini> {
    let mut ini = Ini::new();
    ini.load(path).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e,
    })?;
    Ok(ini)
}

// =============================================================================
// Override Application
// =============================================================================

/// Apply a single `section.key=value` override to the config.
fn apply_override(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let parts: Vec<&str> = key.splitn(2, '.').collect();

    match parts.as_slice() {
        [section, param] => apply_setting(config, None, section, param, value),
        _ => Err(ConfigError::InvalidOverrideKey {
            key: key.to_string(),
            message: "unrecognized key format".to_string(),
        }),
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

/// Result of reading configuration, including any warnings.
#[derive(Debug)]
pub struct ConfigResult {
    /// The parsed configuration.
    pub config: Config,
    /// Any warnings generated during config loading.
    pub warnings: Vec<String>,
}

/// Read and parse configuration from the specified sources.
///
/// Configuration is layered in this order:
/// 1. Built-in defaults
/// 2. Config file (from CLI, env var, or ~/.tsyncconfig)
/// 3. Individual overrides (applied last)
pub fn read_config(source: &ConfigSource) -> Result<ConfigResult> {
    let mut warnings = Vec::new();
    let mut config = default_config();

    let resolved = resolve_config_file(source)?;
    if let Some(warning) = resolved.warning {
        warnings.push(warning);
    }
    if let Some(ref path) = resolved.path {
        let ini = load_ini(path)?;
        apply_ini_to_config(&mut config, &ini, Some(path))?;
    }

    for (key, value) in &source.overrides {
        apply_override(&mut config, key, value)?;
    }

    if config.merge.retry_min_delay_ms > config.merge.retry_max_delay_ms {
        warnings.push(format!(
            "merge.retry_min_delay_ms ({}) is above merge.retry_max_delay_ms ({}), using the minimum for both",
            config.merge.retry_min_delay_ms, config.merge.retry_max_delay_ms
        ));
        config.merge.retry_max_delay_ms = config.merge.retry_min_delay_ms;
    }

    Ok(ConfigResult { config, warnings })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = default_config();
        assert_eq!(config.store.path, PathBuf::from("./.tsync"));
        assert_eq!(config.store.store_id, "default");
        assert_eq!(config.store.version, 1);
        assert_eq!(config.cache.dir_entries, Some(1024));
        assert_eq!(config.merge.max_retries, 10);
        assert!(!config.identity.name.is_empty());
    }

    #[test]
    fn test_apply_override_store() {
        let mut config = default_config();
        apply_override(&mut config, "store.path", "/custom/path").unwrap();
        apply_override(&mut config, "store.store_id", "photos").unwrap();
        assert_eq!(config.store.path, PathBuf::from("/custom/path"));
        assert_eq!(config.store.store_id, "photos");
    }

    #[test]
    fn test_apply_override_cache() {
        let mut config = default_config();
        apply_override(&mut config, "cache.dir_entries", "64").unwrap();
        assert_eq!(config.cache.dir_entries, Some(64));

        apply_override(&mut config, "cache.dir_entries", "none").unwrap();
        assert_eq!(config.cache.dir_entries, None);

        apply_override(&mut config, "cache.dir_entries", "0").unwrap();
        assert_eq!(config.cache.dir_entries, None);
    }

    #[test]
    fn test_apply_override_errors() {
        let mut config = default_config();
        assert!(matches!(
            apply_override(&mut config, "nosection", "1"),
            Err(ConfigError::InvalidOverrideKey { .. })
        ));
        assert!(matches!(
            apply_override(&mut config, "merge.bogus", "1"),
            Err(ConfigError::InvalidOverrideKey { .. })
        ));
        assert!(matches!(
            apply_override(&mut config, "merge.max_retries", "many"),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "merge.max_retries"
        ));
        assert!(matches!(
            apply_override(&mut config, "store.version", "0"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_retry_policy() {
        let mut config = default_config();
        apply_override(&mut config, "merge.retry_min_delay_ms", "5").unwrap();
        apply_override(&mut config, "merge.retry_max_delay_ms", "50").unwrap();
        let policy = config.merge.retry_policy();
        assert_eq!(policy.max_retries, 10);
        assert_eq!(policy.min_delay, Duration::from_millis(5));
        assert_eq!(policy.max_delay, Duration::from_millis(50));
    }

    #[test]
    fn test_parse_ini_config() {
        let mut ini = Ini::new();
        ini.read(
            r#"
[store]
path = /srv/tsync
store_id = team

[cache]
dir_entries = 16

[merge]
max_retries = 3

[identity]
name = alice
"#
            .to_string(),
        )
        .unwrap();

        let mut config = default_config();
        apply_ini_to_config(&mut config, &ini, None).unwrap();

        assert_eq!(config.store.path, PathBuf::from("/srv/tsync"));
        assert_eq!(config.store.store_id, "team");
        assert_eq!(config.cache.dir_entries, Some(16));
        assert_eq!(config.merge.max_retries, 3);
        assert_eq!(config.identity.name, "alice");
    }

    #[test]
    fn test_read_config_file_and_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tsync.ini");
        std::fs::write(&path, "[store]\nstore_id = from-file\n\n[merge]\nmax_retries = 2\n")
            .unwrap();

        let source = ConfigSource {
            config_file: Some(path),
            overrides: vec![("merge.max_retries".to_string(), "7".to_string())],
        };
        let result = read_config(&source).unwrap();
        assert_eq!(result.config.store.store_id, "from-file");
        assert_eq!(result.config.merge.max_retries, 7);
    }

    #[test]
    fn test_read_config_reports_file_and_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.ini");
        std::fs::write(&path, "[cache]\ndir_entries = lots\n").unwrap();

        let source = ConfigSource {
            config_file: Some(path.clone()),
            ..Default::default()
        };
        let err = read_config(&source).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("cache.dir_entries"));
        assert!(message.contains(&path.display().to_string()));
    }

    #[test]
    fn test_missing_explicit_file() {
        let source = ConfigSource {
            config_file: Some(PathBuf::from("/nonexistent/tsync.ini")),
            ..Default::default()
        };
        assert!(matches!(
            read_config(&source),
            Err(ConfigError::FileNotFound(_))
        ));
    }
}
