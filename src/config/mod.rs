//! Configuration module.

mod read_config;
mod types;

pub use read_config::{ConfigError, ConfigResult, ConfigSource, Result, read_config};
pub use types::{CacheConfig, Config, IdentityConfig, MergeConfig, StoreConfig};
