use crate::config::types::{Config, OutputConfig};
use crate::config::validation::validate;
use crate::{ConfigError, ConfigResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable naming the store root directory
pub const STORE_ROOT_ENV: &str = "ROOT_STORE_DIR";

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use sumi_mirror::config::load_config;
///
/// let config = load_config(Path::new("mirror.toml")).unwrap();
/// println!("Mirroring assets: {}", config.fetcher.mirror);
/// ```
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> ConfigResult<Config> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Picks the directory mirrored pages are written to
///
/// In order of precedence: the command-line flag, the `ROOT_STORE_DIR` environment
/// variable, the `[output] store-root` key, the current working directory. Empty
/// values are skipped.
pub fn resolve_store_root(
    flag: Option<&Path>,
    env: Option<OsString>,
    output: &OutputConfig,
) -> ConfigResult<PathBuf> {
    if let Some(flag) = flag.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(flag.to_path_buf());
    }

    if let Some(env) = env.filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(env));
    }

    if let Some(root) = output
        .store_root
        .as_ref()
        .filter(|p| !p.as_os_str().is_empty())
    {
        return Ok(root.clone());
    }

    std::env::current_dir().map_err(|e| ConfigError::StoreRoot(e.to_string()))
}
