use crate::config::types::{Config, FetcherConfig, OutputConfig};
use crate::{ConfigError, ConfigResult};

/// Longest accepted per-request timeout, in seconds
pub const MAX_TIMEOUT_SECS: u64 = 600;

/// Highest accepted concurrency limit
pub const MAX_CONCURRENT_REQUESTS: usize = 1000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_fetcher_config(&config.fetcher)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> ConfigResult<()> {
    if config.request_timeout_secs < 1 || config.request_timeout_secs > MAX_TIMEOUT_SECS {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be between 1 and {}, got {}",
            MAX_TIMEOUT_SECS, config.request_timeout_secs
        )));
    }

    // 0 disables the limit
    if config.max_concurrent_requests > MAX_CONCURRENT_REQUESTS {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_requests must be at most {}, got {}",
            MAX_CONCURRENT_REQUESTS, config.max_concurrent_requests
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> ConfigResult<()> {
    if let Some(root) = &config.store_root {
        if root.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "store_root cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}
