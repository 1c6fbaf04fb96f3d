use super::{types::Config, AuthMethod, ConfigError, MAX_REMOVAL_DELAY_MS};

/// Validate configuration
/// Currently validates:
/// - Auth section exists (enforced by serde)
/// - An API key is present when api_key auth is selected
/// - Server port is not 0
/// - Removal poll interval is not 0
/// - Removal delay is at most one day
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_deref().map_or(true, str::is_empty)
    {
        return Err(ConfigError::ValidationError(
            "auth.api_key must be set when auth.method = \"api_key\"".to_string(),
        ));
    }

    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.queue.removal_poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "queue.removal_poll_interval_ms cannot be 0".to_string(),
        ));
    }

    if config.queue.removal_delay_ms > MAX_REMOVAL_DELAY_MS {
        return Err(ConfigError::ValidationError(format!(
            "queue.removal_delay_ms cannot exceed {} (got {})",
            MAX_REMOVAL_DELAY_MS, config.queue.removal_delay_ms
        )));
    }

    Ok(())
}
