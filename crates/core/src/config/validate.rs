use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Page sizes are positive and the maximum is not below the default
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let pagination = &config.pagination;
    if pagination.default_page_size == 0 {
        return Err(ConfigError::ValidationError(
            "pagination.default_page_size cannot be 0".to_string(),
        ));
    }
    if pagination.max_page_size < pagination.default_page_size {
        return Err(ConfigError::ValidationError(format!(
            "pagination.max_page_size ({}) is below default_page_size ({})",
            pagination.max_page_size, pagination.default_page_size
        )));
    }

    Ok(())
}
