use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Queue size and both pool sizes are not 0
/// - The hand-off ceiling is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    config.processor.validate()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::ProcessorConfig;

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_clients_fails() {
        let config = Config {
            processor: ProcessorConfig::default().with_num_clients(0),
        };
        let result = validate_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("num_clients"));
    }
}
