//! Configuration validator for memscope
//!
//! Validates configuration values to ensure they are within acceptable ranges.

use super::loader::{BridgeConfig, Config, ConfigError, LoggingConfig, MemoryConfig, ScannerConfig};
use tracing::warn;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the entire configuration
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_scanner(&config.scanner)?;
        Self::validate_memory(&config.memory)?;
        Self::validate_bridge(&config.bridge)?;
        Self::validate_logging(&config.logging)?;
        Ok(())
    }

    fn validate_scanner(scanner: &ScannerConfig) -> Result<(), ConfigError> {
        if scanner.max_threads == 0 {
            return Err(ConfigError::Invalid(
                "Scanner threads must be at least 1".to_string(),
            ));
        }

        if scanner.max_threads > 128 {
            return Err(ConfigError::Invalid(
                "Scanner threads cannot exceed 128".to_string(),
            ));
        }

        // Windows are page multiples, so the size must be a power of 2
        if scanner.chunk_size == 0 || !scanner.chunk_size.is_power_of_two() {
            return Err(ConfigError::Invalid(
                "Chunk size must be a power of 2".to_string(),
            ));
        }

        if scanner.alignment > scanner.chunk_size {
            return Err(ConfigError::Invalid(
                "Alignment cannot exceed the chunk size".to_string(),
            ));
        }

        if scanner.progress_interval == 0 {
            return Err(ConfigError::Invalid(
                "Progress interval must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_memory(memory: &MemoryConfig) -> Result<(), ConfigError> {
        if memory.max_retries > 16 {
            return Err(ConfigError::Invalid(
                "Memory retries cannot exceed 16".to_string(),
            ));
        }

        if memory.max_read_size == 0 {
            return Err(ConfigError::Invalid(
                "Maximum read size must be greater than 0".to_string(),
            ));
        }

        if memory.max_read_size > 104857600 {
            warn!("Maximum read size exceeds 100MB");
        }

        Ok(())
    }

    fn validate_bridge(bridge: &BridgeConfig) -> Result<(), ConfigError> {
        if bridge.debugger.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Debugger path cannot be empty".to_string(),
            ));
        }

        if bridge.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "Debugger timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                logging.level, valid_levels
            )));
        }

        if logging.file.is_empty() {
            return Err(ConfigError::Invalid(
                "Log file path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Validates a configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    ConfigValidator::validate(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_thread_count() {
        let mut config = Config::default();
        config.scanner.max_threads = 0;
        assert!(validate_config(&config).is_err());

        config.scanner.max_threads = 129;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_chunk_size() {
        let mut config = Config::default();
        config.scanner.chunk_size = 0;
        assert!(validate_config(&config).is_err());

        config.scanner.chunk_size = 1000; // Not power of 2
        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("power of 2"));
    }

    #[test]
    fn test_alignment_bound() {
        let mut config = Config::default();
        config.scanner.chunk_size = 16;
        config.scanner.alignment = 32;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_retries() {
        let mut config = Config::default();
        config.memory.max_retries = 17;
        assert!(validate_config(&config).is_err());
        config.memory.max_retries = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_bridge() {
        let mut config = Config::default();
        config.bridge.debugger = "  ".to_string();
        assert!(validate_config(&config)
            .unwrap_err()
            .to_string()
            .contains("Debugger path"));

        let mut config = Config::default();
        config.bridge.timeout_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("log level"));
    }
}
