//! Configuration loader for memscope
//!
//! Handles loading configuration from TOML files and merging with defaults.

use super::defaults::default_config;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_scanner")]
    pub scanner: ScannerConfig,

    #[serde(default = "default_memory")]
    pub memory: MemoryConfig,

    #[serde(default = "default_codec")]
    pub codec: CodecConfig,

    #[serde(default = "default_bridge")]
    pub bridge: BridgeConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

/// Scan engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Bytes read per window during a first scan
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Candidate stride; 0 means the natural width of the value type
    #[serde(default = "default_alignment")]
    pub alignment: usize,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
    /// Candidates processed between cancellation checks
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

/// Foreign memory access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_max_read_size")]
    pub max_read_size: usize,
}

/// Value codec configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    #[serde(default = "default_strict_strings")]
    pub strict_strings: bool,
}

/// Expression bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_debugger")]
    pub debugger: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: String,
}

/// Configuration loader
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ConfigLoader {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Loads configuration from file
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            return Err(ConfigError::FileNotFound(
                self.config_path.display().to_string(),
            ));
        }

        let contents = fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Loads configuration, falling back to defaults only when the file is absent
    pub fn load_or_default(&self) -> Result<Config, ConfigError> {
        match self.load() {
            Err(ConfigError::FileNotFound(_)) => Ok(Config::default()),
            other => other,
        }
    }

    /// Saves configuration to file
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Loads `memscope.toml` from the working directory, or defaults
pub fn load_config() -> Result<Config, ConfigError> {
    ConfigLoader::new("memscope.toml").load_or_default()
}

// Default functions for serde
fn default_scanner() -> ScannerConfig {
    let defaults = default_config().scanner;
    ScannerConfig {
        chunk_size: defaults.chunk_size,
        alignment: defaults.alignment,
        parallel: defaults.parallel,
        max_threads: defaults.max_threads,
        progress_interval: defaults.progress_interval,
    }
}

fn default_memory() -> MemoryConfig {
    let defaults = default_config().memory;
    MemoryConfig {
        max_retries: defaults.max_retries,
        retry_delay_ms: defaults.retry_delay_ms,
        max_read_size: defaults.max_read_size,
    }
}

fn default_codec() -> CodecConfig {
    CodecConfig {
        strict_strings: default_config().codec.strict_strings,
    }
}

fn default_bridge() -> BridgeConfig {
    let defaults = default_config().bridge;
    BridgeConfig {
        debugger: defaults.debugger,
        timeout_ms: defaults.timeout_ms,
    }
}

fn default_logging() -> LoggingConfig {
    let defaults = default_config().logging;
    LoggingConfig {
        level: defaults.level,
        file: defaults.file,
    }
}

// Individual field defaults
fn default_chunk_size() -> usize {
    default_config().scanner.chunk_size
}

fn default_alignment() -> usize {
    default_config().scanner.alignment
}

fn default_parallel() -> bool {
    default_config().scanner.parallel
}

fn default_max_threads() -> usize {
    default_config().scanner.max_threads
}

fn default_progress_interval() -> usize {
    default_config().scanner.progress_interval
}

fn default_max_retries() -> u32 {
    default_config().memory.max_retries
}

fn default_retry_delay_ms() -> u64 {
    default_config().memory.retry_delay_ms
}

fn default_max_read_size() -> usize {
    default_config().memory.max_read_size
}

fn default_strict_strings() -> bool {
    default_config().codec.strict_strings
}

fn default_debugger() -> String {
    default_config().bridge.debugger
}

fn default_timeout_ms() -> u64 {
    default_config().bridge.timeout_ms
}

fn default_log_level() -> String {
    default_config().logging.level
}

fn default_log_file() -> String {
    default_config().logging.file
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scanner: default_scanner(),
            memory: default_memory(),
            codec: default_codec(),
            bridge: default_bridge(),
            logging: default_logging(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        default_scanner()
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        default_memory()
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        default_codec()
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        default_bridge()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scanner.chunk_size, 65536);
        assert_eq!(config.memory.max_retries, 3);
        assert!(config.scanner.max_threads > 0);
    }

    #[test]
    fn test_load_missing_file() {
        let loader = ConfigLoader::new("nonexistent.toml");
        let result = loader.load();
        assert!(matches!(result.unwrap_err(), ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_or_default() {
        let loader = ConfigLoader::new("nonexistent.toml");
        let config = loader.load_or_default().unwrap();
        assert_eq!(config.bridge.debugger, "gdb");
    }

    #[test]
    fn test_load_or_default_reports_parse_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        fs::write(&path, "[scanner\nchunk_size = ").unwrap();

        let result = ConfigLoader::new(&path).load_or_default();
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let mut config = Config::default();
        config.memory.max_retries = 7;
        let loader = ConfigLoader::new(&config_path);

        loader.save(&config).unwrap();
        assert!(config_path.exists());

        let loaded = loader.load().unwrap();
        assert_eq!(loaded.memory.max_retries, 7);
        assert_eq!(loaded.scanner.chunk_size, config.scanner.chunk_size);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
            [scanner]
            chunk_size = 4096
            parallel = true

            [codec]
            strict_strings = true
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scanner.chunk_size, 4096);
        assert!(config.scanner.parallel);
        assert!(config.codec.strict_strings);
        // Check defaults are applied
        assert_eq!(config.scanner.alignment, 0);
        assert_eq!(config.memory.max_read_size, 10485760);
        assert_eq!(config.logging.level, "info");
    }
}
