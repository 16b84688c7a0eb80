//! Default configuration values for memscope

use serde::{Deserialize, Serialize};

/// Default configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDefaults {
    pub scanner: ScannerDefaults,
    pub memory: MemoryDefaults,
    pub codec: CodecDefaults,
    pub bridge: BridgeDefaults,
    pub logging: LoggingDefaults,
}

/// Default scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerDefaults {
    pub chunk_size: usize,
    pub alignment: usize,
    pub parallel: bool,
    pub max_threads: usize,
    pub progress_interval: usize,
}

/// Default memory access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDefaults {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub max_read_size: usize,
}

/// Default codec configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecDefaults {
    pub strict_strings: bool,
}

/// Default expression bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeDefaults {
    pub debugger: String,
    pub timeout_ms: u64,
}

/// Default logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingDefaults {
    pub level: String,
    pub file: String,
}

/// Returns the default configuration
pub fn default_config() -> ConfigDefaults {
    ConfigDefaults {
        scanner: ScannerDefaults {
            chunk_size: 65536, // 64KB
            alignment: 0,      // natural width of the value type
            parallel: false,
            max_threads: num_cpus::get().min(8),
            progress_interval: 4096,
        },
        memory: MemoryDefaults {
            max_retries: 3,
            retry_delay_ms: 5,
            max_read_size: 10485760, // 10MB
        },
        codec: CodecDefaults {
            strict_strings: false,
        },
        bridge: BridgeDefaults {
            debugger: "gdb".to_string(),
            timeout_ms: 10000,
        },
        logging: LoggingDefaults {
            level: "info".to_string(),
            file: "memscope.log".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanner_defaults() {
        let config = default_config();
        assert!(config.scanner.max_threads > 0);
        assert!(config.scanner.max_threads <= 8);
        assert_eq!(config.scanner.chunk_size, 65536);
        assert_eq!(config.scanner.alignment, 0);
        assert!(!config.scanner.parallel);
    }

    #[test]
    fn test_memory_defaults() {
        let config = default_config();
        assert_eq!(config.memory.max_retries, 3);
        assert_eq!(config.memory.retry_delay_ms, 5);
        assert_eq!(config.memory.max_read_size, 10485760);
    }

    #[test]
    fn test_codec_and_bridge_defaults() {
        let config = default_config();
        assert!(!config.codec.strict_strings);
        assert_eq!(config.bridge.debugger, "gdb");
        assert_eq!(config.bridge.timeout_ms, 10000);
    }

    #[test]
    fn test_serialization() {
        let config = default_config();
        let serialized = toml::to_string(&config).unwrap();
        assert!(serialized.contains("chunk_size"));
        assert!(serialized.contains("max_retries"));

        let deserialized: ConfigDefaults = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.scanner.chunk_size, config.scanner.chunk_size);
        assert_eq!(deserialized.bridge.debugger, config.bridge.debugger);
    }
}
