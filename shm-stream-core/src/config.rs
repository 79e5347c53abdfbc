// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML stream configuration with strict validation.
//!
//! A config file describes one end of one stream. Both processes must agree
//! on `name` and `wait`; exactly one of them sets `create: true`.
//! Any invalid field results in a HardValidationError that prevents opening.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HardValidationError, StreamError, StreamResult};
use crate::types::{Capacity, StreamName, WaitKind, DEFAULT_CAPACITY};

/// Longest accepted blocking timeout (1 hour).
const MAX_TIMEOUT_MS: u64 = 3_600_000;

/// Longest accepted open retry window (10 minutes).
const MAX_OPEN_RETRY_MS: u64 = 600_000;

/// Raw configuration as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStreamConfig {
    name: Option<String>,
    #[serde(default = "default_capacity")]
    capacity: u64,
    #[serde(default = "default_wait")]
    wait: String,
    #[serde(default)]
    create: bool,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    open_retry_ms: u64,
    #[serde(default)]
    pin_cpu: Option<usize>,
}

fn default_capacity() -> u64 {
    DEFAULT_CAPACITY
}

fn default_wait() -> String {
    "blocking".to_string()
}

/// Validated stream configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub name: StreamName,
    pub capacity: Capacity,
    pub wait: WaitKind,
    /// Create the region (true) or open an existing one (false).
    pub create: bool,
    /// Bound on a single blocking call; expiry reports `WouldBlock`.
    pub timeout: Option<Duration>,
    /// How long an opener retries while the region does not exist yet.
    pub open_retry: Duration,
    /// CPU the process pins itself to, if any. Range-checked by the binary.
    pub pin_cpu: Option<usize>,
}

impl StreamConfig {
    /// Configuration with defaults for everything but the name.
    pub fn new(name: StreamName) -> Self {
        Self {
            name,
            capacity: Capacity::default(),
            wait: WaitKind::default(),
            create: false,
            timeout: None,
            open_retry: Duration::ZERO,
            pin_cpu: None,
        }
    }

    /// Cross-field rules. Run again by callers that edit a loaded config.
    pub fn check(&self) -> Result<(), HardValidationError> {
        if let Some(timeout) = self.timeout {
            let ms = timeout.as_millis() as u64;
            if self.wait == WaitKind::NoWait {
                return Err(HardValidationError::InvalidFieldValue {
                    field: "timeout_ms",
                    value: ms.to_string(),
                    reason: "no_wait streams never wait, a timeout has no effect".to_string(),
                });
            }
            if ms == 0 || ms > MAX_TIMEOUT_MS {
                return Err(HardValidationError::InvalidFieldValue {
                    field: "timeout_ms",
                    value: ms.to_string(),
                    reason: format!("Must be between 1 and {}", MAX_TIMEOUT_MS),
                });
            }
        }

        let retry_ms = self.open_retry.as_millis() as u64;
        if retry_ms > MAX_OPEN_RETRY_MS {
            return Err(HardValidationError::InvalidFieldValue {
                field: "open_retry_ms",
                value: retry_ms.to_string(),
                reason: format!("Must not exceed {}", MAX_OPEN_RETRY_MS),
            });
        }

        Ok(())
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> StreamResult<StreamConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(StreamError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| StreamError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> StreamResult<StreamConfig> {
        let raw: RawStreamConfig =
            serde_yaml::from_str(content).map_err(|e| StreamError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Self::validate(raw)
    }

    fn validate(raw: RawStreamConfig) -> StreamResult<StreamConfig> {
        let name = raw
            .name
            .ok_or_else(|| HardValidationError::MissingRequiredField {
                field: "name",
                context: "stream config".to_string(),
            })?;
        let name = StreamName::new(name)?;
        let capacity = Capacity::new(raw.capacity)?;
        let wait: WaitKind = raw.wait.parse()?;

        if raw.create && raw.open_retry_ms > 0 {
            tracing::debug!(
                name = %name,
                "open_retry_ms is ignored when create is set"
            );
        }

        let config = StreamConfig {
            name,
            capacity,
            wait,
            create: raw.create,
            timeout: raw.timeout_ms.map(Duration::from_millis),
            open_retry: Duration::from_millis(raw.open_retry_ms),
            pin_cpu: raw.pin_cpu,
        };
        config.check()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CONFIG: &str = r#"
name: orders
capacity: 1048576
wait: light
create: true
open_retry_ms: 250
"#;

    #[test]
    fn test_valid_config() {
        let config = ConfigLoader::load_string(VALID_CONFIG).unwrap();
        assert_eq!(config.name.as_str(), "orders");
        assert_eq!(config.capacity.bytes(), 1024 * 1024);
        assert_eq!(config.wait, WaitKind::Light);
        assert!(config.create);
        assert_eq!(config.open_retry, Duration::from_millis(250));
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_defaults_applied() {
        let config = ConfigLoader::load_string("name: orders\n").unwrap();
        assert_eq!(config, StreamConfig::new(StreamName::new("orders").unwrap()));
    }

    #[test]
    fn test_missing_name() {
        let result = ConfigLoader::load_string("capacity: 4096\n");
        assert!(matches!(
            result,
            Err(StreamError::HardValidation(
                HardValidationError::MissingRequiredField { field: "name", .. }
            ))
        ));
    }

    #[test]
    fn test_invalid_name() {
        assert!(ConfigLoader::load_string("name: \"a/b\"\n").is_err());
    }

    #[test]
    fn test_capacity_out_of_bounds() {
        let result = ConfigLoader::load_string("name: orders\ncapacity: 1\n");
        assert!(matches!(
            result,
            Err(StreamError::HardValidation(
                HardValidationError::CapacityOutOfBounds { .. }
            ))
        ));
    }

    #[test]
    fn test_unknown_wait_kind() {
        assert!(ConfigLoader::load_string("name: orders\nwait: spin\n").is_err());
    }

    #[test]
    fn test_timeout_rules() {
        let config =
            ConfigLoader::load_string("name: orders\nwait: blocking\ntimeout_ms: 50\n").unwrap();
        assert_eq!(config.timeout, Some(Duration::from_millis(50)));

        assert!(ConfigLoader::load_string("name: orders\ntimeout_ms: 0\n").is_err());
        assert!(ConfigLoader::load_string("name: orders\nwait: no_wait\ntimeout_ms: 5\n").is_err());
    }

    #[test]
    fn test_check_after_override() {
        let mut config =
            ConfigLoader::load_string("name: orders\nwait: light\ntimeout_ms: 5\n").unwrap();
        assert!(config.check().is_ok());

        config.wait = WaitKind::NoWait;
        assert!(config.check().is_err());

        config.timeout = None;
        config.open_retry = Duration::from_secs(3600);
        assert!(config.check().is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = ConfigLoader::load_string("name: orders\nbuffer: 10\n");
        assert!(matches!(result, Err(StreamError::ConfigParse { .. })));
    }

    #[test]
    fn test_pin_cpu_parsed() {
        let config = ConfigLoader::load_string("name: orders\npin_cpu: 3\n").unwrap();
        assert_eq!(config.pin_cpu, Some(3));
    }
}
