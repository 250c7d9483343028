// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict schema validation.
//!
//! Producer and consumer must agree on the region name and capacity out of
//! band; a shared config file is the usual way to do that. Any invalid
//! field is rejected before a region is touched.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, ShmFrameError, ShmFrameResult};
use crate::frame::FrameType;
use crate::types::{Capacity, RegionName};

/// Default payload capacity: 10 MB.
pub const DEFAULT_CAPACITY: usize = 10 * 1024 * 1024;

const MAX_TIMEOUT_MS: u64 = 60_000;
const MAX_POLL_INTERVAL_MS: u64 = 1_000;

/// Raw region section as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
struct RawRegionConfig {
    name: Option<String>,
    #[serde(default = "default_capacity")]
    capacity: usize,
    #[serde(default)]
    unlink_on_drop: bool,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

/// Raw gate timeouts.
#[derive(Debug, Deserialize)]
struct RawTimeouts {
    #[serde(default = "default_timeout_ms")]
    write_ms: u64,
    #[serde(default = "default_timeout_ms")]
    read_ms: u64,
    #[serde(default = "default_height_map_write_ms")]
    height_map_write_ms: u64,
    #[serde(default = "default_timeout_ms")]
    clear_ms: u64,
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_height_map_write_ms() -> u64 {
    1000 // Height maps stream faster; give up sooner
}

impl Default for RawTimeouts {
    fn default() -> Self {
        Self {
            write_ms: default_timeout_ms(),
            read_ms: default_timeout_ms(),
            height_map_write_ms: default_height_map_write_ms(),
            clear_ms: default_timeout_ms(),
        }
    }
}

/// Raw monitor section.
#[derive(Debug, Deserialize)]
struct RawMonitorConfig {
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    30
}

impl Default for RawMonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Raw root configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    region: RawRegionConfig,
    #[serde(default)]
    timeouts: RawTimeouts,
    #[serde(default)]
    monitor: RawMonitorConfig,
}

/// Gate wait bounds per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub write: Duration,
    pub read: Duration,
    pub height_map_write: Duration,
    pub clear: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            write: Duration::from_millis(default_timeout_ms()),
            read: Duration::from_millis(default_timeout_ms()),
            height_map_write: Duration::from_millis(default_height_map_write_ms()),
            clear: Duration::from_millis(default_timeout_ms()),
        }
    }
}

impl Timeouts {
    /// Gate timeout for writing a frame of the given type.
    pub fn for_write(&self, frame_type: FrameType) -> Duration {
        match frame_type {
            FrameType::HeightMap => self.height_map_write,
            FrameType::Image | FrameType::PointCloud => self.write,
        }
    }
}

/// Validated configuration of one region endpoint.
#[derive(Debug, Clone)]
pub struct RegionConfig {
    pub name: RegionName,
    pub capacity: Capacity,
    /// Unlink the shm objects when the manager that created them drops.
    pub unlink_on_drop: bool,
    pub timeouts: Timeouts,
    pub poll_interval: Duration,
}

impl RegionConfig {
    /// Configuration with default timeouts and poll interval.
    pub fn new(name: RegionName, capacity: Capacity) -> Self {
        Self {
            name,
            capacity,
            unlink_on_drop: false,
            timeouts: Timeouts::default(),
            poll_interval: Duration::from_millis(default_poll_interval_ms()),
        }
    }

    /// Validate raw name and capacity values and apply defaults.
    pub fn from_parts(name: &str, capacity: usize) -> Result<Self, ConfigError> {
        Ok(Self::new(RegionName::new(name)?, Capacity::new(capacity)?))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_unlink_on_drop(mut self, unlink: bool) -> Self {
        self.unlink_on_drop = unlink;
        self
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> ShmFrameResult<RegionConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ShmFrameError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ShmFrameError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> ShmFrameResult<RegionConfig> {
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| ShmFrameError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Ok(Self::validate(raw)?)
    }

    /// Validate raw configuration and convert to validated types.
    fn validate(raw: RawConfig) -> Result<RegionConfig, ConfigError> {
        let name = raw
            .region
            .name
            .ok_or(ConfigError::MissingRequiredField {
                field: "region.name",
            })?;
        let name = RegionName::new(name)?;
        let capacity = Capacity::new(raw.region.capacity)?;

        let timeouts = Timeouts {
            write: Self::validate_timeout("timeouts.write_ms", raw.timeouts.write_ms)?,
            read: Self::validate_timeout("timeouts.read_ms", raw.timeouts.read_ms)?,
            height_map_write: Self::validate_timeout(
                "timeouts.height_map_write_ms",
                raw.timeouts.height_map_write_ms,
            )?,
            clear: Self::validate_timeout("timeouts.clear_ms", raw.timeouts.clear_ms)?,
        };

        let poll_ms = raw.monitor.poll_interval_ms;
        if poll_ms == 0 || poll_ms > MAX_POLL_INTERVAL_MS {
            return Err(ConfigError::InvalidFieldValue {
                field: "monitor.poll_interval_ms",
                value: poll_ms.to_string(),
                reason: format!("Must be between 1 and {}ms", MAX_POLL_INTERVAL_MS),
            });
        }

        Ok(RegionConfig {
            name,
            capacity,
            unlink_on_drop: raw.region.unlink_on_drop,
            timeouts,
            poll_interval: Duration::from_millis(poll_ms),
        })
    }

    fn validate_timeout(field: &'static str, ms: u64) -> Result<Duration, ConfigError> {
        if ms == 0 || ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::InvalidFieldValue {
                field,
                value: ms.to_string(),
                reason: format!("Timeout must be between 1 and {}ms", MAX_TIMEOUT_MS),
            });
        }
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CONFIG: &str = r#"
region:
  name: TestSharedMemory
  capacity: 1048576
  unlink_on_drop: true

timeouts:
  write_ms: 2000
  read_ms: 3000
  height_map_write_ms: 500
  clear_ms: 4000

monitor:
  poll_interval_ms: 10
"#;

    #[test]
    fn test_valid_config() {
        let config = ConfigLoader::load_string(VALID_CONFIG).unwrap();
        assert_eq!(config.name.as_str(), "TestSharedMemory");
        assert_eq!(config.capacity.bytes(), 1024 * 1024);
        assert!(config.unlink_on_drop);
        assert_eq!(config.timeouts.read, Duration::from_millis(3000));
        assert_eq!(config.timeouts.clear, Duration::from_millis(4000));
        assert_eq!(config.poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_defaults_applied() {
        let yaml = r#"
region:
  name: frames
"#;
        let config = ConfigLoader::load_string(yaml).unwrap();
        assert_eq!(config.capacity.bytes(), DEFAULT_CAPACITY);
        assert!(!config.unlink_on_drop);
        assert_eq!(config.timeouts, Timeouts::default());
        assert_eq!(config.poll_interval, Duration::from_millis(30));
    }

    #[test]
    fn test_write_timeout_by_frame_type() {
        let timeouts = Timeouts::default();
        assert_eq!(
            timeouts.for_write(FrameType::HeightMap),
            Duration::from_millis(1000)
        );
        assert_eq!(
            timeouts.for_write(FrameType::Image),
            Duration::from_millis(5000)
        );
        assert_eq!(
            timeouts.for_write(FrameType::PointCloud),
            Duration::from_millis(5000)
        );
    }

    #[test]
    fn test_missing_name() {
        let yaml = r#"
region:
  capacity: 4096
"#;
        let result = ConfigLoader::load_string(yaml);
        assert!(matches!(
            result,
            Err(ShmFrameError::Config(ConfigError::MissingRequiredField { .. }))
        ));
    }

    #[test]
    fn test_invalid_name() {
        let yaml = r#"
region:
  name: "bad/name"
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_zero_capacity() {
        let yaml = r#"
region:
  name: frames
  capacity: 0
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_zero_timeout() {
        let yaml = r#"
region:
  name: frames
timeouts:
  write_ms: 0
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_poll_interval_too_high() {
        let yaml = r#"
region:
  name: frames
monitor:
  poll_interval_ms: 5000
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            ConfigLoader::load_string("region: [unterminated"),
            Err(ShmFrameError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_from_parts() {
        let config = RegionConfig::from_parts("frames", 4096).unwrap();
        assert_eq!(config.timeouts, Timeouts::default());
        assert!(RegionConfig::from_parts("", 4096).is_err());
        assert!(RegionConfig::from_parts("frames", 0).is_err());
    }
}
