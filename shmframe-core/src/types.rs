// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! Following the "Newtype" pattern in Rust to ensure valid state by construction.
//! All types validate their invariants at creation time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::shm::{HEADER_SIZE, MAX_REGION_SIZE};

/// Maximum length of a region name.
/// Leaves room for the leading `/` and the `_mutex` suffix within NAME_MAX.
const MAX_NAME_LEN: usize = 200;

/// Largest payload capacity a region can be created with.
pub const MAX_CAPACITY: usize = MAX_REGION_SIZE - HEADER_SIZE;

/// Validated shared memory region name.
/// Must be non-empty, alphanumeric with hyphens/underscores/dots, max 200 chars.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionName(String);

impl RegionName {
    /// Create a new RegionName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();

        if name.is_empty() {
            return Err(ConfigError::InvalidFieldValue {
                field: "name",
                value: name,
                reason: "Region name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_NAME_LEN {
            return Err(ConfigError::InvalidFieldValue {
                field: "name",
                value: name.clone(),
                reason: format!(
                    "Region name too long: {} chars (max {})",
                    name.len(),
                    MAX_NAME_LEN
                ),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(ConfigError::InvalidFieldValue {
                field: "name",
                value: name,
                reason: "Region name must contain only ASCII alphanumerics, hyphens, underscores and dots".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// POSIX object name of the data segment.
    pub fn shm_path(&self) -> String {
        format!("/{}", self.0)
    }

    /// POSIX object name of the gate backing this region.
    pub fn gate_path(&self) -> String {
        format!("/{}_mutex", self.0)
    }
}

impl fmt::Display for RegionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RegionName {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for RegionName {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RegionName> for String {
    fn from(name: RegionName) -> Self {
        name.0
    }
}

/// Validated payload capacity in bytes (header excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct Capacity(usize);

impl Capacity {
    /// Create a new Capacity with bounds validation.
    pub fn new(bytes: usize) -> Result<Self, ConfigError> {
        if bytes == 0 {
            return Err(ConfigError::InvalidFieldValue {
                field: "capacity",
                value: bytes.to_string(),
                reason: "Capacity must be greater than 0".to_string(),
            });
        }
        if bytes > MAX_CAPACITY {
            return Err(ConfigError::InvalidFieldValue {
                field: "capacity",
                value: bytes.to_string(),
                reason: format!("Capacity must not exceed {} bytes", MAX_CAPACITY),
            });
        }
        Ok(Self(bytes))
    }

    /// Get the payload capacity in bytes.
    pub fn bytes(&self) -> usize {
        self.0
    }

    /// Size of the whole mapping: header plus payload area.
    pub fn region_size(&self) -> usize {
        HEADER_SIZE + self.0
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1024 * 1024 && self.0 % (1024 * 1024) == 0 {
            write!(f, "{}MB", self.0 / (1024 * 1024))
        } else {
            write!(f, "{} bytes", self.0)
        }
    }
}

impl TryFrom<usize> for Capacity {
    type Error = ConfigError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Capacity> for usize {
    fn from(capacity: Capacity) -> Self {
        capacity.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_name_validation() {
        assert!(RegionName::new("TestSharedMemory").is_ok());
        assert!(RegionName::new("camera_0.frames-v2").is_ok());
        assert!(RegionName::new("").is_err());
        assert!(RegionName::new("a/b").is_err());
        assert!(RegionName::new("with space").is_err());
        assert!(RegionName::new("nul\0byte").is_err());
        assert!(RegionName::new("caméra").is_err());
        assert!(RegionName::new("x".repeat(201)).is_err());
    }

    #[test]
    fn test_region_name_paths() {
        let name = RegionName::new("TestSharedMemory").unwrap();
        assert_eq!(name.shm_path(), "/TestSharedMemory");
        assert_eq!(name.gate_path(), "/TestSharedMemory_mutex");
    }

    #[test]
    fn test_capacity_bounds() {
        assert!(Capacity::new(0).is_err());
        assert!(Capacity::new(1).is_ok());
        assert!(Capacity::new(MAX_CAPACITY).is_ok());
        assert!(Capacity::new(MAX_CAPACITY + 1).is_err());

        let cap = Capacity::new(1024).unwrap();
        assert_eq!(cap.region_size(), 1024 + HEADER_SIZE);
    }

    #[test]
    fn test_capacity_display() {
        assert_eq!(Capacity::new(10 * 1024 * 1024).unwrap().to_string(), "10MB");
        assert_eq!(Capacity::new(1000).unwrap().to_string(), "1000 bytes");
    }
}
