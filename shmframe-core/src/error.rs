//! Custom error types for shmframe.
//!
//! This module defines explicit enum error types as per coding guidelines.
//! No `Box<dyn Error>`, no `anyhow::Result` - all errors are strongly typed.

use std::path::PathBuf;

use thiserror::Error;

use crate::shm::SlotStatus;

/// Top-level error type for shmframe.
#[derive(Debug, Error)]
pub enum ShmFrameError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Frame Exchange Errors
    // =========================================================================
    #[error("Frame exchange error: {0}")]
    Frame(#[from] FrameError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid configuration values. Rejected before any region is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingRequiredField { field: &'static str },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Failures of a single frame exchange operation.
///
/// `SlotBusy`, `LockTimeout` and `NotReady` are transient and the caller is
/// expected to retry. Everything else needs intervention (a bigger region,
/// a `clear`, or a re-initialized region).
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Failed to initialize region {name}: {reason}")]
    InitializationFailure { name: String, reason: String },

    #[error("Payload of {size} bytes exceeds region capacity of {capacity} bytes")]
    CapacityExceeded { size: usize, capacity: usize },

    #[error("Slot is busy (status: {status}), previous frame not consumed")]
    SlotBusy { status: SlotStatus },

    #[error("Timed out after {timeout_ms}ms waiting for the region gate")]
    LockTimeout { timeout_ms: u64 },

    #[error("Protocol violation: {reason}")]
    ProtocolViolation { reason: String },

    #[error("No frame ready (status: {status})")]
    NotReady { status: SlotStatus },

    #[error("Frame checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    IntegrityFailure { expected: u32, actual: u32 },

    #[error("Internal failure: {reason}")]
    InternalFailure { reason: String },
}

impl FrameError {
    /// Whether retrying the same operation later can succeed without
    /// anybody intervening.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::SlotBusy { .. } | Self::LockTimeout { .. } | Self::NotReady { .. }
        )
    }
}

/// Result type alias for frame exchange operations.
pub type FrameResult<T> = Result<T, FrameError>;

/// Result type alias using ShmFrameError.
pub type ShmFrameResult<T> = Result<T, ShmFrameError>;
