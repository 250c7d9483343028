// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Frame metadata and payload types.
//!
//! The header stores a `dataType` tag next to `width`/`height` fields whose
//! meaning depends on the tag. [`FrameKind`] decodes that once so callers
//! never re-interpret the raw fields themselves.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// Payload interpretation tag as stored in the header.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameType {
    Image = 0,
    PointCloud = 1,
    HeightMap = 2,
}

impl FrameType {
    /// Get the type name for display.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Image => "Image",
            Self::PointCloud => "PointCloud",
            Self::HeightMap => "HeightMap",
        }
    }

    /// Wire code of this tag.
    pub const fn code(&self) -> u32 {
        *self as u32
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl TryFrom<u32> for FrameType {
    type Error = FrameError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Image),
            1 => Ok(Self::PointCloud),
            2 => Ok(Self::HeightMap),
            _ => Err(FrameError::ProtocolViolation {
                reason: format!("Unknown frame data type: {}", value),
            }),
        }
    }
}

/// What the payload bytes of a frame represent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FrameKind {
    /// Interleaved 8-bit channels, `width * height * channels` bytes.
    Image {
        width: u32,
        height: u32,
        channels: u32,
    },
    /// `point_count` points of `dims` little-endian f32 components each.
    PointCloud { point_count: u32, dims: u32 },
    /// Row-major little-endian f32 heights, `width * height` samples.
    HeightMap {
        width: u32,
        height: u32,
        x_spacing: f32,
        y_spacing: f32,
    },
}

impl FrameKind {
    pub fn frame_type(&self) -> FrameType {
        match self {
            Self::Image { .. } => FrameType::Image,
            Self::PointCloud { .. } => FrameType::PointCloud,
            Self::HeightMap { .. } => FrameType::HeightMap,
        }
    }

    /// Raw `width` header field (point count for point clouds).
    pub fn width(&self) -> u32 {
        match *self {
            Self::Image { width, .. } | Self::HeightMap { width, .. } => width,
            Self::PointCloud { point_count, .. } => point_count,
        }
    }

    /// Raw `height` header field (components per point for point clouds).
    pub fn height(&self) -> u32 {
        match *self {
            Self::Image { height, .. } | Self::HeightMap { height, .. } => height,
            Self::PointCloud { dims, .. } => dims,
        }
    }

    /// Payload length implied by the metadata, if it fits in `usize`.
    pub fn expected_len(&self) -> Option<usize> {
        let (a, b, c) = match *self {
            Self::Image {
                width,
                height,
                channels,
            } => (width, height, channels),
            Self::PointCloud { point_count, dims } => (point_count, dims, 4),
            Self::HeightMap { width, height, .. } => (width, height, 4),
        };
        (a as usize)
            .checked_mul(b as usize)
            .and_then(|n| n.checked_mul(c as usize))
    }
}

/// Metadata stored alongside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub kind: FrameKind,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl FrameInfo {
    /// Metadata stamped with the current wall-clock time.
    pub fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            timestamp: now_millis(),
        }
    }

    pub fn image(width: u32, height: u32, channels: u32) -> Self {
        Self::new(FrameKind::Image {
            width,
            height,
            channels,
        })
    }

    pub fn point_cloud(point_count: u32, dims: u32) -> Self {
        Self::new(FrameKind::PointCloud { point_count, dims })
    }

    pub fn height_map(width: u32, height: u32, x_spacing: f32, y_spacing: f32) -> Self {
        Self::new(FrameKind::HeightMap {
            width,
            height,
            x_spacing,
            y_spacing,
        })
    }

    pub fn frame_type(&self) -> FrameType {
        self.kind.frame_type()
    }
}

/// A frame received from a region.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Writer-local sequence number stored in the header.
    pub frame_id: u32,
    pub info: FrameInfo,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn frame_type(&self) -> FrameType {
        self.info.frame_type()
    }

    pub fn width(&self) -> u32 {
        self.info.kind.width()
    }

    pub fn height(&self) -> u32 {
        self.info.kind.height()
    }

    /// Decode the payload as little-endian f32 values.
    ///
    /// Trailing bytes that do not form a whole float are ignored.
    pub fn as_f32(&self) -> Vec<f32> {
        decode_f32(&self.data)
    }

    /// Minimum and maximum sample of a height map frame.
    ///
    /// Returns `None` for other frame kinds and for empty or all-NaN maps.
    pub fn height_range(&self) -> Option<(f32, f32)> {
        if self.frame_type() != FrameType::HeightMap {
            return None;
        }
        self.as_f32()
            .into_iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Encode f32 samples the way float payloads are laid out in a region.
pub fn encode_f32(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`encode_f32`].
pub fn decode_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
