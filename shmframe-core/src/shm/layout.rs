// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Byte-exact layout of a frame region.
//!
//! ```text
//! offset  field
//!      0  magic            u32
//!      4  status           u32
//!      8  data_size        u32
//!     12  checksum         u32
//!     16  frame_id         u32
//!     20  info.width       u32
//!     24  info.height      u32
//!     28  info.channels    u32
//!     32  info.x_spacing   f32
//!     36  info.y_spacing   f32
//!     40  info.data_type   u32
//!     44  info.timestamp   u64
//!     52  error_msg        [u8; 128]
//!    180  payload ...
//! ```
//!
//! Packed, little-endian. Every field is encoded and decoded explicitly;
//! the mapped bytes are never cast to a native struct.

use std::fmt;

use crate::error::FrameError;
use crate::frame::{FrameInfo, FrameKind, FrameType};

/// Value of the `magic` field in an initialized region.
pub const MAGIC: u32 = 0x1234_5678;

/// Length of the `error_msg` field.
pub const ERROR_MSG_LEN: usize = 128;

pub(crate) const MAGIC_OFFSET: usize = 0;
pub(crate) const STATUS_OFFSET: usize = 4;
pub(crate) const DATA_SIZE_OFFSET: usize = 8;
pub(crate) const CHECKSUM_OFFSET: usize = 12;
pub(crate) const FRAME_ID_OFFSET: usize = 16;
pub(crate) const DATA_INFO_OFFSET: usize = 20;
pub(crate) const ERROR_MSG_OFFSET: usize = DATA_INFO_OFFSET + DATA_INFO_SIZE;

/// Size of the packed metadata block.
pub const DATA_INFO_SIZE: usize = 32;

/// Size of the header preceding the payload area.
pub const HEADER_SIZE: usize = ERROR_MSG_OFFSET + ERROR_MSG_LEN;

/// Slot state stored in the `status` field.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotStatus {
    Empty = 0,
    Writing = 1,
    Ready = 2,
    Error = 3,
}

impl SlotStatus {
    /// Get the state name for log and error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Writing => "Writing",
            Self::Ready => "Ready",
            Self::Error => "Error",
        }
    }

    /// Decode a raw status word.
    pub fn from_raw(raw: u32) -> Result<Self, FrameError> {
        match raw {
            0 => Ok(Self::Empty),
            1 => Ok(Self::Writing),
            2 => Ok(Self::Ready),
            3 => Ok(Self::Error),
            _ => Err(FrameError::ProtocolViolation {
                reason: format!("Unknown slot status: {}", raw),
            }),
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The raw metadata block exactly as stored in the header.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DataInfo {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub x_spacing: f32,
    pub y_spacing: f32,
    pub data_type: u32,
    pub timestamp: u64,
}

impl DataInfo {
    pub fn encode(&self) -> [u8; DATA_INFO_SIZE] {
        let mut buf = [0u8; DATA_INFO_SIZE];
        buf[0..4].copy_from_slice(&self.width.to_le_bytes());
        buf[4..8].copy_from_slice(&self.height.to_le_bytes());
        buf[8..12].copy_from_slice(&self.channels.to_le_bytes());
        buf[12..16].copy_from_slice(&self.x_spacing.to_le_bytes());
        buf[16..20].copy_from_slice(&self.y_spacing.to_le_bytes());
        buf[20..24].copy_from_slice(&self.data_type.to_le_bytes());
        buf[24..32].copy_from_slice(&self.timestamp.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8; DATA_INFO_SIZE]) -> Self {
        Self {
            width: read_u32(buf, 0),
            height: read_u32(buf, 4),
            channels: read_u32(buf, 8),
            x_spacing: f32::from_bits(read_u32(buf, 12)),
            y_spacing: f32::from_bits(read_u32(buf, 16)),
            data_type: read_u32(buf, 20),
            timestamp: read_u64(buf, 24),
        }
    }
}

impl From<&FrameInfo> for DataInfo {
    fn from(info: &FrameInfo) -> Self {
        let mut raw = DataInfo {
            data_type: info.kind.frame_type().code(),
            timestamp: info.timestamp,
            ..Default::default()
        };
        match info.kind {
            FrameKind::Image {
                width,
                height,
                channels,
            } => {
                raw.width = width;
                raw.height = height;
                raw.channels = channels;
            }
            FrameKind::PointCloud { point_count, dims } => {
                raw.width = point_count;
                raw.height = dims;
            }
            FrameKind::HeightMap {
                width,
                height,
                x_spacing,
                y_spacing,
            } => {
                raw.width = width;
                raw.height = height;
                raw.x_spacing = x_spacing;
                raw.y_spacing = y_spacing;
            }
        }
        raw
    }
}

impl TryFrom<DataInfo> for FrameInfo {
    type Error = FrameError;

    fn try_from(raw: DataInfo) -> Result<Self, Self::Error> {
        let kind = match FrameType::try_from(raw.data_type)? {
            FrameType::Image => FrameKind::Image {
                width: raw.width,
                height: raw.height,
                channels: raw.channels,
            },
            FrameType::PointCloud => FrameKind::PointCloud {
                point_count: raw.width,
                dims: raw.height,
            },
            FrameType::HeightMap => FrameKind::HeightMap {
                width: raw.width,
                height: raw.height,
                x_spacing: raw.x_spacing,
                y_spacing: raw.y_spacing,
            },
        };
        Ok(FrameInfo {
            kind,
            timestamp: raw.timestamp,
        })
    }
}

/// The whole header, decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionHeader {
    pub magic: u32,
    /// Raw status word; see [`RegionHeader::status`].
    pub status: u32,
    pub data_size: u32,
    pub checksum: u32,
    pub frame_id: u32,
    pub info: DataInfo,
    pub error_msg: [u8; ERROR_MSG_LEN],
}

impl RegionHeader {
    /// The canonical empty header written on initialization and by `clear`.
    pub fn empty() -> Self {
        Self {
            magic: MAGIC,
            status: SlotStatus::Empty as u32,
            data_size: 0,
            checksum: 0,
            frame_id: 0,
            info: DataInfo::default(),
            error_msg: [0u8; ERROR_MSG_LEN],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    pub fn status(&self) -> Result<SlotStatus, FrameError> {
        SlotStatus::from_raw(self.status)
    }

    /// Text of the error message up to the first NUL.
    pub fn error_message(&self) -> String {
        let end = self
            .error_msg
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(ERROR_MSG_LEN);
        String::from_utf8_lossy(&self.error_msg[..end]).into_owned()
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[MAGIC_OFFSET..MAGIC_OFFSET + 4].copy_from_slice(&self.magic.to_le_bytes());
        buf[STATUS_OFFSET..STATUS_OFFSET + 4].copy_from_slice(&self.status.to_le_bytes());
        buf[DATA_SIZE_OFFSET..DATA_SIZE_OFFSET + 4].copy_from_slice(&self.data_size.to_le_bytes());
        buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&self.checksum.to_le_bytes());
        buf[FRAME_ID_OFFSET..FRAME_ID_OFFSET + 4].copy_from_slice(&self.frame_id.to_le_bytes());
        buf[DATA_INFO_OFFSET..ERROR_MSG_OFFSET].copy_from_slice(&self.info.encode());
        buf[ERROR_MSG_OFFSET..HEADER_SIZE].copy_from_slice(&self.error_msg);
        buf
    }

    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Self {
        let mut info = [0u8; DATA_INFO_SIZE];
        info.copy_from_slice(&buf[DATA_INFO_OFFSET..ERROR_MSG_OFFSET]);
        let mut error_msg = [0u8; ERROR_MSG_LEN];
        error_msg.copy_from_slice(&buf[ERROR_MSG_OFFSET..HEADER_SIZE]);

        Self {
            magic: read_u32(buf, MAGIC_OFFSET),
            status: read_u32(buf, STATUS_OFFSET),
            data_size: read_u32(buf, DATA_SIZE_OFFSET),
            checksum: read_u32(buf, CHECKSUM_OFFSET),
            frame_id: read_u32(buf, FRAME_ID_OFFSET),
            info: DataInfo::decode(&info),
            error_msg,
        }
    }
}

/// Encode `message` into the fixed error field.
///
/// Truncated at a char boundary so at least one trailing NUL remains.
pub fn encode_error_msg(message: &str) -> [u8; ERROR_MSG_LEN] {
    let mut buf = [0u8; ERROR_MSG_LEN];
    let mut end = message.len().min(ERROR_MSG_LEN - 1);
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    buf[..end].copy_from_slice(&message.as_bytes()[..end]);
    buf
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(b)
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        assert_eq!(DATA_INFO_SIZE, 4 * 6 + 8);
        assert_eq!(ERROR_MSG_OFFSET, 52);
        assert_eq!(HEADER_SIZE, 180);
    }

    #[test]
    fn test_field_offsets_are_little_endian() {
        let mut header = RegionHeader::empty();
        header.status = SlotStatus::Ready as u32;
        header.data_size = 0x0102_0304;
        header.frame_id = 7;
        header.info.timestamp = 0x1122_3344_5566_7788;
        let buf = header.encode();

        assert_eq!(&buf[0..4], &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(&buf[4..8], &[2, 0, 0, 0]);
        assert_eq!(&buf[8..12], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&buf[16..20], &[7, 0, 0, 0]);
        assert_eq!(
            &buf[44..52],
            &[0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]
        );
    }

    #[test]
    fn test_header_decode_inverts_encode() {
        let mut header = RegionHeader::empty();
        header.checksum = 0xdead_beef;
        header.info = DataInfo::from(&FrameInfo::height_map(200, 200, 0.1, 0.25));
        header.error_msg = encode_error_msg("boom");

        let decoded = RegionHeader::decode(&header.encode());
        assert_eq!(decoded, header);
        assert_eq!(decoded.error_message(), "boom");
        assert!(decoded.is_valid());
    }

    #[test]
    fn test_data_info_tagging() {
        let info = FrameInfo::point_cloud(1000, 3);
        let raw = DataInfo::from(&info);
        assert_eq!(raw.data_type, 1);
        assert_eq!(raw.width, 1000);
        assert_eq!(raw.height, 3);
        assert_eq!(FrameInfo::try_from(raw).unwrap(), info);

        let bad = DataInfo {
            data_type: 42,
            ..Default::default()
        };
        assert!(FrameInfo::try_from(bad).is_err());
    }

    #[test]
    fn test_error_msg_truncation() {
        let long = "é".repeat(100);
        let buf = encode_error_msg(&long);
        assert_eq!(buf[ERROR_MSG_LEN - 1], 0);
        let end = buf.iter().position(|&b| b == 0).unwrap();
        assert!(std::str::from_utf8(&buf[..end]).is_ok());
        assert_eq!(end, 126);
    }

    #[test]
    fn test_status_decoding() {
        assert_eq!(SlotStatus::from_raw(2).unwrap(), SlotStatus::Ready);
        assert!(SlotStatus::from_raw(4).is_err());
    }
}
