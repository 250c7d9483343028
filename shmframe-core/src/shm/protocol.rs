// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Single-slot frame protocol.
//!
//! Implements the slot lifecycle: Empty → Writing → Ready → Empty, with
//! Error reachable from anywhere and left only through `clear`.
//! Callers must hold the region gate around every call; the protocol itself
//! takes no locks.

use crate::error::{FrameError, FrameResult};
use crate::frame::FrameInfo;
use crate::shm::layout::{
    encode_error_msg, DataInfo, RegionHeader, SlotStatus, CHECKSUM_OFFSET, DATA_INFO_OFFSET,
    DATA_SIZE_OFFSET, ERROR_MSG_OFFSET, FRAME_ID_OFFSET, HEADER_SIZE, STATUS_OFFSET,
};

/// Byte-addressable backing store of a region.
pub trait RegionMemory {
    /// Total size in bytes, header included.
    fn len(&self) -> usize;

    fn read_at(&self, offset: usize, dst: &mut [u8]) -> FrameResult<()>;

    fn write_at(&self, offset: usize, src: &[u8]) -> FrameResult<()>;
}

/// Rolling multiplicative hash over the payload (`h = h * 33 + byte`).
///
/// Detects accidental corruption only. Not a MAC.
pub fn checksum(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |h, &b| {
        (h << 5).wrapping_add(h).wrapping_add(b as u32)
    })
}

/// Frame operations over one region's memory.
pub struct FrameProtocol<'a, M: RegionMemory + ?Sized> {
    mem: &'a M,
}

impl<'a, M: RegionMemory + ?Sized> FrameProtocol<'a, M> {
    pub fn new(mem: &'a M) -> Self {
        Self { mem }
    }

    /// Payload capacity of the region.
    pub fn capacity(&self) -> usize {
        self.mem.len().saturating_sub(HEADER_SIZE)
    }

    pub fn check_capacity(&self, size: usize) -> FrameResult<()> {
        let capacity = self.capacity();
        if size > capacity {
            return Err(FrameError::CapacityExceeded { size, capacity });
        }
        Ok(())
    }

    pub fn read_header(&self) -> FrameResult<RegionHeader> {
        let mut buf = [0u8; HEADER_SIZE];
        self.mem.read_at(0, &mut buf)?;
        Ok(RegionHeader::decode(&buf))
    }

    /// Reset the header to the canonical empty state, whatever it held.
    pub fn clear(&self) -> FrameResult<()> {
        self.mem.write_at(0, &RegionHeader::empty().encode())
    }

    /// Store a frame into an empty slot.
    ///
    /// `frame_counter` is advanced only once the slot is known to be empty.
    /// Returns the frame id written. A fault part-way through leaves the
    /// slot in the Error status with the message recorded in the header.
    pub fn write_frame(
        &self,
        frame_counter: &mut u32,
        payload: &[u8],
        info: &FrameInfo,
    ) -> FrameResult<u32> {
        self.check_capacity(payload.len())?;

        let header = self.read_header()?;
        let status = header.status()?;
        if status != SlotStatus::Empty {
            return Err(FrameError::SlotBusy { status });
        }

        *frame_counter = frame_counter.wrapping_add(1);
        let frame_id = *frame_counter;

        if let Err(e) = self.store(frame_id, payload, info) {
            let reason = e.to_string();
            tracing::error!(frame_id = frame_id, error = %reason, "Frame write failed");
            if let Err(mark) = self.set_error(&reason) {
                tracing::error!(error = %mark, "Could not record write failure in header");
            }
            return Err(FrameError::InternalFailure { reason });
        }

        Ok(frame_id)
    }

    fn store(&self, frame_id: u32, payload: &[u8], info: &FrameInfo) -> FrameResult<()> {
        let size = u32::try_from(payload.len()).map_err(|_| FrameError::InternalFailure {
            reason: format!("Payload length {} does not fit the size field", payload.len()),
        })?;

        self.write_u32(STATUS_OFFSET, SlotStatus::Writing as u32)?;
        self.write_u32(DATA_SIZE_OFFSET, size)?;
        self.write_u32(FRAME_ID_OFFSET, frame_id)?;
        self.mem
            .write_at(DATA_INFO_OFFSET, &DataInfo::from(info).encode())?;
        self.mem.write_at(HEADER_SIZE, payload)?;
        self.write_u32(CHECKSUM_OFFSET, checksum(payload))?;
        self.write_u32(STATUS_OFFSET, SlotStatus::Ready as u32)
    }

    /// Take the ready frame out of the slot.
    ///
    /// The payload is copied into `out` (resized to fit). On a checksum
    /// mismatch the slot stays Ready, so the same bytes are seen again by
    /// the next read until someone clears the region.
    pub fn read_frame(&self, out: &mut Vec<u8>) -> FrameResult<(u32, FrameInfo)> {
        let header = self.read_header()?;
        if !header.is_valid() {
            return Err(FrameError::ProtocolViolation {
                reason: format!("Bad region magic {:#010x}", header.magic),
            });
        }

        let status = header.status()?;
        if status != SlotStatus::Ready {
            return Err(FrameError::NotReady { status });
        }

        let size = header.data_size as usize;
        if size > self.capacity() {
            return Err(FrameError::ProtocolViolation {
                reason: format!(
                    "Stored size {} exceeds capacity {}",
                    size,
                    self.capacity()
                ),
            });
        }

        out.clear();
        out.resize(size, 0);
        self.mem.read_at(HEADER_SIZE, out)?;

        let actual = checksum(out);
        if actual != header.checksum {
            return Err(FrameError::IntegrityFailure {
                expected: header.checksum,
                actual,
            });
        }

        let info = FrameInfo::try_from(header.info)?;
        self.write_u32(STATUS_OFFSET, SlotStatus::Empty as u32)?;

        Ok((header.frame_id, info))
    }

    /// Put the slot into the Error status with `message` for the peer to see.
    pub fn set_error(&self, message: &str) -> FrameResult<()> {
        self.mem
            .write_at(ERROR_MSG_OFFSET, &encode_error_msg(message))?;
        self.write_u32(STATUS_OFFSET, SlotStatus::Error as u32)
    }

    fn write_u32(&self, offset: usize, value: u32) -> FrameResult<()> {
        self.mem.write_at(offset, &value.to_le_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameKind;
    use crate::shm::layout::MAGIC;
    use std::sync::Mutex;

    /// Heap-backed region for exercising the protocol without shm.
    struct HeapMemory {
        bytes: Mutex<Vec<u8>>,
        /// Writes at or past this offset fail, to inject faults.
        fail_from: Option<usize>,
    }

    impl HeapMemory {
        fn new(capacity: usize) -> Self {
            Self {
                bytes: Mutex::new(vec![0u8; HEADER_SIZE + capacity]),
                fail_from: None,
            }
        }

        fn flip(&self, offset: usize) {
            self.bytes.lock().unwrap()[offset] ^= 0xFF;
        }
    }

    impl RegionMemory for HeapMemory {
        fn len(&self) -> usize {
            self.bytes.lock().unwrap().len()
        }

        fn read_at(&self, offset: usize, dst: &mut [u8]) -> FrameResult<()> {
            let bytes = self.bytes.lock().unwrap();
            dst.copy_from_slice(&bytes[offset..offset + dst.len()]);
            Ok(())
        }

        fn write_at(&self, offset: usize, src: &[u8]) -> FrameResult<()> {
            if matches!(self.fail_from, Some(limit) if offset >= limit) {
                return Err(FrameError::InternalFailure {
                    reason: "injected fault".to_string(),
                });
            }
            let mut bytes = self.bytes.lock().unwrap();
            bytes[offset..offset + src.len()].copy_from_slice(src);
            Ok(())
        }
    }

    fn initialized(capacity: usize) -> HeapMemory {
        let mem = HeapMemory::new(capacity);
        FrameProtocol::new(&mem).clear().unwrap();
        mem
    }

    #[test]
    fn test_checksum_values() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[1]), 1);
        assert_eq!(checksum(&[1, 2]), 35);
        assert_eq!(checksum(b"abc"), ((97 * 33) + 98) * 33 + 99);
        // Wraps instead of overflowing
        assert_ne!(checksum(&[0xFF; 4096]), 0);
    }

    #[test]
    fn test_write_then_read() {
        let mem = initialized(1024);
        let proto = FrameProtocol::new(&mem);
        let mut counter = 0;
        let payload: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();
        let info = FrameInfo::image(10, 10, 3);

        assert_eq!(proto.write_frame(&mut counter, &payload, &info).unwrap(), 1);
        let header = proto.read_header().unwrap();
        assert_eq!(header.status().unwrap(), SlotStatus::Ready);
        assert_eq!(header.checksum, checksum(&payload));

        let mut out = Vec::new();
        let (frame_id, read_info) = proto.read_frame(&mut out).unwrap();
        assert_eq!(frame_id, 1);
        assert_eq!(out, payload);
        assert_eq!(read_info, info);
        assert_eq!(
            proto.read_header().unwrap().status().unwrap(),
            SlotStatus::Empty
        );
    }

    #[test]
    fn test_second_write_is_rejected() {
        let mem = initialized(64);
        let proto = FrameProtocol::new(&mem);
        let mut counter = 0;
        let info = FrameInfo::point_cloud(1, 3);

        proto.write_frame(&mut counter, &[1; 12], &info).unwrap();
        let before = proto.read_header().unwrap();

        let err = proto.write_frame(&mut counter, &[2; 12], &info).unwrap_err();
        assert!(matches!(
            err,
            FrameError::SlotBusy {
                status: SlotStatus::Ready
            }
        ));
        assert_eq!(counter, 1);
        assert_eq!(proto.read_header().unwrap(), before);

        let mut out = Vec::new();
        proto.read_frame(&mut out).unwrap();
        assert_eq!(out, vec![1; 12]);
    }

    #[test]
    fn test_capacity_exceeded_leaves_slot_alone() {
        let mem = initialized(16);
        let proto = FrameProtocol::new(&mem);
        let mut counter = 0;
        let err = proto
            .write_frame(&mut counter, &[0; 17], &FrameInfo::image(17, 1, 1))
            .unwrap_err();
        assert!(matches!(
            err,
            FrameError::CapacityExceeded {
                size: 17,
                capacity: 16
            }
        ));
        assert_eq!(counter, 0);
        assert_eq!(proto.read_header().unwrap(), RegionHeader::empty());
    }

    #[test]
    fn test_corrupted_frame_stays_ready() {
        let mem = initialized(64);
        let proto = FrameProtocol::new(&mem);
        let mut counter = 0;
        proto
            .write_frame(&mut counter, b"height samples!!", &FrameInfo::height_map(2, 2, 0.1, 0.1))
            .unwrap();
        mem.flip(HEADER_SIZE + 5);

        let mut out = Vec::new();
        for _ in 0..2 {
            assert!(matches!(
                proto.read_frame(&mut out),
                Err(FrameError::IntegrityFailure { .. })
            ));
            assert_eq!(
                proto.read_header().unwrap().status().unwrap(),
                SlotStatus::Ready
            );
        }

        proto.clear().unwrap();
        assert!(matches!(
            proto.read_frame(&mut out),
            Err(FrameError::NotReady {
                status: SlotStatus::Empty
            })
        ));
    }

    #[test]
    fn test_bad_magic_is_protocol_violation() {
        let mem = HeapMemory::new(64);
        let proto = FrameProtocol::new(&mem);
        let mut out = Vec::new();
        assert!(matches!(
            proto.read_frame(&mut out),
            Err(FrameError::ProtocolViolation { .. })
        ));
        // No mutation
        assert_eq!(proto.read_header().unwrap().magic, 0);
    }

    #[test]
    fn test_error_is_sticky_until_clear() {
        let mem = initialized(64);
        let proto = FrameProtocol::new(&mem);
        let mut counter = 0;

        proto.set_error("camera disconnected").unwrap();
        let header = proto.read_header().unwrap();
        assert_eq!(header.status().unwrap(), SlotStatus::Error);
        assert_eq!(header.error_message(), "camera disconnected");

        assert!(matches!(
            proto.write_frame(&mut counter, &[0; 4], &FrameInfo::image(2, 2, 1)),
            Err(FrameError::SlotBusy {
                status: SlotStatus::Error
            })
        ));

        proto.clear().unwrap();
        let header = proto.read_header().unwrap();
        assert_eq!(header, RegionHeader::empty());
        assert_eq!(header.magic, MAGIC);
        assert!(proto
            .write_frame(&mut counter, &[0; 4], &FrameInfo::image(2, 2, 1))
            .is_ok());
    }

    #[test]
    fn test_fault_during_write_sets_error_status() {
        let mut mem = initialized(64);
        mem.fail_from = Some(HEADER_SIZE);
        let proto = FrameProtocol::new(&mem);
        let mut counter = 0;

        let err = proto
            .write_frame(&mut counter, &[7; 8], &FrameInfo::image(8, 1, 1))
            .unwrap_err();
        assert!(matches!(err, FrameError::InternalFailure { .. }));

        let header = proto.read_header().unwrap();
        assert_eq!(header.status().unwrap(), SlotStatus::Error);
        assert!(header.error_message().contains("injected fault"));
    }

    #[test]
    fn test_empty_payload_round_trip() {
        let mem = initialized(8);
        let proto = FrameProtocol::new(&mem);
        let mut counter = 0;
        let info = FrameInfo::new(FrameKind::PointCloud {
            point_count: 0,
            dims: 3,
        });
        proto.write_frame(&mut counter, &[], &info).unwrap();

        let mut out = vec![1, 2, 3];
        let (_, read_info) = proto.read_frame(&mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(read_info, info);
    }
}
