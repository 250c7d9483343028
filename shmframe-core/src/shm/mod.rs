// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared Memory IPC module.
//!
//! Zero-copy frame exchange through a single POSIX shared memory slot.
//! Provides the region layout codec, the cross-process gate and the
//! slot protocol.

mod gate;
mod layout;
mod protocol;
mod region;

pub use gate::{ExclusiveGate, GateGuard, LocalGate, NamedGate};
pub use layout::{
    encode_error_msg, DataInfo, RegionHeader, SlotStatus, DATA_INFO_SIZE, ERROR_MSG_LEN,
    HEADER_SIZE, MAGIC,
};
pub use protocol::{checksum, FrameProtocol, RegionMemory};
pub use region::SharedMemoryRegion;

/// Largest mapping a region may use, header included.
pub const MAX_REGION_SIZE: usize = SharedMemoryRegion::MAX_SIZE;
