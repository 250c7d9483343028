//! shmframe Core Library
//!
//! Single-slot shared memory frame exchange between a producer and a
//! consumer process. Provides the region layout, the cross-process gate,
//! the slot protocol, the region manager and its background monitor.

pub mod api;
pub mod config;
pub mod error;
pub mod frame;
pub mod manager;
pub mod monitor;
pub mod shm;
pub mod types;

// Re-export commonly used types
pub use config::{ConfigLoader, RegionConfig, Timeouts};
pub use error::{ConfigError, FrameError, FrameResult, ShmFrameError, ShmFrameResult};
pub use frame::{Frame, FrameInfo, FrameKind, FrameType};
pub use manager::RegionManager;
pub use monitor::FrameCallback;
pub use shm::{RegionHeader, SlotStatus};
pub use types::{Capacity, RegionName};
