// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! RegionManager - one process's endpoint on a frame region.
//!
//! Owns the mapping, the gate and the writer-local frame counter, and runs
//! every protocol operation inside the gate. Producer and consumer each
//! create their own manager on the same name.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::RegionConfig;
use crate::error::{FrameError, FrameResult};
use crate::frame::{Frame, FrameInfo};
use crate::monitor::{FrameSource, Monitor, RepeatFilter};
use crate::shm::{
    ExclusiveGate, FrameProtocol, GateGuard, NamedGate, RegionHeader, SharedMemoryRegion,
};
use crate::types::RegionName;

/// State shared between a manager and its monitor thread.
struct Shared {
    config: RegionConfig,
    region: SharedMemoryRegion,
    gate: Box<dyn ExclusiveGate>,
    /// Writer-local frame id, advanced on every stored frame.
    frame_counter: Mutex<u32>,
    last_error: Mutex<Option<String>>,
    /// Last failure logged at warn.
    reported: Mutex<RepeatFilter>,
}

impl Shared {
    fn protocol(&self) -> FrameProtocol<'_, SharedMemoryRegion> {
        FrameProtocol::new(&self.region)
    }

    fn gate(&self, timeout: Duration) -> FrameResult<GateGuard<'_>> {
        GateGuard::acquire(self.gate.as_ref(), timeout)
    }

    /// Record a failed operation's error for `last_error`.
    ///
    /// Integrity and protocol failures are warned about once; a stuck frame
    /// repeats the same failure on every read until it is cleared.
    fn track<T>(&self, op: &'static str, result: FrameResult<T>) -> FrameResult<T> {
        match &result {
            Ok(_) => lock(&self.reported).reset(),
            Err(FrameError::NotReady { .. }) => {}
            Err(e) => {
                let message = e.to_string();
                let fresh = lock(&self.reported).is_new(&message);
                match e {
                    FrameError::IntegrityFailure { .. } | FrameError::ProtocolViolation { .. }
                        if fresh =>
                    {
                        tracing::warn!(name = %self.config.name, op = op, error = %e, "Operation failed")
                    }
                    _ => tracing::debug!(name = %self.config.name, op = op, error = %e, "Operation failed"),
                }
                *lock(&self.last_error) = Some(message);
            }
        }
        result
    }

    /// Run `op` on the protocol while holding the gate.
    fn locked<T>(
        &self,
        timeout: Duration,
        op: impl FnOnce(FrameProtocol<'_, SharedMemoryRegion>) -> FrameResult<T>,
    ) -> FrameResult<T> {
        let _guard = self.gate(timeout)?;
        op(self.protocol())
    }

    fn write(&self, payload: &[u8], info: &FrameInfo) -> FrameResult<u32> {
        let timeout = self.config.timeouts.for_write(info.frame_type());
        let result = self
            .protocol()
            .check_capacity(payload.len())
            .and_then(|_| {
                self.locked(timeout, |proto| {
                    let mut counter = lock(&self.frame_counter);
                    proto.write_frame(&mut counter, payload, info)
                })
            });

        if let Ok(frame_id) = result {
            tracing::debug!(
                name = %self.config.name,
                frame_id = frame_id,
                size = payload.len(),
                frame_type = %info.frame_type(),
                "Frame written"
            );
        }
        self.track("write", result)
    }

    fn read_into(&self, buf: &mut Vec<u8>) -> FrameResult<(u32, FrameInfo)> {
        let result = self.locked(self.config.timeouts.read, |proto| proto.read_frame(buf));

        if let Ok((frame_id, info)) = &result {
            tracing::debug!(
                name = %self.config.name,
                frame_id = *frame_id,
                size = buf.len(),
                frame_type = %info.frame_type(),
                "Frame read"
            );
        }
        self.track("read", result)
    }

    fn clear(&self) -> FrameResult<()> {
        let result = self.locked(self.config.timeouts.clear, |proto| {
            proto.clear()?;
            *lock(&self.frame_counter) = 0;
            Ok(())
        });

        if result.is_ok() {
            tracing::debug!(name = %self.config.name, "Region cleared");
        }
        self.track("clear", result)
    }

    fn set_error(&self, message: &str) -> FrameResult<()> {
        tracing::error!(name = %self.config.name, message = %message, "Region error set");
        *lock(&self.last_error) = Some(message.to_string());

        let result = self.locked(self.config.timeouts.write, |proto| proto.set_error(message));
        self.track("set_error", result)
    }

    fn header(&self) -> FrameResult<RegionHeader> {
        let result = self.locked(self.config.timeouts.read, |proto| proto.read_header());
        self.track("status", result)
    }
}

impl FrameSource for Shared {
    fn label(&self) -> String {
        self.config.name.to_string()
    }

    fn poll(&self, buf: &mut Vec<u8>) -> FrameResult<(u32, FrameInfo)> {
        self.read_into(buf)
    }

    fn error_message(&self) -> Option<String> {
        self.header().ok().map(|h| h.error_message())
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if self.region.is_owner() && self.config.unlink_on_drop {
            NamedGate::unlink(&self.config.name);
        }
    }
}

/// One process's handle on a named frame region.
///
/// Dropping the manager stops its monitor and unmaps the region.
pub struct RegionManager {
    // Declared first so the monitor thread is joined before the region unmaps.
    monitor: Monitor,
    shared: Arc<Shared>,
}

impl RegionManager {
    /// Attach to the region named in `config`, creating it if needed.
    ///
    /// The process that creates the backing object initializes the header;
    /// creation happens under the gate so an attaching peer never sees a
    /// half-initialized region.
    pub fn open(config: RegionConfig) -> FrameResult<Self> {
        let gate = NamedGate::open(&config.name)?;
        Self::with_gate(config, Box::new(gate))
    }

    /// Like [`RegionManager::open`] with a caller-supplied gate.
    pub fn with_gate(config: RegionConfig, gate: Box<dyn ExclusiveGate>) -> FrameResult<Self> {
        let region = {
            let _guard = GateGuard::acquire(gate.as_ref(), config.timeouts.write)?;
            let (mut region, created) = SharedMemoryRegion::create_or_open(
                &config.name,
                config.capacity.region_size(),
            )?;

            if created {
                FrameProtocol::new(&region).clear()?;
                region.set_unlink_on_drop(config.unlink_on_drop);
                tracing::info!(name = %config.name, capacity = %config.capacity, "Region initialized");
            } else {
                let header = FrameProtocol::new(&region).read_header()?;
                if !header.is_valid() {
                    tracing::warn!(
                        name = %config.name,
                        magic = header.magic,
                        "Attached to a region with an invalid header"
                    );
                }
                tracing::info!(name = %config.name, capacity = %config.capacity, "Region attached");
            }
            region
        };

        Ok(Self {
            monitor: Monitor::new(),
            shared: Arc::new(Shared {
                config,
                region,
                gate,
                frame_counter: Mutex::new(0),
                last_error: Mutex::new(None),
                reported: Mutex::new(RepeatFilter::default()),
            }),
        })
    }

    /// Unlink the named region and its gate.
    ///
    /// Attached managers keep working; the next `open` creates a fresh
    /// region. Returns `false` if no region existed under that name.
    pub fn remove(name: &RegionName) -> bool {
        let removed = SharedMemoryRegion::unlink(name);
        NamedGate::unlink(name);
        if removed {
            tracing::debug!(name = %name, "Region removed");
        }
        removed
    }

    pub fn name(&self) -> &RegionName {
        &self.shared.config.name
    }

    pub fn config(&self) -> &RegionConfig {
        &self.shared.config
    }

    /// Payload capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.shared.config.capacity.bytes()
    }

    /// Whether this manager created the backing object.
    pub fn is_creator(&self) -> bool {
        self.shared.region.is_owner()
    }

    /// Store a frame in the slot. Returns the frame id it was stored under.
    ///
    /// Fails with `SlotBusy` while the previous frame is unread or the region
    /// is in the Error status.
    pub fn write(&self, payload: &[u8], info: &FrameInfo) -> FrameResult<u32> {
        self.shared.write(payload, info)
    }

    /// Take the pending frame out of the slot.
    pub fn read(&self) -> FrameResult<Frame> {
        let mut data = Vec::new();
        let (frame_id, info) = self.shared.read_into(&mut data)?;
        Ok(Frame {
            frame_id,
            info,
            data,
        })
    }

    /// Like [`RegionManager::read`], reusing the caller's buffer.
    pub fn read_into(&self, buf: &mut Vec<u8>) -> FrameResult<(u32, FrameInfo)> {
        self.shared.read_into(buf)
    }

    /// Reset the region to the empty state, discarding whatever it holds.
    ///
    /// Only safe while the peer is not mid-write; the gate is the only
    /// protection. Also resets this manager's frame counter.
    pub fn clear(&self) -> FrameResult<()> {
        self.shared.clear()
    }

    /// Put the region into the Error status with a message the peer can read.
    ///
    /// Writes fail until the region is cleared.
    pub fn set_error(&self, message: &str) -> FrameResult<()> {
        self.shared.set_error(message)
    }

    /// Snapshot of the header.
    pub fn status(&self) -> FrameResult<RegionHeader> {
        self.shared.header()
    }

    /// Message of the most recent failed operation on this manager.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.shared.last_error).clone()
    }

    /// Register the callback the monitor delivers frames to.
    pub fn set_frame_callback<F>(&self, callback: F)
    where
        F: Fn(&Frame) + Send + Sync + 'static,
    {
        self.monitor.set_callback(Box::new(callback));
    }

    /// Start polling the region in the background.
    ///
    /// Returns `Ok(false)` if monitoring is already running.
    pub fn start_monitoring(&self) -> FrameResult<bool> {
        self.monitor
            .start(Arc::clone(&self.shared), self.shared.config.poll_interval)
    }

    /// Stop background polling and wait for the poll thread to exit.
    pub fn stop_monitoring(&self) -> bool {
        self.monitor.stop()
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_running()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
