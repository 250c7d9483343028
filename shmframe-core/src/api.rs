// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! One-call entry points for producers and consumers.
//!
//! Each call attaches to (or creates) the named region with default
//! timeouts. Long-lived endpoints should hold a [`RegionManager`] instead.

use crate::config::RegionConfig;
use crate::error::{FrameError, FrameResult};
use crate::frame::{Frame, FrameInfo};
use crate::manager::RegionManager;

/// Publish one frame. Returns `false` if it could not be stored.
pub fn write(name: &str, capacity: usize, payload: &[u8], info: &FrameInfo) -> bool {
    let result = attach(name, capacity).and_then(|manager| manager.write(payload, info));
    match result {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(name = %name, error = %e, "Frame not published");
            false
        }
    }
}

/// Take the pending frame, if there is one.
pub fn read(name: &str, capacity: usize) -> Option<Frame> {
    match attach(name, capacity).and_then(|manager| manager.read()) {
        Ok(frame) => Some(frame),
        Err(FrameError::NotReady { .. }) => None,
        Err(e) => {
            tracing::warn!(name = %name, error = %e, "Frame not read");
            None
        }
    }
}

/// Deliver every frame published on `name` to `callback` until the
/// returned subscription is dropped.
pub fn on_frame<F>(name: &str, capacity: usize, callback: F) -> FrameResult<FrameSubscription>
where
    F: Fn(&Frame) + Send + Sync + 'static,
{
    let manager = attach(name, capacity)?;
    manager.set_frame_callback(callback);
    manager.start_monitoring()?;
    Ok(FrameSubscription { manager })
}

fn attach(name: &str, capacity: usize) -> FrameResult<RegionManager> {
    let config =
        RegionConfig::from_parts(name, capacity).map_err(|e| FrameError::InitializationFailure {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
    RegionManager::open(config)
}

/// A running frame callback. Dropping it stops delivery.
pub struct FrameSubscription {
    manager: RegionManager,
}

impl FrameSubscription {
    /// The manager polling on behalf of this subscription.
    pub fn manager(&self) -> &RegionManager {
        &self.manager
    }

    /// Stop delivery and wait for the poll thread to exit.
    pub fn stop(self) {
        self.manager.stop_monitoring();
    }
}
