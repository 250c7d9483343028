// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared fixtures for the shmframe benchmarks.

use shmframe_core::{Capacity, RegionConfig, RegionManager, RegionName};

/// Frame sizes exercised by the benchmarks: small, one VGA RGB image, a 2K mono map.
pub const FRAME_SIZES: &[usize] = &[4 * 1024, 640 * 480 * 3, 2048 * 2048];

/// Deterministic non-constant payload.
pub fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i * 131 % 251) as u8).collect()
}

/// Producer and consumer on a fresh region unique to this process.
///
/// The producer unlinks the region when dropped.
pub fn endpoints(tag: &str, capacity: usize) -> Result<(RegionManager, RegionManager), String> {
    let name = RegionName::new(format!("shmframe_bench_{}_{}", tag, std::process::id()))
        .map_err(|e| e.to_string())?;
    let capacity = Capacity::new(capacity).map_err(|e| e.to_string())?;
    let config = RegionConfig::new(name, capacity);

    let producer = RegionManager::open(config.clone().with_unlink_on_drop(true))
        .map_err(|e| e.to_string())?;
    let consumer = RegionManager::open(config).map_err(|e| e.to_string())?;
    Ok((producer, consumer))
}
