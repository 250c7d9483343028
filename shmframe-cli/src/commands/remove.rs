// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmframe remove` command - Unlink the named shm objects.
//!
//! Processes that still have the region mapped keep their mapping.

use shmframe_core::{RegionConfig, RegionManager};

pub fn execute(config: RegionConfig) -> Result<(), Box<dyn std::error::Error>> {
    if RegionManager::remove(&config.name) {
        println!("✓ Region '{}' removed", config.name);
    } else {
        println!("Region '{}' does not exist", config.name);
    }
    Ok(())
}
