// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmframe clear` command - Reset the slot to empty.

use shmframe_core::{RegionConfig, RegionManager};

pub fn execute(config: RegionConfig) -> Result<(), Box<dyn std::error::Error>> {
    let manager = RegionManager::open(config)?;
    manager.clear()?;
    println!("✓ Region '{}' cleared", manager.name());
    Ok(())
}
