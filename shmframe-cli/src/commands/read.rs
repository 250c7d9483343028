// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmframe read` command - Take the pending frame.

use shmframe_core::{Frame, FrameError, FrameType, RegionConfig, RegionManager};

pub fn execute(config: RegionConfig, out: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let manager = RegionManager::open(config)?;

    let frame = match manager.read() {
        Ok(frame) => frame,
        Err(FrameError::NotReady { status }) => {
            println!("No frame pending (slot is {})", status);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("✓ {}", describe(&frame));

    if let Some(path) = out {
        std::fs::write(path, &frame.data)?;
        println!("  Payload written to {}", path);
    }
    Ok(())
}

/// One-line summary of a frame.
pub fn describe(frame: &Frame) -> String {
    let mut line = format!(
        "Frame #{} {} {}x{} ({} bytes)",
        frame.frame_id,
        frame.frame_type(),
        frame.width(),
        frame.height(),
        frame.len()
    );
    if frame.frame_type() == FrameType::HeightMap {
        if let Some((min, max)) = frame.height_range() {
            line.push_str(&format!(" range [{:.3}, {:.3}]", min, max));
        }
    }
    line
}
