// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmframe write` command - Publish a file as one frame.

use shmframe_core::{FrameError, FrameInfo, RegionConfig, RegionManager};

use crate::KindArg;

/// Build frame metadata from the command line geometry.
pub fn frame_info(
    kind: KindArg,
    width: u32,
    height: u32,
    channels: u32,
    x_spacing: f32,
    y_spacing: f32,
) -> FrameInfo {
    match kind {
        KindArg::Image => FrameInfo::image(width, height, channels),
        KindArg::PointCloud => FrameInfo::point_cloud(width, height),
        KindArg::HeightMap => FrameInfo::height_map(width, height, x_spacing, y_spacing),
    }
}

pub fn execute(
    config: RegionConfig,
    file: &str,
    info: &FrameInfo,
) -> Result<(), Box<dyn std::error::Error>> {
    let payload = std::fs::read(file)?;

    if let Some(expected) = info.kind.expected_len() {
        if expected != payload.len() {
            tracing::warn!(
                expected = expected,
                actual = payload.len(),
                "Payload size does not match frame geometry"
            );
        }
    }

    let manager = RegionManager::open(config)?;
    match manager.write(&payload, info) {
        Ok(frame_id) => {
            println!(
                "✓ Frame #{} published to '{}' ({} bytes)",
                frame_id,
                manager.name(),
                payload.len()
            );
            Ok(())
        }
        Err(FrameError::SlotBusy { status }) => {
            eprintln!("✗ Slot is {}; the previous frame has not been consumed", status);
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shmframe_core::FrameType;

    #[test]
    fn test_point_cloud_geometry() {
        let info = frame_info(KindArg::PointCloud, 1000, 3, 1, 1.0, 1.0);
        assert_eq!(info.frame_type(), FrameType::PointCloud);
        assert_eq!(info.kind.expected_len(), Some(12_000));
    }

    #[test]
    fn test_height_map_geometry() {
        let info = frame_info(KindArg::HeightMap, 200, 200, 1, 0.1, 0.1);
        assert_eq!(info.frame_type(), FrameType::HeightMap);
        assert_eq!(info.kind.expected_len(), Some(160_000));
    }
}
