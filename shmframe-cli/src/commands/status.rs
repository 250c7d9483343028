// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmframe status` command - Show the region header.

use shmframe_core::{FrameType, RegionConfig, RegionManager};

pub fn execute(config: RegionConfig) -> Result<(), Box<dyn std::error::Error>> {
    let manager = RegionManager::open(config)?;
    let header = manager.status()?;

    let status = match header.status() {
        Ok(status) => status.to_string(),
        Err(_) => format!("UNKNOWN({})", header.status),
    };
    let frame_type = FrameType::try_from(header.info.data_type)
        .map(|t| t.to_string())
        .unwrap_or_else(|_| format!("UNKNOWN({})", header.info.data_type));

    println!("╔══════════════════════════════════════════════════╗");
    println!("║                  REGION STATUS                   ║");
    println!("╠══════════════════════════════════════════════════╣");
    println!("║ Name:       {:<36} ║", manager.name().as_str());
    println!("║ Capacity:   {:<36} ║", manager.config().capacity.to_string());
    println!("║ Magic:      {:<36} ║", format!("{:#010x}", header.magic));
    println!("║ Status:     {:<36} ║", status);
    println!("║ Frame ID:   {:<36} ║", header.frame_id);
    println!("║ Data Size:  {:<36} ║", header.data_size);
    println!("║ Checksum:   {:<36} ║", format!("{:#010x}", header.checksum));
    println!("║ Type:       {:<36} ║", frame_type);
    println!(
        "║ Geometry:   {:<36} ║",
        format!(
            "{}x{}x{}",
            header.info.width, header.info.height, header.info.channels
        )
    );
    println!("║ Timestamp:  {:<36} ║", header.info.timestamp);
    println!("╚══════════════════════════════════════════════════╝");

    let message = header.error_message();
    if !message.is_empty() {
        println!();
        println!("✗ Peer error: {}", message);
    }
    if !header.is_valid() {
        println!();
        println!("✗ Region header is not initialized");
    }

    Ok(())
}
