// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmframe validate` command - Validate configuration file.

use shmframe_core::ConfigLoader;

pub fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Region Settings:");
            println!("  Name:               {}", config.name);
            println!("  Capacity:           {} ({} bytes)", config.capacity, config.capacity.bytes());
            println!("  Unlink On Drop:     {}", config.unlink_on_drop);
            println!(
                "  Poll Interval:      {}ms",
                config.poll_interval.as_millis()
            );
            println!();
            println!("Timeouts:");
            println!("  Write:              {}ms", config.timeouts.write.as_millis());
            println!(
                "  Height Map Write:   {}ms",
                config.timeouts.height_map_write.as_millis()
            );
            println!("  Read:               {}ms", config.timeouts.read.as_millis());
            println!("  Clear:              {}ms", config.timeouts.clear.as_millis());
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
