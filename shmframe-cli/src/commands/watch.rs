// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmframe watch` command - Print frames as they arrive.

use std::sync::mpsc;
use std::sync::Mutex;

use shmframe_core::{RegionConfig, RegionManager};

use super::read::describe;

pub fn execute(config: RegionConfig, count: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let manager = RegionManager::open(config)?;
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);

    manager.set_frame_callback(move |frame| {
        if let Ok(tx) = tx.lock() {
            let _ = tx.send(describe(frame));
        }
    });
    manager.start_monitoring()?;

    println!(
        "Watching '{}' every {}ms (Ctrl+C to stop)",
        manager.name(),
        manager.config().poll_interval.as_millis()
    );

    let mut seen = 0;
    for line in rx.iter() {
        println!("{}", line);
        seen += 1;
        if count.is_some_and(|limit| seen >= limit) {
            break;
        }
    }

    manager.stop_monitoring();
    tracing::info!(frames = seen, "Watch finished");
    Ok(())
}
