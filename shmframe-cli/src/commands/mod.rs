// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

pub mod clear;
pub mod read;
pub mod remove;
pub mod status;
pub mod validate;
pub mod watch;
pub mod write;

use shmframe_core::{ConfigLoader, RegionConfig};

/// Config file if given, otherwise the name and capacity flags.
pub fn resolve_config(
    path: Option<&str>,
    name: &str,
    capacity: usize,
) -> Result<RegionConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(ConfigLoader::load_file(path)?),
        None => Ok(RegionConfig::from_parts(name, capacity)?),
    }
}
