// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shm-stream remove` command - Remove a stale stream.

use shm_stream_core::shm::SharedMemoryRegion;
use shm_stream_core::StreamName;

pub async fn execute(name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let name = StreamName::new(name)?;
    tracing::info!(name = %name, "Removing stream");

    match SharedMemoryRegion::remove(&name.object_name()) {
        Ok(()) => {
            println!("✓ Removed stream {}", name);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Failed to remove stream {}:", name);
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
