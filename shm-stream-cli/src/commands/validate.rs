// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shm-stream validate` command - Validate configuration file.

use shm_stream_core::ConfigLoader;

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Stream Settings:");
            println!("  Name:          {}", config.name);
            println!("  Capacity:      {}", config.capacity);
            println!("  Wait Strategy: {}", config.wait);
            println!(
                "  Role:          {}",
                if config.create { "creator" } else { "opener" }
            );
            match config.timeout {
                Some(timeout) => println!("  Timeout:       {}ms", timeout.as_millis()),
                None => println!("  Timeout:       none"),
            }
            println!("  Open Retry:    {}ms", config.open_retry.as_millis());
            if let Some(cpu) = config.pin_cpu {
                println!("  Pinned CPU:    {}", cpu);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
