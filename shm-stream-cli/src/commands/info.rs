// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shm-stream info` command - Show a stream's header.

use shm_stream_core::shm::{RoleSnapshot, RoleState};
use shm_stream_core::{inspect, StreamName};

pub async fn execute(name: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let name = StreamName::new(name)?;
    let snapshot = inspect(&name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let wait = snapshot
        .wait_kind
        .map(|kind| kind.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("Stream {}", name);
    println!("  Wait Strategy: {}", wait);
    println!("  Capacity:      {} bytes", snapshot.capacity);
    println!("  Write Cursor:  {}", snapshot.write_cursor);
    println!("  Read Cursor:   {}", snapshot.read_cursor);
    println!("  Buffered:      {} bytes", snapshot.buffered());
    println!("  Writer:        {}", describe(&snapshot.writer));
    println!("  Reader:        {}", describe(&snapshot.reader));
    Ok(())
}

fn describe(role: &RoleSnapshot) -> String {
    match role.state {
        RoleState::Attached => format!("● attached (PID: {})", role.pid),
        RoleState::Closed => "○ closed".to_string(),
        RoleState::Detached => "○ not attached".to_string(),
    }
}
