// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

use serde::{Deserialize, Serialize};

use crate::shm::Role;
use crate::types::WaitKind;

/// Per-handle transfer counters. Local to the owning thread; never shared.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Bytes moved through this handle.
    pub bytes: u64,
    /// Calls to `write`/`read`.
    pub calls: u64,
    /// Calls that ended with `WouldBlock`.
    pub would_block: u64,
    /// Wait slices spent with no progress.
    pub waits: u64,
    /// Wakes issued to a sleeping peer.
    pub wakes_sent: u64,
}

/// Stats tagged with the handle they came from, as printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub wait: WaitKind,
    #[serde(flatten)]
    pub stats: StreamStats,
}
