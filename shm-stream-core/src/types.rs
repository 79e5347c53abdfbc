// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! Following the "Newtype" pattern in Rust to ensure valid state by construction.
//! All types validate their invariants at creation time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HardValidationError;

/// Smallest usable data capacity in bytes.
pub const MIN_CAPACITY: u64 = 2;
/// Largest data capacity in bytes (1 GB).
pub const MAX_CAPACITY: u64 = 1024 * 1024 * 1024;
/// Capacity used when none is configured (64 KB).
pub const DEFAULT_CAPACITY: u64 = 64 * 1024;

/// Longest accepted stream name.
const MAX_NAME_LEN: usize = 200;

/// Prefix applied to every OS-level shared memory object.
const OBJECT_PREFIX: &str = "shm_stream_";

/// Validated stream name, agreed upon out-of-band by writer and reader.
/// Must be non-empty, at most 200 chars, alphanumeric with `-`, `_` or `.`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamName(String);

impl StreamName {
    /// Create a new StreamName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, HardValidationError> {
        let name = name.into();

        if name.is_empty() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "name",
                value: name,
                reason: "Stream name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_NAME_LEN {
            return Err(HardValidationError::InvalidFieldValue {
                field: "name",
                value: name.clone(),
                reason: format!(
                    "Stream name too long: {} chars (max {})",
                    name.len(),
                    MAX_NAME_LEN
                ),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(HardValidationError::InvalidFieldValue {
                field: "name",
                value: name,
                reason: "Stream name must contain only ASCII alphanumeric characters, '-', '_' and '.'"
                    .to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the shared memory object backing this stream (without leading `/`).
    pub fn object_name(&self) -> String {
        format!("{}{}", OBJECT_PREFIX, self.0)
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for StreamName {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for StreamName {
    type Error = HardValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StreamName> for String {
    fn from(name: StreamName) -> Self {
        name.0
    }
}

/// Validated data capacity of a ring buffer in bytes.
/// Must be between MIN_CAPACITY and MAX_CAPACITY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Capacity(u64);

impl Capacity {
    /// Create a new Capacity with bounds validation.
    pub fn new(bytes: u64) -> Result<Self, HardValidationError> {
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&bytes) {
            return Err(HardValidationError::CapacityOutOfBounds {
                capacity: bytes,
                min: MIN_CAPACITY,
                max: MAX_CAPACITY,
            });
        }
        Ok(Self(bytes))
    }

    /// Get the capacity in bytes.
    pub fn bytes(&self) -> u64 {
        self.0
    }

    /// Get the capacity as a `usize` for indexing.
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Self(DEFAULT_CAPACITY)
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

impl TryFrom<u64> for Capacity {
    type Error = HardValidationError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Capacity> for u64 {
    fn from(capacity: Capacity) -> Self {
        capacity.0
    }
}

/// Suspension policy used when a transfer cannot make progress.
///
/// Stored in the stream header so that both sides agree on the wake protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WaitKind {
    /// Sleep on an OS wait primitive until the peer signals.
    #[default]
    Blocking,
    /// Busy-poll the cursors without OS involvement.
    Light,
    /// Return `WouldBlock` immediately.
    NoWait,
}

impl WaitKind {
    /// Tag written to the stream header.
    pub(crate) fn tag(self) -> u32 {
        match self {
            Self::Blocking => 1,
            Self::Light => 2,
            Self::NoWait => 3,
        }
    }

    pub(crate) fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(Self::Blocking),
            2 => Some(Self::Light),
            3 => Some(Self::NoWait),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Light => "light",
            Self::NoWait => "no_wait",
        }
    }
}

impl fmt::Display for WaitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WaitKind {
    type Err = HardValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blocking" => Ok(Self::Blocking),
            "light" => Ok(Self::Light),
            "no_wait" | "no-wait" | "nowait" => Ok(Self::NoWait),
            other => Err(HardValidationError::InvalidFieldValue {
                field: "wait",
                value: other.to_string(),
                reason: "Expected one of: blocking, light, no_wait".to_string(),
            }),
        }
    }
}
