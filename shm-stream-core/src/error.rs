// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for shm-stream.
//!
//! This module defines explicit enum error types as per coding guidelines.
//! No `Box<dyn Error>`, no `anyhow::Result` - all errors are strongly typed.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for stream operations.
/// All errors are explicit variants - no catch-all or generic handling.
#[derive(Debug, Error)]
pub enum StreamError {
    // =========================================================================
    // Setup Errors - surfaced at open time, never downgraded
    // =========================================================================
    #[error("Shared memory error: {0}")]
    Region(#[from] SharedMemoryError),

    #[error("Incompatible stream layout: {reason}")]
    IncompatibleLayout { reason: String },

    #[error("The {role} side is already attached by pid {pid}")]
    RoleTaken { role: &'static str, pid: u32 },

    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Transient Conditions - buffer full/empty, not a failure
    // =========================================================================
    #[error("Operation would block")]
    WouldBlock,

    // =========================================================================
    // Terminal Conditions - the peer will never make progress again
    // =========================================================================
    #[error("Stream closed")]
    Closed,

    #[error("Peer gone: {reason}")]
    PeerGone { reason: String },

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },
}

impl StreamError {
    /// The named region does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Region(SharedMemoryError::NotFound { .. }))
    }

    /// The named region (or the requested role slot) is already taken.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Self::Region(SharedMemoryError::AlreadyExists { .. }) | Self::RoleTaken { .. }
        )
    }

    /// Buffer full/empty or a blocking wait timed out.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::WouldBlock)
    }

    /// The handle can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Closed | Self::PeerGone { .. } | Self::IncompatibleLayout { .. }
        )
    }

    pub(crate) fn incompatible(reason: impl Into<String>) -> Self {
        Self::IncompatibleLayout {
            reason: reason.into(),
        }
    }

    pub(crate) fn peer_gone(reason: impl Into<String>) -> Self {
        Self::PeerGone {
            reason: reason.into(),
        }
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        let kind = match &err {
            StreamError::WouldBlock => io::ErrorKind::WouldBlock,
            StreamError::Closed | StreamError::PeerGone { .. } => io::ErrorKind::BrokenPipe,
            StreamError::IncompatibleLayout { .. } => io::ErrorKind::InvalidData,
            StreamError::Region(SharedMemoryError::NotFound { .. }) => io::ErrorKind::NotFound,
            StreamError::Region(SharedMemoryError::AlreadyExists { .. })
            | StreamError::RoleTaken { .. } => io::ErrorKind::AlreadyExists,
            StreamError::Io { source, .. } => source.kind(),
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// Shared memory errors raised by the region manager.
#[derive(Debug, Error)]
pub enum SharedMemoryError {
    #[error("Shared memory region not found: {name}")]
    NotFound { name: String },

    #[error("Shared memory region already exists: {name}")]
    AlreadyExists { name: String },

    #[error("Shared memory region is not sized yet: {name}")]
    Empty { name: String },

    #[error("Failed to create shared memory region: {name} - {reason}")]
    CreateFailed { name: String, reason: String },

    #[error("Failed to open shared memory region: {name} - {reason}")]
    OpenFailed { name: String, reason: String },

    #[error("Failed to map shared memory: {reason}")]
    MapFailed { reason: String },

    #[error("Invalid shared memory name: {name:?} - {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Invalid shared memory size: {size} bytes (min: {min}, max: {max})")]
    InvalidSize { size: usize, min: usize, max: usize },
}

/// Hard validation errors cause immediate process termination.
/// Used when configuration is invalid and the stream cannot safely open.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Capacity out of bounds: {capacity} bytes (min: {min}, max: {max})")]
    CapacityOutOfBounds { capacity: u64, min: u64, max: u64 },
}

/// Result type alias using StreamError.
pub type StreamResult<T> = Result<T, StreamError>;
