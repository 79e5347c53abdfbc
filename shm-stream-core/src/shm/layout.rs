// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Stream header stored at the start of shared memory.
//!
//! Three cache lines: an immutable identity line written once by the
//! creator, then one line per role holding that role's cursor, futex
//! sequence word, pid slot and attach state. The data area of `capacity`
//! bytes follows immediately.
//!
//! The identity line is protected by a CRC32 layout tag so that an opener
//! rejects regions written by an incompatible build or a different wait
//! strategy instead of misreading them.

use std::mem::size_of;
use std::ptr::addr_of_mut;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::Serialize;

use crate::error::StreamError;
use crate::shm::SharedMemoryRegion;
use crate::types::WaitKind;

/// Magic bytes identifying a stream region.
pub const MAGIC: [u8; 8] = *b"SHMSTRM\0";

/// Layout version, bumped on any incompatible header change.
pub const LAYOUT_VERSION: u32 = 1;

/// Value of the `ready` word once the creator has finished initializing.
const READY: u32 = 0x5245_4459;

/// Role slot has never been attached or was released cleanly.
pub(crate) const STATE_DETACHED: u32 = 0;
/// Role is attached by a live handle.
pub(crate) const STATE_ATTACHED: u32 = 1;
/// Role was closed explicitly; the peer sees end-of-stream / `Closed`.
pub(crate) const STATE_CLOSED: u32 = 2;

/// Immutable identity of the stream.
#[repr(C, align(64))]
pub(crate) struct IdentityLine {
    magic: [u8; 8],
    version: u32,
    wait_kind: u32,
    capacity: u64,
    layout_tag: u32,
    /// Published last, with release ordering.
    ready: AtomicU32,
}

/// State owned by one role.
#[repr(C, align(64))]
pub(crate) struct RoleLine {
    /// Total bytes produced (writer) or consumed (reader). Never resets.
    pub(crate) cursor: AtomicU64,
    /// Futex word bumped by the owner after every cursor publish.
    pub(crate) seq: AtomicU32,
    /// Number of peer threads sleeping on `seq`.
    pub(crate) waiters: AtomicU32,
    /// Pid of the attached process, 0 if none.
    pub(crate) pid: AtomicU32,
    /// One of the `STATE_*` values.
    pub(crate) state: AtomicU32,
}

impl RoleLine {
    /// Flag this role closed. The peer treats it as end-of-stream.
    pub(crate) fn mark_closed(&self) {
        self.state.store(STATE_CLOSED, Ordering::Release);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_CLOSED
    }
}

/// Header at the start of the mapped region.
#[repr(C)]
pub(crate) struct StreamHeader {
    identity: IdentityLine,
    pub(crate) writer: RoleLine,
    pub(crate) reader: RoleLine,
}

/// Header size in bytes; the data area starts here.
pub const HEADER_SIZE: usize = size_of::<StreamHeader>();

const _: () = assert!(HEADER_SIZE == 3 * 64);

impl StreamHeader {
    /// Initialize a freshly created, zero-filled header.
    ///
    /// # Safety
    /// `header` must point to at least `HEADER_SIZE` writable bytes that no
    /// other process reads before `ready` is published.
    pub(crate) unsafe fn init(header: *mut StreamHeader, capacity: u64, wait_kind: WaitKind) {
        let identity = addr_of_mut!((*header).identity);
        addr_of_mut!((*identity).magic).write(MAGIC);
        addr_of_mut!((*identity).version).write(LAYOUT_VERSION);
        addr_of_mut!((*identity).wait_kind).write(wait_kind.tag());
        addr_of_mut!((*identity).capacity).write(capacity);
        addr_of_mut!((*identity).layout_tag).write(layout_tag(
            &MAGIC,
            LAYOUT_VERSION,
            wait_kind.tag(),
            capacity,
        ));

        let header = &*header;
        for line in [&header.writer, &header.reader] {
            line.cursor.store(0, Ordering::Relaxed);
            line.seq.store(0, Ordering::Relaxed);
            line.waiters.store(0, Ordering::Relaxed);
            line.pid.store(0, Ordering::Relaxed);
            line.state.store(STATE_DETACHED, Ordering::Relaxed);
        }

        header.identity.ready.store(READY, Ordering::Release);
    }

    /// View the start of a mapped region as a header.
    ///
    /// # Safety
    /// The region must be at least `HEADER_SIZE` bytes. Fields other than
    /// `ready` are meaningful only once [`Self::is_ready`] returns true.
    pub(crate) unsafe fn of(region: &SharedMemoryRegion) -> &StreamHeader {
        &*(region.as_ptr() as *const StreamHeader)
    }

    /// Whether the creator has published the identity line.
    pub(crate) fn is_ready(&self) -> bool {
        self.identity.ready.load(Ordering::Acquire) == READY
    }

    /// Validate the identity line against what the opener expects.
    ///
    /// Returns the stored data capacity.
    pub(crate) fn validate(
        &self,
        region_size: usize,
        expected_kind: WaitKind,
        expected_capacity: Option<u64>,
    ) -> Result<u64, StreamError> {
        if !self.is_ready() {
            return Err(StreamError::incompatible("header was never initialized"));
        }

        let identity = &self.identity;
        if identity.magic != MAGIC {
            return Err(StreamError::incompatible(format!(
                "bad magic {:02x?}",
                identity.magic
            )));
        }
        if identity.version != LAYOUT_VERSION {
            return Err(StreamError::incompatible(format!(
                "layout version {} (expected {})",
                identity.version, LAYOUT_VERSION
            )));
        }

        let expected_tag = layout_tag(
            &identity.magic,
            identity.version,
            identity.wait_kind,
            identity.capacity,
        );
        if identity.layout_tag != expected_tag {
            return Err(StreamError::incompatible(format!(
                "layout tag mismatch: stored {:#010x}, computed {:#010x}",
                identity.layout_tag, expected_tag
            )));
        }

        let stored_kind = WaitKind::from_tag(identity.wait_kind).ok_or_else(|| {
            StreamError::incompatible(format!("unknown wait kind tag {}", identity.wait_kind))
        })?;
        if stored_kind != expected_kind {
            return Err(StreamError::incompatible(format!(
                "stream uses {} waiting, opened as {}",
                stored_kind, expected_kind
            )));
        }

        let capacity = identity.capacity;
        if (region_size as u64) < HEADER_SIZE as u64 + capacity {
            return Err(StreamError::incompatible(format!(
                "region of {} bytes cannot hold capacity {}",
                region_size, capacity
            )));
        }
        if let Some(expected) = expected_capacity {
            if expected != capacity {
                return Err(StreamError::incompatible(format!(
                    "capacity {} (expected {})",
                    capacity, expected
                )));
            }
        }

        Ok(capacity)
    }

    pub(crate) fn wait_kind(&self) -> Option<WaitKind> {
        WaitKind::from_tag(self.identity.wait_kind)
    }

    pub(crate) fn capacity(&self) -> u64 {
        self.identity.capacity
    }

    /// Point-in-time copy of the header for diagnostics.
    pub(crate) fn snapshot(&self) -> HeaderSnapshot {
        HeaderSnapshot {
            wait_kind: self.wait_kind(),
            capacity: self.capacity(),
            write_cursor: self.writer.cursor.load(Ordering::Acquire),
            read_cursor: self.reader.cursor.load(Ordering::Acquire),
            writer: RoleSnapshot::from_line(&self.writer),
            reader: RoleSnapshot::from_line(&self.reader),
        }
    }
}

/// CRC32 over the identity fields.
fn layout_tag(magic: &[u8; 8], version: u32, wait_kind: u32, capacity: u64) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(magic);
    hasher.update(&version.to_le_bytes());
    hasher.update(&wait_kind.to_le_bytes());
    hasher.update(&capacity.to_le_bytes());
    hasher.finalize()
}

/// Attach state of one role as seen in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleState {
    Detached,
    Attached,
    Closed,
}

impl RoleState {
    pub(crate) fn from_raw(raw: u32) -> Self {
        match raw {
            STATE_ATTACHED => Self::Attached,
            STATE_CLOSED => Self::Closed,
            _ => Self::Detached,
        }
    }
}

/// Diagnostic view of one role.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RoleSnapshot {
    pub pid: u32,
    pub state: RoleState,
}

impl RoleSnapshot {
    fn from_line(line: &RoleLine) -> Self {
        Self {
            pid: line.pid.load(Ordering::Acquire),
            state: RoleState::from_raw(line.state.load(Ordering::Acquire)),
        }
    }
}

/// Diagnostic view of a stream header.
#[derive(Debug, Clone, Serialize)]
pub struct HeaderSnapshot {
    pub wait_kind: Option<WaitKind>,
    pub capacity: u64,
    pub write_cursor: u64,
    pub read_cursor: u64,
    pub writer: RoleSnapshot,
    pub reader: RoleSnapshot,
}

impl HeaderSnapshot {
    /// Bytes written but not yet consumed.
    pub fn buffered(&self) -> u64 {
        self.write_cursor.saturating_sub(self.read_cursor)
    }
}
