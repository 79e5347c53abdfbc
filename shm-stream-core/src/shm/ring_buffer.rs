// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Lock-free circular byte buffer for IPC.
//!
//! Uses monotonically increasing write/read cursors for wait-free
//! single-producer single-consumer communication between two processes.
//! Byte `i` of the stream lives at offset `i % capacity` of the data area.
//!
//! The writer publishes `write_cursor` with release ordering after copying
//! bytes in; the reader acquires it before copying bytes out, and
//! symmetrically for `read_cursor`. No lock guards the data area.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::Serialize;

use crate::error::StreamError;
use crate::shm::layout::{
    HeaderSnapshot, RoleLine, StreamHeader, HEADER_SIZE, STATE_ATTACHED, STATE_CLOSED,
    STATE_DETACHED,
};
use crate::shm::SharedMemoryRegion;
use crate::types::{Capacity, WaitKind};

/// How long an opener waits for the creator to publish the header.
pub(crate) const INIT_GRACE: Duration = Duration::from_secs(1);

/// Side of the stream a handle plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Writer,
    Reader,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Writer => "writer",
            Self::Reader => "reader",
        }
    }

    pub fn peer(&self) -> Self {
        match self {
            Self::Writer => Self::Reader,
            Self::Reader => Self::Writer,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a handle can tell about its peer without making progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerStatus {
    /// No peer has attached yet.
    Pending,
    /// Peer is attached and alive.
    Attached,
    /// Peer closed its end explicitly.
    Closed,
    /// Peer vanished without closing, or the region was removed.
    Gone(String),
}

/// Split of a byte range at global index `cursor` into at most two
/// contiguous runs of the data area.
///
/// All wrap-around arithmetic lives here and is shared by both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WrapSpan {
    /// Data-area offset of the first run.
    pub(crate) offset: usize,
    /// Length of the run from `offset` towards the end of the data area.
    pub(crate) first: usize,
    /// Length of the run continuing at offset 0.
    pub(crate) second: usize,
}

impl WrapSpan {
    pub(crate) fn new(cursor: u64, len: usize, capacity: u64) -> Self {
        let offset = (cursor % capacity) as usize;
        let first = len.min(capacity as usize - offset);
        Self {
            offset,
            first,
            second: len - first,
        }
    }

    /// Contiguous run only, never crossing the end of the data area.
    pub(crate) fn contiguous(cursor: u64, len: usize, capacity: u64) -> Self {
        let span = Self::new(cursor, len, capacity);
        Self { second: 0, ..span }
    }

    pub(crate) fn len(&self) -> usize {
        self.first + self.second
    }
}

/// One role's view of a stream ring buffer in shared memory.
///
/// Single-owner: exactly one writer handle and one reader handle may be
/// attached to a region at any time.
pub struct RingBuffer {
    /// Underlying shared memory region.
    region: Arc<SharedMemoryRegion>,
    role: Role,
    capacity: u64,
    /// Local copy of this role's cursor; only this handle advances it.
    cursor: u64,
    /// Bytes handed out by the last reserve call.
    reserved: usize,
}

impl RingBuffer {
    /// Initialize a new ring buffer in a freshly created region and attach `role`.
    pub fn create(
        region: Arc<SharedMemoryRegion>,
        role: Role,
        capacity: Capacity,
        wait_kind: WaitKind,
    ) -> Result<Self, StreamError> {
        let needed = HEADER_SIZE + capacity.as_usize();
        if region.size() < needed {
            return Err(StreamError::incompatible(format!(
                "region of {} bytes is too small for capacity {} (need {})",
                region.size(),
                capacity,
                needed
            )));
        }

        // SAFETY: we just created the region and no peer has seen `ready`
        unsafe {
            StreamHeader::init(
                region.as_ptr() as *mut StreamHeader,
                capacity.bytes(),
                wait_kind,
            );
        }

        Self::attach(region, role, capacity.bytes())
    }

    /// Attach `role` to an existing ring buffer after validating its header.
    ///
    /// Waits up to one second for a concurrent creator to finish initializing.
    pub fn open(
        region: Arc<SharedMemoryRegion>,
        role: Role,
        wait_kind: WaitKind,
        expected_capacity: Option<Capacity>,
    ) -> Result<Self, StreamError> {
        if region.size() < HEADER_SIZE {
            return Err(StreamError::incompatible(format!(
                "region of {} bytes is smaller than the {} byte header",
                region.size(),
                HEADER_SIZE
            )));
        }

        // SAFETY: the region is at least HEADER_SIZE bytes and page aligned
        let header = unsafe { StreamHeader::of(&region) };
        let deadline = Instant::now() + INIT_GRACE;
        while !header.is_ready() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }

        let capacity = header.validate(
            region.size(),
            wait_kind,
            expected_capacity.map(|c| c.bytes()),
        )?;

        Self::attach(region, role, capacity)
    }

    fn attach(
        region: Arc<SharedMemoryRegion>,
        role: Role,
        capacity: u64,
    ) -> Result<Self, StreamError> {
        let mut ring = Self {
            region,
            role,
            capacity,
            cursor: 0,
            reserved: 0,
        };

        let me = std::process::id();
        let line = ring.own_line();
        loop {
            match line
                .pid
                .compare_exchange(0, me, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(holder) if process_alive(holder) => {
                    return Err(StreamError::RoleTaken {
                        role: role.as_str(),
                        pid: holder,
                    });
                }
                Err(holder) => {
                    if line
                        .pid
                        .compare_exchange(holder, me, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        tracing::warn!(
                            name = %ring.region.name(),
                            role = %role,
                            stale_pid = holder,
                            "Reclaimed role slot from exited process"
                        );
                        break;
                    }
                }
            }
        }

        line.state.store(STATE_ATTACHED, Ordering::Release);
        let cursor = line.cursor.load(Ordering::Acquire);
        ring.cursor = cursor;

        tracing::debug!(
            name = %ring.region.name(),
            role = %role,
            capacity = capacity,
            cursor = ring.cursor,
            "Attached to ring buffer"
        );

        Ok(ring)
    }

    /// Get the role of this handle.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Get the capacity of the data area.
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Get the underlying region.
    pub fn region(&self) -> &Arc<SharedMemoryRegion> {
        &self.region
    }

    pub(crate) fn header(&self) -> &StreamHeader {
        // SAFETY: the header was validated on attach and lives as long as the region
        unsafe { StreamHeader::of(&self.region) }
    }

    pub(crate) fn own_line(&self) -> &RoleLine {
        line_of(self.header(), self.role)
    }

    pub(crate) fn peer_line(&self) -> &RoleLine {
        line_of(self.header(), self.role.peer())
    }

    /// Get pointer to the data area (after header).
    fn data_ptr(&self) -> *mut u8 {
        // SAFETY: HEADER_SIZE + capacity is within the region bounds
        unsafe { self.region.as_ptr().add(HEADER_SIZE) }
    }

    /// Current (write_cursor, read_cursor) pair.
    pub fn cursors(&self) -> (u64, u64) {
        let header = self.header();
        (
            header.writer.cursor.load(Ordering::Acquire),
            header.reader.cursor.load(Ordering::Acquire),
        )
    }

    /// Point-in-time copy of the header.
    pub fn snapshot(&self) -> HeaderSnapshot {
        self.header().snapshot()
    }

    /// Bytes the writer may copy in right now.
    pub fn writable_len(&self) -> usize {
        debug_assert_eq!(self.role, Role::Writer);
        let read_cursor = self.peer_line().cursor.load(Ordering::Acquire);
        let buffered = self.cursor - read_cursor;
        debug_assert!(buffered <= self.capacity, "write cursor overran capacity");
        (self.capacity - buffered) as usize
    }

    /// Bytes the reader may copy out right now.
    pub fn readable_len(&self) -> usize {
        debug_assert_eq!(self.role, Role::Reader);
        let write_cursor = self.peer_line().cursor.load(Ordering::Acquire);
        let buffered = write_cursor - self.cursor;
        debug_assert!(buffered <= self.capacity, "read cursor fell behind capacity");
        buffered as usize
    }

    /// Bytes transferable right now in this handle's direction.
    pub fn available(&self) -> usize {
        match self.role {
            Role::Writer => self.writable_len(),
            Role::Reader => self.readable_len(),
        }
    }

    /// Copy as many bytes as fit into the buffer and publish them.
    ///
    /// Returns 0 if the buffer is full.
    pub fn try_write(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.writable_len());
        if n == 0 {
            return 0;
        }

        let span = WrapSpan::new(self.cursor, n, self.capacity);
        // SAFETY: span lies within the data area and covers bytes the reader
        // has already released (n <= free space)
        unsafe {
            let data = self.data_ptr();
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), data.add(span.offset), span.first);
            if span.second > 0 {
                std::ptr::copy_nonoverlapping(
                    bytes.as_ptr().add(span.first),
                    data,
                    span.second,
                );
            }
        }

        self.publish(n);
        n
    }

    /// Copy as many published bytes as fit into `buf` and release them.
    ///
    /// Returns 0 if the buffer is empty.
    pub fn try_read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.readable_len());
        if n == 0 {
            return 0;
        }

        let span = WrapSpan::new(self.cursor, n, self.capacity);
        // SAFETY: span lies within the data area and covers bytes published
        // by the writer's release store of write_cursor
        unsafe {
            let data = self.data_ptr();
            std::ptr::copy_nonoverlapping(data.add(span.offset), buf.as_mut_ptr(), span.first);
            if span.second > 0 {
                std::ptr::copy_nonoverlapping(
                    data,
                    buf.as_mut_ptr().add(span.first),
                    span.second,
                );
            }
        }

        self.publish(n);
        n
    }

    /// Borrow up to `max` free bytes of the data area for in-place writing.
    ///
    /// The span never crosses the end of the data area, so it may be shorter
    /// than the free space. Nothing is visible to the reader until
    /// [`Self::commit_write`].
    pub fn try_reserve_write(&mut self, max: usize) -> &mut [u8] {
        let n = max.min(self.writable_len());
        let span = WrapSpan::contiguous(self.cursor, n, self.capacity);
        self.reserved = span.len();
        // SAFETY: the span is free space owned by the writer until published
        unsafe { std::slice::from_raw_parts_mut(self.data_ptr().add(span.offset), span.first) }
    }

    /// Publish `written` bytes of the last reservation.
    pub fn commit_write(&mut self, written: usize) {
        debug_assert_eq!(self.role, Role::Writer);
        self.commit(written);
    }

    /// Borrow up to `max` published bytes of the data area for in-place reading.
    ///
    /// The span never crosses the end of the data area. The bytes stay owned
    /// by the reader until [`Self::commit_read`].
    pub fn try_reserve_read(&mut self, max: usize) -> &[u8] {
        let n = max.min(self.readable_len());
        let span = WrapSpan::contiguous(self.cursor, n, self.capacity);
        self.reserved = span.len();
        // SAFETY: the span holds bytes published by the writer and not yet released
        unsafe { std::slice::from_raw_parts(self.data_ptr().add(span.offset), span.first) }
    }

    /// Release `read` bytes of the last reservation back to the writer.
    pub fn commit_read(&mut self, read: usize) {
        debug_assert_eq!(self.role, Role::Reader);
        self.commit(read);
    }

    fn commit(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        assert!(
            n <= self.reserved,
            "committed {} bytes but only {} were reserved",
            n,
            self.reserved
        );
        self.publish(n);
    }

    fn publish(&mut self, n: usize) {
        self.cursor += n as u64;
        self.reserved = 0;
        self.own_line().cursor.store(self.cursor, Ordering::Release);
    }

    /// Whether this role was closed, possibly through a stop handle.
    pub fn is_closed(&self) -> bool {
        self.own_line().is_closed()
    }

    /// Whether the peer closed its end. A single atomic load.
    pub fn peer_closed(&self) -> bool {
        self.peer_line().is_closed()
    }

    /// Inspect the peer. Only called on the slow path.
    pub fn peer_status(&self) -> PeerStatus {
        let peer = self.peer_line();
        let state = peer.state.load(Ordering::Acquire);
        if state == STATE_CLOSED {
            return PeerStatus::Closed;
        }

        let pid = peer.pid.load(Ordering::Acquire);
        if pid != 0 && !process_alive(pid) {
            return PeerStatus::Gone(format!("{} process {} exited", self.role.peer(), pid));
        }

        if self.region.is_unlinked() {
            return PeerStatus::Gone(format!(
                "shared memory region {} was removed",
                self.region.name()
            ));
        }

        if state == STATE_DETACHED {
            PeerStatus::Pending
        } else {
            PeerStatus::Attached
        }
    }

    /// Mark this role closed and release its pid slot, so another handle
    /// may attach to the role.
    ///
    /// Waking sleepers is left to the caller's wait strategy.
    pub fn detach(&self) {
        let line = self.own_line();
        line.mark_closed();
        let _ = line.pid.compare_exchange(
            std::process::id(),
            0,
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        tracing::debug!(
            name = %self.region.name(),
            role = %self.role,
            cursor = self.cursor,
            "Detached from ring buffer"
        );
    }
}

pub(crate) fn line_of(header: &StreamHeader, role: Role) -> &RoleLine {
    match role {
        Role::Writer => &header.writer,
        Role::Reader => &header.reader,
    }
}

/// Whether a process with this pid exists.
pub(crate) fn process_alive(pid: u32) -> bool {
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        // Exists but belongs to another user.
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}
