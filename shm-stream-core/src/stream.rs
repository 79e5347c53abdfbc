// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Writer and Reader handles.
//!
//! A handle is **Open** from construction until `close` or drop, after which
//! it is **Closed** for good. Each handle is owned by one thread; only a
//! [`StopHandle`] may be used from elsewhere.
//!
//! Every no-progress iteration checks, in order: can the transfer proceed,
//! did the peer close, is the peer still alive. Liveness is only checked
//! between wait slices.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::StreamConfig;
use crate::error::{HardValidationError, SharedMemoryError, StreamError, StreamResult};
use crate::shm::{
    line_of, wake_both, Blocking, Doorbell, HeaderSnapshot, Light, NoWait, PeerStatus,
    RingBuffer, Role, SharedMemoryRegion, StreamHeader, WaitOptions, WaitSlice, WaitStrategy,
    HEADER_SIZE, INIT_GRACE,
};
use crate::stats::{StatsReport, StreamStats};
use crate::types::{Capacity, StreamName, WaitKind};

/// Delay between attempts while an opener waits for the region to appear.
const OPEN_POLL: Duration = Duration::from_millis(5);

/// How long a creating writer keeps the region alive for unread bytes on close.
pub const DEFAULT_LINGER: Duration = Duration::from_secs(5);

/// Poll interval while lingering.
const LINGER_POLL: Duration = Duration::from_millis(1);

pub type BlockingWriter = Writer<Blocking>;
pub type LightWriter = Writer<Light>;
pub type NoWaitWriter = Writer<NoWait>;
pub type BlockingReader = Reader<Blocking>;
pub type LightReader = Reader<Light>;
pub type NoWaitReader = Reader<NoWait>;

/// Builder for stream handles.
///
/// Defaults: open an existing region, no retry, no timeout, any capacity,
/// [`DEFAULT_LINGER`] on close.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    create: bool,
    capacity: Option<Capacity>,
    timeout: Option<Duration>,
    open_retry: Duration,
    linger: Duration,
    wait: WaitOptions,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            create: false,
            capacity: None,
            timeout: None,
            open_retry: Duration::ZERO,
            linger: DEFAULT_LINGER,
            wait: WaitOptions::default(),
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options matching a loaded configuration.
    ///
    /// The configured capacity only applies when creating; openers adopt the
    /// creator's. A configured timeout also bounds the close linger.
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            create: config.create,
            capacity: config.create.then_some(config.capacity),
            timeout: config.timeout,
            open_retry: config.open_retry,
            linger: config.timeout.unwrap_or(DEFAULT_LINGER),
            wait: WaitOptions::default(),
        }
    }

    /// Create the region instead of opening it. Fails with `AlreadyExists`
    /// if the name is taken.
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Capacity to create with, or to require when opening.
    pub fn capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Bound each blocking call; expiry reports `WouldBlock`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Keep retrying `NotFound` for this long when opening.
    pub fn open_retry(mut self, retry: Duration) -> Self {
        self.open_retry = retry;
        self
    }

    /// Upper bound on how long a writer that created the region waits on
    /// close for the reader to drain it. Zero closes immediately.
    pub fn linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    /// Replace the blocking strategy's doorbell.
    pub fn doorbell(mut self, doorbell: Arc<dyn Doorbell>) -> Self {
        self.wait.doorbell = Some(doorbell);
        self
    }

    pub fn writer<S: WaitStrategy>(&self, name: &StreamName) -> StreamResult<Writer<S>> {
        Endpoint::attach(self, name, Role::Writer).map(Writer)
    }

    pub fn reader<S: WaitStrategy>(&self, name: &StreamName) -> StreamResult<Reader<S>> {
        Endpoint::attach(self, name, Role::Reader).map(Reader)
    }

    fn ring(&self, name: &StreamName, role: Role, kind: WaitKind) -> StreamResult<RingBuffer> {
        let object = name.object_name();
        if self.create {
            let capacity = self.capacity.unwrap_or_default();
            let region = SharedMemoryRegion::create(&object, HEADER_SIZE + capacity.as_usize())?;
            RingBuffer::create(Arc::new(region), role, capacity, kind)
        } else {
            let region = open_region(&object, self.open_retry)?;
            RingBuffer::open(Arc::new(region), role, kind, self.capacity)
        }
    }
}

/// Open a region, retrying while it does not exist or is not sized yet.
fn open_region(object: &str, retry: Duration) -> StreamResult<SharedMemoryRegion> {
    let start = Instant::now();
    let mut announced = false;
    loop {
        match SharedMemoryRegion::open(object) {
            Ok(region) => return Ok(region),
            Err(SharedMemoryError::NotFound { .. }) if start.elapsed() < retry => {
                if !announced {
                    tracing::debug!(name = %object, "Waiting for stream to be created");
                    announced = true;
                }
                std::thread::sleep(OPEN_POLL);
            }
            Err(SharedMemoryError::Empty { .. })
                if start.elapsed() < retry.max(INIT_GRACE) =>
            {
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(SharedMemoryError::Empty { name }) => {
                return Err(StreamError::incompatible(format!(
                    "region {} was never sized by its creator",
                    name
                )));
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Read a stream's header without attaching to either role.
pub fn inspect(name: &StreamName) -> StreamResult<HeaderSnapshot> {
    let region = SharedMemoryRegion::open(&name.object_name())?;
    if region.size() < HEADER_SIZE {
        return Err(StreamError::incompatible(format!(
            "region of {} bytes is smaller than the header",
            region.size()
        )));
    }

    // SAFETY: size checked above
    let header = unsafe { StreamHeader::of(&region) };
    let kind = header
        .is_ready()
        .then(|| header.wait_kind())
        .flatten()
        .ok_or_else(|| StreamError::incompatible("header was never initialized"))?;
    header.validate(region.size(), kind, None)?;
    Ok(header.snapshot())
}

/// State shared by both handle kinds.
struct Endpoint<S: WaitStrategy> {
    name: StreamName,
    ring: RingBuffer,
    strategy: S,
    timeout: Option<Duration>,
    linger: Duration,
    stats: StreamStats,
    closed: bool,
}

impl<S: WaitStrategy> Endpoint<S> {
    fn attach(options: &OpenOptions, name: &StreamName, role: Role) -> StreamResult<Self> {
        let ring = options.ring(name, role, S::KIND)?;

        tracing::debug!(
            name = %name,
            role = %role,
            wait = %S::KIND,
            capacity = ring.capacity(),
            creator = ring.region().is_owner(),
            "Stream opened"
        );

        Ok(Self {
            name: name.clone(),
            ring,
            strategy: S::new(&options.wait),
            timeout: options.timeout,
            linger: options.linger,
            stats: StreamStats::default(),
            closed: false,
        })
    }

    fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|t| Instant::now() + t)
    }

    /// Slow-path liveness check between wait slices.
    fn check_peer(&self) -> StreamResult<()> {
        match self.ring.peer_status() {
            PeerStatus::Gone(reason) => {
                // Bytes published before the writer vanished are still delivered.
                if self.ring.role() == Role::Reader && self.ring.readable_len() > 0 {
                    return Ok(());
                }
                tracing::warn!(name = %self.name, role = %self.ring.role(), %reason, "Peer lost");
                Err(StreamError::peer_gone(reason))
            }
            PeerStatus::Closed if self.ring.role() == Role::Writer => Err(StreamError::Closed),
            _ => Ok(()),
        }
    }

    /// One writer wait slice. `Ok` means retry the transfer.
    fn wait_space(&mut self, deadline: Option<Instant>) -> StreamResult<()> {
        if self.ring.is_closed() || self.ring.peer_closed() {
            return Err(StreamError::Closed);
        }
        match self.strategy.wait_for_space(&self.ring, deadline) {
            WaitSlice::Retry => {
                self.stats.waits += 1;
                Ok(())
            }
            WaitSlice::Idle => {
                self.stats.waits += 1;
                self.check_peer()
            }
            WaitSlice::Expired { check_peer } => {
                if check_peer {
                    self.check_peer()?;
                }
                Err(StreamError::WouldBlock)
            }
        }
    }

    /// One reader wait slice. `Ok` means retry the transfer.
    fn wait_data(&mut self, deadline: Option<Instant>) -> StreamResult<()> {
        match self.strategy.wait_for_data(&self.ring, deadline) {
            WaitSlice::Retry => {
                self.stats.waits += 1;
                Ok(())
            }
            WaitSlice::Idle => {
                self.stats.waits += 1;
                self.check_peer()
            }
            WaitSlice::Expired { check_peer } => {
                if check_peer {
                    self.check_peer()?;
                }
                self.stats.would_block += 1;
                Err(StreamError::WouldBlock)
            }
        }
    }

    /// Reader side: bytes are buffered or the stream has ended.
    fn data_or_eof(&self) -> bool {
        self.ring.is_closed() || self.ring.readable_len() > 0 || self.ring.peer_closed()
    }

    fn reserve_read(&mut self, max: usize) -> &[u8] {
        if self.ring.is_closed() {
            return &[];
        }
        self.ring.try_reserve_read(max)
    }

    fn published(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let woke = match self.ring.role() {
            Role::Writer => self.strategy.notify_data_published(&self.ring),
            Role::Reader => self.strategy.notify_space_released(&self.ring),
        };
        if woke {
            self.stats.wakes_sent += 1;
        }
        self.stats.bytes += n as u64;
    }

    fn stop_handle(&self) -> StopHandle {
        StopHandle {
            region: Arc::clone(self.ring.region()),
            role: self.ring.role(),
            doorbell: self.strategy.doorbell(),
        }
    }

    fn report(&self) -> StatsReport {
        StatsReport {
            name: self.name.to_string(),
            role: Some(self.ring.role()),
            wait: S::KIND,
            stats: self.stats.clone(),
        }
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        // A stopped writer abandons what is left.
        if self.ring.role() == Role::Writer
            && self.ring.region().is_owner()
            && !self.ring.is_closed()
        {
            self.linger();
        }

        self.ring.detach();
        if let Some(doorbell) = self.strategy.doorbell() {
            wake_both(self.ring.header(), doorbell.as_ref());
        }

        let region = self.ring.region();
        if region.is_owner() && region.unlink() {
            tracing::debug!(name = %self.name, "Stream removed by its creator");
        }

        tracing::debug!(
            name = %self.name,
            role = %self.ring.role(),
            bytes = self.stats.bytes,
            "Stream closed"
        );
    }
}

impl<S: WaitStrategy> Endpoint<S> {
    /// Keep the region linked until the reader has read everything, closed,
    /// or died, or until `linger` passes.
    fn linger(&self) {
        let deadline = Instant::now() + self.linger;
        loop {
            let (written, read) = self.ring.cursors();
            if written == read {
                return;
            }
            if let PeerStatus::Closed | PeerStatus::Gone(_) = self.ring.peer_status() {
                return;
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    name = %self.name,
                    unread = written - read,
                    "Closing with bytes the reader never took"
                );
                return;
            }
            std::thread::sleep(LINGER_POLL);
        }
    }
}

impl<S: WaitStrategy> Drop for Endpoint<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Writing end of a stream.
pub struct Writer<S: WaitStrategy>(Endpoint<S>);

impl<S: WaitStrategy> Writer<S> {
    /// Create the stream and attach as its writer.
    pub fn create(name: &StreamName, capacity: Capacity) -> StreamResult<Self> {
        OpenOptions::new()
            .create(true)
            .capacity(capacity)
            .writer(name)
    }

    /// Attach as the writer of an existing stream.
    pub fn open(name: &StreamName) -> StreamResult<Self> {
        OpenOptions::new().writer(name)
    }

    /// Attach as described by `config`, whose wait kind must be `S::KIND`.
    pub fn from_config(config: &StreamConfig) -> StreamResult<Self> {
        check_kind::<S>(config)?;
        OpenOptions::from_config(config).writer(&config.name)
    }

    /// Write bytes in order.
    ///
    /// Blocking and Light writers return once every byte has been accepted,
    /// or earlier with a partial count if a timeout or peer loss interrupts
    /// after some progress. No-Wait writes what fits and fails with
    /// `WouldBlock` only when nothing fits.
    pub fn write(&mut self, bytes: &[u8]) -> StreamResult<usize> {
        let ep = &mut self.0;
        ep.stats.calls += 1;
        if ep.ring.is_closed() {
            return Err(StreamError::Closed);
        }
        if bytes.is_empty() {
            return Ok(0);
        }

        let deadline = ep.deadline();
        let mut written = 0;
        let outcome = loop {
            let n = ep.ring.try_write(&bytes[written..]);
            if n > 0 {
                written += n;
                ep.published(n);
                if written == bytes.len() || S::KIND == WaitKind::NoWait {
                    break Ok(());
                }
                continue;
            }

            if let Err(e) = ep.wait_space(deadline) {
                break Err(e);
            }
        };

        match outcome {
            Ok(()) => Ok(written),
            Err(_) if written > 0 => Ok(written),
            Err(e) => {
                if e.is_would_block() {
                    ep.stats.would_block += 1;
                }
                Err(e)
            }
        }
    }

    /// Borrow up to `max` contiguous free bytes to fill in place.
    ///
    /// The span stops at the end of the data area, so it may be shorter than
    /// [`Self::available`]. Nothing reaches the reader until [`Self::commit`].
    /// Fails with `WouldBlock` when the buffer is full.
    pub fn try_reserve(&mut self, max: usize) -> StreamResult<&mut [u8]> {
        let ep = &mut self.0;
        ep.stats.calls += 1;
        if ep.ring.is_closed() {
            return Err(StreamError::Closed);
        }
        if max > 0 && ep.ring.writable_len() == 0 {
            if ep.ring.peer_closed() {
                return Err(StreamError::Closed);
            }
            ep.check_peer()?;
            ep.stats.would_block += 1;
            return Err(StreamError::WouldBlock);
        }
        Ok(ep.ring.try_reserve_write(max))
    }

    /// Like [`Self::try_reserve`], but waits per the strategy until at least
    /// one byte is free.
    pub fn wait_reserve(&mut self, max: usize) -> StreamResult<&mut [u8]> {
        let ep = &mut self.0;
        ep.stats.calls += 1;
        if ep.ring.is_closed() {
            return Err(StreamError::Closed);
        }

        let deadline = ep.deadline();
        while max > 0 && ep.ring.writable_len() == 0 {
            if let Err(e) = ep.wait_space(deadline) {
                if e.is_would_block() {
                    ep.stats.would_block += 1;
                }
                return Err(e);
            }
        }
        Ok(ep.ring.try_reserve_write(max))
    }

    /// Publish the first `written` bytes of the last reservation.
    ///
    /// # Panics
    ///
    /// If `written` exceeds the reserved span.
    pub fn commit(&mut self, written: usize) {
        let ep = &mut self.0;
        ep.ring.commit_write(written);
        ep.published(written);
    }

    /// Free space in the buffer right now.
    pub fn available(&self) -> usize {
        self.0.ring.writable_len()
    }

    pub fn capacity(&self) -> usize {
        self.0.ring.capacity()
    }

    pub fn name(&self) -> &StreamName {
        &self.0.name
    }

    pub fn stats(&self) -> &StreamStats {
        &self.0.stats
    }

    pub fn report(&self) -> StatsReport {
        self.0.report()
    }

    pub fn snapshot(&self) -> HeaderSnapshot {
        self.0.ring.snapshot()
    }

    /// Handle that closes this writer from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.0.stop_handle()
    }

    /// Close the stream. The reader drains what was written, then sees end-of-stream.
    pub fn close(mut self) {
        self.0.shutdown();
    }
}

impl<S: WaitStrategy> io::Write for Writer<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Writer::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        // Bytes are visible to the reader as soon as `write` returns.
        Ok(())
    }
}

/// Reading end of a stream.
pub struct Reader<S: WaitStrategy>(Endpoint<S>);

impl<S: WaitStrategy> Reader<S> {
    /// Create the stream and attach as its reader.
    pub fn create(name: &StreamName, capacity: Capacity) -> StreamResult<Self> {
        OpenOptions::new()
            .create(true)
            .capacity(capacity)
            .reader(name)
    }

    /// Attach as the reader of an existing stream.
    pub fn open(name: &StreamName) -> StreamResult<Self> {
        OpenOptions::new().reader(name)
    }

    /// Attach as described by `config`, whose wait kind must be `S::KIND`.
    pub fn from_config(config: &StreamConfig) -> StreamResult<Self> {
        check_kind::<S>(config)?;
        OpenOptions::from_config(config).reader(&config.name)
    }

    /// Read at least one byte into `buf`.
    ///
    /// Returns `Ok(0)` at end-of-stream: the writer closed and every byte it
    /// wrote has been read, or this reader was stopped. No-Wait readers fail
    /// with `WouldBlock` when nothing is buffered.
    pub fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        let ep = &mut self.0;
        ep.stats.calls += 1;
        if buf.is_empty() {
            return Ok(0);
        }

        let deadline = ep.deadline();
        loop {
            if ep.ring.is_closed() {
                return Ok(0);
            }

            let n = ep.ring.try_read(buf);
            if n > 0 {
                ep.published(n);
                return Ok(n);
            }

            if ep.ring.peer_closed() {
                // The writer flags itself closed after its last publish.
                if ep.ring.readable_len() == 0 {
                    return Ok(0);
                }
                continue;
            }

            ep.wait_data(deadline)?;
        }
    }

    /// Fill `buf` completely.
    ///
    /// Fails with `Closed` if the stream ends first. Once some bytes have
    /// been taken, `WouldBlock` no longer ends the call.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> StreamResult<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => return Err(StreamError::Closed),
                Ok(n) => filled += n,
                Err(StreamError::WouldBlock) if filled > 0 => std::thread::yield_now(),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Borrow up to `max` contiguous buffered bytes without copying.
    ///
    /// The span stops at the end of the data area, so it may be shorter than
    /// [`Self::available`]. An empty span means end-of-stream. Fails with
    /// `WouldBlock` when nothing is buffered.
    pub fn try_reserve(&mut self, max: usize) -> StreamResult<&[u8]> {
        let ep = &mut self.0;
        ep.stats.calls += 1;
        if max > 0 && !ep.data_or_eof() {
            ep.check_peer()?;
            ep.stats.would_block += 1;
            return Err(StreamError::WouldBlock);
        }
        Ok(ep.reserve_read(max))
    }

    /// Like [`Self::try_reserve`], but waits per the strategy until at least
    /// one byte is buffered or the stream ends.
    pub fn wait_reserve(&mut self, max: usize) -> StreamResult<&[u8]> {
        let ep = &mut self.0;
        ep.stats.calls += 1;

        let deadline = ep.deadline();
        while max > 0 && !ep.data_or_eof() {
            ep.wait_data(deadline)?;
        }
        Ok(ep.reserve_read(max))
    }

    /// Release the first `read` bytes of the last reservation to the writer.
    ///
    /// # Panics
    ///
    /// If `read` exceeds the reserved span.
    pub fn commit(&mut self, read: usize) {
        let ep = &mut self.0;
        ep.ring.commit_read(read);
        ep.published(read);
    }

    /// Bytes buffered right now.
    pub fn available(&self) -> usize {
        self.0.ring.readable_len()
    }

    pub fn capacity(&self) -> usize {
        self.0.ring.capacity()
    }

    pub fn name(&self) -> &StreamName {
        &self.0.name
    }

    pub fn stats(&self) -> &StreamStats {
        &self.0.stats
    }

    pub fn report(&self) -> StatsReport {
        self.0.report()
    }

    pub fn snapshot(&self) -> HeaderSnapshot {
        self.0.ring.snapshot()
    }

    /// Handle that stops this reader from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.0.stop_handle()
    }

    /// Close the stream. A blocked writer fails with `Closed`.
    pub fn close(mut self) {
        self.0.shutdown();
    }
}

impl<S: WaitStrategy> io::Read for Reader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Reader::read(self, buf).map_err(io::Error::from)
    }
}

fn check_kind<S: WaitStrategy>(config: &StreamConfig) -> StreamResult<()> {
    if config.wait != S::KIND {
        return Err(HardValidationError::InvalidFieldValue {
            field: "wait",
            value: config.wait.to_string(),
            reason: format!("handle was built for {} waiting", S::KIND),
        }
        .into());
    }
    Ok(())
}

/// Closes one side of a stream from any thread.
///
/// The owning handle's in-flight or next call returns `Closed` (writer) or
/// end-of-stream (reader). The owning handle still releases the region when
/// it is dropped.
#[derive(Clone)]
pub struct StopHandle {
    region: Arc<SharedMemoryRegion>,
    role: Role,
    doorbell: Option<Arc<dyn Doorbell>>,
}

impl StopHandle {
    pub fn stop(&self) {
        // SAFETY: the region's header was validated when the handle attached
        let header = unsafe { StreamHeader::of(&self.region) };
        line_of(header, self.role).mark_closed();
        if let Some(doorbell) = &self.doorbell {
            wake_both(header, doorbell.as_ref());
        }
        tracing::debug!(name = %self.region.name(), role = %self.role, "Stop requested");
    }

    pub fn is_stopped(&self) -> bool {
        // SAFETY: as above
        let header = unsafe { StreamHeader::of(&self.region) };
        line_of(header, self.role).is_closed()
    }
}

impl std::fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopHandle")
            .field("name", &self.region.name())
            .field("role", &self.role)
            .finish()
    }
}
