// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Wait strategies: what a handle does when the ring is full or empty.
//!
//! A strategy is chosen by type parameter on [`crate::Writer`] and
//! [`crate::Reader`], so the transfer loop is monomorphized per strategy.
//! Each call to `wait_for_*` waits at most one slice and reports a
//! [`WaitSlice`]; the facade re-checks the ring and the peer between slices.

mod blocking;
mod light;
mod no_wait;

pub use blocking::Blocking;
pub(crate) use blocking::wake_both;
pub use light::Light;
pub use no_wait::NoWait;

use std::sync::Arc;
use std::time::Instant;

use crate::shm::doorbell::Doorbell;
use crate::shm::ring_buffer::RingBuffer;
use crate::types::WaitKind;

/// Result of one wait slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitSlice {
    /// The ring may have changed; retry the transfer.
    Retry,
    /// The slice passed without change; verify the peer before waiting again.
    Idle,
    /// Stop waiting and report `WouldBlock`. Verify the peer first if `check_peer`.
    Expired { check_peer: bool },
}

/// Construction inputs shared by all strategies.
#[derive(Clone, Default)]
pub struct WaitOptions {
    /// Overrides the blocking strategy's futex doorbell.
    pub doorbell: Option<Arc<dyn Doorbell>>,
}

impl std::fmt::Debug for WaitOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitOptions")
            .field("doorbell", &self.doorbell.is_some())
            .finish()
    }
}

/// Suspension policy plugged into a stream handle.
pub trait WaitStrategy: Send + Sized + 'static {
    /// Tag stored in the stream header; both sides must agree.
    const KIND: WaitKind;

    fn new(options: &WaitOptions) -> Self;

    /// Writer side: wait for the reader to release space.
    fn wait_for_space(&mut self, ring: &RingBuffer, deadline: Option<Instant>) -> WaitSlice;

    /// Reader side: wait for the writer to publish data.
    fn wait_for_data(&mut self, ring: &RingBuffer, deadline: Option<Instant>) -> WaitSlice;

    /// Writer side, after publishing `write_cursor`. Returns true if a sleeper was woken.
    fn notify_data_published(&mut self, ring: &RingBuffer) -> bool;

    /// Reader side, after publishing `read_cursor`. Returns true if a sleeper was woken.
    fn notify_space_released(&mut self, ring: &RingBuffer) -> bool;

    /// Doorbell to ring on close, if this strategy sleeps on one.
    fn doorbell(&self) -> Option<Arc<dyn Doorbell>>;
}

/// Whether `deadline` has passed.
pub(crate) fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}
