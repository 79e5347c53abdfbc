// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Blocking strategy: sleep on the peer's sequence word until woken.
//!
//! Lost-wakeup protocol, all on SeqCst:
//! - waiter: `waiters += 1`, snapshot `seq`, re-check the ring, futex-wait
//!   on the snapshot, `waiters -= 1`;
//! - publisher: store cursor (release), `seq += 1`, wake only if `waiters > 0`.
//!
//! Either the waiter's re-check observes the new cursor, or the publisher
//! observes the registered waiter and the futex sees a changed word.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{expired, WaitOptions, WaitSlice, WaitStrategy};
use crate::shm::doorbell::{Doorbell, FutexDoorbell, WaitOutcome};
use crate::shm::layout::{RoleLine, StreamHeader};
use crate::shm::ring_buffer::RingBuffer;
use crate::types::WaitKind;

/// Upper bound on one sleep, so peer liveness is re-checked.
pub(crate) const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Sleep on an OS wait primitive until the peer signals progress.
pub struct Blocking {
    doorbell: Arc<dyn Doorbell>,
}

impl Blocking {
    fn sleep_on(
        &self,
        line: &RoleLine,
        deadline: Option<Instant>,
        ready: impl Fn() -> bool,
    ) -> WaitSlice {
        line.waiters.fetch_add(1, Ordering::SeqCst);
        let seq = line.seq.load(Ordering::SeqCst);

        let slice = if ready() {
            WaitSlice::Retry
        } else {
            let timeout = match deadline {
                Some(d) => d.saturating_duration_since(Instant::now()).min(WAIT_SLICE),
                None => WAIT_SLICE,
            };

            if timeout.is_zero() {
                WaitSlice::Expired { check_peer: true }
            } else {
                tracing::trace!(seq, timeout_us = timeout.as_micros() as u64, "Sleeping");
                match self.doorbell.wait(&line.seq, seq, timeout) {
                    WaitOutcome::Woken => WaitSlice::Retry,
                    WaitOutcome::TimedOut | WaitOutcome::Interrupted if expired(deadline) => {
                        WaitSlice::Expired { check_peer: true }
                    }
                    WaitOutcome::TimedOut | WaitOutcome::Interrupted => WaitSlice::Idle,
                }
            }
        };

        line.waiters.fetch_sub(1, Ordering::SeqCst);
        slice
    }

    fn signal(&self, line: &RoleLine) -> bool {
        line.seq.fetch_add(1, Ordering::SeqCst);
        if line.waiters.load(Ordering::SeqCst) == 0 {
            return false;
        }
        self.doorbell.wake(&line.seq);
        tracing::trace!("Woke peer");
        true
    }
}

impl WaitStrategy for Blocking {
    const KIND: WaitKind = WaitKind::Blocking;

    fn new(options: &WaitOptions) -> Self {
        Self {
            doorbell: options
                .doorbell
                .clone()
                .unwrap_or_else(|| Arc::new(FutexDoorbell) as Arc<dyn Doorbell>),
        }
    }

    fn wait_for_space(&mut self, ring: &RingBuffer, deadline: Option<Instant>) -> WaitSlice {
        // Space is released by the reader, which bumps its own line.
        self.sleep_on(ring.peer_line(), deadline, || {
            ring.writable_len() > 0 || ring.peer_closed() || ring.is_closed()
        })
    }

    fn wait_for_data(&mut self, ring: &RingBuffer, deadline: Option<Instant>) -> WaitSlice {
        self.sleep_on(ring.peer_line(), deadline, || {
            ring.readable_len() > 0 || ring.peer_closed() || ring.is_closed()
        })
    }

    fn notify_data_published(&mut self, ring: &RingBuffer) -> bool {
        self.signal(ring.own_line())
    }

    fn notify_space_released(&mut self, ring: &RingBuffer) -> bool {
        self.signal(ring.own_line())
    }

    fn doorbell(&self) -> Option<Arc<dyn Doorbell>> {
        Some(Arc::clone(&self.doorbell))
    }
}

/// Bump both sequence words and wake every sleeper on them.
///
/// Used on close and stop, where the sleeper may be the peer or a thread of
/// this same handle.
pub(crate) fn wake_both(header: &StreamHeader, doorbell: &dyn Doorbell) {
    for line in [&header.writer, &header.reader] {
        line.seq.fetch_add(1, Ordering::SeqCst);
        doorbell.wake(&line.seq);
    }
}
