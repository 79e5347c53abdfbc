// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Light strategy: busy-poll the peer's cursor.
//!
//! No syscalls on the hot path. Publishers never signal. Best paired with a
//! pinned CPU per side.

use std::sync::Arc;
use std::time::Instant;

use super::{expired, WaitOptions, WaitSlice, WaitStrategy};
use crate::shm::doorbell::Doorbell;
use crate::shm::ring_buffer::RingBuffer;
use crate::types::WaitKind;

/// Spins per slice; the facade re-checks peer liveness in between.
const SPINS_PER_SLICE: u32 = 1 << 14;

/// After this many spins in a slice, yield the CPU between polls.
const YIELD_AFTER: u32 = 1 << 10;

/// Busy-poll the cursors without OS involvement.
#[derive(Debug, Default)]
pub struct Light;

impl Light {
    fn spin(&self, deadline: Option<Instant>, ready: impl Fn() -> bool) -> WaitSlice {
        for i in 0..SPINS_PER_SLICE {
            if ready() {
                return WaitSlice::Retry;
            }
            if i < YIELD_AFTER {
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
            if i % YIELD_AFTER == YIELD_AFTER - 1 && expired(deadline) {
                return WaitSlice::Expired { check_peer: true };
            }
        }
        if expired(deadline) {
            WaitSlice::Expired { check_peer: true }
        } else {
            WaitSlice::Idle
        }
    }
}

impl WaitStrategy for Light {
    const KIND: WaitKind = WaitKind::Light;

    fn new(_options: &WaitOptions) -> Self {
        Self
    }

    fn wait_for_space(&mut self, ring: &RingBuffer, deadline: Option<Instant>) -> WaitSlice {
        self.spin(deadline, || {
            ring.writable_len() > 0 || ring.peer_closed() || ring.is_closed()
        })
    }

    fn wait_for_data(&mut self, ring: &RingBuffer, deadline: Option<Instant>) -> WaitSlice {
        self.spin(deadline, || {
            ring.readable_len() > 0 || ring.peer_closed() || ring.is_closed()
        })
    }

    fn notify_data_published(&mut self, _ring: &RingBuffer) -> bool {
        false
    }

    fn notify_space_released(&mut self, _ring: &RingBuffer) -> bool {
        false
    }

    fn doorbell(&self) -> Option<Arc<dyn Doorbell>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shm::ring_buffer::test_support::pair;
    use std::time::Duration;

    #[test]
    fn test_spin_sees_published_bytes() {
        let (mut writer, reader) = pair(8, WaitKind::Light);
        let mut light = Light;

        let spinner = std::thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(5);
            loop {
                match light.wait_for_data(&reader, Some(deadline)) {
                    WaitSlice::Retry => return reader.readable_len(),
                    WaitSlice::Idle => continue,
                    WaitSlice::Expired { .. } => return 0,
                }
            }
        });

        std::thread::sleep(Duration::from_millis(5));
        writer.try_write(b"abc");
        assert_eq!(spinner.join().unwrap(), 3);
    }

    #[test]
    fn test_full_ring_idles_then_expires() {
        let (mut writer, _reader) = pair(4, WaitKind::Light);
        writer.try_write(b"full");
        let mut light = Light;

        let slice = light.wait_for_space(&writer, None);
        assert_eq!(slice, WaitSlice::Idle);

        let deadline = Instant::now() + Duration::from_millis(1);
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(
            light.wait_for_space(&writer, Some(deadline)),
            WaitSlice::Expired { check_peer: true }
        );
    }
}
