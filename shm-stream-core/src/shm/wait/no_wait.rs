// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! No-Wait strategy: never suspend.

use std::sync::Arc;
use std::time::Instant;

use super::{WaitOptions, WaitSlice, WaitStrategy};
use crate::shm::doorbell::Doorbell;
use crate::shm::ring_buffer::RingBuffer;
use crate::types::WaitKind;

/// Consecutive misses between peer liveness checks.
const CHECK_PEER_EVERY: u32 = 1 << 10;

/// Return `WouldBlock` as soon as no progress is possible.
#[derive(Debug, Default)]
pub struct NoWait {
    misses: u32,
}

impl NoWait {
    fn miss(&mut self) -> WaitSlice {
        let check_peer = self.misses % CHECK_PEER_EVERY == 0;
        self.misses = self.misses.wrapping_add(1);
        WaitSlice::Expired { check_peer }
    }
}

impl WaitStrategy for NoWait {
    const KIND: WaitKind = WaitKind::NoWait;

    fn new(_options: &WaitOptions) -> Self {
        Self::default()
    }

    fn wait_for_space(&mut self, _ring: &RingBuffer, _deadline: Option<Instant>) -> WaitSlice {
        self.miss()
    }

    fn wait_for_data(&mut self, _ring: &RingBuffer, _deadline: Option<Instant>) -> WaitSlice {
        self.miss()
    }

    fn notify_data_published(&mut self, _ring: &RingBuffer) -> bool {
        self.misses = 0;
        false
    }

    fn notify_space_released(&mut self, _ring: &RingBuffer) -> bool {
        self.misses = 0;
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

    #[test]
    fn test_misses_check_peer_periodically() {
        let (_writer, reader) = pair(8, WaitKind::NoWait);
        let mut strategy = NoWait::default();

        assert_eq!(
            strategy.wait_for_data(&reader, None),
            WaitSlice::Expired { check_peer: true }
        );
        for _ in 1..CHECK_PEER_EVERY {
            assert_eq!(
                strategy.wait_for_data(&reader, None),
                WaitSlice::Expired { check_peer: false }
            );
        }
        assert_eq!(
            strategy.wait_for_data(&reader, None),
            WaitSlice::Expired { check_peer: true }
        );
    }
}
