// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Cross-process sleep/wake primitive on a 32-bit word in shared memory.
//!
//! The blocking strategy sleeps on a role's `seq` word and is woken by the
//! peer bumping it. On Linux this is a shared (non-private) futex so the
//! wake reaches another process. `PollingDoorbell` re-checks the word on a
//! short sleep and is used where futexes are unavailable and in tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// Why a [`Doorbell::wait`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The word no longer held the expected value, or a wake arrived.
    Woken,
    /// The timeout elapsed.
    TimedOut,
    /// Interrupted by a signal.
    Interrupted,
}

/// Sleep until a shared word changes.
///
/// Implementations must return immediately if `word != expected` at the
/// time of the call, so that a wake issued between the caller's snapshot
/// and the sleep is never lost.
pub trait Doorbell: Send + Sync {
    /// Block while `word == expected`, for at most `timeout`.
    fn wait(&self, word: &AtomicU32, expected: u32, timeout: Duration) -> WaitOutcome;

    /// Wake every thread sleeping on `word`. Returns how many were woken, if known.
    fn wake(&self, word: &AtomicU32) -> usize;
}

/// Futex-backed doorbell shared across processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct FutexDoorbell;

#[cfg(target_os = "linux")]
impl Doorbell for FutexDoorbell {
    fn wait(&self, word: &AtomicU32, expected: u32, timeout: Duration) -> WaitOutcome {
        let ts = libc::timespec {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_nsec: timeout.subsec_nanos() as libc::c_long,
        };

        // SAFETY: `word` is a valid, aligned u32 in memory mapped by this process
        let ret = unsafe {
            libc::syscall(
                libc::SYS_futex,
                word.as_ptr(),
                libc::FUTEX_WAIT,
                expected,
                &ts as *const libc::timespec,
                std::ptr::null::<u32>(),
                0u32,
            )
        };

        if ret == 0 {
            return WaitOutcome::Woken;
        }

        match std::io::Error::last_os_error().raw_os_error() {
            Some(libc::ETIMEDOUT) => WaitOutcome::TimedOut,
            Some(libc::EINTR) => WaitOutcome::Interrupted,
            // EAGAIN: the word had already changed.
            _ => WaitOutcome::Woken,
        }
    }

    fn wake(&self, word: &AtomicU32) -> usize {
        // SAFETY: as above; FUTEX_WAKE never dereferences beyond the word
        let ret = unsafe {
            libc::syscall(
                libc::SYS_futex,
                word.as_ptr(),
                libc::FUTEX_WAKE,
                i32::MAX,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            )
        };

        if ret < 0 {
            tracing::warn!(
                error = %std::io::Error::last_os_error(),
                "futex wake failed"
            );
            return 0;
        }
        ret as usize
    }
}

#[cfg(not(target_os = "linux"))]
impl Doorbell for FutexDoorbell {
    fn wait(&self, word: &AtomicU32, expected: u32, timeout: Duration) -> WaitOutcome {
        PollingDoorbell::default().wait(word, expected, timeout)
    }

    fn wake(&self, word: &AtomicU32) -> usize {
        PollingDoorbell::default().wake(word)
    }
}

/// Doorbell that polls the word on a fixed interval.
#[derive(Debug, Clone, Copy)]
pub struct PollingDoorbell {
    interval: Duration,
}

impl PollingDoorbell {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for PollingDoorbell {
    fn default() -> Self {
        Self::new(Duration::from_micros(50))
    }
}

impl Doorbell for PollingDoorbell {
    fn wait(&self, word: &AtomicU32, expected: u32, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        loop {
            if word.load(Ordering::Acquire) != expected {
                return WaitOutcome::Woken;
            }
            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::TimedOut;
            }
            std::thread::sleep(self.interval.min(deadline - now));
        }
    }

    fn wake(&self, _word: &AtomicU32) -> usize {
        // Sleepers notice the changed word on their next poll.
        0
    }
}
