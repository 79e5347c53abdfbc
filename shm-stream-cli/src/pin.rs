// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CPU pinning for the thread that moves stream bytes.
//!
//! Spinning strategies behave best when each side owns a core; pinning the
//! writer and reader to different CPUs keeps them from stealing each
//! other's time slice.

use nix::sched::{sched_setaffinity, CpuSet};
use nix::unistd::Pid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PinError {
    #[error("CPU {cpu} is out of range, this machine has {available} logical CPUs")]
    OutOfRange { cpu: usize, available: usize },

    #[error("sched_setaffinity failed: {0}")]
    Affinity(#[from] nix::Error),
}

/// Pin the calling thread to `cpu`.
pub fn pin_current_thread(cpu: usize) -> Result<(), PinError> {
    let available = num_cpus::get();
    if cpu >= available {
        return Err(PinError::OutOfRange { cpu, available });
    }

    let mut cpuset = CpuSet::new();
    cpuset.set(cpu)?;
    // Pid 0 is the calling thread
    sched_setaffinity(Pid::from_raw(0), &cpuset)?;

    tracing::debug!(cpu = cpu, "Transfer thread pinned");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_rejected() {
        let available = num_cpus::get();
        assert!(matches!(
            pin_current_thread(available),
            Err(PinError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_pin_to_cpu_zero() {
        // May fail without permission in restricted environments, but must not panic
        std::thread::spawn(|| match pin_current_thread(0) {
            Ok(()) => println!("Pinned to CPU 0"),
            Err(e) => println!("Pin failed (expected in restricted environments): {}", e),
        })
        .join()
        .unwrap();
    }
}
