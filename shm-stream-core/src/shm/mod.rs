// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared Memory IPC module.
//!
//! Byte-stream transport between two processes over POSIX shared memory.
//! Provides the region manager, the header layout, the lock-free ring and
//! the wait strategies layered on top of it.

mod doorbell;
mod layout;
mod region;
mod ring_buffer;
pub mod wait;

pub use doorbell::{Doorbell, FutexDoorbell, PollingDoorbell, WaitOutcome};
pub use layout::{HeaderSnapshot, RoleSnapshot, RoleState, HEADER_SIZE, LAYOUT_VERSION, MAGIC};
pub use region::SharedMemoryRegion;
pub use ring_buffer::{PeerStatus, RingBuffer, Role};
pub use wait::{Blocking, Light, NoWait, WaitOptions, WaitSlice, WaitStrategy};

pub(crate) use layout::StreamHeader;
pub(crate) use ring_buffer::{line_of, INIT_GRACE};
pub(crate) use wait::wake_both;
