// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Background reader for one-way throughput runs.

use std::thread::{self, JoinHandle};

use shm_stream_core::{
    Capacity, Reader, StopHandle, StreamError, StreamName, StreamResult, WaitStrategy,
};

/// Creates a stream as its reader and discards everything written to it.
pub struct Drain {
    stop: StopHandle,
    thread: Option<JoinHandle<StreamResult<u64>>>,
}

impl Drain {
    pub fn spawn<S: WaitStrategy>(name: &StreamName, capacity: Capacity) -> StreamResult<Self> {
        let mut reader = Reader::<S>::create(name, capacity)?;
        let stop = reader.stop_handle();

        let thread = thread::spawn(move || {
            let mut buf = vec![0u8; capacity.as_usize()];
            let mut total = 0u64;
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => return Ok(total),
                    Ok(n) => total += n as u64,
                    Err(StreamError::WouldBlock) => thread::yield_now(),
                    Err(e) => return Err(e),
                }
            }
        });

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Wait for the writer to close and return the bytes received.
    pub fn finish(mut self) -> StreamResult<u64> {
        self.join()
    }

    fn join(&mut self) -> StreamResult<u64> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| StreamError::PeerGone {
                reason: "drain thread panicked".to_string(),
            })?,
            None => Ok(0),
        }
    }
}

impl Drop for Drain {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop.stop();
            let _ = self.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pingpong::send_all;
    use shm_stream_core::{Light, Writer};

    #[test]
    fn test_drain_counts_bytes() {
        let name = StreamName::new(format!("drain_{}", std::process::id())).unwrap();
        let drain = Drain::spawn::<Light>(&name, Capacity::new(256).unwrap()).unwrap();

        let mut writer = Writer::<Light>::open(&name).unwrap();
        for _ in 0..100 {
            send_all(&mut writer, &[0xAB; 100]).unwrap();
        }
        writer.close();

        assert_eq!(drain.finish().unwrap(), 10_000);
    }
}
