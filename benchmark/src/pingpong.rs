// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Ping-pong round trips over a pair of streams.
//!
//! The server owns both streams: it reads requests and writes every byte
//! back on the response stream. A client sends a payload, then reads the
//! same number of bytes back, so one sample covers two stream hops.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use shm_stream_core::{
    Capacity, HardValidationError, OpenOptions, Reader, StopHandle, StreamError, StreamName,
    StreamResult, WaitStrategy, Writer,
};

/// How long a client waits for the server's streams to appear.
const CONNECT_RETRY: Duration = Duration::from_secs(5);

/// Echo server running on its own thread.
pub struct EchoServer {
    stops: [StopHandle; 2],
    thread: Option<JoinHandle<StreamResult<u64>>>,
}

impl EchoServer {
    /// Create both streams and start echoing.
    pub fn spawn<S: WaitStrategy>(
        request: &StreamName,
        response: &StreamName,
        capacity: Capacity,
    ) -> StreamResult<Self> {
        let mut requests = Reader::<S>::create(request, capacity)?;
        let mut responses = Writer::<S>::create(response, capacity)?;
        let stops = [requests.stop_handle(), responses.stop_handle()];

        let thread = thread::spawn(move || {
            let mut buf = vec![0u8; capacity.as_usize()];
            let mut echoed = 0u64;
            loop {
                let n = match requests.read(&mut buf) {
                    Ok(0) => return Ok(echoed),
                    Ok(n) => n,
                    Err(StreamError::WouldBlock) => {
                        thread::yield_now();
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                match send_all(&mut responses, &buf[..n]) {
                    Ok(()) => echoed += n as u64,
                    Err(StreamError::Closed) => return Ok(echoed),
                    Err(e) => return Err(e),
                }
            }
        });

        Ok(Self {
            stops,
            thread: Some(thread),
        })
    }

    /// Stop the server and return how many bytes it echoed.
    pub fn shutdown(mut self) -> StreamResult<u64> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> StreamResult<u64> {
        for stop in &self.stops {
            stop.stop();
        }
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| StreamError::PeerGone {
                    reason: "echo server thread panicked".to_string(),
                })?,
            None => Ok(0),
        }
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        if let Err(e) = self.stop_and_join() {
            eprintln!("echo server failed: {}", e);
        }
    }
}

/// Client side of a ping-pong pair.
pub struct PingPongClient<S: WaitStrategy> {
    requests: Writer<S>,
    responses: Reader<S>,
    scratch: Vec<u8>,
}

impl<S: WaitStrategy> PingPongClient<S> {
    /// Attach to a running [`EchoServer`].
    pub fn connect(request: &StreamName, response: &StreamName) -> StreamResult<Self> {
        let options = OpenOptions::new().open_retry(CONNECT_RETRY);
        let requests = options.writer::<S>(request)?;
        let responses = options.reader::<S>(response)?;
        let scratch = vec![0u8; responses.capacity()];
        Ok(Self {
            requests,
            responses,
            scratch,
        })
    }

    /// Send `payload` and wait until it has come back in full.
    ///
    /// The payload must fit in the stream; larger payloads could leave both
    /// sides waiting on full buffers.
    pub fn round_trip(&mut self, payload: &[u8]) -> StreamResult<()> {
        if payload.len() > self.requests.capacity() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "payload",
                value: payload.len().to_string(),
                reason: format!(
                    "must not exceed the stream capacity of {} bytes",
                    self.requests.capacity()
                ),
            }
            .into());
        }

        send_all(&mut self.requests, payload)?;

        if self.scratch.len() < payload.len() {
            self.scratch.resize(payload.len(), 0);
        }
        let mut filled = 0;
        while filled < payload.len() {
            match self.responses.read(&mut self.scratch[filled..payload.len()]) {
                Ok(0) => return Err(StreamError::Closed),
                Ok(n) => filled += n,
                Err(StreamError::WouldBlock) => thread::yield_now(),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Bytes the last round trip brought back.
    pub fn last_response(&self, len: usize) -> &[u8] {
        &self.scratch[..len.min(self.scratch.len())]
    }
}

/// Write all of `bytes`, yielding whenever the stream reports `WouldBlock`.
pub fn send_all<S: WaitStrategy>(writer: &mut Writer<S>, mut bytes: &[u8]) -> StreamResult<()> {
    while !bytes.is_empty() {
        match writer.write(bytes) {
            Ok(n) => bytes = &bytes[n..],
            Err(StreamError::WouldBlock) => thread::yield_now(),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shm_stream_core::{Blocking, Light, NoWait};

    fn names(tag: &str) -> (StreamName, StreamName) {
        let pid = std::process::id();
        (
            StreamName::new(format!("pp_{}_req_{}", tag, pid)).unwrap(),
            StreamName::new(format!("pp_{}_resp_{}", tag, pid)).unwrap(),
        )
    }

    fn exercise<S: WaitStrategy>(tag: &str) {
        let (request, response) = names(tag);
        let capacity = Capacity::new(4096).unwrap();
        let server = EchoServer::spawn::<S>(&request, &response, capacity).unwrap();
        let mut client = PingPongClient::<S>::connect(&request, &response).unwrap();

        let payload: Vec<u8> = (0..1000u32).map(|i| (i % 256) as u8).collect();
        for _ in 0..50 {
            client.round_trip(&payload).unwrap();
        }
        assert_eq!(client.last_response(payload.len()), &payload[..]);

        drop(client);
        assert_eq!(server.shutdown().unwrap(), 50 * 1000);
    }

    #[test]
    fn test_ping_pong_blocking() {
        exercise::<Blocking>("blocking");
    }

    #[test]
    fn test_ping_pong_light() {
        exercise::<Light>("light");
    }

    #[test]
    fn test_ping_pong_no_wait() {
        exercise::<NoWait>("no_wait");
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let (request, response) = names("oversized");
        let capacity = Capacity::new(64).unwrap();
        let _server = EchoServer::spawn::<Light>(&request, &response, capacity).unwrap();
        let mut client = PingPongClient::<Light>::connect(&request, &response).unwrap();
        assert!(client.round_trip(&[0u8; 65]).is_err());
    }
}
