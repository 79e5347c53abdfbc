// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

pub mod echo;
pub mod info;
pub mod read;
pub mod remove;
pub mod validate;
pub mod write;

use shm_stream_core::{StatsReport, StreamError, StreamResult, WaitKind, WaitStrategy, Writer};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::pin::PinError;
use crate::signal;

/// Chunk size for stdin/stdout copies.
pub(crate) const CHUNK: usize = 64 * 1024;

/// Failure of a transfer thread.
#[derive(Debug, Error)]
pub enum PumpError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Pin(#[from] PinError),

    #[error("stdin: {0}")]
    Stdin(std::io::Error),

    #[error("stdout: {0}")]
    Stdout(std::io::Error),
}

/// Wait for a transfer thread, stopping it on SIGINT/SIGTERM.
///
/// `on_stop` must make the thread return promptly, normally by calling
/// `StopHandle::stop` on every handle it owns.
pub(crate) async fn supervise<T>(
    mut pump: JoinHandle<Result<T, PumpError>>,
    on_stop: impl FnOnce(),
) -> Result<T, Box<dyn std::error::Error>> {
    let outcome = tokio::select! {
        res = &mut pump => res?,
        _ = signal::shutdown() => {
            on_stop();
            pump.await?
        }
    };
    Ok(outcome?)
}

/// Write every byte of `bytes`, backing off on No-Wait's `WouldBlock`.
///
/// A `WouldBlock` from a waiting strategy means its timeout expired and is
/// returned to the caller.
pub(crate) fn write_all<S: WaitStrategy>(
    writer: &mut Writer<S>,
    mut bytes: &[u8],
) -> StreamResult<()> {
    while !bytes.is_empty() {
        match writer.write(bytes) {
            Ok(n) => bytes = &bytes[n..],
            Err(StreamError::WouldBlock) if S::KIND == WaitKind::NoWait => {
                std::thread::yield_now()
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Print a stats report as one JSON line on stderr.
pub(crate) fn print_stats(report: &StatsReport) {
    match serde_json::to_string(report) {
        Ok(json) => eprintln!("{}", json),
        Err(e) => tracing::warn!(error = %e, "Failed to encode stats"),
    }
}
