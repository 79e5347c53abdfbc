// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shm-stream write` command - Copy stdin into a stream.
//!
//! Stdin is read on a plain thread and handed to the transfer thread over a
//! bounded channel. End of input closes the stream; the reader then drains
//! what is buffered and sees end-of-stream.

use std::io::{self, Read};
use std::thread;

use shm_stream_core::{
    Blocking, Light, NoWait, StatsReport, StopHandle, StreamConfig, StreamError, WaitKind,
    WaitStrategy, Writer,
};
use tokio::sync::mpsc;

use super::{print_stats, supervise, write_all, PumpError, CHUNK};
use crate::pin;

/// Chunks buffered between the stdin thread and the transfer thread.
const QUEUE_DEPTH: usize = 16;

/// An empty chunk marks end of input.
type Chunk = io::Result<Vec<u8>>;

pub async fn execute(
    config: StreamConfig,
    show_stats: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match config.wait {
        WaitKind::Blocking => run::<Blocking>(config, show_stats).await,
        WaitKind::Light => run::<Light>(config, show_stats).await,
        WaitKind::NoWait => run::<NoWait>(config, show_stats).await,
    }
}

async fn run<S: WaitStrategy>(
    config: StreamConfig,
    show_stats: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        name = %config.name,
        wait = %config.wait,
        create = config.create,
        "Opening stream for writing"
    );

    let pin_cpu = config.pin_cpu;
    let writer = tokio::task::spawn_blocking(move || Writer::<S>::from_config(&config)).await??;
    let stop = writer.stop_handle();

    let (tx, rx) = mpsc::channel::<Chunk>(QUEUE_DEPTH);

    // A plain thread, so a read blocked on a terminal never holds up exit
    let feeder = tx.clone();
    thread::spawn(move || feed_stdin(feeder));

    let pump = {
        let stop = stop.clone();
        tokio::task::spawn_blocking(move || pump(writer, rx, stop, pin_cpu))
    };

    let report = supervise(pump, || {
        stop.stop();
        // Wake a transfer thread that is waiting on stdin
        let _ = tx.try_send(Ok(Vec::new()));
    })
    .await?;

    tracing::info!(bytes = report.stats.bytes, "Writer finished");
    if show_stats {
        print_stats(&report);
    }
    Ok(())
}

fn feed_stdin(tx: mpsc::Sender<Chunk>) {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    loop {
        let mut buf = vec![0u8; CHUNK];
        let chunk = match input.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => Err(e),
        };

        let last = !matches!(&chunk, Ok(bytes) if !bytes.is_empty());
        if tx.blocking_send(chunk).is_err() || last {
            return;
        }
    }
}

fn pump<S: WaitStrategy>(
    mut writer: Writer<S>,
    mut rx: mpsc::Receiver<Chunk>,
    stop: StopHandle,
    pin_cpu: Option<usize>,
) -> Result<StatsReport, PumpError> {
    if let Some(cpu) = pin_cpu {
        pin::pin_current_thread(cpu)?;
    }

    let outcome = loop {
        match rx.blocking_recv() {
            Some(Ok(chunk)) if chunk.is_empty() => break Ok(()),
            Some(Ok(chunk)) => {
                if let Err(e) = write_all(&mut writer, &chunk) {
                    break Err(e);
                }
            }
            Some(Err(e)) => {
                writer.close();
                return Err(PumpError::Stdin(e));
            }
            None => break Ok(()),
        }
    };

    let stopped = stop.is_stopped();
    let report = writer.report();
    writer.close();

    match outcome {
        Ok(()) => Ok(report),
        Err(StreamError::Closed) if stopped => Ok(report),
        Err(e) => Err(e.into()),
    }
}
