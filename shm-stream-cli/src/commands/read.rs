// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shm-stream read` command - Copy a stream to stdout.

use std::io::{self, Write};

use shm_stream_core::{
    Blocking, Light, NoWait, Reader, StatsReport, StreamConfig, StreamError, WaitKind,
    WaitStrategy,
};

use super::{print_stats, supervise, PumpError, CHUNK};
use crate::pin;

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
        "Opening stream for reading"
    );

    let pin_cpu = config.pin_cpu;
    let reader = tokio::task::spawn_blocking(move || Reader::<S>::from_config(&config)).await??;
    let stop = reader.stop_handle();

    let pump = tokio::task::spawn_blocking(move || pump(reader, pin_cpu));
    let report = supervise(pump, || stop.stop()).await?;

    tracing::info!(bytes = report.stats.bytes, "Reader finished");
    if show_stats {
        print_stats(&report);
    }
    Ok(())
}

/// Copy until end-of-stream, flushing after every chunk.
fn pump<S: WaitStrategy>(
    mut reader: Reader<S>,
    pin_cpu: Option<usize>,
) -> Result<StatsReport, PumpError> {
    if let Some(cpu) = pin_cpu {
        pin::pin_current_thread(cpu)?;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut buf = vec![0u8; CHUNK];

    let outcome = loop {
        match reader.read(&mut buf) {
            Ok(0) => break Ok(()),
            Ok(n) => {
                if let Err(e) = out.write_all(&buf[..n]).and_then(|()| out.flush()) {
                    break Err(PumpError::Stdout(e));
                }
            }
            Err(StreamError::WouldBlock) if S::KIND == WaitKind::NoWait => {
                std::thread::yield_now()
            }
            Err(e) => break Err(e.into()),
        }
    };

    let report = reader.report();
    reader.close();
    outcome.map(|()| report)
}
