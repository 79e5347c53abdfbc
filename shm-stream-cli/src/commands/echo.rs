// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shm-stream echo` command - Ping-pong server.
//!
//! Every byte read from the request stream is written back on the response
//! stream. Ends when the request writer closes.

use shm_stream_core::{
    Blocking, Light, NoWait, Reader, StatsReport, StopHandle, StreamError, WaitKind, WaitStrategy,
    Writer,
};

use super::{print_stats, supervise, write_all, PumpError, CHUNK};
use crate::args::EchoPair;

pub async fn execute(pair: EchoPair) -> Result<(), Box<dyn std::error::Error>> {
    match pair.request.wait {
        WaitKind::Blocking => run::<Blocking>(pair).await,
        WaitKind::Light => run::<Light>(pair).await,
        WaitKind::NoWait => run::<NoWait>(pair).await,
    }
}

async fn run<S: WaitStrategy>(pair: EchoPair) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        request = %pair.request.name,
        response = %pair.response.name,
        wait = %pair.request.wait,
        "Starting echo server"
    );

    let (requests, responses) = tokio::task::spawn_blocking(move || {
        let requests = Reader::<S>::from_config(&pair.request)?;
        let responses = Writer::<S>::from_config(&pair.response)?;
        Ok::<_, StreamError>((requests, responses))
    })
    .await??;

    println!("✓ Echoing {} → {}", requests.name(), responses.name());

    let stops = [requests.stop_handle(), responses.stop_handle()];
    let pump = {
        let stops = stops.clone();
        tokio::task::spawn_blocking(move || pump(requests, responses, stops))
    };

    let (request_report, response_report) = supervise(pump, || {
        for stop in &stops {
            stop.stop();
        }
    })
    .await?;

    println!("✓ Echoed {} bytes", response_report.stats.bytes);
    print_stats(&request_report);
    print_stats(&response_report);
    Ok(())
}

fn pump<S: WaitStrategy>(
    mut requests: Reader<S>,
    mut responses: Writer<S>,
    stops: [StopHandle; 2],
) -> Result<(StatsReport, StatsReport), PumpError> {
    let mut buf = vec![0u8; CHUNK];

    let outcome = loop {
        match requests.read(&mut buf) {
            Ok(0) => break Ok(()),
            Ok(n) => {
                if let Err(e) = write_all(&mut responses, &buf[..n]) {
                    break Err(e);
                }
            }
            Err(StreamError::WouldBlock) if S::KIND == WaitKind::NoWait => {
                std::thread::yield_now()
            }
            Err(e) => break Err(e),
        }
    };

    let stopped = stops.iter().any(StopHandle::is_stopped);
    let reports = (requests.report(), responses.report());
    requests.close();
    responses.close();

    match outcome {
        Ok(()) => Ok(reports),
        Err(StreamError::Closed) if stopped => Ok(reports),
        Err(e) => Err(e.into()),
    }
}
