// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Ping-pong round-trip benchmarks.
//!
//! One iteration sends a payload to an echo server over one stream and
//! reads it back over a second stream.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shm_stream_benchmark::{EchoServer, PingPongClient};
use shm_stream_core::{Blocking, Capacity, Light, NoWait, StreamName, WaitStrategy};
use std::time::Duration;

/// Payload sizes to benchmark (in bytes).
const PAYLOAD_SIZES: &[usize] = &[64, 1024, 16384, 65536];

/// Capacity of both streams.
const CAPACITY: u64 = 1024 * 1024;

fn bench_strategy<S: WaitStrategy>(c: &mut Criterion, wait: &str) {
    let mut group = c.benchmark_group(format!("ping_pong_{}", wait));
    group.measurement_time(Duration::from_secs(5));

    for &size in PAYLOAD_SIZES {
        // Request and response
        group.throughput(Throughput::Bytes(size as u64 * 2));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let pid = std::process::id();
            let request = StreamName::new(format!("bench_pp_{}_{}_req_{}", wait, size, pid))
                .expect("valid stream name");
            let response = StreamName::new(format!("bench_pp_{}_{}_resp_{}", wait, size, pid))
                .expect("valid stream name");
            let capacity = Capacity::new(CAPACITY).expect("valid capacity");

            let server = EchoServer::spawn::<S>(&request, &response, capacity)
                .expect("Failed to start echo server");
            let mut client = PingPongClient::<S>::connect(&request, &response)
                .expect("Failed to connect client");
            let payload = vec![0xABu8; size];

            b.iter(|| {
                client
                    .round_trip(black_box(&payload))
                    .expect("Round trip failed");
            });

            drop(client);
            server.shutdown().expect("Echo server failed");
        });
    }

    group.finish();
}

fn bench_ping_pong_blocking(c: &mut Criterion) {
    bench_strategy::<Blocking>(c, "blocking");
}

fn bench_ping_pong_light(c: &mut Criterion) {
    bench_strategy::<Light>(c, "light");
}

fn bench_ping_pong_no_wait(c: &mut Criterion) {
    bench_strategy::<NoWait>(c, "no_wait");
}

criterion_group!(
    benches,
    bench_ping_pong_blocking,
    bench_ping_pong_light,
    bench_ping_pong_no_wait,
);

criterion_main!(benches);
