// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! One-way throughput benchmarks.
//!
//! A reader thread drains the stream while the measured loop writes
//! messages of a fixed size.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shm_stream_benchmark::{send_all, Drain};
use shm_stream_core::{Blocking, Capacity, Light, NoWait, StreamName, WaitStrategy, Writer};
use std::time::Duration;

/// Message sizes to benchmark (in bytes).
const MESSAGE_SIZES: &[usize] = &[64, 256, 1024, 4096, 16384, 65536];

/// Ten messages of the largest size fit in the buffer.
const CAPACITY: u64 = 10 * 65536;

fn bench_strategy<S: WaitStrategy>(c: &mut Criterion, wait: &str) {
    let mut group = c.benchmark_group(format!("send_messages_{}", wait));
    group.measurement_time(Duration::from_secs(5));

    for &size in MESSAGE_SIZES {
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let name = StreamName::new(format!(
                "bench_tp_{}_{}_{}",
                wait,
                size,
                std::process::id()
            ))
            .expect("valid stream name");
            let capacity = Capacity::new(CAPACITY).expect("valid capacity");

            let drain = Drain::spawn::<S>(&name, capacity).expect("Failed to start reader");
            let mut writer = Writer::<S>::open(&name).expect("Failed to open writer");
            let payload = vec![0xCDu8; size];

            b.iter(|| {
                send_all(&mut writer, black_box(&payload)).expect("Write failed");
            });

            writer.close();
            drain.finish().expect("Reader failed");
        });
    }

    group.finish();
}

fn bench_throughput_blocking(c: &mut Criterion) {
    bench_strategy::<Blocking>(c, "blocking");
}

fn bench_throughput_light(c: &mut Criterion) {
    bench_strategy::<Light>(c, "light");
}

fn bench_throughput_no_wait(c: &mut Criterion) {
    bench_strategy::<NoWait>(c, "no_wait");
}

criterion_group!(
    benches,
    bench_throughput_blocking,
    bench_throughput_light,
    bench_throughput_no_wait,
);

criterion_main!(benches);
