// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! shm-stream Benchmarking Framework
//!
//! Measures shm-stream latency and throughput for each wait strategy.
//!
//! # Benchmark Categories
//!
//! - **Ping-Pong**: round trips of a fixed payload through an echo server
//! - **Throughput**: one-way bulk transfer into a draining reader
//!
//! # Data Output
//!
//! Each run writes a JSON report; every result names its wait strategy,
//! payload size and capacity.

pub mod drain;
pub mod harness;
pub mod metrics;
pub mod pingpong;
pub mod reporter;

pub use drain::Drain;
pub use harness::{BenchmarkHarness, ThroughputRun};
pub use metrics::{
    format_ns, format_rate, BenchmarkCategory, BenchmarkResult, Case, LatencyMetrics,
    Measurement, RunReport, ThroughputMetrics,
};
pub use pingpong::{send_all, EchoServer, PingPongClient};
pub use reporter::JsonReporter;
