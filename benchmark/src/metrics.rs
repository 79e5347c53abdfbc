// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Results of the ping-pong and throughput runs.
//!
//! Every result names the case it measured: the wait strategy, the payload
//! written per call and the stream capacity.

use crate::harness::ThroughputRun;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shm_stream_core::WaitKind;
use std::fmt;

/// Which run produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkCategory {
    /// Request/response round trips through an echo server
    PingPong,
    /// One-way bulk transfer into a draining reader
    Throughput,
}

impl fmt::Display for BenchmarkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PingPong => "ping_pong",
            Self::Throughput => "throughput",
        })
    }
}

/// One measured configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub wait: WaitKind,
    pub payload_bytes: usize,
    pub capacity_bytes: u64,
}

impl Case {
    pub fn new(wait: WaitKind, payload_bytes: usize, capacity_bytes: u64) -> Self {
        Self {
            wait,
            payload_bytes,
            capacity_bytes,
        }
    }

    /// `<category>_<wait>_<payload>`, e.g. `ping_pong_light_1024`.
    pub fn label(&self, category: BenchmarkCategory) -> String {
        format!("{}_{}_{}", category, self.wait, self.payload_bytes)
    }
}

/// Round-trip latency of one ping-pong case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyMetrics {
    pub round_trips: u64,
    /// The request plus its echo.
    pub bytes_per_round_trip: u64,
    pub min_ns: u64,
    pub median_ns: u64,
    pub p99_ns: u64,
    pub max_ns: u64,
    pub mean_ns: f64,
}

impl LatencyMetrics {
    /// Summarize per-round-trip samples in nanoseconds.
    pub fn from_samples(payload_bytes: usize, mut samples: Vec<u64>) -> Self {
        let bytes_per_round_trip = 2 * payload_bytes as u64;
        samples.sort_unstable();

        let (Some(&min_ns), Some(&max_ns)) = (samples.first(), samples.last()) else {
            return Self {
                round_trips: 0,
                bytes_per_round_trip,
                min_ns: 0,
                median_ns: 0,
                p99_ns: 0,
                max_ns: 0,
                mean_ns: 0.0,
            };
        };

        let total: u128 = samples.iter().map(|&ns| u128::from(ns)).sum();
        Self {
            round_trips: samples.len() as u64,
            bytes_per_round_trip,
            min_ns,
            median_ns: nearest_rank(&samples, 50),
            p99_ns: nearest_rank(&samples, 99),
            max_ns,
            mean_ns: total as f64 / samples.len() as f64,
        }
    }

    /// Bytes moved through both streams per second, at the mean round trip.
    pub fn bytes_per_sec(&self) -> f64 {
        if self.mean_ns == 0.0 {
            return 0.0;
        }
        self.bytes_per_round_trip as f64 * 1e9 / self.mean_ns
    }
}

/// Totals of one throughput case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThroughputMetrics {
    pub writes: u64,
    pub bytes_sent: u64,
    /// What the draining reader counted before EOF, warmup included.
    pub bytes_received: u64,
    pub duration_ns: u64,
    pub bytes_per_sec: f64,
}

impl ThroughputMetrics {
    pub fn from_run(run: ThroughputRun, bytes_received: u64) -> Self {
        let secs = run.duration_ns as f64 / 1e9;
        let bytes_per_sec = if secs > 0.0 {
            run.bytes as f64 / secs
        } else {
            0.0
        };
        Self {
            writes: run.operations,
            bytes_sent: run.bytes,
            bytes_received,
            duration_ns: run.duration_ns,
            bytes_per_sec,
        }
    }

    pub fn writes_per_sec(&self) -> f64 {
        if self.bytes_sent == 0 {
            return 0.0;
        }
        self.writes as f64 * self.bytes_per_sec / self.bytes_sent as f64
    }
}

/// What a case measured, tagged by category in the JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum Measurement {
    PingPong(LatencyMetrics),
    Throughput(ThroughputMetrics),
}

/// One case and its measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub name: String,
    pub case: Case,
    pub measurement: Measurement,
}

impl BenchmarkResult {
    pub fn ping_pong(case: Case, samples: Vec<u64>) -> Self {
        Self {
            name: case.label(BenchmarkCategory::PingPong),
            measurement: Measurement::PingPong(LatencyMetrics::from_samples(
                case.payload_bytes,
                samples,
            )),
            case,
        }
    }

    pub fn throughput(case: Case, run: ThroughputRun, bytes_received: u64) -> Self {
        Self {
            name: case.label(BenchmarkCategory::Throughput),
            measurement: Measurement::Throughput(ThroughputMetrics::from_run(run, bytes_received)),
            case,
        }
    }

    pub fn category(&self) -> BenchmarkCategory {
        match self.measurement {
            Measurement::PingPong(_) => BenchmarkCategory::PingPong,
            Measurement::Throughput(_) => BenchmarkCategory::Throughput,
        }
    }

    /// One summary line for the console.
    pub fn summary(&self) -> String {
        match &self.measurement {
            Measurement::PingPong(latency) => format!(
                "{}: median={}, p99={}, {}",
                self.name,
                format_ns(latency.median_ns),
                format_ns(latency.p99_ns),
                format_rate(latency.bytes_per_sec())
            ),
            Measurement::Throughput(tp) => format!(
                "{}: {} ({:.0} writes/s)",
                self.name,
                format_rate(tp.bytes_per_sec),
                tp.writes_per_sec()
            ),
        }
    }
}

/// All results of one `run_benchmarks` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub results: Vec<BenchmarkResult>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, result: BenchmarkResult) {
        self.results.push(result);
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

/// `500ns`, `1.50μs`, `2.25ms`, `1.00s`.
pub fn format_ns(ns: u64) -> String {
    if ns < 1_000 {
        return format!("{}ns", ns);
    }
    let (value, unit) = scale(ns as f64 / 1_000.0, &["μs", "ms", "s"]);
    format!("{:.2}{}", value, unit)
}

/// Decimal units, e.g. `2.50 MB/s`.
pub fn format_rate(bytes_per_sec: f64) -> String {
    let (value, unit) = scale(bytes_per_sec, &["B/s", "KB/s", "MB/s", "GB/s"]);
    format!("{:.2} {}", value, unit)
}

fn scale(mut value: f64, units: &[&'static str]) -> (f64, &'static str) {
    let mut unit = 0;
    while value >= 1_000.0 && unit + 1 < units.len() {
        value /= 1_000.0;
        unit += 1;
    }
    (value, units[unit])
}

/// Nearest-rank percentile of a sorted, non-empty slice.
fn nearest_rank(sorted: &[u64], pct: usize) -> u64 {
    let rank = (sorted.len() * pct).div_ceil(100).max(1);
    sorted[rank - 1]
}
