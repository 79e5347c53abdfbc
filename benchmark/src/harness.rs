// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark harness for timing stream operations.
//!
//! Latency runs time each call of a closure separately; throughput runs
//! count calls and bytes over a fixed wall-clock window.

use std::time::{Duration, Instant};

/// A benchmark harness for measuring operation latency.
pub struct BenchmarkHarness {
    /// Number of warmup iterations before measurement
    warmup_iterations: u64,
    /// Number of measurement iterations
    measurement_iterations: u64,
}

/// Totals from a throughput run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThroughputRun {
    pub operations: u64,
    pub bytes: u64,
    pub duration_ns: u64,
}

impl BenchmarkHarness {
    /// Create a new benchmark harness with default settings.
    pub fn new() -> Self {
        Self {
            warmup_iterations: 10,
            measurement_iterations: 100,
        }
    }

    /// Set the number of warmup iterations.
    pub fn warmup(mut self, iterations: u64) -> Self {
        self.warmup_iterations = iterations;
        self
    }

    /// Set the number of measurement iterations.
    pub fn iterations(mut self, iterations: u64) -> Self {
        self.measurement_iterations = iterations;
        self
    }

    /// Run a benchmark and collect latency samples in nanoseconds.
    ///
    /// The closure performs one iteration, e.g. one ping-pong round trip.
    /// The first error aborts the run.
    pub fn run<F, E>(&self, mut operation: F) -> Result<Vec<u64>, E>
    where
        F: FnMut() -> Result<(), E>,
    {
        for _ in 0..self.warmup_iterations {
            operation()?;
        }

        let mut samples = Vec::with_capacity(self.measurement_iterations as usize);
        for _ in 0..self.measurement_iterations {
            let start = Instant::now();
            operation()?;
            samples.push(start.elapsed().as_nanos() as u64);
        }

        Ok(samples)
    }

    /// Run a throughput benchmark for a fixed duration.
    ///
    /// The closure returns the number of bytes it moved.
    pub fn run_throughput<F, E>(
        &self,
        duration: Duration,
        mut operation: F,
    ) -> Result<ThroughputRun, E>
    where
        F: FnMut() -> Result<u64, E>,
    {
        for _ in 0..self.warmup_iterations {
            operation()?;
        }

        let start = Instant::now();
        let mut operations = 0u64;
        let mut bytes = 0u64;
        while start.elapsed() < duration {
            bytes += operation()?;
            operations += 1;
        }

        Ok(ThroughputRun {
            operations,
            bytes,
            duration_ns: start.elapsed().as_nanos() as u64,
        })
    }
}

impl Default for BenchmarkHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::thread;

    #[test]
    fn test_harness_basic() {
        let harness = BenchmarkHarness::new().warmup(5).iterations(20);

        let samples = harness
            .run(|| {
                thread::sleep(Duration::from_micros(100));
                Ok::<_, Infallible>(())
            })
            .unwrap();

        assert_eq!(samples.len(), 20);
        // Each sample should be at least 100μs
        for sample in &samples {
            assert!(*sample >= 100_000, "Sample {} < 100μs", sample);
        }
    }

    #[test]
    fn test_harness_stops_on_error() {
        let harness = BenchmarkHarness::new().warmup(0).iterations(10);
        let mut calls = 0;
        let result = harness.run(|| {
            calls += 1;
            if calls == 3 {
                Err("broken")
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err("broken"));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_throughput_counts_bytes() {
        let harness = BenchmarkHarness::new().warmup(2);
        let run = harness
            .run_throughput(Duration::from_millis(20), || Ok::<_, Infallible>(64))
            .unwrap();

        assert!(run.operations > 0);
        assert_eq!(run.bytes, run.operations * 64);
        assert!(run.duration_ns >= 20_000_000);
    }
}
