// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI tool to run all benchmarks and generate reports.

use shm_stream_benchmark::{
    send_all, BenchmarkHarness, BenchmarkResult, Case, Drain, EchoServer, JsonReporter,
    PingPongClient, RunReport,
};
use shm_stream_core::{
    Blocking, Capacity, Light, NoWait, StreamName, StreamResult, WaitStrategy, Writer,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Payload sizes for both categories, in bytes.
const PAYLOAD_SIZES: &[usize] = &[64, 1024, 16384, 65536];

#[derive(Parser)]
#[command(name = "run_benchmarks")]
#[command(about = "Run shm-stream benchmarks and generate JSON reports")]
struct Args {
    /// Output directory for benchmark data
    #[arg(short, long, default_value = "data")]
    output: PathBuf,

    /// Number of round trips measured per ping-pong case
    #[arg(short, long, default_value_t = 1000)]
    iterations: u64,

    /// Categories to run: ping_pong, throughput (all if not specified)
    #[arg(short, long)]
    category: Option<Vec<String>>,

    /// Stream capacity in bytes
    #[arg(long, default_value_t = 1024 * 1024)]
    capacity: u64,

    /// Measurement window for each throughput case
    #[arg(long, default_value_t = 1000)]
    duration_ms: u64,

    /// Write one report file per category
    #[arg(long)]
    split: bool,

    /// Run in quick mode (fewer iterations)
    #[arg(long)]
    quick: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let iterations = if args.quick { 50 } else { args.iterations };
    let window = Duration::from_millis(if args.quick { 100 } else { args.duration_ms });
    let capacity = Capacity::new(args.capacity)?;

    println!("shm-stream Benchmark Suite");
    println!("==========================");
    println!("Output directory: {:?}", args.output);
    println!("Iterations: {}", iterations);
    println!("Capacity: {}", capacity);
    println!();

    let reporter = JsonReporter::new(&args.output)?;
    let mut report = RunReport::new();

    // Determine which categories to run
    let run_all = args.category.is_none();
    let categories: Vec<String> = args.category.unwrap_or_default();

    let should_run =
        |cat: &str| -> bool { run_all || categories.iter().any(|c| c.eq_ignore_ascii_case(cat)) };

    let harness = BenchmarkHarness::new()
        .warmup(iterations / 10)
        .iterations(iterations);

    if should_run("ping_pong") {
        println!("Running ping-pong benchmarks...");
        run_ping_pong::<Blocking>(&mut report, &harness, capacity)?;
        run_ping_pong::<Light>(&mut report, &harness, capacity)?;
        run_ping_pong::<NoWait>(&mut report, &harness, capacity)?;
    }

    if should_run("throughput") {
        println!("Running throughput benchmarks...");
        let harness = BenchmarkHarness::new().warmup(100);
        run_throughput::<Blocking>(&mut report, &harness, capacity, window)?;
        run_throughput::<Light>(&mut report, &harness, capacity, window)?;
        run_throughput::<NoWait>(&mut report, &harness, capacity, window)?;
    }

    // Save report
    let paths = if args.split {
        reporter.save_by_category(&report)?
    } else {
        vec![reporter.save(&report)?]
    };
    println!();
    for path in &paths {
        println!("Benchmark report saved to: {:?}", path);
    }
    println!();

    // Print summary
    print_summary(&report);

    Ok(())
}

fn stream_names(kind: &str, case: &Case) -> StreamResult<(StreamName, StreamName)> {
    let pid = std::process::id();
    Ok((
        StreamName::new(format!(
            "bench_{}_{}_{}_req_{}",
            kind, case.wait, case.payload_bytes, pid
        ))?,
        StreamName::new(format!(
            "bench_{}_{}_{}_resp_{}",
            kind, case.wait, case.payload_bytes, pid
        ))?,
    ))
}

fn run_ping_pong<S: WaitStrategy>(
    report: &mut RunReport,
    harness: &BenchmarkHarness,
    capacity: Capacity,
) -> anyhow::Result<()> {
    for &size in PAYLOAD_SIZES {
        if size > capacity.as_usize() {
            continue;
        }

        let case = Case::new(S::KIND, size, capacity.bytes());
        let (request, response) = stream_names("pp", &case)?;
        let server = EchoServer::spawn::<S>(&request, &response, capacity)?;
        let mut client = PingPongClient::<S>::connect(&request, &response)?;
        let payload = vec![0xABu8; size];

        let samples = harness.run(|| client.round_trip(&payload))?;

        drop(client);
        server.shutdown()?;

        let result = BenchmarkResult::ping_pong(case, samples);
        println!("  ✓ {}", result.name);
        report.push(result);
    }
    Ok(())
}

fn run_throughput<S: WaitStrategy>(
    report: &mut RunReport,
    harness: &BenchmarkHarness,
    capacity: Capacity,
    window: Duration,
) -> anyhow::Result<()> {
    for &size in PAYLOAD_SIZES {
        let case = Case::new(S::KIND, size, capacity.bytes());
        let (name, _) = stream_names("tp", &case)?;
        let drain = Drain::spawn::<S>(&name, capacity)?;
        let mut writer = Writer::<S>::open(&name)?;
        let payload = vec![0xCDu8; size];

        let run = harness.run_throughput(window, || {
            send_all(&mut writer, &payload).map(|()| size as u64)
        })?;

        writer.close();
        let received = drain.finish()?;

        let result = BenchmarkResult::throughput(case, run, received);
        println!("  ✓ {}", result.name);
        report.push(result);
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!("Summary");
    println!("-------");
    println!();

    for result in &report.results {
        println!("{}", result.summary());
    }
}
