// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Black-box tests: separate writer and reader processes.

use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};

const BIN: &str = env!("CARGO_BIN_EXE_shm-stream");
const TEXT: &[u8] = b"abc\nabcdefgh\nabcdefghijklmnopqrstuvwxyz\n\n";

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn unique_name(tag: &str) -> String {
    format!(
        "cli_{}_{}_{}",
        tag,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

/// Which side passes `--create`; the other opens with retry.
#[derive(Clone, Copy)]
enum Creator {
    Reader,
    Writer,
}

impl Creator {
    fn args(self, side: Creator) -> &'static [&'static str] {
        match (self, side) {
            (Creator::Reader, Creator::Reader) | (Creator::Writer, Creator::Writer) => {
                &["--create"]
            }
            _ => &["--open-retry-ms", "10000"],
        }
    }
}

/// Run a reader and a writer for one stream, feeding `input` to the writer.
/// The reader is always started first. Returns (writer, reader) outputs.
fn transfer_created_by(
    creator: Creator,
    wait: &str,
    input: &[u8],
    extra: &[&str],
) -> (Output, Output) {
    let name = unique_name(wait);

    let reader = Command::new(BIN)
        .args(["read", "--name", &name, "--wait", wait])
        .args(creator.args(Creator::Reader))
        .args(extra)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn reader");

    let mut writer = Command::new(BIN)
        .args(["write", "--name", &name, "--wait", wait])
        .args(creator.args(Creator::Writer))
        .args(extra)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn writer");

    // Drain the reader's pipes concurrently so it cannot block on a full
    // stdout pipe while the writer is still being fed.
    let reader = std::thread::spawn(move || reader.wait_with_output());

    {
        let mut stdin = writer.stdin.take().expect("writer stdin");
        stdin.write_all(input).expect("Failed to feed writer");
    }

    let writer = writer.wait_with_output().expect("Failed to wait for writer");
    let reader = reader
        .join()
        .expect("Reader thread panicked")
        .expect("Failed to wait for reader");
    (writer, reader)
}

fn transfer(wait: &str, input: &[u8], extra: &[&str]) -> (Output, Output) {
    transfer_created_by(Creator::Reader, wait, input, extra)
}

fn assert_identity(wait: &str) {
    assert_identity_created_by(Creator::Reader, wait);
}

fn assert_identity_created_by(creator: Creator, wait: &str) {
    let (writer, reader) = transfer_created_by(creator, wait, TEXT, &[]);
    assert!(
        writer.status.success(),
        "writer failed: {}",
        String::from_utf8_lossy(&writer.stderr)
    );
    assert!(
        reader.status.success(),
        "reader failed: {}",
        String::from_utf8_lossy(&reader.stderr)
    );
    assert_eq!(reader.stdout, TEXT);
}

#[test]
fn test_text_identity_blocking() {
    assert_identity("blocking");
}

#[test]
fn test_text_identity_light() {
    assert_identity("light");
}

#[test]
fn test_text_identity_no_wait() {
    assert_identity("no-wait");
}

#[test]
fn test_writer_created_identity_blocking() {
    assert_identity_created_by(Creator::Writer, "blocking");
}

#[test]
fn test_writer_created_identity_light() {
    assert_identity_created_by(Creator::Writer, "light");
}

#[test]
fn test_writer_created_identity_no_wait() {
    assert_identity_created_by(Creator::Writer, "no-wait");
}

#[test]
fn test_large_input_through_small_buffer() {
    let input: Vec<u8> = (0..200_000u32).map(|i| (i * 31 % 251) as u8).collect();
    let (writer, reader) = transfer("blocking", &input, &["--capacity", "1000"]);
    assert!(writer.status.success());
    assert!(reader.status.success());
    assert_eq!(reader.stdout, input);
}

#[test]
fn test_stats_printed_as_json() {
    let name = unique_name("stats");

    let reader = Command::new(BIN)
        .args(["read", "--name", &name, "--wait", "light", "--create", "--stats"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .env("RUST_LOG", "off")
        .spawn()
        .expect("Failed to spawn reader");

    let mut writer = Command::new(BIN)
        .args(["write", "--name", &name, "--wait", "light", "--open-retry-ms", "10000"])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn writer");
    writer
        .stdin
        .take()
        .expect("writer stdin")
        .write_all(TEXT)
        .expect("Failed to feed writer");
    assert!(writer.wait().expect("Failed to wait for writer").success());

    let reader = reader.wait_with_output().expect("Failed to wait for reader");
    assert!(reader.status.success());

    let stderr = String::from_utf8_lossy(&reader.stderr);
    let line = stderr.lines().last().expect("stats line");
    let stats: serde_json::Value = serde_json::from_str(line).expect("stats are JSON");
    assert_eq!(stats["role"], "reader");
    assert_eq!(stats["bytes"], TEXT.len() as u64);
}

#[test]
fn test_open_missing_stream_fails() {
    let output = Command::new(BIN)
        .args(["read", "--name", &unique_name("missing")])
        .output()
        .expect("Failed to run reader");
    assert!(!output.status.success());
}

#[test]
fn test_remove_missing_stream_fails() {
    let output = Command::new(BIN)
        .args(["remove", "--name", &unique_name("absent")])
        .output()
        .expect("Failed to run remove");
    assert!(!output.status.success());
}

#[test]
fn test_validate_config_file() {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(b"name: orders\nwait: light\ncreate: true\n")
        .expect("Failed to write config");

    let output = Command::new(BIN)
        .args(["validate", file.path().to_str().expect("utf-8 path")])
        .output()
        .expect("Failed to run validate");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Configuration is valid"));
}

#[test]
fn test_validate_rejects_bad_config() {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(b"name: orders\nwait: no_wait\ntimeout_ms: 10\n")
        .expect("Failed to write config");

    let output = Command::new(BIN)
        .args(["validate", file.path().to_str().expect("utf-8 path")])
        .output()
        .expect("Failed to run validate");
    assert!(!output.status.success());
}
