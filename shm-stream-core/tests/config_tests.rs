// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Configuration file loading and config-driven handle construction.

use std::io::Write;
use std::time::Duration;

use shm_stream_core::{
    ConfigLoader, LightReader, LightWriter, StreamError, WaitKind,
};
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(yaml.as_bytes())
        .expect("Failed to write config");
    file
}

#[test]
fn test_load_file() {
    let file = write_config(
        r#"
name: telemetry
capacity: 8192
wait: light
create: true
timeout_ms: 250
"#,
    );

    let config = ConfigLoader::load_file(file.path()).expect("valid config");
    assert_eq!(config.name.as_str(), "telemetry");
    assert_eq!(config.capacity.bytes(), 8192);
    assert_eq!(config.wait, WaitKind::Light);
    assert_eq!(config.timeout, Some(Duration::from_millis(250)));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let result = ConfigLoader::load_file(dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(StreamError::ConfigNotFound { .. })));
}

#[test]
fn test_malformed_yaml() {
    let file = write_config("name: [unterminated\n");
    assert!(matches!(
        ConfigLoader::load_file(file.path()),
        Err(StreamError::ConfigParse { .. })
    ));
}

#[test]
fn test_handles_from_config_files() {
    let name = format!("cfg_pair_{}", std::process::id());
    let creator = write_config(&format!(
        "name: {}\ncapacity: 64\nwait: light\ncreate: true\n",
        name
    ));
    let opener = write_config(&format!(
        "name: {}\nwait: light\nopen_retry_ms: 1000\n",
        name
    ));

    let reader_config = ConfigLoader::load_file(creator.path()).expect("creator config");
    let writer_config = ConfigLoader::load_file(opener.path()).expect("opener config");

    let mut reader = LightReader::from_config(&reader_config).expect("create reader");
    let mut writer = LightWriter::from_config(&writer_config).expect("open writer");

    writer.write(b"configured").expect("write");
    writer.close();

    let mut buf = [0u8; 10];
    reader.read_exact(&mut buf).expect("read");
    assert_eq!(&buf, b"configured");
}
