// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Stream flags shared by `write` and `read`, merged over an optional
//! config file.

use std::time::Duration;

use clap::Args;
use shm_stream_core::{
    Capacity, ConfigLoader, HardValidationError, StreamConfig, StreamName, StreamResult, WaitKind,
};

#[derive(Args, Debug, Clone)]
pub struct StreamArgs {
    /// Stream name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Wait strategy: blocking, light or no-wait
    #[arg(short, long)]
    pub wait: Option<WaitKind>,

    /// Create the stream instead of opening it
    #[arg(long)]
    pub create: bool,

    /// Data capacity in bytes when creating
    #[arg(long)]
    pub capacity: Option<u64>,

    /// Give up on a single blocking transfer after this long
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Keep retrying for this long while the stream does not exist yet
    #[arg(long)]
    pub open_retry_ms: Option<u64>,

    /// Pin the transfer thread to this CPU
    #[arg(long)]
    pub pin_cpu: Option<usize>,

    /// Print transfer statistics as JSON on stderr when done
    #[arg(long)]
    pub stats: bool,
}

impl StreamArgs {
    /// Build the effective configuration: file values first, then flags.
    pub fn resolve(&self, config_path: Option<&str>) -> StreamResult<StreamConfig> {
        let mut config = match config_path {
            Some(path) => ConfigLoader::load_file(path)?,
            None => {
                let name = self.name.as_deref().ok_or_else(|| {
                    HardValidationError::MissingRequiredField {
                        field: "name",
                        context: "--name or a --config file".to_string(),
                    }
                })?;
                StreamConfig::new(StreamName::new(name)?)
            }
        };

        if let Some(name) = &self.name {
            config.name = StreamName::new(name.as_str())?;
        }
        if let Some(wait) = self.wait {
            config.wait = wait;
        }
        if self.create {
            config.create = true;
        }
        if let Some(capacity) = self.capacity {
            config.capacity = Capacity::new(capacity)?;
        }
        if let Some(ms) = self.timeout_ms {
            config.timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = self.open_retry_ms {
            config.open_retry = Duration::from_millis(ms);
        }
        if self.pin_cpu.is_some() {
            config.pin_cpu = self.pin_cpu;
        }

        config.check()?;
        Ok(config)
    }
}

/// The two streams an echo server bridges.
#[derive(Debug, Clone)]
pub struct EchoPair {
    pub request: StreamConfig,
    pub response: StreamConfig,
}

pub fn echo_pair(
    request: &str,
    response: &str,
    wait: WaitKind,
    create: bool,
    capacity: Option<u64>,
    open_retry_ms: u64,
) -> StreamResult<EchoPair> {
    let side = |name: &str| -> StreamResult<StreamConfig> {
        let mut config = StreamConfig::new(StreamName::new(name)?);
        config.wait = wait;
        config.create = create;
        if let Some(capacity) = capacity {
            config.capacity = Capacity::new(capacity)?;
        }
        config.open_retry = Duration::from_millis(open_retry_ms);
        config.check()?;
        Ok(config)
    };

    Ok(EchoPair {
        request: side(request)?,
        response: side(response)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(name: Option<&str>) -> StreamArgs {
        StreamArgs {
            name: name.map(str::to_string),
            wait: None,
            create: false,
            capacity: None,
            timeout_ms: None,
            open_retry_ms: None,
            pin_cpu: None,
            stats: false,
        }
    }

    #[test]
    fn test_name_required_without_config() {
        assert!(args(None).resolve(None).is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(b"name: from_file\nwait: light\ncapacity: 4096\n")
            .expect("Failed to write config");

        let mut flags = args(Some("from_flag"));
        flags.capacity = Some(128);
        flags.create = true;

        let path = file.path().to_str().expect("utf-8 temp path");
        let config = flags.resolve(Some(path)).expect("Failed to resolve");
        assert_eq!(config.name.as_str(), "from_flag");
        assert_eq!(config.wait, WaitKind::Light);
        assert_eq!(config.capacity.bytes(), 128);
        assert!(config.create);
    }

    #[test]
    fn test_timeout_flag_rejected_for_no_wait() {
        let mut flags = args(Some("orders"));
        flags.wait = Some(WaitKind::NoWait);
        flags.timeout_ms = Some(10);
        assert!(flags.resolve(None).is_err());
    }

    #[test]
    fn test_echo_pair() {
        let pair = echo_pair("req", "resp", WaitKind::Light, true, Some(256), 0)
            .expect("Failed to build echo pair");
        assert_eq!(pair.request.name.as_str(), "req");
        assert_eq!(pair.response.capacity.bytes(), 256);
        assert!(pair.response.create);
    }
}
