// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! shm-stream CLI
//!
//! Writer and reader processes for shared-memory byte streams. `write`
//! copies stdin into a stream and `read` copies a stream to stdout, byte
//! for byte. Logs go to stderr so stdout carries only stream data.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod args;
mod commands;
mod pin;
mod signal;

use args::StreamArgs;

/// shm-stream - SPSC byte streams over POSIX shared memory
#[derive(Parser)]
#[command(name = "shm-stream")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Stream configuration file (flags override its values)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Copy stdin into a stream until end of input
    Write(StreamArgs),

    /// Copy a stream to stdout until the writer closes
    Read(StreamArgs),

    /// Copy a request stream back out on a response stream
    Echo {
        /// Stream to read requests from
        #[arg(long)]
        request: String,

        /// Stream to write responses to
        #[arg(long)]
        response: String,

        /// Wait strategy: blocking, light or no-wait
        #[arg(short, long, default_value = "blocking")]
        wait: shm_stream_core::WaitKind,

        /// Create both streams instead of opening them
        #[arg(long)]
        create: bool,

        /// Data capacity in bytes when creating
        #[arg(long)]
        capacity: Option<u64>,

        /// Keep retrying for this long while the streams do not exist yet
        #[arg(long, default_value_t = 0)]
        open_retry_ms: u64,
    },

    /// Remove a stream left behind by a crashed process
    Remove {
        /// Stream name
        #[arg(short, long)]
        name: String,
    },

    /// Show a stream's header without attaching to it
    Info {
        /// Stream name
        #[arg(short, long)]
        name: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for stream data
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Write(args) => {
            let config = args.resolve(cli.config.as_deref())?;
            commands::write::execute(config, args.stats).await
        }
        Commands::Read(args) => {
            let config = args.resolve(cli.config.as_deref())?;
            commands::read::execute(config, args.stats).await
        }
        Commands::Echo {
            request,
            response,
            wait,
            create,
            capacity,
            open_retry_ms,
        } => {
            let pair = args::echo_pair(&request, &response, wait, create, capacity, open_retry_ms)?;
            commands::echo::execute(pair).await
        }
        Commands::Remove { name } => commands::remove::execute(&name).await,
        Commands::Info { name, json } => commands::info::execute(&name, json).await,
        Commands::Validate { file } => commands::validate::execute(&file).await,
    }
}
