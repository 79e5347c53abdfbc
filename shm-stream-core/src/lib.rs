//! shm-stream Core Library
//!
//! Single-producer single-consumer byte streams between two processes over
//! POSIX shared memory. A writer and a reader agree on a stream name and a
//! wait strategy; bytes arrive in order, exactly once, with no intermediate
//! copy through the kernel.
//!
//! ```no_run
//! use shm_stream_core::{BlockingReader, BlockingWriter, Capacity, StreamName};
//!
//! let name = StreamName::new("orders")?;
//! let mut reader = BlockingReader::create(&name, Capacity::default())?;
//! let mut writer = BlockingWriter::open(&name)?;
//!
//! writer.write(b"hello")?;
//! let mut buf = [0u8; 5];
//! reader.read_exact(&mut buf)?;
//! # Ok::<(), shm_stream_core::StreamError>(())
//! ```

pub mod config;
pub mod error;
pub mod shm;
pub mod stats;
pub mod stream;
pub mod types;

// Re-export commonly used types
pub use config::{ConfigLoader, StreamConfig};
pub use error::{HardValidationError, SharedMemoryError, StreamError, StreamResult};
pub use shm::{Blocking, Doorbell, Light, NoWait, Role, WaitStrategy};
pub use stats::{StatsReport, StreamStats};
pub use stream::{
    BlockingReader, BlockingWriter, LightReader, LightWriter, NoWaitReader, NoWaitWriter,
    inspect, OpenOptions, Reader, StopHandle, Writer,
};
pub use types::{Capacity, StreamName, WaitKind};
