// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Integration tests for shm-stream handles.
//!
//! Writers and readers run on separate threads, each with its own mapping of
//! the region, which exercises the same protocol two processes would.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use shm_stream_core::shm::{PollingDoorbell, SharedMemoryRegion};
use shm_stream_core::{
    Blocking, BlockingReader, BlockingWriter, Capacity, Light, LightReader, LightWriter, NoWait,
    NoWaitReader, NoWaitWriter, OpenOptions, StreamError, StreamName, WaitStrategy,
};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn unique_name(tag: &str) -> StreamName {
    StreamName::new(format!(
        "it_{}_{}_{}",
        tag,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ))
    .expect("valid stream name")
}

fn cap(bytes: u64) -> Capacity {
    Capacity::new(bytes).expect("valid capacity")
}

/// Deterministic pseudo-random bytes (xorshift64).
struct Noise(u64);

impl Noise {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn bytes(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| self.next() as u8).collect()
    }

    fn below(&mut self, bound: usize) -> usize {
        (self.next() % bound as u64) as usize
    }
}

/// Push `payload` through a stream of `capacity` in random-sized chunks and
/// return what the reader saw. Both sides check the capacity invariant
/// after every operation.
fn pump<S: WaitStrategy>(payload: Arc<Vec<u8>>, capacity: u64, seed: u64) -> Vec<u8> {
    let name = unique_name("pump");
    let mut reader = OpenOptions::new()
        .create(true)
        .capacity(cap(capacity))
        .reader::<S>(&name)
        .expect("create reader");

    let writer_thread = {
        let payload = Arc::clone(&payload);
        let name = name.clone();
        thread::spawn(move || {
            let mut writer = OpenOptions::new()
                .writer::<S>(&name)
                .expect("open writer");
            let mut noise = Noise(seed);
            let mut offset = 0;
            while offset < payload.len() {
                let len = 1 + noise.below(capacity as usize * 2);
                let end = (offset + len).min(payload.len());
                match writer.write(&payload[offset..end]) {
                    Ok(n) => offset += n,
                    Err(StreamError::WouldBlock) => thread::yield_now(),
                    Err(e) => panic!("write failed: {}", e),
                }
                assert!(writer.available() <= writer.capacity());
            }
            writer.close();
        })
    };

    let mut noise = Noise(seed ^ 0x9E37_79B9_7F4A_7C15);
    let mut received = Vec::with_capacity(payload.len());
    let mut buf = vec![0u8; capacity as usize * 2];
    loop {
        let len = 1 + noise.below(buf.len());
        match reader.read(&mut buf[..len]) {
            Ok(0) => break,
            Ok(n) => received.extend_from_slice(&buf[..n]),
            Err(StreamError::WouldBlock) => thread::yield_now(),
            Err(e) => panic!("read failed: {}", e),
        }
        assert!(reader.available() <= reader.capacity());
    }

    writer_thread.join().expect("writer thread panicked");
    received
}

#[test]
fn test_byte_fidelity_blocking() {
    let payload = Arc::new(Noise(1).bytes(1 << 20));
    assert_eq!(pump::<Blocking>(Arc::clone(&payload), 4093, 11), *payload);
}

#[test]
fn test_byte_fidelity_light() {
    let payload = Arc::new(Noise(2).bytes(1 << 20));
    assert_eq!(pump::<Light>(Arc::clone(&payload), 4093, 12), *payload);
}

#[test]
fn test_byte_fidelity_no_wait() {
    let payload = Arc::new(Noise(3).bytes(1 << 19));
    assert_eq!(pump::<NoWait>(Arc::clone(&payload), 997, 13), *payload);
}

#[test]
fn test_wrap_around_with_odd_capacity() {
    // Payload length is not a multiple of capacity and the cursors wrap many times.
    let payload = Arc::new(Noise(4).bytes(7 * 1000 + 5));
    assert_eq!(pump::<Blocking>(Arc::clone(&payload), 7, 14), *payload);
}

#[test]
fn test_single_byte_capacity_boundary() {
    let payload = Arc::new(Noise(5).bytes(5000));
    assert_eq!(pump::<Light>(Arc::clone(&payload), 2, 15), *payload);
}

#[test]
fn test_full_capacity_is_usable() {
    let name = unique_name("full");
    let mut writer = NoWaitWriter::create(&name, cap(64)).expect("create writer");
    let mut reader = NoWaitReader::open(&name).expect("open reader");

    assert_eq!(writer.write(&[7u8; 64]).expect("fill"), 64);
    assert_eq!(writer.available(), 0);
    assert_eq!(reader.available(), 64);

    let mut buf = [0u8; 64];
    reader.read_exact(&mut buf).expect("drain");
    assert_eq!(buf, [7u8; 64]);
}

#[test]
fn test_no_wait_never_blocks() {
    let name = unique_name("nowait");
    let mut writer = NoWaitWriter::create(&name, cap(16)).expect("create writer");
    let mut reader = NoWaitReader::open(&name).expect("open reader");
    writer.write(&[1u8; 16]).expect("fill");

    let start = Instant::now();
    for _ in 0..10_000 {
        assert!(matches!(writer.write(b"x"), Err(StreamError::WouldBlock)));
    }
    let mut buf = [0u8; 16];
    reader.read(&mut buf).expect("drain");
    for _ in 0..10_000 {
        assert!(matches!(reader.read(&mut buf), Err(StreamError::WouldBlock)));
    }
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(writer.stats().would_block, 10_000);
    assert_eq!(reader.stats().would_block, 10_000);
}

/// Many tiny transfers with both sides sleeping often. A lost wakeup shows
/// up as a stall that only ends on the 100 ms wait slice, so the total
/// time bound catches it.
fn wake_stress(options: OpenOptions) {
    const MESSAGES: u32 = 20_000;
    let name = unique_name("wake");
    let mut reader = options
        .clone()
        .create(true)
        .capacity(cap(2))
        .reader::<Blocking>(&name)
        .expect("create reader");

    let writer_thread = {
        let name = name.clone();
        let options = options.clone();
        thread::spawn(move || {
            let mut writer = options.writer::<Blocking>(&name).expect("open writer");
            for i in 0..MESSAGES {
                writer.write(&[i as u8]).expect("write");
            }
            writer.stats().clone()
        })
    };

    let start = Instant::now();
    let mut buf = [0u8; 1];
    for i in 0..MESSAGES {
        reader.read_exact(&mut buf).expect("read");
        assert_eq!(buf[0], i as u8);
    }
    let elapsed = start.elapsed();

    let writer_stats = writer_thread.join().expect("writer thread panicked");
    assert_eq!(writer_stats.bytes, MESSAGES as u64);
    assert_eq!(reader.stats().bytes, MESSAGES as u64);
    assert!(
        elapsed < Duration::from_secs(20),
        "transfer stalled: {:?}",
        elapsed
    );
}

#[test]
fn test_blocking_wake_stress_futex() {
    wake_stress(OpenOptions::new());
}

#[test]
fn test_blocking_wake_stress_polling_doorbell() {
    wake_stress(OpenOptions::new().doorbell(Arc::new(PollingDoorbell::new(Duration::from_micros(
        20,
    )))));
}

#[test]
fn test_reader_blocked_on_empty_sees_eof_on_close() {
    let name = unique_name("eof");
    let mut reader = BlockingReader::create(&name, cap(32)).expect("create reader");
    let writer = BlockingWriter::open(&name).expect("open writer");

    let closer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        writer.close();
    });

    let start = Instant::now();
    let mut buf = [0u8; 8];
    assert_eq!(reader.read(&mut buf).expect("read"), 0);
    // Woken by the close, well before a 100 ms slice would notice.
    assert!(start.elapsed() < Duration::from_secs(1));
    closer.join().expect("closer panicked");
}

#[test]
fn test_writer_blocked_on_full_sees_reader_close() {
    let name = unique_name("wfull");
    let mut writer = BlockingWriter::create(&name, cap(4)).expect("create writer");
    let reader = BlockingReader::open(&name).expect("open reader");

    let closer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        reader.close();
    });

    assert_eq!(writer.write(b"0123456789").expect("partial"), 4);
    assert!(matches!(writer.write(b"x"), Err(StreamError::Closed)));
    closer.join().expect("closer panicked");
}

#[test]
fn test_removed_region_is_peer_gone() {
    let name = unique_name("gone");
    let _writer = LightWriter::create(&name, cap(16)).expect("create writer");
    let mut reader = LightReader::open(&name).expect("open reader");
    SharedMemoryRegion::remove(&name.object_name()).expect("remove");

    let mut buf = [0u8; 4];
    assert!(matches!(
        reader.read(&mut buf),
        Err(StreamError::PeerGone { .. })
    ));
}

#[test]
fn test_lifecycle_errors() {
    let name = unique_name("life");

    assert!(BlockingReader::open(&name).err().expect("missing").is_not_found());

    let writer = BlockingWriter::create(&name, cap(64)).expect("create writer");
    let err = BlockingWriter::create(&name, cap(64)).err().expect("duplicate");
    assert!(err.is_already_exists());

    // A second live writer on the same region is refused.
    let err = BlockingWriter::open(&name).err().expect("second writer");
    assert!(err.is_already_exists());

    // Opener closing does not remove the region.
    let reader = BlockingReader::open(&name).expect("open reader");
    reader.close();
    assert!(SharedMemoryRegion::exists(&name.object_name()));

    // A new reader may attach after the previous one closed.
    let reader = BlockingReader::open(&name).expect("reopen reader");
    drop(reader);

    // Creator closing removes it.
    writer.close();
    assert!(!SharedMemoryRegion::exists(&name.object_name()));
    assert!(BlockingReader::open(&name).err().expect("removed").is_not_found());
}

#[test]
fn test_capacity_mismatch_on_open() {
    let name = unique_name("capmis");
    let _reader = LightReader::create(&name, cap(128)).expect("create reader");
    let err = OpenOptions::new()
        .capacity(cap(256))
        .writer::<Light>(&name)
        .err()
        .expect("mismatch");
    assert!(matches!(err, StreamError::IncompatibleLayout { .. }));
}
