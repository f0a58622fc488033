// src/io/serial/reader.rs
//
// Serial port driver for the switchboard link.
// Owns the OS port handle, runs a background read loop that forwards every
// non-empty read as a RawChunk, and performs blocking frame writes.

use std::io::{Read, Write};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};
use std::thread::JoinHandle;
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};

use super::utils::{describe_line, port_builder, resolve_baud_rate};
use crate::io::codec::Frame;
use crate::io::error::PortError;
use crate::io::types::{ChunkSender, RawChunk};
use crate::io::now_us;
use crate::settings::LinkSettings;

// ============================================================================
// Port Trait
// ============================================================================

/// A point-to-point link the controller can drive.
///
/// Implementations gate open/close/write on one "is open" state so the
/// three always agree.
pub trait LinkPort: Send + Sync {
    /// Open `path` and start delivering received bytes to `chunks`.
    /// No-op if already open.
    fn open(&self, path: &str, baud_rate: u32, chunks: ChunkSender) -> Result<(), PortError>;

    /// Stop reading and release the handle. No-op if already closed.
    fn close(&self);

    /// Write one frame. Fails with `PortError::NotConnected` when closed.
    fn write(&self, frame: &Frame) -> Result<(), PortError>;

    fn is_open(&self) -> bool;

    /// Path and effective baud rate of the open port.
    fn connection(&self) -> Option<(String, u32)>;
}

// ============================================================================
// Configuration
// ============================================================================

/// Bounds for the per-read timeout. Zero would spin the reader; a long
/// timeout delays `close` by the same amount.
pub const MIN_READ_TIMEOUT_MS: u64 = 10;
pub const MAX_READ_TIMEOUT_MS: u64 = 1000;

/// Reader configuration
#[derive(Clone, Debug)]
pub struct SerialLinkConfig {
    /// Upper bound on how long a single read waits for data
    pub read_timeout: Duration,
    /// Maximum bytes taken per read
    pub read_chunk_size: usize,
    /// Reject unsupported baud rates instead of falling back
    pub strict_baud: bool,
}

impl Default for SerialLinkConfig {
    fn default() -> Self {
        SerialLinkConfig {
            read_timeout: Duration::from_millis(100),
            read_chunk_size: 1024,
            strict_baud: false,
        }
    }
}

impl From<&LinkSettings> for SerialLinkConfig {
    fn from(settings: &LinkSettings) -> Self {
        SerialLinkConfig {
            read_timeout: Duration::from_millis(
                settings
                    .read_timeout_ms
                    .clamp(MIN_READ_TIMEOUT_MS, MAX_READ_TIMEOUT_MS),
            ),
            read_chunk_size: settings.read_chunk_size.max(1),
            strict_baud: settings.strict_baud,
        }
    }
}

// ============================================================================
// Serial Link
// ============================================================================

struct OpenPort {
    path: String,
    baud_rate: u32,
    writer: Box<dyn SerialPort>,
    // Dropped after `writer` is taken out; stops the read loop
    reader: ReadLoop,
}

/// Serial port implementing LinkPort on top of the serialport crate.
pub struct SerialLink {
    config: SerialLinkConfig,
    // Single state gate: writes hold this lock, so close waits for them
    state: Mutex<Option<OpenPort>>,
}

impl SerialLink {
    pub fn new(config: SerialLinkConfig) -> Self {
        Self {
            config,
            state: Mutex::new(None),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, Option<OpenPort>> {
        // A panic while holding the lock leaves the handle usable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SerialLink {
    fn default() -> Self {
        SerialLink::new(SerialLinkConfig::default())
    }
}

impl LinkPort for SerialLink {
    fn open(&self, path: &str, baud_rate: u32, chunks: ChunkSender) -> Result<(), PortError> {
        let mut state = self.lock_state();
        if state.is_some() {
            return Ok(());
        }

        let baud_rate = resolve_baud_rate(baud_rate, self.config.strict_baud)?;

        // Every early return below drops the handle, which closes it
        let writer = port_builder(path, baud_rate, self.config.read_timeout)
            .open()
            .map_err(|e| {
                // Build the error first so errno is read before logging touches it
                let err = PortError::open(path, &e);
                tlog!("[serial] Failed to open {}: {}", path, err);
                err
            })?;

        writer
            .clear(ClearBuffer::All)
            .map_err(|e| PortError::open(path, &e))?;

        let read_handle = writer
            .try_clone()
            .map_err(|e| PortError::open(path, &e))?;

        let reader = ReadLoop::spawn(
            read_handle,
            path.to_string(),
            self.config.read_chunk_size,
            chunks,
        )
        .map_err(|e| PortError::Open {
            path: path.to_string(),
            code: e.raw_os_error(),
            message: format!("failed to start reader: {}", e),
        })?;

        tlog!(
            "[serial] Opened {} at {}",
            path,
            describe_line(baud_rate)
        );

        *state = Some(OpenPort {
            path: path.to_string(),
            baud_rate,
            writer,
            reader,
        });
        Ok(())
    }

    fn close(&self) {
        let open = self.lock_state().take();
        if let Some(open) = open {
            let OpenPort { path, writer, reader, .. } = open;
            drop(writer);
            // Joins the read loop, which drops its own handle on the way out
            drop(reader);
            tlog!("[serial] Closed {}", path);
        }
    }

    fn write(&self, frame: &Frame) -> Result<(), PortError> {
        let mut state = self.lock_state();
        let open = state.as_mut().ok_or(PortError::NotConnected)?;

        open.writer
            .write_all(frame.as_bytes())
            .and_then(|_| open.writer.flush())
            .map_err(|e| {
                tlog!("[serial] Write to {} failed: {}", open.path, e);
                PortError::write(&e)
            })
    }

    fn is_open(&self) -> bool {
        self.lock_state().is_some()
    }

    fn connection(&self) -> Option<(String, u32)> {
        self.lock_state()
            .as_ref()
            .map(|open| (open.path.clone(), open.baud_rate))
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Read Loop
// ============================================================================

/// Background reader bound to one port handle. Dropping it cancels the loop
/// and waits for the thread, which releases the handle as it exits.
struct ReadLoop {
    cancel_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReadLoop {
    fn spawn(
        port: Box<dyn SerialPort>,
        path: String,
        chunk_size: usize,
        chunks: ChunkSender,
    ) -> std::io::Result<Self> {
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let flag = cancel_flag.clone();

        let handle = std::thread::Builder::new()
            .name(format!("serial-reader {}", path))
            .spawn(move || run_read_loop(port, path, chunk_size, chunks, flag))?;

        Ok(Self {
            cancel_flag,
            handle: Some(handle),
        })
    }
}

impl Drop for ReadLoop {
    fn drop(&mut self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tlog!("[serial] Reader thread panicked");
            }
        }
    }
}

/// Blocking read loop. Each successful non-empty read becomes exactly one
/// RawChunk. Timeouts and empty reads are expected on an idle line.
fn run_read_loop(
    mut port: Box<dyn SerialPort>,
    path: String,
    chunk_size: usize,
    chunks: ChunkSender,
    cancel_flag: Arc<AtomicBool>,
) {
    let mut buf = vec![0u8; chunk_size];
    let mut last_error: Option<std::io::ErrorKind> = None;

    while !cancel_flag.load(Ordering::Relaxed) {
        match port.read(&mut buf) {
            Ok(n) if n > 0 => {
                last_error = None;
                let chunk = RawChunk {
                    bytes: buf[..n].to_vec(),
                    timestamp_us: now_us(),
                };
                if chunks.send(chunk).is_err() {
                    // Consumer is gone; nothing left to deliver to
                    tlog!("[serial] {} has no consumer, stopping reader", path);
                    break;
                }
            }
            Ok(_) => {}
            Err(ref e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                // Log once per streak, then back off for one poll interval
                if last_error != Some(e.kind()) {
                    tlog!("[serial] Read error on {}: {}", path, e);
                    last_error = Some(e.kind());
                }
                std::thread::sleep(port.timeout());
            }
        }
    }
}
