// src/io/serial/framer.rs
//
// Reassembly of fixed-width frames from an arbitrarily chunked byte stream.
// Bytes before a header are noise and are dropped; frames are only ever
// emitted header-aligned and complete.

use crate::io::codec::{Frame, FRAME_HEADER, FRAME_LEN};

/// Default cap on buffered bytes before the reassembler resets itself.
pub const DEFAULT_MAX_BUFFER_LEN: usize = 4096;

/// Stateful frame extractor for one serial stream. Not reentrant.
#[derive(Debug)]
pub struct FrameReassembler {
    buffer: Vec<u8>,
    max_len: usize,
    discarded: u64,
    overflows: u64,
}

impl Default for FrameReassembler {
    fn default() -> Self {
        FrameReassembler::new(DEFAULT_MAX_BUFFER_LEN)
    }
}

impl FrameReassembler {
    /// Create a reassembler that resets once more than `max_len` bytes are pending.
    pub fn new(max_len: usize) -> Self {
        FrameReassembler {
            buffer: Vec::with_capacity(FRAME_LEN * 4),
            max_len: max_len.max(FRAME_LEN),
            discarded: 0,
            overflows: 0,
        }
    }

    /// Feed a chunk of received bytes.
    /// Returns every complete frame now available, in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = find_header(&self.buffer) {
            if pos > 0 {
                self.buffer.drain(..pos);
                self.discarded += pos as u64;
            }

            if self.buffer.len() < FRAME_LEN {
                break;
            }

            let mut bytes = [0u8; FRAME_LEN];
            bytes.copy_from_slice(&self.buffer[..FRAME_LEN]);
            self.buffer.drain(..FRAME_LEN);
            frames.push(Frame::from_aligned(bytes));
        }

        if self.buffer.len() > self.max_len {
            self.reset_after_overflow();
        }

        frames
    }

    /// Bytes waiting for the rest of a frame (or for a header).
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Total bytes dropped as noise or on overflow.
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded
    }

    pub fn overflow_count(&self) -> u64 {
        self.overflows
    }

    // Keep a trailing 0xAA; it may be the first half of a header.
    fn reset_after_overflow(&mut self) {
        let keep = usize::from(self.buffer.last() == Some(&FRAME_HEADER[0]));
        let dropped = self.buffer.len() - keep;
        self.buffer.drain(..dropped);
        self.discarded += dropped as u64;
        self.overflows += 1;
        tlog!(
            "[framer] Buffer exceeded {} bytes without a frame, dropped {} bytes",
            self.max_len,
            dropped
        );
    }
}

/// Index of the earliest header occurrence in `buf`.
fn find_header(buf: &[u8]) -> Option<usize> {
    buf.windows(FRAME_HEADER.len())
        .position(|w| w == &FRAME_HEADER[..])
}
