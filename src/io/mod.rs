// src/io/mod.rs
//
// Serial IO core for the switchboard link.
// Frame codec, error taxonomy, the serial driver and the event types
// exchanged with whatever presentation layer sits on top.

pub mod codec;
mod error;
pub mod serial;
mod types;

pub use codec::{build_frame, parse_hex, to_hex_string, Frame, FRAME_HEADER, FRAME_LEN};
pub use error::{CommandError, FrameError, HexParseError, LinkError, PortError};
pub use types::{
    chunk_channel, event_channel, ChunkReceiver, ChunkSender, EventReceiver, EventSender,
    LinkEvent, RawChunk, SendTarget,
};

use std::time::{SystemTime, UNIX_EPOCH};

/// Get current time in microseconds since UNIX epoch
pub fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
