// src/io/types.rs
//
// Channel and event types shared between the serial reader, the controller
// and the presentation layer.

use serde::Serialize;
use tokio::sync::mpsc;

use super::codec::Frame;

// ============================================================================
// Raw Chunks (reader -> controller)
// ============================================================================

/// Bytes produced by one read from the port. No alignment guarantee.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawChunk {
    pub bytes: Vec<u8>,
    /// Host UNIX timestamp in microseconds, taken when the read returned.
    pub timestamp_us: u64,
}

/// Sender held by the read loop. Sending never blocks, so closing the port
/// cannot stall behind a slow consumer.
pub type ChunkSender = mpsc::UnboundedSender<RawChunk>;
pub type ChunkReceiver = mpsc::UnboundedReceiver<RawChunk>;

pub fn chunk_channel() -> (ChunkSender, ChunkReceiver) {
    mpsc::unbounded_channel()
}

// ============================================================================
// Link Events (controller -> presentation layer)
// ============================================================================

/// What a send was addressed by.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SendTarget {
    /// Command table key, e.g. "LIGHT 1"
    Key(String),
    /// Caller-supplied hex text
    Raw(String),
}

/// Events emitted by the controller, in the order they happened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkEvent {
    /// A chunk of bytes arrived from the port
    RawReceived { hex: String, len: usize, timestamp_us: u64 },
    /// A complete frame was reassembled
    FrameReceived {
        hex: String,
        frame: Frame,
        timestamp_us: u64,
    },
    /// Outcome of send_cmd / send_raw
    SendResult {
        target: SendTarget,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        hex: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp_us: u64,
    },
    /// Port opened or closed
    ConnectionChanged {
        open: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        port: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        baud_rate: Option<u32>,
        timestamp_us: u64,
    },
    /// Failure not tied to a send (e.g. connect)
    Error { message: String, timestamp_us: u64 },
}

pub type EventSender = mpsc::UnboundedSender<LinkEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<LinkEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::codec::build_frame;

    #[test]
    fn test_send_result_serializes_tagged() {
        let event = LinkEvent::SendResult {
            target: SendTarget::Key("LIGHT 1".to_string()),
            success: true,
            hex: Some("AA 55 02 01 00 00".to_string()),
            error: None,
            timestamp_us: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "send_result");
        assert_eq!(json["target"]["kind"], "key");
        assert_eq!(json["target"]["value"], "LIGHT 1");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_frame_event_carries_bytes() {
        let frame = build_frame(&[0xAA, 0x55, 0x03, 0x01]).unwrap();
        let event = LinkEvent::FrameReceived {
            hex: frame.to_hex(),
            frame,
            timestamp_us: 7,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "frame_received");
        assert_eq!(json["frame"], serde_json::json!([170, 85, 3, 1, 0, 0]));
    }
}
