// src/controller.rs
//
// Session controller for the switchboard link.
//
// Sends go presentation layer -> Controller -> codec -> port. Received bytes
// come back as RawChunks from the port's read loop and are consumed here one
// at a time, in arrival order, so the reassembler is never shared.
//
// The read loop only holds the chunk sender; it never holds the controller.
// Dropping the controller drops the receiver, and the loop stops on its next
// delivery.

use crate::commands;
use crate::io::serial::{FrameReassembler, LinkPort};
use crate::io::{
    build_frame, chunk_channel, event_channel, now_us, parse_hex, ChunkReceiver, EventReceiver,
    EventSender, Frame, LinkError, LinkEvent, RawChunk, SendTarget, to_hex_string,
};

pub struct Controller<P: LinkPort> {
    port: P,
    reassembler: FrameReassembler,
    events: EventSender,
    chunks: Option<ChunkReceiver>,
}

impl<P: LinkPort> Controller<P> {
    /// Create a controller around `port`. The returned receiver yields every
    /// event the controller emits.
    pub fn new(port: P, max_buffer_len: usize) -> (Self, EventReceiver) {
        let (events, event_rx) = event_channel();
        let controller = Self {
            port,
            reassembler: FrameReassembler::new(max_buffer_len),
            events,
            chunks: None,
        };
        (controller, event_rx)
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn reassembler(&self) -> &FrameReassembler {
        &self.reassembler
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_open()
    }

    fn emit(&self, event: LinkEvent) {
        // Nobody listening is not an error
        let _ = self.events.send(event);
    }

    // ========================================================================
    // Connection
    // ========================================================================

    /// Open the port. No-op if it is already open.
    pub fn connect(&mut self, path: &str, baud_rate: u32) -> Result<(), LinkError> {
        if self.port.is_open() {
            return Ok(());
        }

        let (chunk_tx, chunk_rx) = chunk_channel();
        if let Err(e) = self.port.open(path, baud_rate, chunk_tx) {
            tlog!("[controller] Connect to {} failed: {}", path, e);
            self.emit(LinkEvent::Error {
                message: e.to_string(),
                timestamp_us: now_us(),
            });
            return Err(e.into());
        }
        self.chunks = Some(chunk_rx);

        let (port, baud) = self
            .port
            .connection()
            .unwrap_or_else(|| (path.to_string(), baud_rate));
        self.emit(LinkEvent::ConnectionChanged {
            open: true,
            port: Some(port),
            baud_rate: Some(baud),
            timestamp_us: now_us(),
        });
        Ok(())
    }

    /// Close the port. Chunks already received are still processed first.
    pub fn disconnect(&mut self) {
        if !self.port.is_open() {
            return;
        }
        self.port.close();
        self.process_pending();
        self.chunks = None;

        self.emit(LinkEvent::ConnectionChanged {
            open: false,
            port: None,
            baud_rate: None,
            timestamp_us: now_us(),
        });
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Send the frame for a command table key.
    /// Unknown keys fail without touching the port.
    pub fn send_cmd(&self, key: &str) -> Result<Frame, LinkError> {
        let result = commands::frame_for(key).and_then(|frame| self.write_frame(frame));
        self.report_send(SendTarget::Key(key.to_string()), &result);
        result
    }

    /// Send caller-supplied hex text as a frame.
    pub fn send_raw(&self, hex: &str) -> Result<Frame, LinkError> {
        let result = parse_hex(hex)
            .map_err(LinkError::from)
            .and_then(|raw| build_frame(&raw).map_err(LinkError::from))
            .and_then(|frame| self.write_frame(frame));
        self.report_send(SendTarget::Raw(hex.to_string()), &result);
        result
    }

    fn write_frame(&self, frame: Frame) -> Result<Frame, LinkError> {
        self.port.write(&frame)?;
        Ok(frame)
    }

    fn report_send(&self, target: SendTarget, result: &Result<Frame, LinkError>) {
        let event = match result {
            Ok(frame) => LinkEvent::SendResult {
                target,
                success: true,
                hex: Some(frame.to_hex()),
                error: None,
                timestamp_us: now_us(),
            },
            Err(e) => {
                tlog!("[controller] Send {:?} failed: {}", target, e);
                LinkEvent::SendResult {
                    target,
                    success: false,
                    hex: None,
                    error: Some(e.to_string()),
                    timestamp_us: now_us(),
                }
            }
        };
        self.emit(event);
    }

    // ========================================================================
    // Receiving
    // ========================================================================

    /// Handle one chunk from the port: log it raw, then surface any frames it
    /// completes.
    pub fn on_bytes_received(&mut self, chunk: &RawChunk) -> Vec<Frame> {
        self.emit(LinkEvent::RawReceived {
            hex: to_hex_string(&chunk.bytes),
            len: chunk.bytes.len(),
            timestamp_us: chunk.timestamp_us,
        });

        let frames = self.reassembler.feed(&chunk.bytes);
        for frame in &frames {
            self.emit(LinkEvent::FrameReceived {
                hex: frame.to_hex(),
                frame: *frame,
                timestamp_us: chunk.timestamp_us,
            });
        }
        frames
    }

    /// Process every chunk already queued by the read loop without waiting.
    /// Returns the number of chunks handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Some(chunk) = self.chunks.as_mut().and_then(|rx| rx.try_recv().ok()) {
            self.on_bytes_received(&chunk);
            handled += 1;
        }
        handled
    }

    /// Wait for the next chunk and process it.
    /// Returns `None` when not connected or the read loop has stopped.
    pub async fn next_chunk(&mut self) -> Option<Vec<Frame>> {
        let chunk = self.chunks.as_mut()?.recv().await?;
        Some(self.on_bytes_received(&chunk))
    }
}

impl<P: LinkPort> Drop for Controller<P> {
    fn drop(&mut self) {
        self.port.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{ChunkSender, CommandError, FrameError, HexParseError, PortError};
    use std::sync::Mutex;

    /// In-memory port that records writes and lets tests inject chunks.
    #[derive(Default)]
    struct MockPort {
        state: Mutex<MockState>,
    }

    #[derive(Default)]
    struct MockState {
        open: Option<(String, u32)>,
        chunks: Option<ChunkSender>,
        writes: Vec<Frame>,
        fail_writes: bool,
    }

    impl MockPort {
        fn writes(&self) -> Vec<Frame> {
            self.state.lock().unwrap().writes.clone()
        }

        fn inject(&self, bytes: &[u8]) {
            let state = self.state.lock().unwrap();
            let tx = state.chunks.as_ref().expect("port not open");
            tx.send(RawChunk {
                bytes: bytes.to_vec(),
                timestamp_us: now_us(),
            })
            .unwrap();
        }

        fn set_fail_writes(&self, fail: bool) {
            self.state.lock().unwrap().fail_writes = fail;
        }
    }

    impl LinkPort for MockPort {
        fn open(&self, path: &str, baud_rate: u32, chunks: crate::io::ChunkSender) -> Result<(), PortError> {
            let mut state = self.state.lock().unwrap();
            if path == "/dev/missing" {
                return Err(PortError::Open {
                    path: path.to_string(),
                    code: Some(2),
                    message: "No such file or directory".to_string(),
                });
            }
            state.open = Some((path.to_string(), baud_rate));
            state.chunks = Some(chunks);
            Ok(())
        }

        fn close(&self) {
            let mut state = self.state.lock().unwrap();
            state.open = None;
            state.chunks = None;
        }

        fn write(&self, frame: &Frame) -> Result<(), PortError> {
            let mut state = self.state.lock().unwrap();
            if state.open.is_none() {
                return Err(PortError::NotConnected);
            }
            if state.fail_writes {
                return Err(PortError::Write {
                    code: Some(5),
                    message: "Input/output error (os error 5)".to_string(),
                });
            }
            state.writes.push(*frame);
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.state.lock().unwrap().open.is_some()
        }

        fn connection(&self) -> Option<(String, u32)> {
            self.state.lock().unwrap().open.clone()
        }
    }

    fn drain(rx: &mut EventReceiver) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn connected() -> (Controller<MockPort>, EventReceiver) {
        let (mut controller, mut rx) = Controller::new(MockPort::default(), 4096);
        controller.connect("/dev/ttyUSB0", 115200).unwrap();
        drain(&mut rx);
        (controller, rx)
    }

    #[test]
    fn test_connect_emits_state_change() {
        let (mut controller, mut rx) = Controller::new(MockPort::default(), 4096);
        controller.connect("/dev/ttyUSB0", 9600).unwrap();

        assert!(controller.is_connected());
        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [LinkEvent::ConnectionChanged { open: true, port: Some(p), baud_rate: Some(9600), .. }]
                if p == "/dev/ttyUSB0"
        ));

        // Second connect is a no-op
        controller.connect("/dev/ttyUSB1", 9600).unwrap();
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_connect_failure_is_reported() {
        let (mut controller, mut rx) = Controller::new(MockPort::default(), 4096);

        let err = controller.connect("/dev/missing", 115200).unwrap_err();
        assert!(matches!(err, LinkError::Port(PortError::Open { code: Some(2), .. })));
        assert!(!controller.is_connected());

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], LinkEvent::Error { message, .. } if message.contains("/dev/missing")));
    }

    #[test]
    fn test_send_cmd_writes_padded_frame() {
        let (controller, mut rx) = connected();

        let frame = controller.send_cmd("LIGHT 1").unwrap();
        assert_eq!(frame.as_bytes(), &[0xAA, 0x55, 0x02, 0x01, 0x00, 0x00]);
        assert_eq!(controller.port().writes(), vec![frame]);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            LinkEvent::SendResult { target: SendTarget::Key(k), success: true, hex: Some(h), error: None, .. }
                if k == "LIGHT 1" && h == "AA 55 02 01 00 00"
        ));
    }

    #[test]
    fn test_send_cmd_unknown_key_does_not_write() {
        let (controller, mut rx) = connected();

        let err = controller.send_cmd("NOPE").unwrap_err();
        assert_eq!(err, LinkError::Command(CommandError::UnknownKey("NOPE".to_string())));
        assert!(controller.port().writes().is_empty());

        let events = drain(&mut rx);
        assert!(matches!(
            &events[0],
            LinkEvent::SendResult { success: false, error: Some(msg), target: SendTarget::Key(k), .. }
                if msg.contains("NOPE") && k == "NOPE"
        ));
    }

    #[test]
    fn test_send_raw_pipeline() {
        let (controller, _rx) = connected();

        let frame = controller.send_raw("0xAA 0x55 4 1").unwrap();
        assert_eq!(frame.as_bytes(), &[0xAA, 0x55, 0x04, 0x01, 0x00, 0x00]);

        assert_eq!(
            controller.send_raw("AA5"),
            Err(LinkError::Hex(HexParseError::OddLength))
        );
        assert_eq!(
            controller.send_raw("00 AA 55"),
            Err(LinkError::Frame(FrameError::MissingHeader))
        );
        assert_eq!(
            controller.send_raw(""),
            Err(LinkError::Frame(FrameError::MissingHeader))
        );
        assert_eq!(controller.port().writes().len(), 1);
    }

    #[test]
    fn test_send_when_disconnected_fails_softly() {
        let (controller, mut rx) = Controller::new(MockPort::default(), 4096);

        assert_eq!(
            controller.send_cmd("DOOR 1"),
            Err(LinkError::Port(PortError::NotConnected))
        );
        let events = drain(&mut rx);
        assert!(matches!(
            &events[0],
            LinkEvent::SendResult { success: false, error: Some(msg), .. } if msg == "not connected"
        ));
    }

    #[test]
    fn test_write_failure_keeps_session() {
        let (controller, mut rx) = connected();
        controller.port().set_fail_writes(true);

        let err = controller.send_cmd("EYE 1").unwrap_err();
        assert!(matches!(err, LinkError::Port(PortError::Write { code: Some(5), .. })));
        assert!(controller.is_connected());

        controller.port().set_fail_writes(false);
        assert!(controller.send_cmd("EYE 0").is_ok());
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn test_received_bytes_become_frames() {
        let (mut controller, mut rx) = connected();

        controller.port().inject(&[0x00, 0xAA, 0x55, 0x01]);
        controller.port().inject(&[0x02, 0x03, 0x04, 0x99]);
        assert_eq!(controller.process_pending(), 2);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], LinkEvent::RawReceived { hex, len: 4, .. } if hex == "00 AA 55 01"));
        assert!(matches!(&events[1], LinkEvent::RawReceived { len: 4, .. }));
        match &events[2] {
            LinkEvent::FrameReceived { hex, frame, .. } => {
                assert_eq!(hex, "AA 55 01 02 03 04");
                assert_eq!(frame.as_bytes(), &[0xAA, 0x55, 0x01, 0x02, 0x03, 0x04]);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(controller.reassembler().buffered(), &[0x99]);
    }

    #[tokio::test]
    async fn test_next_chunk_waits_for_data() {
        let (mut controller, mut rx) = connected();

        controller.port().inject(&[
            0xAA, 0x55, 0x02, 0x01, 0x00, 0x00, 0xAA, 0x55, 0x02, 0x00, 0x00, 0x00,
        ]);
        let frames = controller.next_chunk().await.unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(commands::key_for(&frames[0]), Some("LIGHT 1"));
        assert_eq!(commands::key_for(&frames[1]), Some("LIGHT 0"));
        assert!(controller.reassembler().buffered().is_empty());
        assert_eq!(drain(&mut rx).len(), 3);
    }

    #[tokio::test]
    async fn test_next_chunk_ends_after_disconnect() {
        let (mut controller, mut rx) = connected();

        controller.port().inject(&[0xAA, 0x55, 0x03, 0x01, 0x00, 0x00]);
        controller.disconnect();

        // Queued data was flushed through before the state change
        let events = drain(&mut rx);
        assert!(matches!(events[1], LinkEvent::FrameReceived { .. }));
        assert!(matches!(
            events.last(),
            Some(LinkEvent::ConnectionChanged { open: false, .. })
        ));

        assert!(controller.next_chunk().await.is_none());
        assert!(!controller.is_connected());

        // Idempotent
        controller.disconnect();
        assert!(drain(&mut rx).is_empty());
    }
}
