// src/io/serial/mod.rs
//
// Serial port driver with fixed-width frame reassembly.
//
// Features:
// - Device discovery (directory scan and USB metadata)
// - Raw-mode 8N1 port configuration with a supported baud set
// - Background read loop delivering raw chunks
// - Header-aligned frame extraction from the raw stream

pub mod framer;
pub mod ports;
pub mod reader;
pub mod utils;

pub use framer::{FrameReassembler, DEFAULT_MAX_BUFFER_LEN};
pub use ports::{describe_ports, list_ports_in, DeviceBus, DeviceInfo, UsbIdentity, NO_PORT};
pub use reader::{
    LinkPort, SerialLink, SerialLinkConfig, MAX_READ_TIMEOUT_MS, MIN_READ_TIMEOUT_MS,
};
pub use utils::{resolve_baud_rate, FALLBACK_BAUD_RATE, SUPPORTED_BAUD_RATES};
