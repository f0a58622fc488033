// src/io/serial/utils.rs
//
// Line parameters for the switchboard link: supported baud rates and the
// raw 8N1 port configuration handed to the serialport crate.

use serialport::{DataBits, FlowControl, Parity, SerialPortBuilder, StopBits};
use std::time::Duration;

use crate::io::error::PortError;

// ============================================================================
// Baud Rates
// ============================================================================

/// Baud rates the microcontroller firmware can be built for.
pub const SUPPORTED_BAUD_RATES: [u32; 6] = [9600, 19200, 38400, 57600, 115200, 230400];

/// Rate used when the requested one is not supported.
pub const FALLBACK_BAUD_RATE: u32 = 115200;

pub fn is_supported_baud(baud: u32) -> bool {
    SUPPORTED_BAUD_RATES.contains(&baud)
}

/// Resolve the requested baud rate against the supported set.
/// Unsupported rates fall back to 115200 unless `strict` is set.
pub fn resolve_baud_rate(requested: u32, strict: bool) -> Result<u32, PortError> {
    if is_supported_baud(requested) {
        return Ok(requested);
    }
    if strict {
        return Err(PortError::UnsupportedBaud(requested));
    }
    tlog!(
        "[serial] Unsupported baud rate {}, falling back to {}",
        requested,
        FALLBACK_BAUD_RATE
    );
    Ok(FALLBACK_BAUD_RATE)
}

// ============================================================================
// Port Configuration
// ============================================================================

/// Builder for a raw-mode 8N1 port with no flow control.
///
/// serialport opens the device non-blocking without acquiring it as the
/// controlling terminal, ignores modem control lines and disables canonical
/// processing, echo and signals. `read_timeout` bounds each read so the
/// reader loop stays responsive when the line is idle.
pub fn port_builder(path: &str, baud: u32, read_timeout: Duration) -> SerialPortBuilder {
    serialport::new(path, baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(read_timeout)
}

/// Short line description for logs, e.g. "115200 8N1".
pub fn describe_line(baud: u32) -> String {
    format!("{} 8N1", baud)
}
