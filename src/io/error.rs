// src/io/error.rs
//
// Error taxonomy for the serial link. Every variant is recoverable: the
// controller turns these into events and the session keeps running.

use thiserror::Error;

/// Hex text could not be turned into bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexParseError {
    /// A single contiguous hex token had an odd number of digits.
    #[error("hex string has an odd number of digits")]
    OddLength,
    /// A token (or digit pair) is not a valid hex byte.
    #[error("illegal hex byte: {0:?}")]
    IllegalByte(String),
}

/// Bytes could not be turned into a protocol frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame must start with header AA 55")]
    MissingHeader,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command key: {0:?}")]
    UnknownKey(String),
}

/// Port open, configure and write failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("not connected")]
    NotConnected,
    #[error("failed to open {path}: {message}{}", os_suffix(.code))]
    Open {
        path: String,
        code: Option<i32>,
        message: String,
    },
    #[error("serial write error: {message}")]
    Write { code: Option<i32>, message: String },
    #[error("unsupported baud rate {0}")]
    UnsupportedBaud(u32),
}

impl PortError {
    /// Must be called straight after the failed call: the OS code is read
    /// from errno, with the flattened io::ErrorKind as a fallback.
    pub(crate) fn open(path: &str, err: &serialport::Error) -> Self {
        let code = last_os_code(err).or_else(|| match err.kind() {
            serialport::ErrorKind::Io(kind) => io_kind_code(kind),
            _ => None,
        });
        PortError::Open {
            path: path.to_string(),
            code,
            message: err.description.clone(),
        }
    }

    pub(crate) fn write(err: &std::io::Error) -> Self {
        PortError::Write {
            code: err.raw_os_error(),
            message: err.to_string(),
        }
    }

    /// OS error code behind this failure, when the platform reported one.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            PortError::Open { code, .. } | PortError::Write { code, .. } => *code,
            _ => None,
        }
    }
}

fn os_suffix(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!(" (os error {})", c),
        None => String::new(),
    }
}

// serialport drops the errno of a failed open/configure step, but the
// thread's errno still holds it. InvalidInput is raised by serialport itself.
#[cfg(unix)]
fn last_os_code(err: &serialport::Error) -> Option<i32> {
    match err.kind() {
        serialport::ErrorKind::InvalidInput => None,
        _ => std::io::Error::last_os_error()
            .raw_os_error()
            .filter(|&code| code != 0),
    }
}

#[cfg(not(unix))]
fn last_os_code(_err: &serialport::Error) -> Option<i32> {
    None
}

// serialport flattens errno into an io::ErrorKind; recover the common codes.
#[cfg(unix)]
fn io_kind_code(kind: std::io::ErrorKind) -> Option<i32> {
    use std::io::ErrorKind;
    match kind {
        ErrorKind::NotFound => Some(2),          // ENOENT
        ErrorKind::PermissionDenied => Some(13), // EACCES
        _ => None,
    }
}

#[cfg(not(unix))]
fn io_kind_code(_kind: std::io::ErrorKind) -> Option<i32> {
    None
}

/// Any failure in the send/receive pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error(transparent)]
    Hex(#[from] HexParseError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Port(#[from] PortError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_include_offending_input() {
        assert_eq!(
            HexParseError::IllegalByte("ZZ".to_string()).to_string(),
            "illegal hex byte: \"ZZ\""
        );
        assert_eq!(
            CommandError::UnknownKey("NOPE".to_string()).to_string(),
            "unknown command key: \"NOPE\""
        );
    }

    #[test]
    fn test_port_error_carries_os_code() {
        let io = std::io::Error::from_raw_os_error(5);
        let err = PortError::write(&io);
        assert_eq!(err.os_code(), Some(5));
        assert!(err.to_string().contains("(os error 5)"));

        assert_eq!(PortError::NotConnected.os_code(), None);
        assert_eq!(PortError::NotConnected.to_string(), "not connected");
    }

    #[test]
    fn test_link_error_is_transparent() {
        let err: LinkError = FrameError::MissingHeader.into();
        assert_eq!(err.to_string(), "frame must start with header AA 55");
        assert!(matches!(err, LinkError::Frame(FrameError::MissingHeader)));
    }
}
