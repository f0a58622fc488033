// src/io/codec.rs
//
// Fixed-width frame codec for the switchboard link.
//
// Wire format (6 bytes): [0xAA][0x55][b2][b3][b4][b5]
// Shorter payloads are zero-padded, longer input is truncated.
// Hex text accepted from callers is parsed here before framing.

use serde::Serialize;
use std::fmt;

use super::error::{FrameError, HexParseError};

// ============================================================================
// Constants
// ============================================================================

/// Two-byte marker that starts every frame.
pub const FRAME_HEADER: [u8; 2] = [0xAA, 0x55];

/// Total frame length including the header.
pub const FRAME_LEN: usize = 6;

// ============================================================================
// Frame
// ============================================================================

/// A complete, header-aligned protocol frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    /// Wrap bytes that are already known to start with the header.
    pub(crate) fn from_aligned(bytes: [u8; FRAME_LEN]) -> Self {
        debug_assert_eq!(bytes[..2], FRAME_HEADER);
        Frame(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// Bytes 2..6, everything after the header.
    pub fn payload(&self) -> &[u8] {
        &self.0[FRAME_HEADER.len()..]
    }

    /// Subsystem id (door, light, ...) carried in byte 2.
    pub fn subsystem(&self) -> u8 {
        self.0[2]
    }

    /// Value byte carried in byte 3.
    pub fn value(&self) -> u8 {
        self.0[3]
    }

    pub fn to_hex(&self) -> String {
        to_hex_string(&self.0)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Frame {
    type Error = FrameError;

    fn try_from(raw: &[u8]) -> Result<Self, Self::Error> {
        build_frame(raw)
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Build a frame from raw bytes.
///
/// The input must begin with the header. Anything shorter than a frame is
/// right-padded with zeros; anything longer is cut to the first 6 bytes.
pub fn build_frame(raw: &[u8]) -> Result<Frame, FrameError> {
    if raw.len() < FRAME_HEADER.len() || raw[..2] != FRAME_HEADER {
        return Err(FrameError::MissingHeader);
    }

    let mut bytes = [0u8; FRAME_LEN];
    let n = raw.len().min(FRAME_LEN);
    bytes[..n].copy_from_slice(&raw[..n]);
    Ok(Frame(bytes))
}

/// Format bytes as space-separated uppercase hex, e.g. "AA 55 02 01".
pub fn to_hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Hex Parsing
// ============================================================================

/// Parse user-supplied hex text into bytes.
///
/// Two shapes are accepted:
/// - one contiguous token ("AA5502", "0xAA55"), which must have an even digit count
/// - several whitespace/comma separated tokens ("AA 55 2", "0xAA,0x55"), each 1-2 digits
///
/// Empty or whitespace-only input yields no bytes.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, HexParseError> {
    let tokens: Vec<&str> = input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();

    match tokens.as_slice() {
        [] => Ok(Vec::new()),
        [token] => parse_contiguous(token),
        _ => tokens.iter().map(|t| parse_byte_token(t)).collect(),
    }
}

fn strip_hex_prefix(token: &str) -> &str {
    token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token)
}

fn parse_contiguous(token: &str) -> Result<Vec<u8>, HexParseError> {
    let digits = strip_hex_prefix(token);
    hex::decode(digits).map_err(|e| match e {
        hex::FromHexError::InvalidHexCharacter { index, .. } => {
            // Report the offending digit pair
            let start = index - index % 2;
            let end = (start + 2).min(digits.len());
            let pair = digits.get(start..end).unwrap_or(token);
            HexParseError::IllegalByte(pair.to_string())
        }
        hex::FromHexError::OddLength | hex::FromHexError::InvalidStringLength => {
            HexParseError::OddLength
        }
    })
}

fn parse_byte_token(token: &str) -> Result<u8, HexParseError> {
    let digits = strip_hex_prefix(token);
    let padded = match digits.len() {
        1 => format!("0{}", digits),
        2 => digits.to_string(),
        _ => return Err(HexParseError::IllegalByte(token.to_string())),
    };

    let mut byte = [0u8; 1];
    hex::decode_to_slice(&padded, &mut byte)
        .map_err(|_| HexParseError::IllegalByte(token.to_string()))?;
    Ok(byte[0])
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_contiguous_and_spaced_agree() {
        let expected = vec![0xAA, 0x55];
        assert_eq!(parse_hex("AA55").unwrap(), expected);
        assert_eq!(parse_hex("AA 55").unwrap(), expected);
        assert_eq!(parse_hex("0xAA55").unwrap(), expected);
        assert_eq!(parse_hex("0xaa, 0x55").unwrap(), expected);
    }

    #[test]
    fn test_parse_hex_single_digit_tokens() {
        assert_eq!(parse_hex("AA 55 2 1").unwrap(), vec![0xAA, 0x55, 0x02, 0x01]);
        assert_eq!(parse_hex("A B").unwrap(), vec![0x0A, 0x0B]);
    }

    #[test]
    fn test_parse_hex_odd_length() {
        assert_eq!(parse_hex("A"), Err(HexParseError::OddLength));
        assert_eq!(parse_hex("0xAA5"), Err(HexParseError::OddLength));
    }

    #[test]
    fn test_parse_hex_illegal_byte() {
        assert_eq!(
            parse_hex("ZZ"),
            Err(HexParseError::IllegalByte("ZZ".to_string()))
        );
        assert_eq!(
            parse_hex("AA5G"),
            Err(HexParseError::IllegalByte("5G".to_string()))
        );
        assert_eq!(
            parse_hex("AA 55 XY"),
            Err(HexParseError::IllegalByte("XY".to_string()))
        );
        // Multi-token mode caps each token at two digits
        assert_eq!(
            parse_hex("AA 555"),
            Err(HexParseError::IllegalByte("555".to_string()))
        );
    }

    #[test]
    fn test_parse_hex_empty_input() {
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_hex("   \t ").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_hex(" , ").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_build_frame_pads_short_input() {
        let frame = build_frame(&[0xAA, 0x55, 0x02, 0x01]).unwrap();
        assert_eq!(frame.as_bytes(), &[0xAA, 0x55, 0x02, 0x01, 0x00, 0x00]);
        assert_eq!(frame.subsystem(), 0x02);
        assert_eq!(frame.value(), 0x01);

        let header_only = build_frame(&FRAME_HEADER).unwrap();
        assert_eq!(header_only.as_bytes(), &[0xAA, 0x55, 0, 0, 0, 0]);
    }

    #[test]
    fn test_build_frame_truncates_long_input() {
        let frame = build_frame(&[0xAA, 0x55, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]).unwrap();
        assert_eq!(frame.as_bytes(), &[0xAA, 0x55, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(frame.payload(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_build_frame_missing_header() {
        assert_eq!(build_frame(&[0x00, 0xAA, 0x55]), Err(FrameError::MissingHeader));
        assert_eq!(build_frame(&[0xAA]), Err(FrameError::MissingHeader));
        assert_eq!(build_frame(&[]), Err(FrameError::MissingHeader));
        assert_eq!(build_frame(&[0x55, 0xAA]), Err(FrameError::MissingHeader));
    }

    #[test]
    fn test_frame_hex_display() {
        let frame = Frame::try_from(&[0xAA, 0x55, 0x0F][..]).unwrap();
        assert_eq!(frame.to_hex(), "AA 55 0F 00 00 00");
        assert_eq!(frame.to_string(), "AA 55 0F 00 00 00");
        assert_eq!(to_hex_string(&[]), "");
    }
}
