// src/commands.rs
//
// Command table: symbolic switch keys mapped to partial hex frames
// (header + subsystem id + value). Frames are padded on send.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::io::{build_frame, parse_hex, CommandError, Frame, LinkError};

/// Subsystem ids carried in byte 2 of every frame
pub const SUBSYSTEM_DOOR: u8 = 0x01;
pub const SUBSYSTEM_LIGHT: u8 = 0x02;
pub const SUBSYSTEM_EYE: u8 = 0x03;
pub const SUBSYSTEM_ANTI: u8 = 0x04;

/// Key -> hex template, in display order.
const COMMAND_TABLE: [(&str, &str); 8] = [
    ("DOOR 1", "AA 55 01 01"),
    ("DOOR 0", "AA 55 01 00"),
    ("LIGHT 1", "AA 55 02 01"),
    ("LIGHT 0", "AA 55 02 00"),
    ("EYE 1", "AA 55 03 01"),
    ("EYE 0", "AA 55 03 00"),
    ("ANTI 1", "AA 55 04 01"),
    ("ANTI 0", "AA 55 04 00"),
];

static COMMAND_INDEX: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| COMMAND_TABLE.iter().copied().collect());

/// Hex template for `key`, if the table has one.
pub fn lookup(key: &str) -> Option<&'static str> {
    COMMAND_INDEX.get(key).copied()
}

pub fn resolve(key: &str) -> Result<&'static str, CommandError> {
    lookup(key).ok_or_else(|| CommandError::UnknownKey(key.to_string()))
}

/// All keys in table order.
pub fn keys() -> impl Iterator<Item = &'static str> {
    COMMAND_TABLE.iter().map(|(key, _)| *key)
}

/// Parse and pad the template for `key` into a ready-to-send frame.
pub fn frame_for(key: &str) -> Result<Frame, LinkError> {
    let template = resolve(key)?;
    let raw = parse_hex(template)?;
    Ok(build_frame(&raw)?)
}

/// Key matching a received frame, if it encodes a known switch state.
pub fn key_for(frame: &Frame) -> Option<&'static str> {
    COMMAND_TABLE
        .iter()
        .find(|(_, template)| {
            parse_hex(template)
                .ok()
                .and_then(|raw| build_frame(&raw).ok())
                .as_ref()
                == Some(frame)
        })
        .map(|(key, _)| *key)
}
