// src/settings.rs
//
// Persistent link settings, stored as JSON in the user config directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::io::serial::{DEFAULT_MAX_BUFFER_LEN, FALLBACK_BAUD_RATE};

const APP_DIR_NAME: &str = "switchboard";
const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LinkSettings {
    /// Last used device path
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Fail instead of falling back when the baud rate is unsupported
    #[serde(default)]
    pub strict_baud: bool,
    #[serde(default = "default_device_dir")]
    pub device_dir: String,
    #[serde(default = "default_device_prefixes")]
    pub device_prefixes: Vec<String>,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
    #[serde(default = "default_max_buffer_len")]
    pub max_buffer_len: usize,
    /// File logging is enabled when set
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_baud_rate() -> u32 {
    FALLBACK_BAUD_RATE
}
fn default_device_dir() -> String {
    "/dev".to_string()
}
fn default_device_prefixes() -> Vec<String> {
    // cu = calling unit, tty = terminal
    #[cfg(target_os = "macos")]
    {
        vec!["cu.".to_string(), "tty.".to_string()]
    }
    #[cfg(not(target_os = "macos"))]
    {
        vec!["ttyUSB".to_string(), "ttyACM".to_string()]
    }
}
fn default_read_timeout_ms() -> u64 {
    100
}
fn default_read_chunk_size() -> usize {
    1024
}
fn default_max_buffer_len() -> usize {
    DEFAULT_MAX_BUFFER_LEN
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            strict_baud: false,
            device_dir: default_device_dir(),
            device_prefixes: default_device_prefixes(),
            read_timeout_ms: default_read_timeout_ms(),
            read_chunk_size: default_read_chunk_size(),
            max_buffer_len: default_max_buffer_len(),
            log_dir: None,
        }
    }
}

impl LinkSettings {
    /// Candidate device paths for the configured directory and prefixes.
    pub fn list_ports(&self) -> Vec<String> {
        crate::io::serial::list_ports_in(Path::new(&self.device_dir), &self.device_prefixes)
    }

    /// OS-reported devices matching the configured prefixes.
    pub fn describe_ports(&self) -> Vec<crate::io::serial::DeviceInfo> {
        crate::io::serial::describe_ports(&self.device_prefixes)
    }
}

/// Default settings location: `<config dir>/switchboard/settings.json`
pub fn settings_path() -> Result<PathBuf, String> {
    let config_dir =
        dirs::config_dir().ok_or_else(|| "Failed to get user config dir".to_string())?;
    Ok(config_dir.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
}

/// Load settings from the default location, writing defaults on first run.
pub fn load_settings() -> Result<LinkSettings, String> {
    load_settings_from(&settings_path()?)
}

pub fn load_settings_from(path: &Path) -> Result<LinkSettings, String> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read settings: {}", e))?;

        serde_json::from_str(&content).map_err(|e| format!("Failed to parse settings: {}", e))
    } else {
        // First run
        let settings = LinkSettings::default();
        save_settings_to(path, &settings)?;
        tlog!("[settings] Created default settings at {}", path.display());
        Ok(settings)
    }
}

pub fn save_settings(settings: &LinkSettings) -> Result<(), String> {
    save_settings_to(&settings_path()?, settings)
}

pub fn save_settings_to(path: &Path, settings: &LinkSettings) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create settings dir: {}", e))?;
    }

    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;

    std::fs::write(path, content).map_err(|e| format!("Failed to write settings: {}", e))
}
