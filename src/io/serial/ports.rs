// src/io/serial/ports.rs
//
// Serial device discovery.
//
// `list_ports_in` scans a device directory for names with one of the
// configured prefixes and always leads with a "none" entry, so a picker
// can offer "no port" even when nothing is attached.
// `describe_ports` asks the serialport crate for the same devices with their
// bus and USB identity.

use serde::Serialize;
use std::path::Path;

/// Sentinel entry for "no port selected".
pub const NO_PORT: &str = "none";

/// List candidate device paths, sorted, with the sentinel first.
/// An unreadable directory yields only the sentinel.
pub fn list_ports_in<S: AsRef<str>>(device_dir: &Path, prefixes: &[S]) -> Vec<String> {
    let mut ports = vec![NO_PORT.to_string()];

    let entries = match std::fs::read_dir(device_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tlog!("[ports] Cannot read {}: {}", device_dir.display(), e);
            return ports;
        }
    };

    let mut found: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_str()?;
            if prefixes.iter().any(|p| name.starts_with(p.as_ref())) {
                Some(device_dir.join(name).to_string_lossy().into_owned())
            } else {
                None
            }
        })
        .collect();
    found.sort();

    ports.extend(found);
    ports
}

/// Bus a device sits on, as reported by the OS.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceBus {
    Usb,
    Bluetooth,
    Pci,
    Unknown,
}

/// USB adapter identity, used to tell boards apart when several are attached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UsbIdentity {
    pub vid: u16,
    pub pid: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
}

/// A candidate device with whatever the OS knows about it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub path: String,
    pub bus: DeviceBus,
    pub usb: Option<UsbIdentity>,
}

impl DeviceInfo {
    /// One-line summary, e.g. "/dev/ttyUSB0 usb 0403:6001 FT232R USB UART".
    pub fn summary(&self) -> String {
        let bus = match self.bus {
            DeviceBus::Usb => "usb",
            DeviceBus::Bluetooth => "bluetooth",
            DeviceBus::Pci => "pci",
            DeviceBus::Unknown => "unknown",
        };
        match &self.usb {
            Some(usb) => format!(
                "{} {} {:04x}:{:04x} {}",
                self.path,
                bus,
                usb.vid,
                usb.pid,
                usb.product.as_deref().unwrap_or("")
            )
            .trim_end()
            .to_string(),
            None => format!("{} {}", self.path, bus),
        }
    }
}

impl From<serialport::SerialPortInfo> for DeviceInfo {
    fn from(port: serialport::SerialPortInfo) -> Self {
        let (bus, usb) = match port.port_type {
            serialport::SerialPortType::UsbPort(info) => (
                DeviceBus::Usb,
                Some(UsbIdentity {
                    vid: info.vid,
                    pid: info.pid,
                    manufacturer: info.manufacturer,
                    product: info.product,
                    serial_number: info.serial_number,
                }),
            ),
            serialport::SerialPortType::BluetoothPort => (DeviceBus::Bluetooth, None),
            serialport::SerialPortType::PciPort => (DeviceBus::Pci, None),
            serialport::SerialPortType::Unknown => (DeviceBus::Unknown, None),
        };
        DeviceInfo {
            path: port.port_name,
            bus,
            usb,
        }
    }
}

fn has_device_prefix<S: AsRef<str>>(path: &str, prefixes: &[S]) -> bool {
    let name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path);
    prefixes.iter().any(|p| name.starts_with(p.as_ref()))
}

/// Devices the OS reports whose file name carries one of `prefixes`, sorted
/// by path. Same filter as `list_ports_in`, so both listings agree.
/// Enumeration failures degrade to an empty list.
pub fn describe_ports<S: AsRef<str>>(prefixes: &[S]) -> Vec<DeviceInfo> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            tlog!("[ports] Failed to enumerate ports: {}", e);
            return Vec::new();
        }
    };

    let mut devices: Vec<DeviceInfo> = ports
        .into_iter()
        .filter(|p| has_device_prefix(&p.port_name, prefixes))
        .map(DeviceInfo::from)
        .collect();
    devices.sort_by(|a, b| a.path.cmp(&b.path));
    devices
}
