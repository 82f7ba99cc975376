use serde::Serialize;
use std::fmt;

/// Connection state reported by `adb devices`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    /// adb reports `device`
    Ready,
    Unauthorized,
    Offline,
    /// Any other state (`recovery`, `sideload`, `no permissions`, ...)
    Unknown,
}

impl DeviceState {
    pub fn from_adb(raw: &str) -> Self {
        match raw.trim() {
            "device" => DeviceState::Ready,
            "unauthorized" => DeviceState::Unauthorized,
            "offline" => DeviceState::Offline,
            _ => DeviceState::Unknown,
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceState::Ready => "device",
            DeviceState::Unauthorized => "unauthorized",
            DeviceState::Offline => "offline",
            DeviceState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Represents an Android device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    /// USB serial or `ip:port`
    pub identifier: String,
    pub state: DeviceState,
}

impl Device {
    pub fn is_ready(&self) -> bool {
        self.state == DeviceState::Ready
    }

    /// Network devices show up as `ip:port`
    pub fn is_network(&self) -> bool {
        self.identifier.contains(':')
    }
}

/// Parse `adb devices` output.
///
/// The first line is the `List of devices attached` header. Every other line
/// must be exactly `<serial>\t<state>`; anything else is skipped. A serial seen
/// twice keeps its first entry.
pub fn parse_devices(output: &str) -> Vec<Device> {
    let mut devices: Vec<Device> = Vec::new();

    for line in output.lines().skip(1) {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() != 2 || parts[0].is_empty() {
            log::debug!("skipping unrecognised adb devices line: {:?}", line);
            continue;
        }

        let identifier = parts[0].to_string();
        if devices.iter().any(|d| d.identifier == identifier) {
            continue;
        }

        devices.push(Device {
            identifier,
            state: DeviceState::from_adb(parts[1]),
        });
    }

    devices
}
