//! USB / Wi-Fi connection state

use crate::bridge::{self, Adb, Device, DeviceState};
use crate::error::{MirrorError, Result};
use crate::events::{EventEmitter, MirrorEvent};
use crate::process::ToolOutput;
use crate::utils::hints;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    Usb,
    Wifi,
}

/// The active device link. Only Wi-Fi connections carry an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    /// `serial` is the device picked among the attached ones
    Usb { serial: Option<String> },
    /// Address without port; the port is appended when talking to adb
    Wifi { address: Ipv4Addr },
}

impl Connection {
    pub fn mode(&self) -> ConnectionMode {
        match self {
            Connection::Usb { .. } => ConnectionMode::Usb,
            Connection::Wifi { .. } => ConnectionMode::Wifi,
        }
    }

    pub fn address(&self) -> Option<Ipv4Addr> {
        match self {
            Connection::Wifi { address } => Some(*address),
            Connection::Usb { .. } => None,
        }
    }

    /// Value for scrcpy/adb `-s`, if the connection names a device
    pub fn target(&self, port: u16) -> Option<String> {
        match self {
            Connection::Wifi { address } => Some(format!("{}:{}", address, port)),
            Connection::Usb { serial } => serial.clone(),
        }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connection::Usb { serial: Some(s) } => write!(f, "USB ({})", s),
            Connection::Usb { serial: None } => write!(f, "USB"),
            Connection::Wifi { address } => write!(f, "Wi-Fi ({})", address),
        }
    }
}

/// Validate a dotted-quad IPv4 address
pub fn parse_ipv4(input: &str) -> Result<Ipv4Addr> {
    input
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| MirrorError::InvalidAddress(input.trim().to_string()))
}

/// Interpret `adb connect` output.
///
/// Exit code first, then known negative wording, then the success phrases.
/// Text that mentions "connected" in any other way is reported as ambiguous
/// instead of being guessed.
pub fn classify_connect(output: &ToolOutput, address: &str) -> Result<String> {
    let stdout = output.stdout.trim();
    let lower = stdout.to_lowercase();

    if !output.success() {
        return Err(MirrorError::non_zero_exit(
            &format!("adb connect {}", address),
            output.exit_code,
            if output.stderr.trim().is_empty() {
                stdout
            } else {
                output.stderr.as_str()
            },
        ));
    }

    const NEGATIVE: [&str; 4] = ["cannot", "failed", "unable", "refused"];
    if NEGATIVE.iter().any(|marker| lower.contains(marker)) {
        return Err(MirrorError::ConnectionRefused {
            address: address.to_string(),
            output: stdout.to_string(),
        });
    }

    if lower.contains("already connected to") || lower.contains("connected to") {
        return Ok(stdout.to_string());
    }

    if lower.contains("connected") {
        return Err(MirrorError::ParseAmbiguous {
            context: "adb connect".to_string(),
            output: stdout.to_string(),
        });
    }

    Err(MirrorError::ConnectionRefused {
        address: address.to_string(),
        output: stdout.to_string(),
    })
}

pub struct ConnectionManager {
    adb: Adb,
    events: EventEmitter,
    port: u16,
    restart_pause: Duration,
    current: Option<Connection>,
}

impl ConnectionManager {
    pub fn new(adb: Adb, events: EventEmitter, port: u16, restart_pause: Duration) -> Self {
        Self {
            adb,
            events,
            port,
            restart_pause,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&Connection> {
        self.current.as_ref()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Connect to the single ready USB device.
    ///
    /// Several ready devices yield `SelectionRequired`; pick one and call
    /// [`connect_usb_device`](Self::connect_usb_device).
    pub async fn connect_usb(&mut self) -> Result<Connection> {
        self.events.info("Looking for USB devices...");
        let devices = bridge::list_devices(&self.adb, &self.events).await;
        let ready = self.ready_devices(&devices);

        match ready.len() {
            0 => {
                self.events.error("No ready Android device found over USB");
                self.events.warn(hints::NO_DEVICE_HINT);
                Err(MirrorError::NoDevices)
            }
            1 => Ok(self.set_usb(ready[0].identifier.clone())),
            _ => {
                self.events
                    .info(format!("{} devices found; select one", ready.len()));
                Err(MirrorError::SelectionRequired(ready))
            }
        }
    }

    /// Connect to a specific attached device
    pub async fn connect_usb_device(&mut self, serial: &str) -> Result<Connection> {
        let devices = bridge::list_devices(&self.adb, &self.events).await;
        let device = devices
            .iter()
            .find(|d| d.identifier == serial)
            .ok_or_else(|| MirrorError::DeviceNotFound(serial.to_string()))?;

        if !device.is_ready() {
            if device.state == DeviceState::Unauthorized {
                self.events.warn(hints::UNAUTHORIZED_HINT);
            }
            return Err(MirrorError::DeviceNotReady {
                serial: serial.to_string(),
                state: device.state,
            });
        }

        Ok(self.set_usb(serial.to_string()))
    }

    /// `adb connect <ip>:<port>`; the state only changes on success
    pub async fn connect_wifi(&mut self, ip: &str) -> Result<String> {
        let address = match parse_ipv4(ip) {
            Ok(address) => address,
            Err(e) => {
                self.events.error(e.to_string());
                return Err(e);
            }
        };
        let target = format!("{}:{}", address, self.port);
        self.events.info(format!("Connecting to {} over Wi-Fi...", target));

        let result = match self.adb.connect(&target).await {
            Ok(output) => classify_connect(&output, &target),
            Err(e) => Err(e),
        };

        match result {
            Ok(message) => {
                let connection = Connection::Wifi { address };
                self.current = Some(connection.clone());
                self.events.emit(MirrorEvent::Connected { connection });
                Ok(message)
            }
            Err(e) => {
                self.events
                    .error(format!("Could not connect to {}: {}", target, e));
                self.events.warn(hints::WIFI_HINT);
                Err(e)
            }
        }
    }

    /// Drop the active connection; Wi-Fi links are disconnected in adb.
    /// Failures are logged, never returned.
    pub async fn disconnect(&mut self) {
        let Some(connection) = self.current.take() else {
            return;
        };

        if let Some(target) = connection
            .address()
            .map(|address| format!("{}:{}", address, self.port))
        {
            match self.adb.disconnect(&target).await {
                Ok(output) if output.success() => {
                    self.events.info(format!("Disconnected from {}", target))
                }
                Ok(output) => self.events.warn(format!(
                    "adb disconnect {} exited with {:?}: {}",
                    target,
                    output.exit_code,
                    output.stderr.trim()
                )),
                Err(e) => self.events.warn(format!("adb disconnect {}: {}", target, e)),
            }
        }

        self.events.emit(MirrorEvent::Disconnected { connection });
    }

    /// `adb kill-server`, pause, `adb start-server`.
    ///
    /// Only start-server decides the outcome so that restarting an already
    /// stopped server succeeds.
    pub async fn restart_server(&self) -> Result<String> {
        self.events.info("Restarting adb server...");

        match self.adb.kill_server().await {
            Ok(output) if output.success() => self.events.info("adb server stopped"),
            Ok(output) => self.events.info(format!(
                "adb kill-server: {}",
                first_non_empty(&output.stderr, &output.stdout)
            )),
            Err(e) => self.events.warn(format!("adb kill-server: {}", e)),
        }

        tokio::time::sleep(self.restart_pause).await;

        let result = match self.adb.start_server().await {
            Ok(output) if output.success() => Ok("adb server restarted".to_string()),
            Ok(output) => Err(MirrorError::non_zero_exit(
                "adb start-server",
                output.exit_code,
                &output.stderr,
            )),
            Err(e) => Err(e),
        };

        self.events.emit(MirrorEvent::ServerRestarted {
            success: result.is_ok(),
        });
        if let Err(ref e) = result {
            self.events.error(format!("Failed to restart adb: {}", e));
        }
        result
    }

    fn ready_devices(&self, devices: &[Device]) -> Vec<Device> {
        for device in devices.iter().filter(|d| !d.is_ready()) {
            let hint = if device.state == DeviceState::Unauthorized {
                format!(" ({})", hints::UNAUTHORIZED_HINT)
            } else {
                String::new()
            };
            self.events.warn(format!(
                "Skipping {} [{}]{}",
                device.identifier, device.state, hint
            ));
        }
        devices.iter().filter(|d| d.is_ready()).cloned().collect()
    }

    fn set_usb(&mut self, serial: String) -> Connection {
        let connection = Connection::Usb {
            serial: Some(serial),
        };
        self.current = Some(connection.clone());
        self.events.emit(MirrorEvent::Connected {
            connection: connection.clone(),
        });
        connection
    }
}

fn first_non_empty<'a>(a: &'a str, b: &'a str) -> &'a str {
    let a = a.trim();
    if a.is_empty() {
        b.trim()
    } else {
        a
    }
}
