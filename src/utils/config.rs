use std::path::PathBuf;
use std::time::Duration;

use super::binary_resolver;

/// Default adb TCP/IP port
pub const DEFAULT_WIFI_PORT: u16 = 5555;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Explicit adb executable, bypasses lookup
    pub adb_path: Option<PathBuf>,

    /// Explicit scrcpy executable, bypasses lookup
    pub scrcpy_path: Option<PathBuf>,

    /// Port appended to Wi-Fi addresses
    pub wifi_port: u16,

    /// `adb version` / `scrcpy --version`
    pub version_timeout: Duration,

    /// `scrcpy --help`
    pub help_timeout: Duration,

    pub devices_timeout: Duration,

    pub connect_timeout: Duration,

    pub disconnect_timeout: Duration,

    /// `adb kill-server` / `adb start-server`
    pub server_timeout: Duration,

    /// Pause between kill-server and start-server
    pub server_restart_pause: Duration,

    /// How long scrcpy must stay alive to count as started
    pub launch_grace: Duration,

    /// Wait after SIGTERM before killing scrcpy
    pub stop_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            adb_path: None,
            scrcpy_path: None,
            wifi_port: DEFAULT_WIFI_PORT,
            version_timeout: Duration::from_secs(10),
            help_timeout: Duration::from_secs(5),
            devices_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(15),
            disconnect_timeout: Duration::from_secs(5),
            server_timeout: Duration::from_secs(10),
            server_restart_pause: Duration::from_secs(1),
            launch_grace: Duration::from_secs(2),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn adb(&self) -> PathBuf {
        binary_resolver::find_adb(self.adb_path.as_deref())
    }

    pub fn scrcpy(&self) -> PathBuf {
        binary_resolver::find_scrcpy(self.scrcpy_path.as_deref())
    }
}
