//! Human-readable help text: installation hints, device setup, troubleshooting.

/// How to install adb on the current platform
pub fn adb_install_hint() -> String {
    let lines: &[&str] = if cfg!(windows) {
        &[
            "Download Android SDK Platform Tools from:",
            "  https://developer.android.com/studio/releases/platform-tools",
            "Extract it and add the folder to PATH",
            "Or install with Chocolatey: choco install adb",
        ]
    } else if cfg!(target_os = "macos") {
        &["macOS: brew install android-platform-tools"]
    } else {
        &[
            "Ubuntu/Debian: sudo apt install android-tools-adb",
            "Fedora: sudo dnf install android-tools",
        ]
    };
    format_hint("To install adb:", lines)
}

/// How to install scrcpy on the current platform
pub fn scrcpy_install_hint() -> String {
    let lines: &[&str] = if cfg!(windows) {
        &[
            "Download from: https://github.com/Genymobile/scrcpy/releases",
            "Extract it and add the folder to PATH",
            "Or install with Chocolatey: choco install scrcpy",
            "Or install with Scoop: scoop install scrcpy",
        ]
    } else if cfg!(target_os = "macos") {
        &["macOS: brew install scrcpy"]
    } else {
        &[
            "Ubuntu/Debian: sudo apt install scrcpy",
            "Fedora: sudo dnf install scrcpy",
        ]
    };
    format_hint("To install scrcpy:", lines)
}

/// Hint printed when `tool` is missing
pub fn install_hint_for(tool: &str) -> Option<String> {
    let name = std::path::Path::new(tool)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match name.as_str() {
        "adb" => Some(adb_install_hint()),
        "scrcpy" => Some(scrcpy_install_hint()),
        _ => None,
    }
}

pub const DEVICE_SETUP: &str = "\
Android device setup:

1. Enable USB debugging
   - Settings > About phone, tap 'Build number' 7 times
   - Settings > Developer options > enable 'USB debugging'

2. Wi-Fi (optional)
   - Connect the device over USB first
   - Run: adb tcpip 5555
   - Unplug USB and connect with the device IP

3. Windows drivers
   - Some devices need the vendor's ADB driver";

pub const UNAUTHORIZED_HINT: &str =
    "Accept the 'Allow USB debugging' prompt on the device, then scan again";

pub const NO_DEVICE_HINT: &str = "\
Make sure that:
  - the device is plugged in with a data cable
  - USB debugging is enabled
  - the computer is authorised on the device";

pub const WIFI_HINT: &str = "\
Possible fixes:
  - put the device on the same network
  - run 'adb tcpip 5555' over USB first
  - double-check the IP address
  - restart the adb server (droid-mirror restart-server)";

pub const TROUBLESHOOTING: &str = "\
Troubleshooting:

1. Device not detected over USB
   adb devices
   adb kill-server
   adb start-server
   adb devices

2. Wi-Fi connection fails
   adb tcpip 5555
   adb connect 192.168.1.100:5555
   adb devices

3. Check tool versions
   adb version
   scrcpy --version";

pub const TIPS: &str = "\
Tips:

Performance
  - USB gives lower latency than Wi-Fi
  - --max-size 720 for low-latency gaming
  - raise --bit-rate only with enough bandwidth

Quality
  - presentations: --max-size 1920 --bit-rate 15M
  - general use: --max-size 1080 --bit-rate 8M
  - audio forwarding needs Android 11+ and scrcpy 2.0+

Connectivity
  - both devices on the same network for Wi-Fi
  - some routers block client-to-client traffic";

pub const USAGE_EXAMPLES: &str = "\
Examples:
  droid-mirror                                   interactive menu
  droid-mirror --usb                             first USB device
  droid-mirror --wifi 192.168.1.100              adb over TCP/IP
  droid-mirror --wifi 192.168.1.100 --max-size 1024 --bit-rate 8M
  droid-mirror --usb --no-control                view only";

fn format_hint(title: &str, lines: &[&str]) -> String {
    let mut out = title.to_string();
    for line in lines {
        out.push_str("\n  - ");
        out.push_str(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_lookup_by_tool_path() {
        assert!(install_hint_for("/usr/bin/adb").unwrap().contains("adb"));
        assert!(install_hint_for("scrcpy.exe").unwrap().contains("scrcpy"));
        assert!(install_hint_for("ffmpeg").is_none());
    }
}
