//! scrcpy command line construction

use crate::connection::Connection;
use crate::error::{MirrorError, Result};
use crate::mirror::deps::ToolCapabilities;
use std::fmt;
use std::path::PathBuf;

const AUDIO_CODEC: &str = "aac";
const VIDEO_CODEC: &str = "h264";
const MAX_FPS: u32 = 60;

/// User-selected scrcpy options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorOptions {
    /// Longest side in pixels; 0 keeps the device resolution
    pub max_size: Option<u32>,
    /// Video bit rate token such as `8M`
    pub bit_rate: Option<String>,
    pub disable_control: bool,
    pub disable_audio: bool,
    pub disable_video_optimization: bool,
    pub fullscreen: bool,
}

impl MirrorOptions {
    /// Parse a max-size text field: empty means unset, otherwise a non-negative integer
    pub fn parse_max_size(value: &str) -> Result<Option<u32>> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(None);
        }
        value
            .parse::<u32>()
            .map(Some)
            .map_err(|_| MirrorError::InvalidOption {
                name: "max-size".to_string(),
                reason: format!("'{}' is not a non-negative integer (e.g. 1024, or 0)", value),
            })
    }

    /// Validate a bit rate token; empty means unset
    pub fn parse_bit_rate(value: &str) -> Result<Option<String>> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(None);
        }
        if value.chars().any(char::is_whitespace) {
            return Err(MirrorError::InvalidOption {
                name: "bit-rate".to_string(),
                reason: format!("'{}' must be a single token such as 8M", value),
            });
        }
        Ok(Some(value.to_string()))
    }
}

/// A ready-to-spawn scrcpy invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl MirrorCommand {
    pub fn contains(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Value following `flag`, if present
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for MirrorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Flags dropped because the installed scrcpy lacks them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildNotes {
    pub skipped: Vec<&'static str>,
}

/// Build the scrcpy argument list.
///
/// An explicit `device` wins over the connection's target. Flags the installed
/// scrcpy does not know are left out and listed in the returned notes.
pub fn build(
    program: PathBuf,
    device: Option<&str>,
    connection: Option<&Connection>,
    options: &MirrorOptions,
    caps: &ToolCapabilities,
    port: u16,
) -> (MirrorCommand, BuildNotes) {
    let mut args: Vec<String> = Vec::new();
    let mut notes = BuildNotes::default();

    let target = match (device, connection) {
        (Some(id), _) => Some(id.to_string()),
        (None, Some(conn)) => conn.target(port),
        (None, None) => None,
    };
    if let Some(target) = target {
        args.push("-s".to_string());
        args.push(target);
    }

    if let Some(size) = options.max_size {
        args.push("--max-size".to_string());
        args.push(size.to_string());
    }

    if options.fullscreen {
        args.push("--fullscreen".to_string());
    }

    if let Some(ref rate) = options.bit_rate {
        let flag = if caps.has_video_bit_rate_flag {
            "--video-bit-rate"
        } else {
            "--bit-rate"
        };
        args.push(flag.to_string());
        args.push(rate.clone());
    }

    if options.disable_control {
        args.push("--no-control".to_string());
    }

    if options.disable_audio {
        args.push("--no-audio".to_string());
    } else if caps.has_audio_codec_flag {
        args.push(format!("--audio-codec={}", AUDIO_CODEC));
    } else {
        notes.skipped.push("--audio-codec");
    }

    if !options.disable_video_optimization {
        if caps.has_video_codec_flag {
            args.push(format!("--video-codec={}", VIDEO_CODEC));
        } else {
            notes.skipped.push("--video-codec");
        }
        if caps.has_max_fps_flag {
            args.push(format!("--max-fps={}", MAX_FPS));
        } else {
            notes.skipped.push("--max-fps");
        }
    }

    (MirrorCommand { program, args }, notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn scrcpy() -> PathBuf {
        PathBuf::from("scrcpy")
    }

    #[test]
    fn test_device_size_fullscreen_no_audio() {
        let options = MirrorOptions {
            max_size: MirrorOptions::parse_max_size("0").unwrap(),
            disable_audio: true,
            fullscreen: true,
            ..Default::default()
        };
        let (cmd, _) = build(
            scrcpy(),
            Some("ABC123"),
            None,
            &options,
            &ToolCapabilities::all(),
            5555,
        );

        assert_eq!(cmd.value_of("-s"), Some("ABC123"));
        assert_eq!(cmd.value_of("--max-size"), Some("0"));
        assert!(cmd.contains("--fullscreen"));
        assert!(cmd.contains("--no-audio"));
        assert!(!cmd.args.iter().any(|a| a.starts_with("--audio-codec")));
    }

    #[test]
    fn test_full_order() {
        let options = MirrorOptions {
            max_size: Some(1024),
            bit_rate: Some("8M".to_string()),
            disable_control: true,
            fullscreen: true,
            ..Default::default()
        };
        let (cmd, notes) = build(
            scrcpy(),
            Some("ABC123"),
            None,
            &options,
            &ToolCapabilities::all(),
            5555,
        );

        assert_eq!(
            cmd.args,
            [
                "-s",
                "ABC123",
                "--max-size",
                "1024",
                "--fullscreen",
                "--video-bit-rate",
                "8M",
                "--no-control",
                "--audio-codec=aac",
                "--video-codec=h264",
                "--max-fps=60",
            ]
        );
        assert!(notes.skipped.is_empty());
        assert_eq!(
            cmd.to_string(),
            "scrcpy -s ABC123 --max-size 1024 --fullscreen --video-bit-rate 8M --no-control \
             --audio-codec=aac --video-codec=h264 --max-fps=60"
        );
    }

    #[test]
    fn test_wifi_target_appends_port() {
        let conn = Connection::Wifi {
            address: Ipv4Addr::new(192, 168, 1, 100),
        };
        let (cmd, _) = build(
            scrcpy(),
            None,
            Some(&conn),
            &MirrorOptions::default(),
            &ToolCapabilities::all(),
            5555,
        );
        assert_eq!(cmd.value_of("-s"), Some("192.168.1.100:5555"));

        let (cmd, _) = build(
            scrcpy(),
            Some("other"),
            Some(&conn),
            &MirrorOptions::default(),
            &ToolCapabilities::all(),
            5555,
        );
        assert_eq!(cmd.value_of("-s"), Some("other"));
    }

    #[test]
    fn test_usb_without_serial_has_no_target() {
        let conn = Connection::Usb { serial: None };
        let (cmd, _) = build(
            scrcpy(),
            None,
            Some(&conn),
            &MirrorOptions::default(),
            &ToolCapabilities::all(),
            5555,
        );
        assert!(!cmd.contains("-s"));
    }

    #[test]
    fn test_old_scrcpy_capabilities() {
        let options = MirrorOptions {
            bit_rate: Some("2M".to_string()),
            ..Default::default()
        };
        let (cmd, notes) = build(
            scrcpy(),
            None,
            None,
            &options,
            &ToolCapabilities::default(),
            5555,
        );

        assert_eq!(cmd.args, ["--bit-rate", "2M"]);
        assert_eq!(notes.skipped, ["--audio-codec", "--video-codec", "--max-fps"]);
    }

    #[test]
    fn test_video_optimization_disabled() {
        let options = MirrorOptions {
            disable_video_optimization: true,
            ..Default::default()
        };
        let (cmd, notes) = build(
            scrcpy(),
            None,
            None,
            &options,
            &ToolCapabilities::default(),
            5555,
        );

        assert!(cmd.args.is_empty());
        assert_eq!(notes.skipped, ["--audio-codec"]);
    }

    #[test]
    fn test_option_validation() {
        assert_eq!(MirrorOptions::parse_max_size("").unwrap(), None);
        assert_eq!(MirrorOptions::parse_max_size(" 1920 ").unwrap(), Some(1920));
        assert!(MirrorOptions::parse_max_size("-1").is_err());
        assert!(MirrorOptions::parse_max_size("big").is_err());

        assert_eq!(MirrorOptions::parse_bit_rate("8M").unwrap().as_deref(), Some("8M"));
        assert_eq!(MirrorOptions::parse_bit_rate("  ").unwrap(), None);
        assert!(MirrorOptions::parse_bit_rate("8 M").is_err());
    }
}
