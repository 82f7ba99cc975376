//! Tool availability and scrcpy feature detection

use crate::bridge::Adb;
use crate::error::{MirrorError, Result};
use crate::events::{EventEmitter, MirrorEvent};
use crate::process::{ProcessRunner, ToolOutput};
use crate::utils::config::Config;
use crate::utils::hints;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// First scrcpy release with audio forwarding
const AUDIO_MIN_VERSION: MirrorVersion = MirrorVersion { major: 2, minor: 0 };

/// scrcpy `MAJOR.MINOR`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MirrorVersion {
    pub major: u32,
    pub minor: u32,
}

impl MirrorVersion {
    /// Parse `scrcpy 2.4 <https://github.com/Genymobile/scrcpy>` style output
    pub fn parse(output: &str) -> Option<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"scrcpy\s+v?(\d+)\.(\d+)").expect("version pattern is valid")
        });

        let caps = re.captures(output)?;
        Some(Self {
            major: caps[1].parse().ok()?,
            minor: caps[2].parse().ok()?,
        })
    }

    pub fn supports_audio(&self) -> bool {
        *self >= AUDIO_MIN_VERSION
    }
}

impl fmt::Display for MirrorVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Flags the installed scrcpy understands, from `scrcpy --help`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolCapabilities {
    pub has_audio_codec_flag: bool,
    pub has_video_codec_flag: bool,
    pub has_max_fps_flag: bool,
    pub has_video_bit_rate_flag: bool,
}

impl ToolCapabilities {
    pub fn from_help(help: &str) -> Self {
        Self {
            has_audio_codec_flag: help.contains("--audio-codec"),
            has_video_codec_flag: help.contains("--video-codec"),
            has_max_fps_flag: help.contains("--max-fps"),
            has_video_bit_rate_flag: help.contains("--video-bit-rate"),
        }
    }

    /// Everything a current scrcpy supports
    pub fn all() -> Self {
        Self {
            has_audio_codec_flag: true,
            has_video_codec_flag: true,
            has_max_fps_flag: true,
            has_video_bit_rate_flag: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DependencyReport {
    pub bridge_version: String,
    pub mirror_version_text: String,
    /// `None` when the version line could not be parsed
    pub mirror_version: Option<MirrorVersion>,
}

/// scrcpy invocations that are expected to return
#[derive(Clone)]
pub struct Scrcpy {
    runner: Arc<dyn ProcessRunner>,
    program: PathBuf,
    config: Config,
}

impl Scrcpy {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: &Config) -> Self {
        Self {
            runner,
            program: config.scrcpy(),
            config: config.clone(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn exec(&self, arg: &str, timeout: std::time::Duration) -> Result<ToolOutput> {
        let tool = self.program.display().to_string();
        let output = self
            .runner
            .run(&self.program, &[arg], timeout)
            .await
            .map_err(|e| MirrorError::from_tool(&tool, e))?;

        if !output.success() {
            return Err(MirrorError::non_zero_exit(
                &format!("{} {}", tool, arg),
                output.exit_code,
                &output.stderr,
            ));
        }
        Ok(output)
    }

    pub async fn version(&self) -> Result<String> {
        let output = self.exec("--version", self.config.version_timeout).await?;
        Ok(output.stdout)
    }

    /// Help text; some builds print usage to stderr
    pub async fn help(&self) -> Result<String> {
        let output = self.exec("--help", self.config.help_timeout).await?;
        Ok(format!("{}\n{}", output.stdout, output.stderr))
    }
}

pub struct DependencyChecker {
    adb: Adb,
    scrcpy: Scrcpy,
    events: EventEmitter,
}

impl DependencyChecker {
    pub fn new(adb: Adb, scrcpy: Scrcpy, events: EventEmitter) -> Self {
        Self {
            adb,
            scrcpy,
            events,
        }
    }

    /// Verify adb and scrcpy run; warn about old scrcpy releases
    pub async fn check(&self) -> Result<DependencyReport> {
        self.events.info("Checking dependencies...");

        let bridge_version = self
            .adb
            .version()
            .await
            .map_err(|e| self.report_missing(self.adb.program(), e))?;

        let mirror_version_text = self
            .scrcpy
            .version()
            .await
            .map_err(|e| self.report_missing(self.scrcpy.program(), e))?;

        let mirror_version = MirrorVersion::parse(&mirror_version_text);
        match mirror_version {
            Some(version) if !version.supports_audio() => {
                self.events.warn(format!(
                    "scrcpy {} detected; releases before {} may lack audio forwarding",
                    version, AUDIO_MIN_VERSION
                ));
            }
            Some(version) => log::debug!("scrcpy version {}", version),
            None => self.events.warn("Could not determine the scrcpy version"),
        }

        let first_line = mirror_version_text
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();

        self.events.emit(MirrorEvent::DependenciesChecked {
            bridge_version: bridge_version.clone(),
            mirror_version: first_line.clone(),
        });

        Ok(DependencyReport {
            bridge_version,
            mirror_version_text: first_line,
            mirror_version,
        })
    }

    /// Probe `scrcpy --help`; all flags off when the probe fails
    pub async fn probe_capabilities(&self) -> ToolCapabilities {
        match self.scrcpy.help().await {
            Ok(help) => {
                let caps = ToolCapabilities::from_help(&help);
                log::debug!("scrcpy capabilities: {:?}", caps);
                caps
            }
            Err(e) => {
                self.events.warn(format!(
                    "Could not probe scrcpy options ({}); using basic settings",
                    e
                ));
                ToolCapabilities::default()
            }
        }
    }

    fn report_missing(&self, program: &Path, err: MirrorError) -> MirrorError {
        self.events.error(err.to_string());
        if let Some(hint) = hints::install_hint_for(&program.display().to_string()) {
            self.events.warn(hint);
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogLevel;
    use crate::testing::ScriptedRunner;

    fn checker(runner: &Arc<ScriptedRunner>) -> (DependencyChecker, EventEmitter) {
        let config = ScriptedRunner::config();
        let events = EventEmitter::default();
        let checker = DependencyChecker::new(
            Adb::new(runner.clone(), &config),
            Scrcpy::new(runner.clone(), &config),
            events.clone(),
        );
        (checker, events)
    }

    fn drain_warnings(rx: &mut tokio::sync::broadcast::Receiver<MirrorEvent>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let MirrorEvent::Log {
                level: LogLevel::Warn,
                message,
            } = event
            {
                out.push(message);
            }
        }
        out
    }

    #[test]
    fn test_version_parsing() {
        assert_eq!(
            MirrorVersion::parse("scrcpy 2.4 <https://github.com/Genymobile/scrcpy>"),
            Some(MirrorVersion { major: 2, minor: 4 })
        );
        assert_eq!(
            MirrorVersion::parse("scrcpy 1.25\n\ndependencies:"),
            Some(MirrorVersion { major: 1, minor: 25 })
        );
        assert_eq!(MirrorVersion::parse("unknown build"), None);
    }

    #[test]
    fn test_audio_threshold() {
        assert!(!MirrorVersion { major: 1, minor: 25 }.supports_audio());
        assert!(MirrorVersion { major: 2, minor: 0 }.supports_audio());
        assert!(MirrorVersion { major: 3, minor: 1 }.supports_audio());
    }

    #[test]
    fn test_capabilities_from_help() {
        let caps = ToolCapabilities::from_help(
            "    --audio-codec=name\n    --max-fps=value\n    -b, --video-bit-rate=value",
        );
        assert!(caps.has_audio_codec_flag);
        assert!(caps.has_max_fps_flag);
        assert!(caps.has_video_bit_rate_flag);
        assert!(!caps.has_video_codec_flag);
    }

    #[tokio::test]
    async fn test_check_succeeds() {
        let runner = ScriptedRunner::new();
        runner.respond("adb version", 0, "Android Debug Bridge version 1.0.41\n", "");
        runner.respond("scrcpy --version", 0, "scrcpy 2.4 <https://github.com/Genymobile/scrcpy>\n", "");
        let (deps, _) = checker(&runner);

        let report = deps.check().await.unwrap();
        assert_eq!(report.mirror_version, Some(MirrorVersion { major: 2, minor: 4 }));
        assert_eq!(report.bridge_version, "Android Debug Bridge version 1.0.41");
    }

    #[tokio::test]
    async fn test_missing_scrcpy_fails_with_hint() {
        let runner = ScriptedRunner::new();
        runner.respond("adb version", 0, "Android Debug Bridge version 1.0.41\n", "");
        runner.not_found("scrcpy --version");
        let (deps, events) = checker(&runner);
        let mut rx = events.subscribe();

        let err = deps.check().await.unwrap_err();
        assert!(err.is_tool_missing());
        assert!(drain_warnings(&mut rx)
            .iter()
            .any(|w| w.contains("To install scrcpy")));
    }

    #[tokio::test]
    async fn test_adb_non_zero_exit_fails() {
        let runner = ScriptedRunner::new();
        runner.respond("adb version", 1, "", "broken install");
        let (deps, _) = checker(&runner);

        let err = deps.check().await.unwrap_err();
        assert!(matches!(err, MirrorError::ToolNonZeroExit { .. }));
        assert_eq!(runner.calls(), ["adb version"]);
    }

    #[tokio::test]
    async fn test_old_or_unparsable_version_only_warns() {
        let runner = ScriptedRunner::new();
        runner.respond("adb version", 0, "Android Debug Bridge version 1.0.41\n", "");
        runner.respond("scrcpy --version", 0, "scrcpy 1.24\n", "");
        let (old, events) = checker(&runner);
        let mut rx = events.subscribe();

        assert!(old.check().await.is_ok());
        assert!(drain_warnings(&mut rx).iter().any(|w| w.contains("audio")));

        let runner = ScriptedRunner::new();
        runner.respond("adb version", 0, "Android Debug Bridge version 1.0.41\n", "");
        runner.respond("scrcpy --version", 0, "custom build\n", "");
        let (custom, events) = checker(&runner);
        let mut rx = events.subscribe();

        let report = custom.check().await.unwrap();
        assert_eq!(report.mirror_version, None);
        assert!(drain_warnings(&mut rx)
            .iter()
            .any(|w| w.contains("Could not determine")));
    }

    #[tokio::test]
    async fn test_probe_failure_yields_no_capabilities() {
        let runner = ScriptedRunner::new();
        runner.timeout("scrcpy --help");
        let (deps, _) = checker(&runner);

        assert_eq!(deps.probe_capabilities().await, ToolCapabilities::default());
    }
}
