use crate::bridge::devices::{parse_devices, Device};
use crate::error::{MirrorError, Result};
use crate::process::{ProcessRunner, ToolOutput};
use crate::utils::config::Config;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// adb command wrapper
#[derive(Clone)]
pub struct Adb {
    runner: Arc<dyn ProcessRunner>,
    program: PathBuf,
    config: Config,
}

impl Adb {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: &Config) -> Self {
        Self {
            runner,
            program: config.adb(),
            config: config.clone(),
        }
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    fn tool_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Execute a raw adb command; a non-zero exit is returned as data
    pub async fn exec(&self, args: &[&str], timeout: Duration) -> Result<ToolOutput> {
        self.runner
            .run(&self.program, args, timeout)
            .await
            .map_err(|e| MirrorError::from_tool(&self.tool_name(), e))
    }

    /// Execute and require exit code 0
    async fn exec_ok(&self, args: &[&str], timeout: Duration) -> Result<ToolOutput> {
        let output = self.exec(args, timeout).await?;
        if !output.success() {
            return Err(MirrorError::non_zero_exit(
                &format!("{} {}", self.tool_name(), args.join(" ")),
                output.exit_code,
                &output.stderr,
            ));
        }
        Ok(output)
    }

    /// `adb version`, first line of its output
    pub async fn version(&self) -> Result<String> {
        let output = self
            .exec_ok(&["version"], self.config.version_timeout)
            .await?;
        Ok(output.stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    /// Get list of attached devices
    pub async fn devices(&self) -> Result<Vec<Device>> {
        let output = self
            .exec_ok(&["devices"], self.config.devices_timeout)
            .await?;
        Ok(parse_devices(&output.stdout))
    }

    /// `adb connect <address>`
    pub async fn connect(&self, address: &str) -> Result<ToolOutput> {
        self.exec(&["connect", address], self.config.connect_timeout)
            .await
    }

    /// `adb disconnect <address>`
    pub async fn disconnect(&self, address: &str) -> Result<ToolOutput> {
        self.exec(&["disconnect", address], self.config.disconnect_timeout)
            .await
    }

    pub async fn kill_server(&self) -> Result<ToolOutput> {
        self.exec(&["kill-server"], self.config.server_timeout)
            .await
    }

    pub async fn start_server(&self) -> Result<ToolOutput> {
        self.exec(&["start-server"], self.config.server_timeout)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::devices::DeviceState;
    use crate::testing::ScriptedRunner;

    #[tokio::test]
    async fn test_devices_parses_stdout() {
        let runner = ScriptedRunner::new();
        runner.respond(
            "adb devices",
            0,
            "List of devices attached\nABC123\tdevice\nXYZ\tunauthorized\n",
            "",
        );
        let adb = Adb::new(runner.clone(), &ScriptedRunner::config());

        let devices = adb.devices().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].state, DeviceState::Unauthorized);
    }

    #[tokio::test]
    async fn test_devices_missing_adb() {
        let runner = ScriptedRunner::new();
        runner.not_found("adb devices");
        let adb = Adb::new(runner.clone(), &ScriptedRunner::config());

        let err = adb.devices().await.unwrap_err();
        assert!(err.is_tool_missing());
    }

    #[tokio::test]
    async fn test_version_first_line() {
        let runner = ScriptedRunner::new();
        runner.respond(
            "adb version",
            0,
            "Android Debug Bridge version 1.0.41\nVersion 34.0.5\n",
            "",
        );
        let adb = Adb::new(runner.clone(), &ScriptedRunner::config());

        assert_eq!(
            adb.version().await.unwrap(),
            "Android Debug Bridge version 1.0.41"
        );
    }
}
