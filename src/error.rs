use std::process::ExitStatus;

use thiserror::Error;

use crate::bridge::devices::{Device, DeviceState};
use crate::process::ToolError;

pub type Result<T> = std::result::Result<T, MirrorError>;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("'{tool}' was not found; is it installed and on PATH?")]
    ToolNotFound { tool: String },

    #[error("'{tool}' did not finish within {secs}s")]
    ToolTimeout { tool: String, secs: u64 },

    #[error("'{tool}' exited with {code}: {stderr}")]
    ToolNonZeroExit {
        tool: String,
        code: String,
        stderr: String,
    },

    #[error("'{tool}' could not be run: {message}")]
    ToolFailed { tool: String, message: String },

    /// Output was neither a recognised success nor a recognised failure.
    #[error("could not interpret {context} output: {output}")]
    ParseAmbiguous { context: String, output: String },

    #[error("connection to {address} refused: {output}")]
    ConnectionRefused { address: String, output: String },

    #[error("invalid IPv4 address: {0}")]
    InvalidAddress(String),

    #[error("invalid option {name}: {reason}")]
    InvalidOption { name: String, reason: String },

    #[error("no ready Android device found")]
    NoDevices,

    #[error("device {0} not found")]
    DeviceNotFound(String),

    #[error("device {serial} is {state}, not ready")]
    DeviceNotReady { serial: String, state: DeviceState },

    #[error("{} devices are ready; pick one explicitly", .0.len())]
    SelectionRequired(Vec<Device>),

    #[error("mirror tool exited during startup ({status}): {stderr}")]
    LaunchFailed {
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("a mirroring session is already running (pid {pid})")]
    SessionActive { pid: u32 },

    #[error("controller is no longer running")]
    ControllerClosed,
}

impl MirrorError {
    /// Map a process runner failure for `tool` onto the error taxonomy.
    pub fn from_tool(tool: &str, err: ToolError) -> Self {
        match err {
            ToolError::NotFound => MirrorError::ToolNotFound {
                tool: tool.to_string(),
            },
            ToolError::TimedOut(dur) => MirrorError::ToolTimeout {
                tool: tool.to_string(),
                secs: dur.as_secs(),
            },
            ToolError::Other(message) => MirrorError::ToolFailed {
                tool: tool.to_string(),
                message,
            },
        }
    }

    pub fn non_zero_exit(tool: &str, code: Option<i32>, stderr: &str) -> Self {
        MirrorError::ToolNonZeroExit {
            tool: tool.to_string(),
            code: code.map_or_else(|| "signal".to_string(), |c| format!("code {}", c)),
            stderr: stderr.trim().to_string(),
        }
    }

    pub fn launch_failed(status: ExitStatus, stdout: String, stderr: String) -> Self {
        MirrorError::LaunchFailed {
            status: status.to_string(),
            stdout,
            stderr,
        }
    }

    pub fn is_tool_missing(&self) -> bool {
        matches!(self, MirrorError::ToolNotFound { .. })
    }
}
