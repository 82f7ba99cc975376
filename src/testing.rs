//! Scripted process runner for unit tests.

use crate::process::{ProcessRunner, ToolError, ToolOutput};
use crate::utils::config::Config;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Reply = Result<ToolOutput, ToolError>;

/// Replies are keyed by the full command line, e.g. `"adb connect 1.2.3.4:5555"`.
/// Queued replies are consumed in order; the last one repeats.
#[derive(Default)]
pub struct ScriptedRunner {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Config pointing at bare `adb`/`scrcpy` with short delays
    pub fn config() -> Config {
        Config {
            adb_path: Some(PathBuf::from("adb")),
            scrcpy_path: Some(PathBuf::from("scrcpy")),
            server_restart_pause: Duration::ZERO,
            launch_grace: Duration::from_millis(300),
            stop_timeout: Duration::from_secs(2),
            ..Config::default()
        }
    }

    pub fn respond(&self, command: &str, code: i32, stdout: &str, stderr: &str) {
        self.push(
            command,
            Ok(ToolOutput {
                exit_code: Some(code),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }),
        );
    }

    pub fn not_found(&self, command: &str) {
        self.push(command, Err(ToolError::NotFound));
    }

    pub fn timeout(&self, command: &str) {
        self.push(command, Err(ToolError::TimedOut(Duration::from_secs(10))));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, command: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(command.to_string())
            .or_default()
            .push_back(reply);
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, program: &Path, args: &[&str], _timeout: Duration) -> Reply {
        let key = format!("{} {}", program.display(), args.join(" "));
        self.calls.lock().unwrap().push(key.clone());

        let mut replies = self.replies.lock().unwrap();
        match replies.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(ToolError::Other(format!("no reply for {}", key)))),
            None => Err(ToolError::Other(format!("unscripted command: {}", key))),
        }
    }
}
