//! scrcpy process supervision
//!
//! A launch only counts once scrcpy survives the grace period; most startup
//! problems (no device, unauthorised, unsupported option) make it exit within
//! a second. A running session's child is owned by a reaper task, which
//! publishes the exit status and performs termination on request.

use crate::connection::Connection;
use crate::error::{MirrorError, Result};
use crate::events::{EventEmitter, MirrorEvent};
use crate::mirror::command::MirrorCommand;
use crate::process::quiet_command;
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Output lines kept per stream
const TAIL_LINES: usize = 200;

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: String,
    pub pid: u32,
    pub command: String,
    pub connection: Option<Connection>,
    pub device: Option<String>,
    pub started_at: DateTime<Local>,
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionExit {
    /// `None` when terminated by a signal
    pub code: Option<i32>,
    pub description: String,
    /// Last stderr lines, only kept for unsuccessful exits
    pub stderr_tail: String,
}

impl SessionExit {
    fn from_status(status: &ExitStatus, stderr: &OutputTail) -> Self {
        Self {
            code: status.code(),
            description: status.to_string(),
            stderr_tail: if status.success() {
                String::new()
            } else {
                stderr.snapshot()
            },
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub type ExitWatch = watch::Receiver<Option<SessionExit>>;

struct Session {
    info: SessionInfo,
    stop_tx: mpsc::Sender<oneshot::Sender<()>>,
    exit_rx: ExitWatch,
}

impl Session {
    fn exit(&self) -> Option<SessionExit> {
        self.exit_rx.borrow().clone()
    }
}

/// Captures lines from a child pipe into a bounded buffer
#[derive(Clone)]
struct OutputTail {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl OutputTail {
    fn spawn<R>(pipe: Option<R>, stream: &'static str) -> (Self, Option<JoinHandle<()>>)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let tail = OutputTail {
            lines: Arc::new(Mutex::new(VecDeque::new())),
        };
        let handle = pipe.map(|pipe| {
            let lines = tail.lines.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(pipe).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    log::debug!("scrcpy {}: {}", stream, line);
                    if let Ok(mut buf) = lines.lock() {
                        if buf.len() == TAIL_LINES {
                            buf.pop_front();
                        }
                        buf.push_back(line);
                    }
                }
            })
        });
        (tail, handle)
    }

    fn snapshot(&self) -> String {
        self.lines
            .lock()
            .map(|buf| buf.iter().cloned().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default()
    }

    /// Wait briefly for the reader to hit EOF, then return what was captured
    async fn collect(&self, handle: Option<JoinHandle<()>>) -> String {
        if let Some(handle) = handle {
            let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
        }
        self.snapshot()
    }
}

pub struct SessionSupervisor {
    events: EventEmitter,
    grace: Duration,
    stop_timeout: Duration,
    session: Option<Session>,
}

impl SessionSupervisor {
    pub fn new(events: EventEmitter, grace: Duration, stop_timeout: Duration) -> Self {
        Self {
            events,
            grace,
            stop_timeout,
            session: None,
        }
    }

    /// Launch scrcpy and confirm it is still alive after the grace period
    pub async fn start(
        &mut self,
        command: &MirrorCommand,
        connection: Option<Connection>,
        device: Option<String>,
    ) -> Result<SessionInfo> {
        self.reap();
        if let Some(ref session) = self.session {
            return Err(MirrorError::SessionActive {
                pid: session.info.pid,
            });
        }

        let command_line = command.to_string();
        self.events.emit(MirrorEvent::SessionLaunching {
            command: command_line.clone(),
        });

        let spawned = quiet_command(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let err = if e.kind() == std::io::ErrorKind::NotFound {
                    MirrorError::ToolNotFound {
                        tool: command.program.display().to_string(),
                    }
                } else {
                    MirrorError::LaunchFailed {
                        status: "not started".to_string(),
                        stdout: String::new(),
                        stderr: e.to_string(),
                    }
                };
                return Err(self.launch_failed(err));
            }
        };

        let pid = child.id().unwrap_or_default();
        let (stdout, stdout_reader) = OutputTail::spawn(child.stdout.take(), "stdout");
        let (stderr, stderr_reader) = OutputTail::spawn(child.stderr.take(), "stderr");

        tokio::time::sleep(self.grace).await;

        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = stdout.collect(stdout_reader).await;
                let stderr = stderr.collect(stderr_reader).await;
                return Err(self.launch_failed(MirrorError::launch_failed(status, stdout, stderr)));
            }
            Ok(None) => {}
            Err(e) => {
                let _ = child.kill().await;
                return Err(self.launch_failed(MirrorError::LaunchFailed {
                    status: format!("unknown ({})", e),
                    stdout: stdout.snapshot(),
                    stderr: stderr.snapshot(),
                }));
            }
        }

        let info = SessionInfo {
            id: uuid::Uuid::new_v4().to_string(),
            pid,
            command: command_line,
            connection,
            device,
            started_at: Local::now(),
        };

        let (stop_tx, stop_rx) = mpsc::channel(1);
        let (exit_tx, exit_rx) = watch::channel(None);
        tokio::spawn(reap_child(
            child,
            stop_rx,
            exit_tx,
            stderr,
            self.stop_timeout,
            self.events.clone(),
            info.id.clone(),
        ));

        self.events.emit(MirrorEvent::SessionStarted {
            session_id: info.id.clone(),
            pid,
        });
        self.session = Some(Session {
            info: info.clone(),
            stop_tx,
            exit_rx,
        });
        Ok(info)
    }

    /// Terminate the session: SIGTERM, then kill after the stop timeout.
    /// Without a session this does nothing.
    pub async fn stop(&mut self) -> Option<SessionExit> {
        let session = self.session.take()?;

        if let Some(exit) = session.exit() {
            return Some(exit);
        }

        self.events
            .info(format!("Stopping scrcpy (pid {})...", session.info.pid));
        let (ack_tx, ack_rx) = oneshot::channel();
        if session.stop_tx.send(ack_tx).await.is_ok() {
            let _ = ack_rx.await;
        }

        let exit = session.exit();
        if exit.is_none() {
            log::warn!("scrcpy session {} ended without a status", session.info.id);
        }
        exit
    }

    /// Receiver that resolves once the running session exits
    pub fn exit_watch(&self) -> Option<ExitWatch> {
        self.session.as_ref().map(|s| s.exit_rx.clone())
    }

    /// Wait for the running session to exit on its own
    pub async fn wait(&mut self) -> Option<SessionExit> {
        let mut rx = self.exit_watch()?;
        let exit = wait_exit(&mut rx).await;
        self.session = None;
        exit
    }

    /// Info about the live session, if any
    pub fn status(&mut self) -> Option<SessionInfo> {
        self.reap();
        self.session.as_ref().map(|s| s.info.clone())
    }

    pub fn is_running(&mut self) -> bool {
        self.status().is_some()
    }

    /// Forget a session whose process already exited
    fn reap(&mut self) {
        if self.session.as_ref().is_some_and(|s| s.exit().is_some()) {
            self.session = None;
        }
    }

    fn launch_failed(&self, err: MirrorError) -> MirrorError {
        self.events.emit(MirrorEvent::LaunchFailed {
            error: err.to_string(),
        });
        err
    }
}

/// Wait until the watch holds an exit status
pub async fn wait_exit(rx: &mut ExitWatch) -> Option<SessionExit> {
    loop {
        if let Some(exit) = rx.borrow_and_update().clone() {
            return Some(exit);
        }
        if rx.changed().await.is_err() {
            return rx.borrow().clone();
        }
    }
}

async fn reap_child(
    mut child: Child,
    mut stop_rx: mpsc::Receiver<oneshot::Sender<()>>,
    exit_tx: watch::Sender<Option<SessionExit>>,
    stderr: OutputTail,
    stop_timeout: Duration,
    events: EventEmitter,
    session_id: String,
) {
    let mut ack = None;

    let status = tokio::select! {
        status = child.wait() => status,
        Some(reply) = stop_rx.recv() => {
            ack = Some(reply);
            terminate(&mut child, stop_timeout).await
        }
    };

    let exit = match status {
        Ok(status) => SessionExit::from_status(&status, &stderr),
        Err(e) => SessionExit {
            code: None,
            description: format!("unknown ({})", e),
            stderr_tail: stderr.snapshot(),
        },
    };

    events.emit(MirrorEvent::SessionFinished {
        session_id,
        status: exit.description.clone(),
    });
    let _ = exit_tx.send(Some(exit));

    if let Some(reply) = ack {
        let _ = reply.send(());
    }
}

/// Ask politely, then force
async fn terminate(child: &mut Child, timeout: Duration) -> std::io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: pid belongs to our own, not yet reaped child.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        }
    }
    #[cfg(not(unix))]
    {
        child.start_kill()?;
    }

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            log::warn!("scrcpy ignored SIGTERM for {:?}; killing", timeout);
            child.kill().await?;
            child.wait().await
        }
    }
}
