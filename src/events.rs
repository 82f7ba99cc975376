use crate::bridge::devices::{Device, DeviceState};
use crate::connection::Connection;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Mirroring lifecycle events for whatever presentation layer is attached
#[derive(Debug, Clone)]
pub enum MirrorEvent {
    Log {
        level: LogLevel,
        message: String,
    },

    DependenciesChecked {
        bridge_version: String,
        mirror_version: String,
    },

    DevicesScanned {
        devices: Vec<Device>,
    },

    Connected {
        connection: Connection,
    },
    Disconnected {
        connection: Connection,
    },

    ServerRestarted {
        success: bool,
    },

    // Session events
    SessionLaunching {
        command: String,
    },
    SessionStarted {
        session_id: String,
        pid: u32,
    },
    LaunchFailed {
        error: String,
    },
    SessionFinished {
        session_id: String,
        status: String,
    },
}

/// Event emitter for broadcasting mirroring events
///
/// Also the log sink: every message is mirrored to the `log` facade so that
/// `RUST_LOG` captures it even with no subscriber attached.
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<MirrorEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<MirrorEvent>) {
        let (sender, receiver) = broadcast::channel(100);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: MirrorEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MirrorEvent> {
        self.sender.subscribe()
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        log::info!("{}", message);
        self.emit(MirrorEvent::Log {
            level: LogLevel::Info,
            message,
        });
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.emit(MirrorEvent::Log {
            level: LogLevel::Warn,
            message,
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        log::error!("{}", message);
        self.emit(MirrorEvent::Log {
            level: LogLevel::Error,
            message,
        });
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }
}

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration as StdDuration;

/// Console event listener for printing real-time updates
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<MirrorEvent>) {
        use colored::Colorize;
        use std::io::IsTerminal;

        let interactive = std::io::stdout().is_terminal();
        let mut spinner: Option<ProgressBar> = None;

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let line = match event {
                MirrorEvent::Log { level, message } => match level {
                    LogLevel::Info => format!("  {}", message),
                    LogLevel::Warn => format!("{} {}", "⚠".yellow(), message.yellow()),
                    LogLevel::Error => format!("{} {}", "✗".red(), message.red()),
                },

                MirrorEvent::DependenciesChecked {
                    bridge_version,
                    mirror_version,
                } => format!(
                    "{} adb: {}\n{} scrcpy: {}",
                    "✓".green(),
                    bridge_version.dimmed(),
                    "✓".green(),
                    mirror_version.dimmed()
                ),

                MirrorEvent::DevicesScanned { devices } => {
                    if devices.is_empty() {
                        "  No Android devices connected".to_string()
                    } else {
                        let mut out = format!("  Found {} device(s):", devices.len());
                        for device in devices {
                            let state = match device.state {
                                DeviceState::Ready => device.state.to_string().green(),
                                DeviceState::Unauthorized => device.state.to_string().yellow(),
                                _ => device.state.to_string().red(),
                            };
                            out.push_str(&format!(
                                "\n    {} {} ({})",
                                "•".green(),
                                device.identifier.white().bold(),
                                state
                            ));
                        }
                        out
                    }
                }

                MirrorEvent::Connected { connection } => {
                    format!("{} Connected: {}", "✓".green(), connection.to_string().cyan())
                }
                MirrorEvent::Disconnected { connection } => {
                    format!("{} Disconnected: {}", "■".blue(), connection)
                }

                MirrorEvent::ServerRestarted { success } => {
                    if success {
                        format!("{} adb server restarted", "✓".green())
                    } else {
                        format!("{} adb server restart failed", "✗".red())
                    }
                }

                MirrorEvent::SessionLaunching { command } => {
                    let text = format!("Starting {}", command.dimmed());
                    if interactive {
                        let pb = ProgressBar::new_spinner();
                        let style = ProgressStyle::default_spinner()
                            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                            .template("  {spinner} {msg}")
                            .unwrap_or_else(|_| ProgressStyle::default_spinner());
                        pb.set_style(style);
                        pb.set_message(text);
                        pb.enable_steady_tick(StdDuration::from_millis(100));
                        spinner = Some(pb);
                        continue;
                    }
                    format!("{} {}", "▶".green(), text)
                }
                MirrorEvent::SessionStarted { session_id, pid } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    format!(
                        "{} scrcpy running (pid {}, session {})",
                        "▶".green().bold(),
                        pid,
                        session_id.dimmed()
                    )
                }
                MirrorEvent::LaunchFailed { error } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    format!("{} {}", "✗".red(), error.red())
                }
                MirrorEvent::SessionFinished { session_id, status } => format!(
                    "{} Session {} finished ({})",
                    "■".blue().bold(),
                    session_id.dimmed(),
                    status
                ),
            };

            match &spinner {
                Some(pb) => pb.println(line),
                None => println!("{}", line),
            }
        }

        if let Some(pb) = spinner.take() {
            pb.finish_and_clear();
        }
    }
}
