//! Request queue in front of the connection and session state
//!
//! One task owns the [`ConnectionManager`], the [`SessionSupervisor`] and the
//! capability cache. Front ends talk to it through a cloneable
//! [`ControllerHandle`]; requests run one at a time in arrival order.

use crate::bridge::{self, Adb, Device};
use crate::connection::{Connection, ConnectionManager};
use crate::error::{MirrorError, Result};
use crate::events::{EventEmitter, MirrorEvent};
use crate::mirror::command::{self, MirrorOptions};
use crate::mirror::deps::{DependencyChecker, DependencyReport, Scrcpy, ToolCapabilities};
use crate::mirror::session::{self, ExitWatch, SessionExit, SessionInfo, SessionSupervisor};
use crate::process::ProcessRunner;
use crate::utils::config::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

const QUEUE_DEPTH: usize = 32;

type Reply<T> = oneshot::Sender<T>;

enum Request {
    CheckDependencies(Reply<Result<DependencyReport>>),
    RefreshCapabilities(Reply<ToolCapabilities>),
    ScanDevices(Reply<Vec<Device>>),
    ConnectUsb(Reply<Result<Connection>>),
    ConnectUsbDevice {
        serial: String,
        reply: Reply<Result<Connection>>,
    },
    ConnectWifi {
        ip: String,
        reply: Reply<Result<String>>,
    },
    RestartServer(Reply<Result<String>>),
    StartMirroring {
        device: Option<String>,
        options: MirrorOptions,
        reply: Reply<Result<SessionInfo>>,
    },
    StopMirroring(Reply<Option<SessionExit>>),
    WatchSession(Reply<Option<ExitWatch>>),
    SessionStatus(Reply<Option<SessionInfo>>),
    CurrentConnection(Reply<Option<Connection>>),
    Cleanup(Reply<()>),
    Shutdown(Reply<()>),
}

pub struct Controller {
    adb: Adb,
    scrcpy: PathBuf,
    checker: DependencyChecker,
    connections: ConnectionManager,
    supervisor: SessionSupervisor,
    capabilities: Option<ToolCapabilities>,
    events: EventEmitter,
}

impl Controller {
    /// Start the controller task and return a handle to it
    pub fn spawn(config: Config, runner: Arc<dyn ProcessRunner>) -> ControllerHandle {
        let events = EventEmitter::default();
        let adb = Adb::new(runner.clone(), &config);
        let scrcpy = Scrcpy::new(runner, &config);

        let controller = Controller {
            scrcpy: scrcpy.program().to_path_buf(),
            checker: DependencyChecker::new(adb.clone(), scrcpy, events.clone()),
            connections: ConnectionManager::new(
                adb.clone(),
                events.clone(),
                config.wifi_port,
                config.server_restart_pause,
            ),
            supervisor: SessionSupervisor::new(
                events.clone(),
                config.launch_grace,
                config.stop_timeout,
            ),
            capabilities: None,
            adb,
            events: events.clone(),
        };

        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(controller.run(rx));
        ControllerHandle { tx, events }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Request>) {
        while let Some(request) = rx.recv().await {
            match request {
                Request::CheckDependencies(reply) => {
                    let _ = reply.send(self.checker.check().await);
                }
                Request::RefreshCapabilities(reply) => {
                    self.capabilities = None;
                    let _ = reply.send(self.capabilities().await);
                }
                Request::ScanDevices(reply) => {
                    let _ = reply.send(bridge::list_devices(&self.adb, &self.events).await);
                }
                Request::ConnectUsb(reply) => {
                    let _ = reply.send(self.connections.connect_usb().await);
                }
                Request::ConnectUsbDevice { serial, reply } => {
                    let _ = reply.send(self.connections.connect_usb_device(&serial).await);
                }
                Request::ConnectWifi { ip, reply } => {
                    let _ = reply.send(self.connections.connect_wifi(&ip).await);
                }
                Request::RestartServer(reply) => {
                    let _ = reply.send(self.connections.restart_server().await);
                }
                Request::StartMirroring {
                    device,
                    options,
                    reply,
                } => {
                    let _ = reply.send(self.start_mirroring(device, options).await);
                }
                Request::StopMirroring(reply) => {
                    let _ = reply.send(self.supervisor.stop().await);
                }
                Request::WatchSession(reply) => {
                    let _ = reply.send(self.supervisor.exit_watch());
                }
                Request::SessionStatus(reply) => {
                    let _ = reply.send(self.supervisor.status());
                }
                Request::CurrentConnection(reply) => {
                    let _ = reply.send(self.connections.current().cloned());
                }
                Request::Cleanup(reply) => {
                    self.cleanup().await;
                    let _ = reply.send(());
                }
                Request::Shutdown(reply) => {
                    self.cleanup().await;
                    let _ = reply.send(());
                    break;
                }
            }
        }
        log::debug!("controller stopped");
    }

    /// Cached capabilities, probing scrcpy on first use
    async fn capabilities(&mut self) -> ToolCapabilities {
        if let Some(caps) = self.capabilities {
            return caps;
        }
        let caps = self.checker.probe_capabilities().await;
        self.capabilities = Some(caps);
        caps
    }

    async fn start_mirroring(
        &mut self,
        device: Option<String>,
        options: MirrorOptions,
    ) -> Result<SessionInfo> {
        if let Some(info) = self.supervisor.status() {
            let err = MirrorError::SessionActive { pid: info.pid };
            self.events.error(err.to_string());
            return Err(err);
        }

        let caps = self.capabilities().await;
        let connection = self.connections.current().cloned();
        let port = self.connections.port();

        let (command, notes) = command::build(
            self.scrcpy.clone(),
            device.as_deref(),
            connection.as_ref(),
            &options,
            &caps,
            port,
        );
        for flag in notes.skipped {
            self.events
                .warn(format!("Installed scrcpy does not support {}; left out", flag));
        }

        let target = device.or_else(|| connection.as_ref().and_then(|c| c.target(port)));
        self.supervisor.start(&command, connection, target).await
    }

    /// Stop the session and drop the connection; never fails
    async fn cleanup(&mut self) {
        if let Some(exit) = self.supervisor.stop().await {
            log::debug!("session ended during cleanup: {}", exit.description);
        }
        self.connections.disconnect().await;
    }
}

/// Cloneable front door to a running [`Controller`]
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Request>,
    events: EventEmitter,
}

impl ControllerHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<MirrorEvent> {
        self.events.subscribe()
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Request) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| MirrorError::ControllerClosed)?;
        rx.await.map_err(|_| MirrorError::ControllerClosed)
    }

    pub async fn check_dependencies(&self) -> Result<DependencyReport> {
        self.request(Request::CheckDependencies).await?
    }

    /// Re-probe `scrcpy --help`, e.g. after upgrading scrcpy
    pub async fn refresh_capabilities(&self) -> Result<ToolCapabilities> {
        self.request(Request::RefreshCapabilities).await
    }

    pub async fn scan_devices(&self) -> Result<Vec<Device>> {
        self.request(Request::ScanDevices).await
    }

    pub async fn connect_usb(&self) -> Result<Connection> {
        self.request(Request::ConnectUsb).await?
    }

    pub async fn connect_usb_device(&self, serial: &str) -> Result<Connection> {
        let serial = serial.to_string();
        self.request(|reply| Request::ConnectUsbDevice { serial, reply })
            .await?
    }

    pub async fn connect_wifi(&self, ip: &str) -> Result<String> {
        let ip = ip.to_string();
        self.request(|reply| Request::ConnectWifi { ip, reply }).await?
    }

    pub async fn restart_server(&self) -> Result<String> {
        self.request(Request::RestartServer).await?
    }

    pub async fn start_mirroring(
        &self,
        device: Option<String>,
        options: MirrorOptions,
    ) -> Result<SessionInfo> {
        self.request(|reply| Request::StartMirroring {
            device,
            options,
            reply,
        })
        .await?
    }

    pub async fn stop_mirroring(&self) -> Result<Option<SessionExit>> {
        self.request(Request::StopMirroring).await
    }

    /// Wait for the running session to end without blocking other requests
    pub async fn wait_mirroring(&self) -> Result<Option<SessionExit>> {
        match self.request(Request::WatchSession).await? {
            Some(mut rx) => Ok(session::wait_exit(&mut rx).await),
            None => Ok(None),
        }
    }

    pub async fn session_status(&self) -> Result<Option<SessionInfo>> {
        self.request(Request::SessionStatus).await
    }

    pub async fn connection(&self) -> Result<Option<Connection>> {
        self.request(Request::CurrentConnection).await
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.request(Request::Cleanup).await
    }

    /// Clean up and stop the controller task
    pub async fn shutdown(&self) -> Result<()> {
        self.request(Request::Shutdown).await
    }
}
