//! Lifecycle of the single mpv process.
//!
//! The session (current URL, child process, last exit) is owned by one
//! [`Coordinator`] task. Everything else talks to it through a cloneable
//! [`PlayerHandle`], so starts, stops and IPC writes are handled strictly one
//! after another.

use crate::ipc::{self, IpcCommand, IpcError};
use std::fmt;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const DEFAULT_PLAYER: &str = "mpv";
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/mpvsocket";
pub const DEFAULT_YTDL_FORMAT: &str = "bestvideo[height<=?720]+bestaudio/best";

/// How long a killed player gets to be reaped before it is left to the runtime.
const KILL_REAP_TIMEOUT: Duration = Duration::from_millis(500);

const REQUEST_QUEUE: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    pub program: String,
    pub ytdl_format: String,
    pub socket_path: PathBuf,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PLAYER.to_string(),
            ytdl_format: DEFAULT_YTDL_FORMAT.to_string(),
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
        }
    }
}

/// Arguments for a fullscreen mpv exposing its IPC server at the configured path.
pub fn build_player_args(config: &PlayerConfig, url: &str) -> Vec<String> {
    vec![
        url.to_string(),
        format!("--ytdl-format={}", config.ytdl_format),
        "--fs".to_string(),
        format!("--input-ipc-server={}", config.socket_path.display()),
    ]
}

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("error while starting {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Ipc(#[from] IpcError),
    #[error("player coordinator is not running")]
    Closed,
}

/// How a player process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    pub pid: Option<u32>,
    pub url: String,
    pub code: Option<i32>,
    pub signal: Option<String>,
    /// The process was killed by a stop or by a newer start.
    pub requested: bool,
}

impl ExitReport {
    fn from_status(running: &Running, status: ExitStatus, requested: bool) -> Self {
        let signal = status.signal().map(|raw| {
            nix::sys::signal::Signal::try_from(raw)
                .map(|sig| sig.as_str().to_string())
                .unwrap_or_else(|_| format!("signal {raw}"))
        });
        Self {
            pid: running.pid,
            url: running.url.clone(),
            code: status.code(),
            signal,
            requested,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ExitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pid {
            Some(pid) => write!(f, "player (pid {pid})")?,
            None => write!(f, "player")?,
        }
        match (&self.code, &self.signal) {
            (Some(code), _) => write!(f, " exited with code {code}"),
            (None, Some(signal)) => write!(f, " was killed by {signal}"),
            (None, None) => write!(f, " exited"),
        }
    }
}

/// What readers get to see of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Empty when nothing is playing.
    pub current_url: String,
    pub pid: Option<u32>,
    pub last_exit: Option<ExitReport>,
}

impl SessionSnapshot {
    pub fn is_playing(&self) -> bool {
        !self.current_url.is_empty()
    }
}

struct Running {
    child: Child,
    pid: Option<u32>,
    url: String,
}

#[derive(Default)]
struct Session {
    current_url: String,
    running: Option<Running>,
    last_exit: Option<ExitReport>,
}

enum Request {
    Start {
        url: String,
        reply: oneshot::Sender<Result<(), PlayerError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Send {
        command: IpcCommand,
        reply: oneshot::Sender<Result<(), IpcError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cheap, cloneable access to the coordinator.
#[derive(Clone)]
pub struct PlayerHandle {
    requests: mpsc::Sender<Request>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl PlayerHandle {
    /// Replaces whatever is playing with `url`. Resolves once the new process
    /// has been launched (or failed to launch).
    pub async fn start(&self, url: impl Into<String>) -> Result<(), PlayerError> {
        let url = url.into();
        self.request(|reply| Request::Start { url, reply }).await?
    }

    pub async fn stop(&self) -> Result<(), PlayerError> {
        self.request(|reply| Request::Stop { reply }).await
    }

    pub async fn send_command(&self, command: IpcCommand) -> Result<(), PlayerError> {
        self.request(|reply| Request::Send { command, reply })
            .await?
            .map_err(PlayerError::from)
    }

    /// Stops the player and ends the coordinator task.
    pub async fn shutdown(&self) -> Result<(), PlayerError> {
        self.request(|reply| Request::Shutdown { reply }).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    #[cfg(test)]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Result<T, PlayerError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(make(reply))
            .await
            .map_err(|_| PlayerError::Closed)?;
        response.await.map_err(|_| PlayerError::Closed)
    }
}

/// Spawns the coordinator task and returns a handle to it.
pub fn spawn(config: PlayerConfig) -> (PlayerHandle, JoinHandle<()>) {
    let (coordinator, handle) = Coordinator::new(config);
    let task = tokio::spawn(coordinator.run());
    (handle, task)
}

pub struct Coordinator {
    config: PlayerConfig,
    session: Session,
    requests: mpsc::Receiver<Request>,
    snapshot: watch::Sender<SessionSnapshot>,
}

impl Coordinator {
    fn new(config: PlayerConfig) -> (Self, PlayerHandle) {
        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_QUEUE);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());
        let coordinator = Self {
            config,
            session: Session::default(),
            requests: requests_rx,
            snapshot: snapshot_tx,
        };
        let handle = PlayerHandle {
            requests: requests_tx,
            snapshot: snapshot_rx,
        };
        (coordinator, handle)
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                status = wait_for_exit(&mut self.session.running) => {
                    self.reap(status);
                }
                request = self.requests.recv() => {
                    match request {
                        Some(Request::Start { url, reply }) => {
                            let _ = reply.send(self.start(url).await);
                        }
                        Some(Request::Stop { reply }) => {
                            self.stop().await;
                            let _ = reply.send(());
                        }
                        Some(Request::Send { command, reply }) => {
                            let _ = reply.send(self.send(&command).await);
                        }
                        Some(Request::Shutdown { reply }) => {
                            self.stop().await;
                            let _ = reply.send(());
                            break;
                        }
                        None => {
                            self.stop().await;
                            break;
                        }
                    }
                }
            }
        }
        debug!("player coordinator stopped");
    }

    async fn start(&mut self, url: String) -> Result<(), PlayerError> {
        self.kill_current().await;
        self.session.current_url.clear();
        self.remove_socket().await;

        let args = build_player_args(&self.config, &url);
        let spawned = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(source) => {
                let err = PlayerError::Spawn {
                    program: self.config.program.clone(),
                    source,
                };
                error!(%url, "{err}");
                self.publish();
                return Err(err);
            }
        };

        let pid = child.id();
        info!(%url, pid, "started {}", self.config.program);
        self.session.current_url = url.clone();
        self.session.running = Some(Running { child, pid, url });
        self.publish();
        Ok(())
    }

    async fn stop(&mut self) {
        self.kill_current().await;
        self.session.current_url.clear();
        self.remove_socket().await;
        self.publish();
    }

    async fn send(&mut self, command: &IpcCommand) -> Result<(), IpcError> {
        let result = ipc::send_command(&self.config.socket_path, command).await;
        match &result {
            Ok(()) => debug!(%command, "sent command to player"),
            Err(err) => warn!(%command, "{err}"),
        }
        result
    }

    /// Sends SIGKILL to the current player and reaps it. A player that has
    /// already exited on its own is reaped as an unrequested exit.
    async fn kill_current(&mut self) {
        if let Some(running) = self.session.running.as_mut() {
            match running.child.try_wait() {
                Ok(Some(status)) => {
                    self.reap(Ok(status));
                    return;
                }
                Ok(None) => {}
                Err(err) => warn!(pid = running.pid, "error while checking player: {err}"),
            }
        }
        let Some(mut running) = self.session.running.take() else {
            return;
        };
        if let Err(err) = running.child.start_kill() {
            warn!(pid = running.pid, "error while killing player: {err}");
        }
        match tokio::time::timeout(KILL_REAP_TIMEOUT, running.child.wait()).await {
            Ok(Ok(status)) => {
                let report = ExitReport::from_status(&running, status, true);
                debug!(url = %report.url, "{report}");
                self.session.last_exit = Some(report);
            }
            Ok(Err(err)) => warn!(pid = running.pid, "error while reaping player: {err}"),
            Err(_) => warn!(
                pid = running.pid,
                "player did not exit within {KILL_REAP_TIMEOUT:?} after kill"
            ),
        }
    }

    fn reap(&mut self, status: io::Result<ExitStatus>) {
        let Some(running) = self.session.running.take() else {
            return;
        };
        self.session.current_url.clear();
        match status {
            Ok(status) => {
                let report = ExitReport::from_status(&running, status, false);
                if report.success() {
                    info!(url = %report.url, "{report}");
                } else {
                    error!(url = %report.url, "{report}");
                }
                self.session.last_exit = Some(report);
            }
            Err(err) => error!(pid = running.pid, "error while waiting for player: {err}"),
        }
        self.publish();
    }

    async fn remove_socket(&self) {
        match tokio::fs::remove_file(&self.config.socket_path).await {
            Ok(()) => debug!(path = %self.config.socket_path.display(), "removed control socket"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                path = %self.config.socket_path.display(),
                "error while removing control socket: {err}"
            ),
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(SessionSnapshot {
            current_url: self.session.current_url.clone(),
            pid: self.session.running.as_ref().and_then(|r| r.pid),
            last_exit: self.session.last_exit.clone(),
        });
    }
}

async fn wait_for_exit(running: &mut Option<Running>) -> io::Result<ExitStatus> {
    match running {
        Some(running) => running.child.wait().await,
        None => std::future::pending().await,
    }
}
