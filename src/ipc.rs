//! Client side of mpv's JSON IPC socket.
//!
//! Every command is written as a single JSON object terminated by a newline on
//! a fresh connection, which is closed right after the write. Replies from mpv
//! are never read.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

/// Step used by the relative seek buttons, in seconds.
pub const SEEK_STEP_SECS: i32 = 15;

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("error while opening IPC connection to {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error while encoding command: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("error while writing to the player: {0}")]
    Write(#[source] std::io::Error),
}

/// Visibility modes accepted by mpv's `osc-visibility` script message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OscVisibility {
    Always,
    Auto,
}

impl OscVisibility {
    fn as_str(self) -> &'static str {
        match self {
            OscVisibility::Always => "always",
            OscVisibility::Auto => "auto",
        }
    }
}

/// One `{"command": [...]}` object of the mpv IPC protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpcCommand {
    command: Vec<String>,
}

impl IpcCommand {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn toggle_pause() -> Self {
        Self::new(["cycle", "pause"])
    }

    /// Relative seek; the offset always carries its sign (`+15`, `-15`).
    pub fn seek_relative(seconds: i32) -> Self {
        Self::new(["seek".to_string(), format!("{seconds:+}")])
    }

    /// Absolute seek in percent. `position` is forwarded as given.
    pub fn seek_absolute_percent(position: &str) -> Self {
        Self::new(["seek", position, "absolute-percent"])
    }

    pub fn osc_visibility(mode: OscVisibility) -> Self {
        Self::new(["script-message", "osc-visibility", mode.as_str()])
    }

    /// Wire form: compact JSON followed by `\n`.
    pub fn to_line(&self) -> Result<Vec<u8>, IpcError> {
        let mut data = serde_json::to_vec(self)?;
        data.push(b'\n');
        Ok(data)
    }
}

impl fmt::Display for IpcCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command.join(" "))
    }
}

/// Opens `socket`, writes `command` as one line and closes the connection.
pub async fn send_command(socket: &Path, command: &IpcCommand) -> Result<(), IpcError> {
    let data = command.to_line()?;
    let mut stream = UnixStream::connect(socket)
        .await
        .map_err(|source| IpcError::Connect {
            path: socket.to_path_buf(),
            source,
        })?;
    stream.write_all(&data).await.map_err(IpcError::Write)?;
    stream.shutdown().await.map_err(IpcError::Write)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use tokio::io::AsyncReadExt;
    use tokio::net::UnixListener;

    /// Accepts one connection and returns everything written to it.
    pub async fn read_one(listener: &UnixListener) -> String {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut received = String::new();
        stream
            .read_to_string(&mut received)
            .await
            .expect("read command");
        received
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::read_one;
    use super::*;
    use tempfile::tempdir;
    use tokio::net::UnixListener;

    fn line(command: &IpcCommand) -> String {
        String::from_utf8(command.to_line().unwrap()).unwrap()
    }

    #[test]
    fn fixed_commands_match_mpv_wire_format() {
        assert_eq!(
            line(&IpcCommand::toggle_pause()),
            "{\"command\":[\"cycle\",\"pause\"]}\n"
        );
        assert_eq!(
            line(&IpcCommand::seek_relative(SEEK_STEP_SECS)),
            "{\"command\":[\"seek\",\"+15\"]}\n"
        );
        assert_eq!(
            line(&IpcCommand::seek_relative(-SEEK_STEP_SECS)),
            "{\"command\":[\"seek\",\"-15\"]}\n"
        );
        assert_eq!(
            line(&IpcCommand::osc_visibility(OscVisibility::Always)),
            "{\"command\":[\"script-message\",\"osc-visibility\",\"always\"]}\n"
        );
        assert_eq!(
            line(&IpcCommand::osc_visibility(OscVisibility::Auto)),
            "{\"command\":[\"script-message\",\"osc-visibility\",\"auto\"]}\n"
        );
    }

    #[test]
    fn absolute_seek_keeps_position_as_string() {
        assert_eq!(
            line(&IpcCommand::seek_absolute_percent("50")),
            "{\"command\":[\"seek\",\"50\",\"absolute-percent\"]}\n"
        );
        // no numeric coercion, quotes are escaped by the encoder
        assert_eq!(
            line(&IpcCommand::seek_absolute_percent("4\"2")),
            "{\"command\":[\"seek\",\"4\\\"2\",\"absolute-percent\"]}\n"
        );
    }

    #[test]
    fn display_joins_arguments() {
        assert_eq!(IpcCommand::seek_relative(-15).to_string(), "seek -15");
    }

    #[tokio::test]
    async fn send_command_writes_single_line_and_closes() {
        let dir = tempdir().unwrap();
        let socket = dir.path().join("mpv.sock");
        let listener = UnixListener::bind(&socket).unwrap();

        let reader = tokio::spawn(async move { read_one(&listener).await });
        send_command(&socket, &IpcCommand::toggle_pause())
            .await
            .unwrap();

        assert_eq!(reader.await.unwrap(), "{\"command\":[\"cycle\",\"pause\"]}\n");
    }

    #[tokio::test]
    async fn send_command_without_listener_reports_connect_error() {
        let dir = tempdir().unwrap();
        let socket = dir.path().join("missing.sock");

        let err = send_command(&socket, &IpcCommand::toggle_pause())
            .await
            .unwrap_err();
        match err {
            IpcError::Connect { path, .. } => assert_eq!(path, socket),
            other => panic!("unexpected error: {other}"),
        }
    }
}
