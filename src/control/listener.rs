use super::parse;
use super::ControlCommand;
use super::ControlError;

use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;

use std::fmt;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::net::UnixListener;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

use tokio_util::codec::Framed;
use tokio_util::codec::LinesCodec;
use tokio_util::codec::LinesCodecError;

use tracing::debug;
use tracing::info;
use tracing::warn;

/// Longest control line, a device path plus a command.
pub const CONTROL_LINE_MAX: usize = 1024;

/// A command from the control socket waiting for the daemon's answer.
#[derive(Debug)]
pub struct ControlRequest {
    pub command: ControlCommand,
    pub reply: oneshot::Sender<ControlReply>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ControlReply {
    Ok,
    Error,
    /// Paths of the allocated devices, followed by `OK`.
    Devices(Vec<String>),
}

impl fmt::Display for ControlReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlReply::Ok => f.write_str("OK"),
            ControlReply::Error => f.write_str("ERROR"),
            ControlReply::Devices(paths) => {
                for path in paths {
                    writeln!(f, "{}", path)?;
                }

                f.write_str("OK")
            }
        }
    }
}

/// The bound control socket.  The socket file is removed on drop.
#[derive(Debug)]
pub struct ControlSocket {
    path: PathBuf,
    listener: UnixListener,
}

impl ControlSocket {
    /// Bind `path`, replacing a socket left over from an earlier run.
    pub fn bind(path: &Path) -> Result<Self, ControlError> {
        let bind_error = |source| ControlError::Bind {
            path: path.to_path_buf(),
            source,
        };

        match std::fs::remove_file(path) {
            Ok(()) => debug!("removed stale control socket {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => (),
            Err(e) => return Err(bind_error(e)),
        }

        let listener = UnixListener::bind(path).map_err(bind_error)?;

        info!("control socket {}", path.display());

        Ok(ControlSocket {
            path: path.to_path_buf(),
            listener,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn accept(&self) -> io::Result<UnixStream> {
        let (stream, _) = self.listener.accept().await?;

        Ok(stream)
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("unable to remove control socket {}: {}", self.path.display(), e);
        }
    }
}

/// Answer control commands from one connection until it closes.
///
/// Each line is handed to the daemon through `requests` and its reply written back.  A
/// malformed line is answered with `ERROR` and the connection stays open.
#[tracing::instrument(skip_all)]
pub async fn serve<S>(stream: S, requests: mpsc::Sender<ControlRequest>) -> Result<(), ControlError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut lines = Framed::new(stream, LinesCodec::new_with_max_length(CONTROL_LINE_MAX));

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!("control line longer than {} bytes", CONTROL_LINE_MAX);
                lines.send(ControlReply::Error.to_string()).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let reply = match parse(&line) {
            Ok(command) => {
                info!("<= control: {}", line.trim_end());
                dispatch(command, &requests).await?
            }
            Err(e) => {
                warn!("{}", e);
                ControlReply::Error
            }
        };

        lines.send(reply.to_string()).await?;
    }

    debug!("control connection closed");

    Ok(())
}

async fn dispatch(
    command: ControlCommand,
    requests: &mpsc::Sender<ControlRequest>,
) -> Result<ControlReply, ControlError> {
    let (reply, response) = oneshot::channel();

    requests
        .send(ControlRequest { command, reply })
        .await
        .map_err(|_| ControlError::Shutdown)?;

    response.await.map_err(|_| ControlError::Shutdown)
}
