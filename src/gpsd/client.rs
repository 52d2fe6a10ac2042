use super::codec::Codec;
use super::codec::CodecError;
use super::parser::Command;

use bytes::Bytes;

use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;

use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::time::timeout;

use tokio_util::codec::FramedRead;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;

use tracing::debug;
use tracing::info;
use tracing::Instrument;

/// Responses queued for one client before it counts as blocked.
pub const CLIENT_QUEUE: usize = 128;

/// What a client connection tells the daemon.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    Commands { id: u64, commands: Vec<Command> },
    Closed { id: u64 },
}

/// The daemon's end of a client connection.
#[derive(Debug)]
pub struct ClientHandle {
    pub id: u64,
    pub peer: String,
    pub responses: mpsc::Sender<Bytes>,
    pub cancel: CancellationToken,
}

/// Start the reader and writer tasks for a connected client.
///
/// Requests are forwarded to `events` tagged with `id`.  The writer gives up when one write
/// takes longer than `noread`, unless it is zero.  Cancelling the returned handle's token, or
/// dropping its sender, closes the connection.
pub fn spawn<S>(id: u64, peer: String, stream: S, events: mpsc::Sender<ClientEvent>, noread: Duration) -> ClientHandle
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read, write) = tokio::io::split(stream);
    let (responses, rx) = mpsc::channel(CLIENT_QUEUE);
    let cancel = CancellationToken::new();

    let requests = FramedRead::new(read, Codec::new());
    let span = tracing::info_span!("client", peer = %peer);

    tokio::spawn(read_requests(id, requests, events, cancel.clone()).instrument(span.clone()));

    let writer = FramedWrite::new(write, Codec::new());

    tokio::spawn(write_responses(writer, rx, noread, cancel.clone()).instrument(span));

    ClientHandle {
        id,
        peer,
        responses,
        cancel,
    }
}

async fn read_requests<R>(
    id: u64,
    mut requests: FramedRead<R, Codec>,
    events: mpsc::Sender<ClientEvent>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = requests.next() => result,
        };

        match result {
            Some(Ok(commands)) if commands.is_empty() => (),
            Some(Ok(commands)) => {
                if events.send(ClientEvent::Commands { id, commands }).await.is_err() {
                    break;
                }
            }
            Some(Err(e)) => {
                info!("{}", e);
                break;
            }
            None => {
                debug!("disconnected");
                break;
            }
        }
    }

    cancel.cancel();

    // the daemon may already be gone during shutdown
    let _ = events.send(ClientEvent::Closed { id }).await;
}

async fn write_responses<W>(
    mut writer: FramedWrite<W, Codec>,
    mut rx: mpsc::Receiver<Bytes>,
    noread: Duration,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = rx.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };

        let result = if noread.is_zero() {
            writer.send(line).await
        } else {
            match timeout(noread, writer.send(line)).await {
                Ok(result) => result,
                Err(_) => Err(CodecError::Timeout),
            }
        };

        if let Err(e) = result {
            info!("{}", e);
            break;
        }
    }

    cancel.cancel();
}
