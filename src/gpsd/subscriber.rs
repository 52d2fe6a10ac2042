use super::client::ClientHandle;
use super::watch::Watch;

use bytes::Bytes;

use std::time::Duration;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use tracing::debug;
use tracing::info;

/// A connected client in the daemon's subscriber table.
#[derive(Debug)]
pub struct Subscriber {
    pub policy: Watch,
    pub last_command: Instant,
    client: ClientHandle,
    blocked_since: Option<Instant>,
}

impl Subscriber {
    pub fn new(client: ClientHandle) -> Self {
        Subscriber {
            policy: Watch::default(),
            last_command: Instant::now(),
            client,
            blocked_since: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.client.id
    }

    pub fn peer(&self) -> &str {
        &self.client.peer
    }

    /// A sender for replies that arrive after the command was handled.
    pub fn responses(&self) -> mpsc::Sender<Bytes> {
        self.client.responses.clone()
    }

    /// Queue `line` for the client.
    ///
    /// A full queue drops the line.  Returns false when the subscriber should be detached: its
    /// connection closed, or its queue has been full for longer than `noread`.
    pub fn send(&mut self, line: Bytes, noread: Duration) -> bool {
        match self.client.responses.try_send(line) {
            Ok(()) => {
                self.blocked_since = None;
                true
            }
            Err(TrySendError::Full(_)) => {
                let since = *self.blocked_since.get_or_insert_with(Instant::now);

                if !noread.is_zero() && since.elapsed() > noread {
                    info!("{} blocked for {:?}, detaching", self.peer(), since.elapsed());
                    false
                } else {
                    debug!("{} is lagging, response dropped", self.peer());
                    true
                }
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Silent for longer than `command` and not watching.  A zero timeout never expires.
    pub fn is_idle(&self, command: Duration) -> bool {
        !command.is_zero() && !self.policy.enable && self.last_command.elapsed() > command
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.client.cancel.cancel();
    }
}
