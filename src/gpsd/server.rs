use crate::configuration::ServerConfig;

use futures::future::select_all;

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::net::TcpStream;

use tracing::info;
use tracing::warn;

/// The client listening sockets, IPv4 and IPv6.
#[derive(Debug)]
pub struct Listeners {
    listeners: Vec<TcpListener>,
    linger: Duration,
}

impl Listeners {
    /// Bind every configured address.
    ///
    /// An address that cannot be bound is skipped, hosts without IPv6 are common.  It is an
    /// error when nothing could be bound.
    pub async fn bind(config: &ServerConfig, linger: Duration) -> io::Result<Listeners> {
        let mut listeners = vec![];
        let mut last_error = None;

        for address in config.addresses() {
            match TcpListener::bind((address.as_str(), config.port)).await {
                Ok(listener) => {
                    info!("listening on {}", listener.local_addr()?);
                    listeners.push(listener);
                }
                Err(e) => {
                    warn!("unable to listen on {} port {}: {}", address, config.port, e);
                    last_error = Some(e);
                }
            }
        }

        if listeners.is_empty() {
            return Err(last_error.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "no listen addresses configured")
            }));
        }

        Ok(Listeners { listeners, linger })
    }

    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners
            .iter()
            .filter_map(|listener| listener.local_addr().ok())
            .collect()
    }

    /// The next connection on any listener.
    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let accepts = self
            .listeners
            .iter()
            .map(|listener| Box::pin(listener.accept()));

        let (result, _, _) = select_all(accepts).await;
        let (stream, peer) = result?;

        if !self.linger.is_zero() {
            stream.set_linger(Some(self.linger))?;
        }

        Ok((stream, peer))
    }
}
