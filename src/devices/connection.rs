use super::ntrip;
use super::uri::Source;
use super::DeviceError;

use crate::configuration::DeviceConfig;
use crate::configuration::Framing;
use crate::packet::Codec;
use crate::packet::Lexer;
use crate::packet::Packet;
use crate::shm::NtpSegment;
use crate::timestamp::Timestamp;

use bytes::Bytes;

use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;

use serde_json::json;

use std::io;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::UdpSocket;
use tokio::time::Interval;

use tokio_serial::SerialPort;
use tokio_serial::SerialPortBuilderExt;
use tokio_serial::SerialStream;

use tokio_util::codec::Framed;

use tracing::debug;
use tracing::info;

/// How often a refclock segment source is checked for a new sample.
const SHM_POLL: Duration = Duration::from_millis(250);

const DATAGRAM_MAX: usize = 65536;

/// Byte streams a device can be read from.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// One thing read from a device.
#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    Packet(Packet),
    /// A sample from a refclock segment.
    Time(Timestamp),
}

/// An open device.
pub enum Connection {
    Serial(Framed<SerialStream, Codec>),
    Stream(Framed<Box<dyn AsyncStream>, Codec>),
    Datagram {
        socket: UdpSocket,
        lexer: Lexer,
        buffer: Vec<u8>,
    },
    Shm {
        segment: NtpSegment,
        path: String,
        last_count: i32,
        poll: Interval,
    },
    /// A bare PPS device, edges arrive separately.
    Pps,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Connection::Serial(_) => "Serial",
            Connection::Stream(_) => "Stream",
            Connection::Datagram { .. } => "Datagram",
            Connection::Shm { .. } => "Shm",
            Connection::Pps => "Pps",
        };

        f.debug_tuple("Connection").field(&kind).finish()
    }
}

impl Connection {
    /// Wrap an already connected byte stream.
    pub fn stream<S: AsyncStream + 'static>(stream: S) -> Self {
        let stream: Box<dyn AsyncStream> = Box::new(stream);

        Connection::Stream(Framed::new(stream, Codec::new()))
    }

    /// Open `source`.  Serial ports use `speed` and `framing`.
    pub async fn open(
        source: &Source,
        config: &DeviceConfig,
        speed: u32,
        framing: Framing,
    ) -> Result<Connection, DeviceError> {
        let path = config.path.as_str();

        match source {
            Source::Serial(_) => {
                let serial = config
                    .serial_port_builder(speed, framing)?
                    .open_native_async()
                    .map_err(|source| DeviceError::Serial {
                        path: path.to_string(),
                        source,
                    })?;

                info!("opened {} at {} {}", path, speed, framing);

                Ok(Connection::Serial(Framed::new(serial, Codec::new())))
            }
            Source::Pps(_) => Ok(Connection::Pps),
            Source::Tcp { host, port } => {
                let stream = connect(path, host, *port).await?;

                Ok(Connection::stream(stream))
            }
            Source::Udp { host, port } => {
                let socket = UdpSocket::bind((host.as_str(), *port))
                    .await
                    .map_err(|source| DeviceError::Io {
                        path: path.to_string(),
                        source,
                    })?;

                info!("receiving datagrams for {} on {}:{}", path, host, port);

                Ok(Connection::Datagram {
                    socket,
                    lexer: Lexer::new(),
                    buffer: vec![0; DATAGRAM_MAX],
                })
            }
            Source::Gpsd { host, port, device } => {
                let mut stream = connect(path, host, *port).await?;

                stream
                    .write_all(&watch_request(device.as_deref()))
                    .await
                    .map_err(|source| DeviceError::Io {
                        path: path.to_string(),
                        source,
                    })?;

                Ok(Connection::stream(stream))
            }
            Source::Ntrip(mountpoint) => {
                let mut stream = connect(path, &mountpoint.host, mountpoint.port).await?;

                let leftover = ntrip::handshake(&mut stream, mountpoint).await?;

                let stream: Box<dyn AsyncStream> = Box::new(stream);
                let mut framed = Framed::new(stream, Codec::new());
                framed.read_buffer_mut().extend_from_slice(&leftover);

                Ok(Connection::Stream(framed))
            }
            Source::Dgpsip { host, port } => {
                let mut stream = connect(path, host, *port).await?;

                stream
                    .write_all(dgpsip_greeting(&hostname()).as_bytes())
                    .await
                    .map_err(|source| DeviceError::Io {
                        path: path.to_string(),
                        source,
                    })?;

                Ok(Connection::stream(stream))
            }
            Source::Shm(unit) => {
                let segment = NtpSegment::open(*unit)?;

                Ok(Connection::Shm {
                    segment,
                    path: path.to_string(),
                    last_count: 0,
                    poll: tokio::time::interval(SHM_POLL),
                })
            }
        }
    }

    /// The next packet or time sample.  `None` at end of file.
    pub async fn next(&mut self) -> Option<io::Result<Input>> {
        match self {
            Connection::Serial(framed) => framed.next().await.map(|r| r.map(Input::Packet)),
            Connection::Stream(framed) => framed.next().await.map(|r| r.map(Input::Packet)),
            Connection::Datagram {
                socket,
                lexer,
                buffer,
            } => loop {
                if let Some(packet) = lexer.next_packet() {
                    return Some(Ok(Input::Packet(packet)));
                }

                match socket.recv_from(buffer).await {
                    Ok((length, peer)) => {
                        debug!("{} byte datagram from {}", length, peer);
                        lexer.feed(&buffer[..length]);
                    }
                    Err(e) => return Some(Err(e)),
                }
            },
            Connection::Shm {
                segment,
                path,
                last_count,
                poll,
            } => loop {
                poll.tick().await;

                if let Some(sample) = segment.read(*last_count) {
                    *last_count = sample.count;

                    return Some(Ok(Input::Time(sample.timestamp(path))));
                }
            },
            Connection::Pps => std::future::pending().await,
        }
    }

    /// Commands can be written.
    pub fn is_writable(&self) -> bool {
        matches!(self, Connection::Serial(_) | Connection::Stream(_))
    }

    pub async fn write(&mut self, data: Bytes) -> io::Result<()> {
        match self {
            Connection::Serial(framed) => framed.send(data).await,
            Connection::Stream(framed) => framed.send(data).await,
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "source can't be written to",
            )),
        }
    }

    /// Change a serial port's speed and framing, discarding anything buffered at the old
    /// settings.  Other connections ignore this.
    pub fn set_line(&mut self, path: &str, speed: u32, framing: Framing) -> Result<(), DeviceError> {
        let framed = match self {
            Connection::Serial(framed) => framed,
            _ => return Ok(()),
        };

        let serial_error = |source| DeviceError::Serial {
            path: path.to_string(),
            source,
        };

        let port = framed.get_mut();
        port.set_baud_rate(speed).map_err(serial_error)?;
        port.set_data_bits(framing.data_bits).map_err(serial_error)?;
        port.set_parity(framing.parity).map_err(serial_error)?;
        port.set_stop_bits(framing.stop_bits).map_err(serial_error)?;

        framed.read_buffer_mut().clear();
        framed.codec_mut().lexer_mut().clear();

        debug!("{} now {} {}", path, speed, framing);

        Ok(())
    }
}

async fn connect(path: &str, host: &str, port: u16) -> Result<TcpStream, DeviceError> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|source| DeviceError::Io {
            path: path.to_string(),
            source,
        })?;

    stream.set_nodelay(true).map_err(|source| DeviceError::Io {
        path: path.to_string(),
        source,
    })?;

    match stream.peer_addr() {
        Ok(peer) => info!("connected {} to {}", path, peer),
        Err(_) => info!("connected {} to {}", path, host),
    }

    Ok(stream)
}

/// Subscribe to a remote daemon's JSON, optionally one of its devices.
pub fn watch_request(device: Option<&str>) -> Vec<u8> {
    let mut watch = json!({ "enable": true, "json": true });

    if let Some(device) = device {
        watch["device"] = json!(device);
    }

    format!("?WATCH={};\r\n", watch).into_bytes()
}

/// Introduce ourselves to a DGPSIP server and ask for corrections.
pub fn dgpsip_greeting(hostname: &str) -> String {
    format!("HELO {} gpsmux {}\r\nR\r\n", hostname, env!("CARGO_PKG_VERSION"))
}

/// The approximate position a DGPSIP server uses to pick corrections.
pub fn dgpsip_position(lat: f64, lon: f64, alt: f64) -> String {
    format!("R {:.8} {:.8} {:.2}\r\n", lat, lon, alt)
}

fn hostname() -> String {
    let mut buffer = [0u8; 256];

    nix::unistd::gethostname(&mut buffer)
        .ok()
        .and_then(|name| name.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}
