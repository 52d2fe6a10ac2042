use crate::configuration::ConfigurationError;
use crate::shm::ShmError;

use nix::errno::Errno;

use std::io;

use thiserror::Error;

/// A device path that isn't a usable source.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum UriError {
    #[error("unknown scheme in {0}")]
    UnknownScheme(String),
    #[error("{0} needs a port")]
    MissingPort(String),
    #[error("invalid port in {0}")]
    InvalidPort(String),
    #[error("{0} names no NTRIP mountpoint")]
    MissingMountpoint(String),
    #[error("malformed device URI {0}")]
    Malformed(String),
    #[error("device path {0} is longer than {1} bytes")]
    TooLong(String, usize),
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("unable to open {path}: {source}")]
    Open { path: String, source: io::Error },
    #[error("PPS ioctl on {path} failed: {source}")]
    PpsIoctl { path: String, source: Errno },
    #[error("{0} can't wait for assert edges")]
    PpsCapability(String),
    #[error("unable to open serial port {path}: {source}")]
    Serial {
        path: String,
        source: tokio_serial::Error,
    },
    #[error("NTRIP caster {caster} refused {mountpoint}: {status}")]
    Ntrip {
        caster: String,
        mountpoint: String,
        status: String,
    },
    #[error("{0} is read-only")]
    ReadOnly(String),
    #[error("I/O error on {path}: {source}")]
    Io { path: String, source: io::Error },
    #[error("unable to resolve {0}")]
    Resolve(String),
    #[error(transparent)]
    Uri(#[from] UriError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Shm(#[from] ShmError),
}
