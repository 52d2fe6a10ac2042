pub mod ioctl;

use crate::devices::DeviceError;

use libc::c_int;

use nix::errno::Errno;

use std::fs::File;
use std::fs::OpenOptions;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;

use tokio::sync::watch;

use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;

/// Precision reported for kernel PPS edges when it hasn't been measured, about a microsecond.
pub const DEFAULT_PRECISION: i32 = -20;

/// Seconds a fetch waits for an edge before checking whether anyone still listens.
const FETCH_TIMEOUT: i64 = 3;

/// A kernel PPS source capturing assert edges.
#[derive(Clone, Debug)]
pub struct Pps {
    pub path: String,
    file: Arc<File>,
}

impl Pps {
    pub fn open(path: &str) -> Result<Self, DeviceError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| DeviceError::Open {
                path: path.to_string(),
                source,
            })?;

        let fd = file.as_raw_fd();
        debug!("opened PPS {} as fd ({})", path, fd);

        configure(fd, path)?;

        info!("PPS {} capturing assert edges", path);

        Ok(Pps {
            path: path.to_string(),
            file: Arc::new(file),
        })
    }

    /// Start fetching edges on a blocking thread.
    ///
    /// The thread stops once every receiver has been dropped.
    pub fn edges(&self) -> watch::Receiver<Option<ioctl::data>> {
        let (sender, receiver) = watch::channel(None);
        let pps = self.clone();

        tokio::task::spawn_blocking(move || {
            run(&pps, sender);
            trace!("PPS {} shutdown, no more watchers", pps.path);
        });

        receiver
    }
}

fn configure(fd: c_int, path: &str) -> Result<(), DeviceError> {
    let ioctl_error = |source| DeviceError::PpsIoctl {
        path: path.to_string(),
        source,
    };

    let mut mode = 0;

    unsafe { ioctl::getcap(fd, &mut mode) }.map_err(ioctl_error)?;
    trace!("PPS {} mode: {:#x}", path, mode);

    if mode & ioctl::CANWAIT == 0 || mode & ioctl::CAPTUREASSERT == 0 {
        return Err(DeviceError::PpsCapability(path.to_string()));
    }

    let mut params = ioctl::params::default();

    unsafe { ioctl::getparams(fd, &mut params) }.map_err(ioctl_error)?;
    trace!("PPS {} params: {:?}", path, params);

    params.mode |= ioctl::CAPTUREASSERT;

    unsafe { ioctl::setparams(fd, &mut params) }.map_err(ioctl_error)?;

    Ok(())
}

fn run(pps: &Pps, sender: watch::Sender<Option<ioctl::data>>) {
    let fd = pps.file.as_raw_fd();
    let mut last_sequence = None;

    while !sender.is_closed() {
        let mut data = ioctl::data::default();
        data.timeout.sec = FETCH_TIMEOUT;

        match unsafe { ioctl::fetch(fd, &mut data) } {
            Ok(_) => (),
            Err(Errno::ETIMEDOUT) | Err(Errno::EINTR) => continue,
            Err(e) => {
                error!("unable to fetch PPS event from {}: {}", pps.path, e);
                return;
            }
        }

        if last_sequence == Some(data.info.assert_sequence) {
            continue;
        }

        last_sequence = Some(data.info.assert_sequence);

        trace!(
            "PPS {} assert {} at {}.{:09}",
            pps.path,
            data.info.assert_sequence,
            data.info.assert_tu.sec,
            data.info.assert_tu.nsec
        );

        if sender.send(Some(data)).is_err() {
            return;
        }
    }
}
