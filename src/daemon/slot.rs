use crate::configuration::DeviceConfig;
use crate::devices::uri;
use crate::devices::DeviceCommand;
use crate::devices::DeviceHandle;
use crate::gpsd::DeviceInfo;
use crate::gpsd::Gst;
use crate::gpsd::Sky;
use crate::gpsd::Tpv;

use std::time::Duration;
use std::time::Instant;

/// One entry in the device table.
///
/// A slot outlives the device task it starts: it is allocated when a device is configured or
/// added and keeps the latest `DEVICE` object and poll data while the device is closed.
#[derive(Debug)]
pub struct Slot {
    pub config: DeviceConfig,
    pub info: DeviceInfo,
    pub handle: Option<DeviceHandle>,
    pub generation: u64,
    pub rtcm_writer: bool,
    /// Opened at startup with `-n`, never released.
    pub pinned: bool,
    pps_only: bool,
    dgpsip: bool,
    unwatched_since: Option<Instant>,

    pub tpv: Option<Tpv>,
    pub sky: Option<Sky>,
    pub gst: Option<Gst>,
}

impl Slot {
    pub fn new(config: DeviceConfig, pinned: bool) -> Self {
        let source = uri::parse(&config.path).ok();

        Slot {
            info: DeviceInfo::new(&config.path),
            handle: None,
            generation: 0,
            rtcm_writer: false,
            pinned,
            pps_only: source.as_ref().map_or(false, |source| source.is_pps()),
            dgpsip: source.as_ref().map_or(false, |source| source.is_dgpsip()),
            unwatched_since: None,
            tpv: None,
            sky: None,
            gst: None,
            config,
        }
    }

    pub fn path(&self) -> &str {
        &self.config.path
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Reported data since it was opened, counts as active in `POLL`.
    pub fn is_observed(&self) -> bool {
        self.tpv.is_some() || self.sky.is_some() || self.gst.is_some()
    }

    /// A bare PPS device, labels its edges with a sibling's time.
    pub fn is_pps_only(&self) -> bool {
        self.pps_only
    }

    pub fn is_dgpsip(&self) -> bool {
        self.dgpsip
    }

    /// Queue `command` for an open device.
    pub fn command(&self, command: DeviceCommand) -> bool {
        match &self.handle {
            Some(handle) => handle.command(command),
            None => false,
        }
    }

    /// Stop the device task.  Its deactivation arrives as an event.
    pub fn close(&mut self) {
        self.handle = None;
        self.rtcm_writer = false;
        self.unwatched_since = None;
        self.tpv = None;
        self.sky = None;
        self.gst = None;
    }

    /// Track how long nobody has watched the device, true once that exceeds `release`.
    pub fn expired(&mut self, watched: bool, release: Duration) -> bool {
        if watched || self.pinned || !self.is_open() {
            self.unwatched_since = None;
            return false;
        }

        let since = *self.unwatched_since.get_or_insert_with(Instant::now);

        since.elapsed() > release
    }
}
