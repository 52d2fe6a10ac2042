use super::connection::dgpsip_position;
use super::connection::Connection;
use super::connection::Input;
use super::hunt::Hunt;
use super::hunt::HUNT_INTERVAL;
use super::report::CasterFix;
use super::report::Report;
use super::report::Reporter;
use super::uri;
use super::uri::Source;
use super::DeviceError;

use crate::configuration::DeviceConfig;
use crate::configuration::Framing;
use crate::configuration::TimeoutConfig;
use crate::configuration::DEFAULT_SPEED;
use crate::control::unhex;
use crate::gps::ChangedMask;
use crate::gps::Context;
use crate::gps::Driver;
use crate::gps::Session;
use crate::gpsd::json::encode;
use crate::gpsd::obfuscate_uri;
use crate::gpsd::Activated;
use crate::gpsd::DeviceInfo;
use crate::gpsd::DeviceRequest;
use crate::gpsd::Pps as PpsReport;
use crate::gpsd::Publication;
use crate::gpsd::Toff;
use crate::packet::Packet;
use crate::pps::ioctl;
use crate::pps::Pps;
use crate::pps::DEFAULT_PRECISION;
use crate::precision::Precision;
use crate::shm::NtpSegment;
use crate::timestamp;
use crate::timestamp::Timestamp;

use backoff::ExponentialBackoff;
use backoff::SystemClock;

use bytes::Bytes;

use chrono::DateTime;
use chrono::Utc;

use std::io;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;

use tokio_util::sync::CancellationToken;

use tracing::debug;
use tracing::info;
use tracing::warn;
use tracing::Instrument;

/// Commands queued for one device.
pub const COMMAND_QUEUE: usize = 32;

/// Pause between writing a speed change command and switching the port.
const SPEED_SETTLE: Duration = Duration::from_millis(50);

/// Everything a device task needs to know about its device.
#[derive(Clone, Debug)]
pub struct DeviceSettings {
    pub config: DeviceConfig,
    pub context: Context,
    pub timeouts: TimeoutConfig,
    /// Position in the device table, picks the default NTP units.
    pub slot: usize,
    /// Tells this opening of the device from earlier ones at the same path.
    pub generation: u64,
}

/// Requests from the daemon to a running device.
#[derive(Debug)]
pub enum DeviceCommand {
    /// Write bytes to the receiver, `reply` says whether they were.
    Write {
        data: Bytes,
        reply: Option<oneshot::Sender<bool>>,
    },
    /// Apply a `?DEVICE=` request.  The reply is the new `DEVICE` object or an error message.
    Configure {
        request: DeviceRequest,
        reply: oneshot::Sender<Result<DeviceInfo, String>>,
    },
    /// The system clock jumped, restart the silence timers.
    TimeWarp,
    /// In-band time from a sibling receiver, for labelling PPS edges.
    FixIn(Timestamp),
    /// A position for a DGPSIP server.
    CasterFix(CasterFix),
}

/// What a device tells the daemon.
#[derive(Debug)]
pub enum DeviceEvent {
    /// The device opened, its driver changed, or a client reconfigured it.
    Info {
        path: String,
        info: DeviceInfo,
        rtcm_writer: bool,
    },
    /// The device closed, it will be reopened.
    Deactivated { path: String, generation: u64 },
    /// The device task ended, the device will not be reopened.
    Stopped { path: String, generation: u64 },
    Report(Box<Report>),
}

/// The daemon's end of a device task.  Dropping it stops the task.
#[derive(Debug)]
pub struct DeviceHandle {
    pub path: String,
    pub commands: mpsc::Sender<DeviceCommand>,
    cancel: CancellationToken,
}

impl DeviceHandle {
    /// Queue `command`, false when the device task is gone or busy.
    pub fn command(&self, command: DeviceCommand) -> bool {
        self.commands.try_send(command).is_ok()
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Open the device described by `settings` and keep it open until the handle is dropped.
pub fn spawn(settings: DeviceSettings, events: mpsc::Sender<DeviceEvent>) -> DeviceHandle {
    let path = settings.config.path.clone();
    let (commands, receiver) = mpsc::channel(COMMAND_QUEUE);
    let cancel = CancellationToken::new();

    let span = tracing::info_span!("device", path = %obfuscate_uri(&path));
    let device = Device::new(settings, events);

    tokio::spawn(device.run(receiver, cancel.clone()).instrument(span));

    DeviceHandle {
        path,
        commands,
        cancel,
    }
}

/// Why a connection ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Closed {
    Cancelled,
    Eof,
    Error,
}

/// A kernel PPS source with its measured precision.
struct PpsSource {
    path: String,
    edges: watch::Receiver<Option<ioctl::data>>,
    precision: watch::Receiver<i32>,
}

/// The NTP refclock units a device feeds.
#[derive(Default)]
struct NtpUnits {
    time: Option<NtpSegment>,
    pps: Option<NtpSegment>,
}

/// A device task's state.
pub struct Device {
    path: String,
    settings: DeviceSettings,
    session: Session,
    reporter: Reporter,
    events: mpsc::Sender<DeviceEvent>,
    hunt: Hunt,
    speed: u32,
    framing: Framing,
    cycle: f64,
    native: bool,
    activated: Option<DateTime<Utc>>,
    last_packet: Instant,
    ntp: NtpUnits,
    ntp_attached: bool,
    /// Latest in-band time, labels PPS edges.
    last_in_band: Option<Timestamp>,
    caster_reported: bool,
    writable: bool,
    is_pps: bool,
}

impl Device {
    pub fn new(settings: DeviceSettings, events: mpsc::Sender<DeviceEvent>) -> Self {
        let path = settings.config.path.clone();
        let context = settings.context.clone();

        let pinned_speed = settings.config.speed.or(context.fixed_port_speed);
        let pinned_framing = settings
            .config
            .framing()
            .ok()
            .flatten()
            .or_else(|| context.fixed_port_framing.as_deref().and_then(|f| f.parse().ok()));

        let hunt = Hunt::new(DEFAULT_SPEED, pinned_speed, pinned_framing);
        let session = Session::new(&path, context);

        Device {
            path,
            settings,
            session,
            reporter: Reporter::default(),
            events,
            speed: hunt.speed(),
            framing: hunt.framing(),
            hunt,
            cycle: 1.0,
            native: false,
            activated: None,
            last_packet: Instant::now(),
            ntp: NtpUnits::default(),
            ntp_attached: false,
            last_in_band: None,
            caster_reported: false,
            writable: false,
            is_pps: false,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<DeviceCommand>, cancel: CancellationToken) {
        let source = match uri::parse(&self.path) {
            Ok(source) => source,
            Err(e) => {
                warn!("{}", e);
                self.send(self.stopped()).await;
                return;
            }
        };

        self.is_pps = source.is_pps();

        loop {
            let connection = tokio::select! {
                _ = cancel.cancelled() => break,
                connection = self.open(&source) => connection,
            };

            let connection = match connection {
                Ok(connection) => connection,
                Err(e) => {
                    warn!("giving up on {}: {}", obfuscate_uri(&self.path), e);
                    break;
                }
            };

            let closed = self.stream(connection, &source, &mut commands, &cancel).await;

            self.deactivate().await;

            if closed == Closed::Cancelled {
                break;
            }

            let pause = if source.is_network() {
                self.settings.timeouts.reconnect_interval()
            } else {
                self.settings.timeouts.reawake_interval()
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => (),
            }
        }

        debug!("stopped");

        self.send(self.stopped()).await;
    }

    fn backoff(&self) -> ExponentialBackoff {
        let initial = self
            .settings
            .timeouts
            .reconnect_interval()
            .max(Duration::from_millis(50));

        ExponentialBackoff {
            current_interval: initial,
            initial_interval: initial,
            randomization_factor: 0.25,
            multiplier: 1.5,
            max_interval: Duration::from_secs(60),
            max_elapsed_time: None,
            clock: SystemClock::default(),
            start_time: Instant::now(),
        }
    }

    /// Open `source`, retrying until it works.  Only a device that can never be opened as
    /// configured is an error.
    async fn open(&self, source: &Source) -> Result<Connection, DeviceError> {
        let config = &self.settings.config;
        let speed = self.speed;
        let framing = self.framing;

        backoff::future::retry(self.backoff(), || async move {
            Connection::open(source, config, speed, framing)
                .await
                .map_err(|e| match e {
                    DeviceError::Configuration(_) | DeviceError::Uri(_) => {
                        backoff::Error::permanent(e)
                    }
                    e => {
                        info!("unable to open: {}", e);
                        backoff::Error::transient(e)
                    }
                })
        })
        .await
    }

    /// Read from `connection` until it closes or the device is cancelled.
    pub async fn stream(
        &mut self,
        mut connection: Connection,
        source: &Source,
        commands: &mut mpsc::Receiver<DeviceCommand>,
        cancel: &CancellationToken,
    ) -> Closed {
        self.activate(connection.is_writable(), source).await;

        let mut pps = self.open_pps(source);

        loop {
            let hunting = matches!(connection, Connection::Serial(_))
                && self.session.driver == Driver::Unknown
                && self.hunt.is_hunting();
            let hunt_deadline = tokio::time::Instant::from_std(self.last_packet + HUNT_INTERVAL);

            tokio::select! {
                _ = cancel.cancelled() => return Closed::Cancelled,
                command = commands.recv() => {
                    let command = match command {
                        Some(command) => command,
                        None => return Closed::Cancelled,
                    };

                    if let Err(e) = self.command(command, &mut connection).await {
                        info!("write failed: {}", e);
                        return Closed::Error;
                    }
                }
                input = connection.next() => match input {
                    Some(Ok(Input::Packet(packet))) => {
                        if let Err(e) = self.packet(packet, &mut connection).await {
                            info!("write failed: {}", e);
                            return Closed::Error;
                        }
                    }
                    Some(Ok(Input::Time(time))) => self.time(time).await,
                    Some(Err(e)) => {
                        info!("read failed: {}", e);
                        return Closed::Error;
                    }
                    None => {
                        info!("end of file");
                        return Closed::Eof;
                    }
                },
                (edge, precision) = next_edge(&mut pps) => self.pps_edge(&edge, precision).await,
                _ = tokio::time::sleep_until(hunt_deadline), if hunting => {
                    if !self.hunt_next(&mut connection) {
                        warn!("no packets recognized at any speed");
                        return Closed::Error;
                    }
                }
            }
        }
    }

    async fn activate(&mut self, writable: bool, source: &Source) {
        let now = Utc::now();

        self.activated = Some(now);
        self.last_packet = Instant::now();
        self.writable = writable && source.is_writable() && !self.session.context.readonly;

        self.attach_ntp(source);

        let online = now.timestamp() as f64 + now.timestamp_subsec_nanos() as f64 / 1e9;
        self.reporter = Reporter::new(self.ntp.time.as_ref().map(|unit| unit.unit), online);

        info!("activated");

        self.send_info().await;
    }

    async fn deactivate(&mut self) {
        self.session.reset();
        self.activated = None;
        self.hunt.reset();
        self.speed = self.hunt.speed();
        self.framing = self.hunt.framing();
        self.caster_reported = false;
        self.writable = false;

        info!("deactivated");

        self.send(self.deactivated()).await;
    }

    /// In-band time goes to unit 2n, PPS to 2n+1, unless the device names its own first unit.
    fn attach_ntp(&mut self, source: &Source) {
        if self.ntp_attached || matches!(source, Source::Shm(_)) {
            return;
        }

        self.ntp_attached = true;

        let base = self
            .settings
            .config
            .ntp_unit
            .unwrap_or(2 * self.settings.slot as i32);

        let attach = |unit: i32| match NtpSegment::attach(unit) {
            Ok(segment) => {
                info!("NTP unit {} attached", unit);
                Some(segment)
            }
            Err(e) => {
                warn!("NTP unit {} unavailable: {}", unit, e);
                None
            }
        };

        if !source.is_pps() {
            self.ntp.time = attach(base);
        }

        if source.is_pps() || self.settings.config.pps.is_some() {
            self.ntp.pps = attach(base + 1);
        }
    }

    fn open_pps(&self, source: &Source) -> Option<PpsSource> {
        let path = match source {
            Source::Pps(path) => path.clone(),
            _ => self.settings.config.pps.clone()?,
        };

        match Pps::open(&path) {
            Ok(pps) => Some(PpsSource {
                path,
                edges: pps.edges(),
                precision: Precision::new().watch(&pps),
            }),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    /// The device as a `DEVICE` object.
    pub fn info(&self) -> DeviceInfo {
        let mut info = DeviceInfo::new(&self.path);

        info.activated = Some(match self.activated {
            Some(time) => Activated::At(time),
            None => Activated::Off,
        });

        if self.activated.is_none() {
            return info;
        }

        if self.is_pps {
            info.driver = Some("PPS".to_string());
            return info;
        }

        let driver = self.session.driver;

        if driver != Driver::Unknown {
            info.driver = Some(driver.type_name().to_string());
            info.native = Some(self.native as u8);
            info.cycle = Some(self.cycle);
            info.mincycle = Some(driver.min_cycle());
        }

        info.subtype = Some(self.session.subtype.clone()).filter(|s| !s.is_empty());
        info.subtype1 = Some(self.session.subtype1.clone()).filter(|s| !s.is_empty());
        info.readonly = Some(true).filter(|_| self.session.context.readonly);

        if uri::parse(&self.path).map_or(false, |source| source.is_serial()) {
            info.bps = Some(self.speed);
            info.parity = Some(self.framing.parity_char());
            info.stopbits = Some(self.framing.stop_bits_count());
        }

        info
    }

    async fn send_info(&mut self) {
        let info = self.info();
        let rtcm_writer = self.writable && self.session.driver.rtcm_writer();

        self.send(DeviceEvent::Info {
            path: self.path.clone(),
            info,
            rtcm_writer,
        })
        .await;
    }

    fn deactivated(&self) -> DeviceEvent {
        DeviceEvent::Deactivated {
            path: self.path.clone(),
            generation: self.settings.generation,
        }
    }

    fn stopped(&self) -> DeviceEvent {
        DeviceEvent::Stopped {
            path: self.path.clone(),
            generation: self.settings.generation,
        }
    }

    async fn send(&self, event: DeviceEvent) {
        if self.events.send(event).await.is_err() {
            debug!("daemon is gone, event dropped");
        }
    }

    async fn write(&mut self, connection: &mut Connection, data: Bytes) -> io::Result<bool> {
        if !self.writable {
            debug!("read-only, {} bytes not written", data.len());
            return Ok(false);
        }

        connection.write(data).await?;

        Ok(true)
    }

    /// Decode `packet` and report what changed.
    pub async fn packet(&mut self, packet: Packet, connection: &mut Connection) -> io::Result<()> {
        let clock = timestamp::now();

        self.last_packet = Instant::now();

        let changed = self.session.handle(&packet);

        for command in self.session.take_outbound() {
            self.write(connection, command).await?;
        }

        let mut report = self.reporter.report(&mut self.session, packet, changed, clock);

        if changed.contains(ChangedMask::DRIVER) {
            report.publication.notice = Some(encode(&self.info()));
            self.send_info().await;
        }

        if let Some(in_band) = &report.in_band {
            if let Some(unit) = &self.ntp.time {
                unit.write(in_band);
            }

            self.last_in_band = Some(in_band.clone());
        }

        self.send(DeviceEvent::Report(Box::new(report))).await;

        Ok(())
    }

    /// A sample from a refclock segment source is this device's in-band time.
    async fn time(&mut self, time: Timestamp) {
        debug!("time sample offset {:.9}", time.offset());

        let mut report = Report {
            publication: Publication::new(&self.path),
            ..Report::default()
        };

        report.publication.toff = Some(encode(&Toff::new(&time, None)));
        report.in_band = Some(time.clone());

        self.last_in_band = Some(time);

        self.send(DeviceEvent::Report(Box::new(report))).await;
    }

    async fn pps_edge(&mut self, edge: &ioctl::data, precision: i32) {
        let pps = match Timestamp::from_pps_edge(&self.path, precision, edge, self.last_in_band.as_ref()) {
            Some(pps) => pps,
            None => {
                debug!("PPS edge without recent in-band time");
                return;
            }
        };

        if let Some(unit) = &self.ntp.pps {
            unit.write(&pps);
        }

        let mut report = Report {
            publication: Publication::new(&self.path),
            ..Report::default()
        };

        let unit = self.ntp.pps.as_ref().map(|unit| unit.unit);
        report.publication.pps = Some(encode(&PpsReport::new(&pps, unit)));

        self.send(DeviceEvent::Report(Box::new(report))).await;
    }

    /// Try the next speed, false when the hunt is over.
    fn hunt_next(&mut self, connection: &mut Connection) -> bool {
        let (speed, framing) = match self.hunt.next() {
            Some(next) => next,
            None => return false,
        };

        debug!("hunting, trying {} {}", speed, framing);

        self.last_packet = Instant::now();

        match connection.set_line(&self.path, speed, framing) {
            Ok(()) => {
                self.speed = speed;
                self.framing = framing;
                true
            }
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    pub async fn command(&mut self, command: DeviceCommand, connection: &mut Connection) -> io::Result<()> {
        match command {
            DeviceCommand::Write { data, reply } => {
                let written = self.write(connection, data).await?;

                if let Some(reply) = reply {
                    let _ = reply.send(written);
                }
            }
            DeviceCommand::Configure { request, reply } => {
                let result = self.configure(request, connection).await?;

                if result.is_ok() {
                    self.send_info().await;
                }

                let _ = reply.send(result);
            }
            DeviceCommand::TimeWarp => {
                debug!("time warp, silence timers restarted");
                self.last_packet = Instant::now();
            }
            DeviceCommand::FixIn(time) => self.last_in_band = Some(time),
            DeviceCommand::CasterFix(fix) => {
                if self.caster_reported || !uri::parse(&self.path).map_or(false, |s| s.is_dgpsip()) {
                    return Ok(());
                }

                self.caster_reported = true;

                let position = dgpsip_position(fix.lat, fix.lon, fix.alt);
                self.write(connection, Bytes::from(position)).await?;
            }
        }

        Ok(())
    }

    /// Apply a `?DEVICE=` request.  The outer error closes the device, the inner one is
    /// reported to the client.
    async fn configure(
        &mut self,
        request: DeviceRequest,
        connection: &mut Connection,
    ) -> io::Result<Result<DeviceInfo, String>> {
        let driver = self.session.driver;

        if driver == Driver::Unknown && !self.is_pps {
            return Ok(Err(format!("Type of {} is unknown.", obfuscate_uri(&self.path))));
        }

        if let Some(native) = request.native {
            let native = native != 0;

            if native != self.native {
                if let Some(command) = driver.mode_command(native, self.speed) {
                    if self.write(connection, command).await? {
                        self.native = native;
                    }
                }
            }
        }

        if request.changes_serial() {
            let speed = request.bps.unwrap_or(self.speed);
            let parity = request
                .parity
                .as_deref()
                .and_then(|parity| parity.chars().next())
                .unwrap_or_else(|| self.framing.parity_char());
            let stop_bits = request.stopbits.unwrap_or_else(|| self.framing.stop_bits_count());

            let framing = match Framing::new(parity, stop_bits) {
                Ok(framing) => framing,
                Err(e) => return Ok(Err(e.to_string())),
            };

            if let Some(command) = driver.speed_command(speed, parity, stop_bits) {
                self.write(connection, command).await?;
                tokio::time::sleep(SPEED_SETTLE).await;
            }

            if let Err(e) = connection.set_line(&self.path, speed, framing) {
                return Ok(Err(e.to_string()));
            }

            self.speed = speed;
            self.framing = framing;
            self.hunt.restart(speed, framing);
        }

        if let Some(cycle) = request.cycle.filter(|cycle| *cycle > 0.0) {
            if (cycle - self.cycle).abs() > f64::EPSILON && cycle >= driver.min_cycle() {
                if let Some(command) = driver.rate_command(cycle) {
                    if self.write(connection, command).await? {
                        self.cycle = cycle;
                    }
                }
            }
        }

        if let Some(hexdata) = request.hexdata.as_deref().filter(|hex| !hex.is_empty()) {
            let data = match unhex(hexdata) {
                Some(data) => data,
                None => return Ok(Err("invalid hexdata".to_string())),
            };

            if !self.write(connection, data).await? {
                return Ok(Err(format!("Device {} is read-only.", obfuscate_uri(&self.path))));
            }
        }

        Ok(Ok(self.info()))
    }
}

/// The next PPS edge and the source's precision, never when there is no PPS source.
async fn next_edge(pps: &mut Option<PpsSource>) -> (ioctl::data, i32) {
    let source = match pps {
        Some(source) => source,
        None => return std::future::pending().await,
    };

    loop {
        if source.edges.changed().await.is_err() {
            warn!("PPS {} stopped", source.path);
            return std::future::pending().await;
        }

        let edge = *source.edges.borrow();

        if let Some(edge) = edge {
            let precision = match *source.precision.borrow() {
                0 => DEFAULT_PRECISION,
                precision => precision,
            };

            return (edge, precision);
        }
    }
}
