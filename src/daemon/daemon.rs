use super::slot::Slot;

use crate::configuration::Configuration;
use crate::configuration::ConfigurationError;
use crate::configuration::GPS_PATH_MAX;
use crate::control;
use crate::control::ControlCommand;
use crate::control::ControlReply;
use crate::control::ControlRequest;
use crate::control::ControlSocket;
use crate::devices;
use crate::devices::uri;
use crate::devices::DeviceCommand;
use crate::devices::DeviceEvent;
use crate::devices::DeviceSettings;
use crate::devices::Report;
use crate::gpsd::json::encode;
use crate::gpsd::obfuscate_uri;
use crate::gpsd::spawn_client;
use crate::gpsd::ClientEvent;
use crate::gpsd::Command;
use crate::gpsd::DeviceInfo;
use crate::gpsd::DeviceRequest;
use crate::gpsd::Devices;
use crate::gpsd::ErrorMessage;
use crate::gpsd::Listeners;
use crate::gpsd::Poll;
use crate::gpsd::Publication;
use crate::gpsd::Subscriber;
use crate::gpsd::Version;
use crate::gpsd::Watch;
use crate::shm::ShmExport;

use bytes::Bytes;

use chrono::DateTime;
use chrono::Utc;

use serde_json::Value;

use std::collections::BTreeMap;
use std::io;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::net::UnixStream;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio::time::MissedTickBehavior;

use tracing::debug;
use tracing::info;
use tracing::warn;

/// Event loop slice, also the time warp reference.
pub const TICK: Duration = Duration::from_secs(2);

/// How far a tick may overrun its slice before the clock counts as having jumped.
const WARP_TOLERANCE: Duration = Duration::from_secs(1);

/// Longest wait for a device to answer a `?DEVICE=` change or a control write.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

const EVENT_QUEUE: usize = 256;
const CONTROL_QUEUE: usize = 16;

/// The wall clock moved backwards, or further than one slice plus the tolerance.
pub fn is_time_warp(before: DateTime<Utc>, after: DateTime<Utc>, slice: Duration) -> bool {
    let elapsed = after - before;

    match elapsed.to_std() {
        Ok(elapsed) => elapsed >= slice + WARP_TOLERANCE,
        Err(_) => true,
    }
}

/// How the event loop ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Exit {
    /// No devices and no clients remain after some were seen.
    Idle,
    Signal(&'static str),
}

/// The device table, the subscribers and everything that moves data between them.
pub struct Daemon {
    configuration: Configuration,
    slots: Vec<Option<Slot>>,
    subscribers: BTreeMap<u64, Subscriber>,
    next_client: u64,
    next_generation: u64,
    shm: Option<ShmExport>,
    /// A device has activated since startup, arms the idle shutdown.
    devices_seen: bool,
    last_tick: DateTime<Utc>,

    client_tx: mpsc::Sender<ClientEvent>,
    client_rx: mpsc::Receiver<ClientEvent>,
    device_tx: mpsc::Sender<DeviceEvent>,
    device_rx: mpsc::Receiver<DeviceEvent>,
    control_tx: mpsc::Sender<ControlRequest>,
    control_rx: mpsc::Receiver<ControlRequest>,
}

impl Daemon {
    pub fn new(configuration: Configuration, shm: Option<ShmExport>) -> Self {
        let (client_tx, client_rx) = mpsc::channel(EVENT_QUEUE);
        let (device_tx, device_rx) = mpsc::channel(EVENT_QUEUE);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE);

        let slots = (0..configuration.max_devices).map(|_| None).collect();

        Daemon {
            configuration,
            slots,
            subscribers: BTreeMap::new(),
            next_client: 0,
            next_generation: 0,
            shm,
            devices_seen: false,
            last_tick: Utc::now(),
            client_tx,
            client_rx,
            device_tx,
            device_rx,
            control_tx,
            control_rx,
        }
    }

    /// Allocate the configured devices, opening them now with `-n`.
    pub fn start(&mut self) -> Result<(), ConfigurationError> {
        let nowait = self.configuration.nowait;

        for config in self.configuration.devices.clone() {
            let index = self.allocate(&config.path, nowait)?;

            if nowait {
                self.awaken(index);
            }
        }

        Ok(())
    }

    /// Requests for the control socket.
    pub fn control_requests(&self) -> mpsc::Sender<ControlRequest> {
        self.control_tx.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Paths of the allocated devices, in slot order.
    pub fn device_paths(&self) -> Vec<String> {
        self.slots
            .iter()
            .flatten()
            .map(|slot| slot.path().to_string())
            .collect()
    }

    pub fn is_open(&self, path: &str) -> bool {
        self.find(path)
            .and_then(|index| self.slot(index))
            .map_or(false, Slot::is_open)
    }

    /// Serve until a terminating signal, or until idle shutdown.
    pub async fn run(
        &mut self,
        listeners: &Listeners,
        control: Option<&ControlSocket>,
    ) -> io::Result<Exit> {
        let mut hangup = signal(SignalKind::hangup())?;
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let mut quit = signal(SignalKind::quit())?;

        let mut tick = tokio::time::interval(TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.last_tick = Utc::now();

        let exit = loop {
            tokio::select! {
                accepted = listeners.accept() => match accepted {
                    Ok((stream, peer)) => self.attach(peer.to_string(), stream),
                    Err(e) => warn!("client accept failed: {}", e),
                },
                accepted = accept_control(control) => match accepted {
                    Ok(stream) => self.serve_control(stream),
                    Err(e) => warn!("control accept failed: {}", e),
                },
                Some(event) = self.client_rx.recv() => self.client_event(event),
                Some(event) = self.device_rx.recv() => self.device_event(event),
                Some(request) = self.control_rx.recv() => self.control_request(request),
                _ = hangup.recv() => {
                    info!("SIGHUP, restarting");

                    if let Err(e) = self.restart() {
                        warn!("restart failed: {}", e);
                    }
                }
                _ = interrupt.recv() => break Exit::Signal("SIGINT"),
                _ = terminate.recv() => break Exit::Signal("SIGTERM"),
                _ = quit.recv() => break Exit::Signal("SIGQUIT"),
                _ = tick.tick() => {
                    if !self.tick(Utc::now()) {
                        break Exit::Idle;
                    }
                }
            }
        };

        info!("exiting: {:?}", exit);

        self.terminate();

        Ok(exit)
    }

    /// Handle one pending client, device or control event.
    pub async fn handle_next(&mut self) {
        tokio::select! {
            Some(event) = self.client_rx.recv() => self.client_event(event),
            Some(event) = self.device_rx.recv() => self.device_event(event),
            Some(request) = self.control_rx.recv() => self.control_request(request),
            else => (),
        }
    }

    /// Take on a connected client and greet it with `VERSION`.
    pub fn attach<S>(&mut self, peer: String, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let max_clients = self.configuration.server.max_clients;

        if self.subscribers.len() >= max_clients {
            warn!("{} refused, all {} client slots in use", peer, max_clients);
            return;
        }

        self.next_client += 1;

        let noread = self.configuration.timeouts.noread_timeout();
        let handle = spawn_client(self.next_client, peer, stream, self.client_tx.clone(), noread);
        let mut subscriber = Subscriber::new(handle);

        info!("{} connected", subscriber.peer());

        if subscriber.send(encode(&Version::default()), noread) {
            self.subscribers.insert(subscriber.id(), subscriber);
        }
    }

    fn serve_control(&self, stream: UnixStream) {
        let requests = self.control_tx.clone();

        tokio::spawn(async move {
            if let Err(e) = control::serve(stream, requests).await {
                info!("control connection: {}", e);
            }
        });
    }

    /// Time warp detection, idle clients and unwatched devices.  False once the daemon should
    /// shut down.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        if is_time_warp(self.last_tick, now, TICK) {
            info!("time warp of {}, restarting device timers", now - self.last_tick);

            for slot in self.slots.iter().flatten() {
                slot.command(DeviceCommand::TimeWarp);
            }
        }

        self.last_tick = now;

        let command = self.configuration.timeouts.command_timeout();

        let idle: Vec<u64> = self
            .subscribers
            .values()
            .filter(|subscriber| subscriber.is_idle(command))
            .map(Subscriber::id)
            .collect();

        for id in idle {
            if let Some(subscriber) = self.subscribers.remove(&id) {
                info!("{} silent for {:?}, detaching", subscriber.peer(), command);
            }
        }

        self.release();

        !self.is_idle()
    }

    fn release(&mut self) {
        let release = self.configuration.timeouts.release_timeout();
        let subscribers = &self.subscribers;

        for slot in self.slots.iter_mut().flatten() {
            let watched = subscribers
                .values()
                .any(|subscriber| subscriber.policy.subscribed(slot.path()));

            if slot.expired(watched, release) {
                info!("{} unwatched, releasing", obfuscate_uri(slot.path()));
                slot.close();
            }
        }
    }

    /// Started without devices, every hot-plugged device is gone and so is every client.
    fn is_idle(&self) -> bool {
        self.configuration.devices.is_empty()
            && self.devices_seen
            && self.subscribers.is_empty()
            && self.slots.iter().all(Option::is_none)
    }

    /// Close every device and start over from the configuration, keeping the clients.
    pub fn restart(&mut self) -> Result<(), ConfigurationError> {
        self.close_all();

        let noread = self.configuration.timeouts.noread_timeout();
        let version = encode(&Version::default());

        self.subscribers
            .retain(|_, subscriber| subscriber.send(version.clone(), noread));

        self.start()?;

        let watched: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|slot| (index, slot)))
            .filter(|(_, slot)| {
                self.subscribers
                    .values()
                    .any(|subscriber| subscriber.policy.subscribed(slot.path()))
            })
            .map(|(index, _)| index)
            .collect();

        for index in watched {
            self.awaken(index);
        }

        Ok(())
    }

    fn terminate(&mut self) {
        self.close_all();
        self.subscribers.clear();
    }

    /// Free every slot, telling watchers of open devices.
    fn close_all(&mut self) {
        let slots = std::mem::replace(
            &mut self.slots,
            (0..self.configuration.max_devices).map(|_| None).collect(),
        );

        for slot in slots.into_iter().flatten() {
            if slot.is_open() {
                self.notify(slot.path(), &DeviceInfo::deactivated(slot.path()));
            }
        }
    }

    fn find(&self, path: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().map_or(false, |slot| slot.path() == path))
    }

    fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Give `path` a free slot.
    fn allocate(&mut self, path: &str, pinned: bool) -> Result<usize, ConfigurationError> {
        if path.len() > GPS_PATH_MAX {
            return Err(ConfigurationError::PathTooLong(path.to_string(), GPS_PATH_MAX));
        }

        if self.find(path).is_some() {
            return Err(ConfigurationError::DuplicateDevice(path.to_string()));
        }

        uri::parse(path)?;

        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(ConfigurationError::TooManyDevices(self.slots.len()))?;

        let config = self.configuration.device(path);

        self.slots[index] = Some(Slot::new(config, pinned));

        debug!("{} allocated slot {}", obfuscate_uri(path), index);

        Ok(index)
    }

    /// Open the device in slot `index` unless it already is.
    fn awaken(&mut self, index: usize) {
        let generation = self.next_generation + 1;
        let context = self.configuration.context();
        let timeouts = self.configuration.timeouts.clone();
        let events = self.device_tx.clone();

        let slot = match self.slots.get_mut(index).and_then(Option::as_mut) {
            Some(slot) if !slot.is_open() => slot,
            _ => return,
        };

        self.next_generation = generation;

        let settings = DeviceSettings {
            config: slot.config.clone(),
            context,
            timeouts,
            slot: index,
            generation,
        };

        info!("opening {}", obfuscate_uri(slot.path()));

        slot.generation = generation;
        slot.handle = Some(devices::spawn(settings, events));
    }

    /// Awaken every device `policy` watches.
    fn awaken_watched(&mut self, policy: &Watch) {
        for index in 0..self.slots.len() {
            let watched = self
                .slot(index)
                .map_or(false, |slot| policy.subscribed(slot.path()));

            if watched {
                self.awaken(index);
            }
        }
    }

    /// Send `info` to everyone watching `path`.
    fn notify(&mut self, path: &str, info: &DeviceInfo) {
        let line = encode(info);

        self.broadcast(|policy| {
            if policy.subscribed(path) {
                vec![line.clone()]
            } else {
                vec![]
            }
        });
    }

    fn publish(&mut self, publication: &Publication) {
        self.broadcast(|policy| publication.lines_for(policy));
    }

    /// Send each subscriber the lines `lines` picks for its policy, dropping the ones that can
    /// no longer be written to.
    fn broadcast<F>(&mut self, lines: F)
    where
        F: Fn(&Watch) -> Vec<Bytes>,
    {
        let noread = self.configuration.timeouts.noread_timeout();

        self.subscribers.retain(|_, subscriber| {
            for line in lines(&subscriber.policy) {
                if !subscriber.send(line, noread) {
                    info!("{} detached", subscriber.peer());
                    return false;
                }
            }

            true
        });
    }

    fn reply(&mut self, id: u64, lines: Vec<Bytes>) {
        let noread = self.configuration.timeouts.noread_timeout();

        let subscriber = match self.subscribers.get_mut(&id) {
            Some(subscriber) => subscriber,
            None => return,
        };

        for line in lines {
            if !subscriber.send(line, noread) {
                info!("{} detached", subscriber.peer());
                self.subscribers.remove(&id);
                return;
            }
        }
    }

    pub fn client_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Commands { id, commands } => {
                if let Some(subscriber) = self.subscribers.get_mut(&id) {
                    subscriber.last_command = std::time::Instant::now();
                }

                for command in commands {
                    let lines = self.command(id, command);
                    self.reply(id, lines);
                }
            }
            ClientEvent::Closed { id } => {
                if let Some(subscriber) = self.subscribers.remove(&id) {
                    info!("{} disconnected", subscriber.peer());
                }
            }
        }
    }

    fn command(&mut self, id: u64, command: Command) -> Vec<Bytes> {
        match command {
            Command::Version => vec![encode(&Version::default())],
            Command::Devices => vec![encode(&self.devices())],
            Command::Error(message) => vec![encode(&ErrorMessage::new(message))],
            Command::Poll => self.poll(id),
            Command::Watch(request) => self.watch(id, request),
            Command::Device(None) => self
                .slots
                .iter()
                .flatten()
                .map(|slot| encode(&slot.info))
                .collect(),
            Command::Device(Some(request)) => self.device(id, request),
        }
    }

    fn devices(&self) -> Devices {
        Devices {
            devices: self
                .slots
                .iter()
                .flatten()
                .map(|slot| slot.info.clone())
                .collect(),
        }
    }

    fn poll(&self, id: u64) -> Vec<Bytes> {
        let device = match self.subscribers.get(&id) {
            Some(subscriber) => subscriber.policy.device.clone(),
            None => return vec![],
        };

        let mut poll = Poll::new(&Utc::now());

        let polled = self
            .slots
            .iter()
            .flatten()
            .filter(|slot| device.as_deref().map_or(true, |device| device == slot.path()));

        for slot in polled {
            if slot.is_observed() {
                poll.active += 1;
            }

            poll.tpv.extend(slot.tpv.clone());
            poll.gst.extend(slot.gst.clone());
            poll.sky.extend(slot.sky.clone());
        }

        vec![encode(&poll)]
    }

    fn watch(&mut self, id: u64, request: Option<Value>) -> Vec<Bytes> {
        let mut policy = match self.subscribers.get(&id) {
            Some(subscriber) => subscriber.policy.clone(),
            None => return vec![],
        };

        if let Some(request) = request {
            if let Err(message) = policy.update(&request) {
                return vec![encode(&ErrorMessage::new(format!("Invalid WATCH: {}", message)))];
            }

            if let Some(device) = &policy.device {
                if self.find(device).is_none() {
                    return vec![encode(&ErrorMessage::no_such_device(device))];
                }
            }

            if policy.enable {
                self.awaken_watched(&policy);
            }

            if let Some(subscriber) = self.subscribers.get_mut(&id) {
                subscriber.policy = policy.clone();
            }
        }

        vec![encode(&self.devices()), encode(&policy)]
    }

    fn device(&mut self, id: u64, request: DeviceRequest) -> Vec<Bytes> {
        let error = |message: String| vec![encode(&ErrorMessage::new(message))];

        let index = match &request.path {
            Some(path) => match self.find(path) {
                Some(index) => index,
                None => return error(format!("Can't open {}.", path)),
            },
            None => {
                let allocated: Vec<usize> = self
                    .slots
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| slot.is_some())
                    .map(|(index, _)| index)
                    .collect();

                match allocated.as_slice() {
                    [] => {
                        return error(
                            "Can't perform DEVICE configuration, no devices attached.".to_string(),
                        )
                    }
                    [index] => *index,
                    _ => {
                        return error(
                            "No path specified in DEVICE, but multiple devices are attached."
                                .to_string(),
                        )
                    }
                }
            }
        };

        self.awaken(index);

        let slot = match self.slot(index) {
            Some(slot) => slot,
            None => return vec![],
        };

        if !request.has_settings() {
            return vec![encode(&slot.info)];
        }

        let path = obfuscate_uri(slot.path());
        let (reply, answer) = oneshot::channel();

        if !slot.command(DeviceCommand::Configure { request, reply }) {
            return error(format!("Device {} is busy.", path));
        }

        let responses = match self.subscribers.get(&id) {
            Some(subscriber) => subscriber.responses(),
            None => return vec![],
        };

        tokio::spawn(async move {
            let line = match timeout(REPLY_TIMEOUT, answer).await {
                Ok(Ok(Ok(info))) => encode(&info),
                Ok(Ok(Err(message))) => encode(&ErrorMessage::new(message)),
                Ok(Err(_)) => encode(&ErrorMessage::new(format!("Device {} closed.", path))),
                Err(_) => encode(&ErrorMessage::new(format!("Device {} did not respond.", path))),
            };

            if responses.send(line).await.is_err() {
                debug!("client gone before its DEVICE reply");
            }
        });

        vec![]
    }

    pub fn device_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Info {
                path,
                info,
                rtcm_writer,
            } => {
                let slot = match self.find(&path).and_then(|index| self.slot_mut(index)) {
                    Some(slot) if slot.is_open() => slot,
                    _ => return,
                };

                let activated = !slot.info.is_active() && info.is_active();

                slot.info = info.clone();
                slot.rtcm_writer = rtcm_writer;

                if activated {
                    self.devices_seen = true;
                    self.notify(&path, &info);
                }
            }
            DeviceEvent::Deactivated { path, generation } => {
                let slot = match self.find(&path).and_then(|index| self.slot_mut(index)) {
                    Some(slot) if slot.generation == generation => slot,
                    _ => return,
                };

                let was_active = slot.info.is_active();

                slot.info = DeviceInfo::deactivated(&path);
                slot.rtcm_writer = false;

                if was_active {
                    self.notify(&path, &DeviceInfo::deactivated(&path));
                }
            }
            DeviceEvent::Stopped { path, generation } => {
                if let Some(slot) = self.find(&path).and_then(|index| self.slot_mut(index)) {
                    if slot.generation == generation && slot.is_open() {
                        info!("{} stopped", obfuscate_uri(&path));
                        slot.close();
                        slot.info = DeviceInfo::deactivated(&path);
                    }
                }
            }
            DeviceEvent::Report(report) => self.report(*report),
        }
    }

    fn report(&mut self, report: Report) {
        let Report {
            publication,
            in_band,
            export,
            corrections,
            caster_fix,
        } = report;

        let path = publication.device.clone();

        let slot = match self.find(&path).and_then(|index| self.slot_mut(index)) {
            Some(slot) if slot.is_open() => slot,
            _ => return,
        };

        if publication.tpv.is_some() {
            slot.tpv = publication.tpv.clone();
        }

        if publication.sky.is_some() {
            slot.sky = publication.sky.clone();
        }

        if publication.gst.is_some() {
            slot.gst = publication.gst.clone();
        }

        let others = self
            .slots
            .iter()
            .flatten()
            .filter(|slot| slot.path() != path && slot.is_open());

        for slot in others {
            if let Some(time) = in_band.as_ref().filter(|_| slot.is_pps_only()) {
                slot.command(DeviceCommand::FixIn(time.clone()));
            }

            if let Some(data) = corrections.as_ref().filter(|_| slot.rtcm_writer) {
                slot.command(DeviceCommand::Write {
                    data: data.clone(),
                    reply: None,
                });
            }

            if let Some(fix) = caster_fix.filter(|_| slot.is_dgpsip()) {
                slot.command(DeviceCommand::CasterFix(fix));
            }
        }

        if let (Some(shm), Some(record)) = (self.shm.as_mut(), export) {
            shm.update(&record);
        }

        self.publish(&publication);
    }

    pub fn control_request(&mut self, request: ControlRequest) {
        let ControlRequest { command, reply } = request;

        let answer = match command {
            ControlCommand::Add(path) => self.add(&path),
            ControlCommand::Remove(path) => self.remove(&path),
            ControlCommand::Devices => ControlReply::Devices(self.device_paths()),
            ControlCommand::Write { path, data } => {
                let slot = match self.find(&path).and_then(|index| self.slot(index)) {
                    Some(slot) => slot,
                    None => {
                        info!("control: {} not active", obfuscate_uri(&path));
                        let _ = reply.send(ControlReply::Error);
                        return;
                    }
                };

                let (written, answer) = oneshot::channel();

                if !slot.command(DeviceCommand::Write {
                    data,
                    reply: Some(written),
                }) {
                    warn!("control: {} is not open", obfuscate_uri(&path));
                    let _ = reply.send(ControlReply::Error);
                    return;
                }

                tokio::spawn(async move {
                    let answer = match timeout(REPLY_TIMEOUT, answer).await {
                        Ok(Ok(true)) => ControlReply::Ok,
                        _ => ControlReply::Error,
                    };

                    let _ = reply.send(answer);
                });

                return;
            }
        };

        // the control connection may have closed while waiting
        let _ = reply.send(answer);
    }

    fn add(&mut self, path: &str) -> ControlReply {
        let nowait = self.configuration.nowait;

        let index = match self.allocate(path, nowait) {
            Ok(index) => index,
            Err(e) => {
                info!("control: adding {} failed: {}", obfuscate_uri(path), e);
                return ControlReply::Error;
            }
        };

        info!("control: added {}", obfuscate_uri(path));

        let watched = self
            .subscribers
            .values()
            .any(|subscriber| subscriber.policy.subscribed(path));

        if nowait || watched {
            self.awaken(index);
        }

        ControlReply::Ok
    }

    fn remove(&mut self, path: &str) -> ControlReply {
        let slot = match self.find(path).and_then(|index| self.slots[index].take()) {
            Some(slot) => slot,
            None => {
                info!("control: {} not active", obfuscate_uri(path));
                return ControlReply::Error;
            }
        };

        info!("control: removed {}", obfuscate_uri(path));

        if slot.info.is_active() {
            self.notify(path, &DeviceInfo::deactivated(path));
        }

        ControlReply::Ok
    }
}

async fn accept_control(control: Option<&ControlSocket>) -> io::Result<UnixStream> {
    match control {
        Some(control) => control.accept().await,
        None => futures::future::pending().await,
    }
}
