use crate::configuration::Args;
use crate::configuration::ConfigurationError;
use crate::configuration::DeviceConfig;
use crate::configuration::Framing;
use crate::configuration::ServerConfig;
use crate::configuration::TimeoutConfig;
use crate::gps::Context;

use serde::Deserialize;

use std::collections::HashSet;
use std::convert::TryFrom;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use tracing::warn;

use tracing_subscriber::filter::EnvFilter;

/// Longest accepted device path.
pub const GPS_PATH_MAX: usize = 128;

/// SHM export key when `GPSD_SHM_KEY` is unset.
pub const DEFAULT_SHM_KEY: i32 = 0x4750_5344;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Configuration {
    pub log_filter: Option<String>,
    /// Verbosity from `-D`, used when neither `log_filter` nor `RUST_LOG` is set.
    pub debug: Option<u8>,
    pub devices: Vec<DeviceConfig>,
    pub server: ServerConfig,
    pub control_socket: Option<PathBuf>,
    pub pid_file: Option<PathBuf>,
    pub shm_export: bool,
    pub max_devices: usize,
    pub timeouts: TimeoutConfig,
    pub readonly: bool,
    pub passive: bool,
    pub battery_rtc: bool,
    pub foreground: bool,
    pub nowait: bool,
    pub speed: Option<u32>,
    pub framing: Option<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            log_filter: None,
            debug: None,
            devices: vec![],
            server: ServerConfig::default(),
            control_socket: None,
            pid_file: None,
            shm_export: true,
            max_devices: 4,
            timeouts: TimeoutConfig::default(),
            readonly: false,
            passive: false,
            battery_rtc: false,
            foreground: false,
            nowait: false,
            speed: None,
            framing: None,
        }
    }
}

impl Configuration {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Configuration, ConfigurationError> {
        let source = fs::read_to_string(path)?;

        parse(source)
    }

    /// The configuration file named by `-c`, if any, with the command line laid over it.
    pub fn from_args(args: &Args) -> Result<Configuration, ConfigurationError> {
        let mut configuration = match &args.config {
            Some(path) => Configuration::load(path)?,
            None => Configuration::default(),
        };

        configuration.merge(args);
        configuration.validate()?;

        Ok(configuration)
    }

    pub fn merge(&mut self, args: &Args) {
        self.readonly |= args.readonly;
        self.server.listen_any |= args.listen_any;
        self.foreground |= args.foreground;
        self.nowait |= args.nowait;
        self.passive |= args.passive;
        self.battery_rtc |= args.battery_rtc;

        if args.debug.is_some() {
            self.debug = args.debug;
        }

        if let Some(port) = args.port {
            self.server.port = port;
        }

        if args.speed.is_some() {
            self.speed = args.speed;
        }

        if args.framing.is_some() {
            self.framing = args.framing.clone();
        }

        if args.pid_file.is_some() {
            self.pid_file = args.pid_file.clone();
        }

        if args.control_socket.is_some() {
            self.control_socket = args.control_socket.clone();
        }

        for path in &args.devices {
            if !self.devices.iter().any(|d| &d.path == path) {
                self.devices.push(DeviceConfig::new(path));
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.fixed_framing()?;

        if self.devices.len() > self.max_devices {
            return Err(ConfigurationError::TooManyDevices(self.max_devices));
        }

        let mut seen = HashSet::new();

        for device in &self.devices {
            if device.path.len() > GPS_PATH_MAX {
                return Err(ConfigurationError::PathTooLong(
                    device.path.clone(),
                    GPS_PATH_MAX,
                ));
            }

            if !seen.insert(device.path.as_str()) {
                return Err(ConfigurationError::DuplicateDevice(device.path.clone()));
            }

            device.framing()?;
            device.flow_control()?;
        }

        Ok(())
    }

    /// Framing pinned by `-f` for every device.
    pub fn fixed_framing(&self) -> Result<Option<Framing>, ConfigurationError> {
        self.framing.as_deref().map(str::parse).transpose()
    }

    /// Settings for a device named on the command line or added over the control socket.
    pub fn device(&self, path: &str) -> DeviceConfig {
        self.devices
            .iter()
            .find(|d| d.path == path)
            .cloned()
            .unwrap_or_else(|| DeviceConfig::new(path))
    }

    /// A fresh time-keeping context carrying the daemon-wide device policy.
    pub fn context(&self) -> Context {
        Context {
            passive: self.passive,
            readonly: self.readonly,
            battery_rtc: self.battery_rtc,
            fixed_port_speed: self.speed,
            fixed_port_framing: self.framing.clone(),
            ..Context::default()
        }
    }

    /// Key of the SHM export segment, `GPSD_SHM_KEY` overrides the default.
    pub fn shm_key(&self) -> i32 {
        match std::env::var("GPSD_SHM_KEY") {
            Ok(value) => parse_shm_key(&value).unwrap_or_else(|| {
                warn!("ignoring unparseable GPSD_SHM_KEY {:?}", value);
                DEFAULT_SHM_KEY
            }),
            Err(_) => DEFAULT_SHM_KEY,
        }
    }

    /// Log directives from `log_filter`, else `rust_log`, else the `-D` level, else `info`.
    pub fn log_directives(&self, rust_log: Option<String>) -> String {
        if let Some(filter) = &self.log_filter {
            return filter.clone();
        }

        if let Some(filter) = rust_log.filter(|f| !f.is_empty()) {
            return filter;
        }

        let level = match self.debug {
            None | Some(1) => "info",
            Some(0) => "warn",
            Some(2) => "debug",
            Some(_) => "trace",
        };

        level.to_string()
    }
}

fn parse(source: String) -> Result<Configuration, ConfigurationError> {
    match toml::from_str(&source) {
        Err(e) => Err(ConfigurationError::from(e)),
        Ok(c) => Ok(c),
    }
}

/// Parse a SysV key the way `strtol` with base 0 does: `0x` hex, leading `0` octal, else
/// decimal.
pub fn parse_shm_key(value: &str) -> Option<i32> {
    let value = value.trim();

    let parsed = if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16).ok()
    } else if value.len() > 1 && value.starts_with('0') {
        u32::from_str_radix(&value[1..], 8).ok()
    } else {
        value.parse::<i64>().ok().map(|v| v as u32)
    };

    parsed.map(|v| v as i32)
}

impl TryFrom<&Configuration> for EnvFilter {
    type Error = ConfigurationError;

    fn try_from(configuration: &Configuration) -> Result<EnvFilter, ConfigurationError> {
        let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        let filter = configuration.log_directives(rust_log);

        match EnvFilter::try_new(filter.clone()) {
            Ok(f) => Ok(f),
            Err(e) => Err(ConfigurationError::InvalidLogFilter(filter, e)),
        }
    }
}
