use crate::configuration::*;

use clap::Parser;

use std::convert::TryFrom;
use std::fs;
use std::io;
use std::io::Write;
use std::path::PathBuf;

use tempfile::tempdir;
use tempfile::TempDir;

use tokio_serial::DataBits;
use tokio_serial::FlowControl;
use tokio_serial::Parity;
use tokio_serial::StopBits;

use tracing_subscriber::filter::EnvFilter;

fn write(content: &str) -> Result<(fs::File, TempDir), io::Error> {
    let dir = tempdir()?;
    let path = dir.path().join("gpsmux.toml");

    let mut file = fs::File::create(path.clone())?;

    file.write_all(content.as_bytes())?;

    Ok((file, dir))
}

#[test]
fn test_config() {
    let (_, dir) = write(
        r#"
log_filter = "debug"
pid_file = "/run/gpsmux.pid"
max_devices = 2

[[devices]]
path = "/dev/ttyUSB0"
speed = 38400
framing = "8N1"
ntp_unit = 0
pps = "/dev/pps0"

[[devices]]
path = "tcp://192.0.2.1:5000"

[server]
port = 3000

[timeouts]
release = 5
reconnect = 0.5
    "#,
    )
    .unwrap();

    let path = dir.path().join("gpsmux.toml");
    let config = Configuration::load(path).unwrap();

    let usb0 = DeviceConfig {
        path: "/dev/ttyUSB0".to_string(),
        speed: Some(38400),
        framing: Some("8N1".to_string()),
        flow_control: None,
        ntp_unit: Some(0),
        pps: Some("/dev/pps0".to_string()),
    };

    let tcp = DeviceConfig::new("tcp://192.0.2.1:5000");

    assert_eq!(Some("debug".to_string()), config.log_filter);
    assert_eq!(vec![usb0, tcp], config.devices);
    assert_eq!(Some(PathBuf::from("/run/gpsmux.pid")), config.pid_file);
    assert_eq!(2, config.max_devices);
    assert!(config.shm_export);

    assert_eq!(3000, config.server.port);
    assert_eq!(64, config.server.max_clients);
    assert_eq!(
        vec!["127.0.0.1".to_string(), "::1".to_string()],
        config.server.bind_addresses
    );

    assert_approx_eq!(5.0, config.timeouts.release);
    assert_approx_eq!(0.5, config.timeouts.reconnect);
    assert_approx_eq!(900.0, config.timeouts.command);
    assert_approx_eq!(180.0, config.timeouts.noread);
}

#[test]
fn test_config_empty() {
    let (_, dir) = write("").unwrap();

    let config = Configuration::load(dir.path().join("gpsmux.toml")).unwrap();

    assert_eq!(Configuration::default(), config);
    assert_eq!(4, config.max_devices);
    assert_eq!(2947, config.server.port);
}

#[test]
fn test_config_invalid() {
    let (_, dir) = write("devices = 7").unwrap();

    match Configuration::load(dir.path().join("gpsmux.toml")) {
        Err(ConfigurationError::De(_)) => (),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_config_missing() {
    let dir = tempdir().unwrap();

    match Configuration::load(dir.path().join("missing.toml")) {
        Err(ConfigurationError::Io(_)) => (),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_from_args() {
    let args = Args::try_parse_from([
        "gpsmux",
        "-b",
        "-D",
        "2",
        "-G",
        "-S",
        "3001",
        "-s",
        "4800",
        "-f",
        "7E1",
        "-P",
        "/tmp/gpsmux.pid",
        "/dev/ttyUSB0",
        "gpsd://example.com",
    ])
    .unwrap();

    let config = Configuration::from_args(&args).unwrap();

    assert!(config.readonly);
    assert!(!config.passive);
    assert!(config.server.listen_any);
    assert_eq!(Some(2), config.debug);
    assert_eq!(3001, config.server.port);
    assert_eq!(Some(4800), config.speed);
    assert_eq!(Some(PathBuf::from("/tmp/gpsmux.pid")), config.pid_file);

    let paths: Vec<&str> = config.devices.iter().map(|d| d.path.as_str()).collect();
    assert_eq!(vec!["/dev/ttyUSB0", "gpsd://example.com"], paths);

    let framing = config.fixed_framing().unwrap().unwrap();
    assert_eq!(DataBits::Seven, framing.data_bits);
    assert_eq!(Parity::Even, framing.parity);
    assert_eq!(StopBits::One, framing.stop_bits);

    let context = config.context();
    assert!(context.readonly);
    assert_eq!(Some(4800), context.fixed_port_speed);

    assert_eq!(
        vec!["0.0.0.0".to_string(), "::".to_string()],
        config.server.addresses()
    );
}

#[test]
fn test_from_args_overlays_file() {
    let (_, dir) = write(
        r#"
passive = true

[[devices]]
path = "/dev/ttyUSB0"
speed = 38400
    "#,
    )
    .unwrap();

    let config_path = dir.path().join("gpsmux.toml");
    let config_path = config_path.to_str().unwrap();

    let args = Args::try_parse_from([
        "gpsmux",
        "-c",
        config_path,
        "/dev/ttyUSB0",
        "/dev/ttyUSB1",
    ])
    .unwrap();

    let config = Configuration::from_args(&args).unwrap();

    assert!(config.passive);
    assert_eq!(2, config.devices.len());
    assert_eq!(Some(38400), config.device("/dev/ttyUSB0").speed);
    assert_eq!(None, config.device("/dev/ttyUSB1").speed);
    assert_eq!(None, config.device("/dev/ttyUSB2").speed);
}

#[test]
fn test_from_args_bad_framing() {
    let args = Args::try_parse_from(["gpsmux", "-f", "8X1"]).unwrap();

    match Configuration::from_args(&args) {
        Err(ConfigurationError::InvalidParity(p)) => assert_eq!('X', p),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_validate_path_too_long() {
    let config = Configuration {
        devices: vec![DeviceConfig::new(&"x".repeat(GPS_PATH_MAX + 1))],
        ..Configuration::default()
    };

    match config.validate() {
        Err(ConfigurationError::PathTooLong(_, max)) => assert_eq!(GPS_PATH_MAX, max),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_validate_duplicate() {
    let config = Configuration {
        devices: vec![DeviceConfig::new("/dev/gps0"), DeviceConfig::new("/dev/gps0")],
        ..Configuration::default()
    };

    match config.validate() {
        Err(ConfigurationError::DuplicateDevice(path)) => assert_eq!("/dev/gps0", path),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_validate_too_many_devices() {
    let config = Configuration {
        devices: vec![DeviceConfig::new("/dev/gps0"), DeviceConfig::new("/dev/gps1")],
        max_devices: 1,
        ..Configuration::default()
    };

    match config.validate() {
        Err(ConfigurationError::TooManyDevices(max)) => assert_eq!(1, max),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_framing() {
    let framing: Framing = "7O2".parse().unwrap();

    assert_eq!(DataBits::Seven, framing.data_bits);
    assert_eq!(Parity::Odd, framing.parity);
    assert_eq!(StopBits::Two, framing.stop_bits);
    assert_eq!("7O2", framing.to_string());

    assert_eq!(Framing::default(), Framing::new('N', 1).unwrap());
}

#[test]
fn test_framing_error() {
    match "9N1".parse::<Framing>() {
        Err(ConfigurationError::InvalidDataBits(e)) => assert_eq!('9', e),
        other => panic!("unexpected {:?}", other),
    }

    match "8N3".parse::<Framing>() {
        Err(ConfigurationError::InvalidStopBits(e)) => assert_eq!('3', e),
        other => panic!("unexpected {:?}", other),
    }

    match "8N".parse::<Framing>() {
        Err(ConfigurationError::InvalidFraming(e)) => assert_eq!("8N", e),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_flow_control() {
    let mut device = DeviceConfig::new("/dev/gps0");

    assert_eq!(FlowControl::None, device.flow_control().unwrap());

    device.flow_control = Some("H".to_string());
    assert_eq!(FlowControl::Hardware, device.flow_control().unwrap());

    device.flow_control = Some("Q".to_string());
    assert!(matches!(
        device.flow_control(),
        Err(ConfigurationError::InvalidFlowControl(_))
    ));
}

#[test]
fn test_log_directives() {
    let mut config = Configuration::default();

    assert_eq!("info", config.log_directives(None));
    assert_eq!("gpsmux=trace", config.log_directives(Some("gpsmux=trace".into())));

    config.debug = Some(0);
    assert_eq!("warn", config.log_directives(None));

    config.debug = Some(2);
    assert_eq!("debug", config.log_directives(None));

    config.debug = Some(9);
    assert_eq!("trace", config.log_directives(Some(String::new())));

    config.log_filter = Some("error".to_string());
    assert_eq!("error", config.log_directives(Some("debug".into())));
}

#[test]
fn test_try_from_log_filter_set() {
    let config = Configuration {
        log_filter: Some(String::from("trace")),
        ..Configuration::default()
    };

    let filter = EnvFilter::try_from(&config).unwrap();

    assert_eq!("trace", filter.to_string());
}

#[test]
fn test_try_from_log_filter_error() {
    let config = Configuration {
        log_filter: Some(String::from("=garbage")),
        ..Configuration::default()
    };

    match EnvFilter::try_from(&config).err().unwrap() {
        ConfigurationError::InvalidLogFilter(f, e) => {
            assert_eq!("=garbage", f);
            assert_eq!("invalid filter directive", e.to_string());
        }
        other => panic!("unexpected {:?}", other),
    };
}

#[test]
fn test_parse_shm_key() {
    assert_eq!(Some(0x47505344), parse_shm_key("0x47505344"));
    assert_eq!(Some(0x47505344), parse_shm_key("0X47505344"));
    assert_eq!(Some(8), parse_shm_key("010"));
    assert_eq!(Some(1234), parse_shm_key(" 1234 "));
    assert_eq!(Some(0), parse_shm_key("0"));
    assert_eq!(None, parse_shm_key("key"));
}

#[test]
fn test_timeouts() {
    let timeouts = TimeoutConfig::default();

    assert_eq!(900, timeouts.command_timeout().as_secs());
    assert_eq!(10, timeouts.reawake_interval().as_millis());
    assert_eq!(2, timeouts.reconnect_interval().as_secs());

    let negative = TimeoutConfig {
        release: -1.0,
        ..TimeoutConfig::default()
    };

    assert!(negative.release_timeout().is_zero());
}
