use crate::configuration::Configuration;
use crate::configuration::DeviceConfig;
use crate::control::ControlCommand;
use crate::control::ControlReply;
use crate::control::ControlRequest;
use crate::daemon::*;

use assert_approx_eq::assert_approx_eq;

use bytes::Bytes;

use chrono::TimeZone;
use chrono::Utc;

use serde_json::Value;

use std::fs;
use std::time::Duration;

use tempfile::tempdir;

use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::io::DuplexStream;
use tokio::io::Lines;
use tokio::io::ReadHalf;
use tokio::io::WriteHalf;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;

const DATE: &str = "# Date: 1994-03-23\n";
const RMC: &str = "$GPRMC,123519.00,A,4807.038,N,01131.324,E,22.4,84.4,230394,003.1,W,A*2C\r\n";
const GGA: &str = "$GPGGA,123519.00,4807.038,N,01131.324,E,1,08,0.9,545.4,M,46.9,M,,*6C\r\n";

struct Client {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl Client {
    fn attach(daemon: &mut Daemon) -> Self {
        let (local, remote) = tokio::io::duplex(8192);

        daemon.attach("test".to_string(), remote);

        let (read, writer) = tokio::io::split(local);

        Client {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    async fn send(&mut self, request: &str) {
        self.writer.write_all(request.as_bytes()).await.unwrap();
    }

    /// The next line from the daemon, handling its events while waiting.
    async fn next(&mut self, daemon: &mut Daemon) -> Value {
        let lines = &mut self.lines;

        let read = async {
            loop {
                tokio::select! {
                    _ = daemon.handle_next() => (),
                    line = lines.next_line() => return line.unwrap().unwrap(),
                }
            }
        };

        let line = timeout(Duration::from_secs(10), read)
            .await
            .expect("no reply from the daemon");

        serde_json::from_str(&line).unwrap()
    }

    /// Skip lines until one of `class`.
    async fn until(&mut self, daemon: &mut Daemon, class: &str) -> Value {
        loop {
            let object = self.next(daemon).await;

            if object["class"] == class {
                return object;
            }
        }
    }
}

async fn control(daemon: &mut Daemon, command: ControlCommand) -> ControlReply {
    let (reply, answer) = oneshot::channel();

    daemon.control_request(ControlRequest { command, reply });

    answer.await.unwrap()
}

#[tokio::test]
async fn test_attach_sends_version() {
    let mut daemon = Daemon::new(Configuration::default(), None);
    let mut client = Client::attach(&mut daemon);

    let version = client.next(&mut daemon).await;

    assert_eq!("VERSION", version["class"]);
    assert_eq!(3, version["proto_major"]);
    assert_eq!(1, daemon.subscriber_count());
}

#[tokio::test]
async fn test_attach_refused_when_full() {
    let mut configuration = Configuration::default();
    configuration.server.max_clients = 1;

    let mut daemon = Daemon::new(configuration, None);
    let _first = Client::attach(&mut daemon);
    let mut second = Client::attach(&mut daemon);

    assert_eq!(1, daemon.subscriber_count());
    assert_eq!(None, second.lines.next_line().await.unwrap());
}

#[tokio::test]
async fn test_client_disconnect() {
    let mut daemon = Daemon::new(Configuration::default(), None);
    let client = Client::attach(&mut daemon);

    drop(client);

    daemon.handle_next().await;

    assert_eq!(0, daemon.subscriber_count());
}

#[tokio::test]
async fn test_requests_without_devices() {
    let mut daemon = Daemon::new(Configuration::default(), None);
    let mut client = Client::attach(&mut daemon);

    client.until(&mut daemon, "VERSION").await;

    client.send("?DEVICES;\n").await;
    let devices = client.next(&mut daemon).await;
    assert_eq!("DEVICES", devices["class"]);
    assert!(devices["devices"].as_array().unwrap().is_empty());

    client.send("?POLL;\n").await;
    let poll = client.next(&mut daemon).await;
    assert_eq!("POLL", poll["class"]);
    assert_eq!(0, poll["active"]);
    assert!(poll["tpv"].as_array().unwrap().is_empty());

    client.send("?DEVICE={\"bps\":4800};\n").await;
    let error = client.next(&mut daemon).await;
    assert_eq!("ERROR", error["class"]);
    assert_eq!(
        "Can't perform DEVICE configuration, no devices attached.",
        error["message"]
    );

    client.send("?DEVICE={\"path\":\"/dev/nope\"};\n").await;
    let error = client.next(&mut daemon).await;
    assert_eq!("Can't open /dev/nope.", error["message"]);

    client.send("?WATCH={\"device\":\"/dev/nope\"};\n").await;
    let error = client.next(&mut daemon).await;
    assert_eq!("No such device as /dev/nope", error["message"]);

    client.send("?FOO;\n").await;
    let error = client.next(&mut daemon).await;
    assert_eq!("ERROR", error["class"]);
}

#[tokio::test]
async fn test_watch_replies_devices_then_watch() {
    let mut daemon = Daemon::new(Configuration::default(), None);
    let mut client = Client::attach(&mut daemon);

    client.until(&mut daemon, "VERSION").await;

    client.send("?WATCH={\"enable\":true,\"json\":true};\n").await;

    assert_eq!("DEVICES", client.next(&mut daemon).await["class"]);

    let watch = client.next(&mut daemon).await;
    assert_eq!("WATCH", watch["class"]);
    assert_eq!(true, watch["enable"]);
    assert_eq!(true, watch["json"]);
    assert_eq!(false, watch["nmea"]);

    client.send("?WATCH;\n").await;

    assert_eq!("DEVICES", client.next(&mut daemon).await["class"]);
    assert_eq!(true, client.next(&mut daemon).await["enable"]);
}

#[tokio::test]
async fn test_two_devices_need_a_path() {
    let mut configuration = Configuration::default();
    configuration.devices = vec![
        DeviceConfig::new("tcp://127.0.0.1:1"),
        DeviceConfig::new("tcp://127.0.0.1:2"),
    ];

    let mut daemon = Daemon::new(configuration, None);
    daemon.start().unwrap();

    assert!(!daemon.is_open("tcp://127.0.0.1:1"));

    let mut client = Client::attach(&mut daemon);
    client.until(&mut daemon, "VERSION").await;

    client.send("?DEVICE={\"native\":1};\n").await;
    let error = client.next(&mut daemon).await;
    assert_eq!(
        "No path specified in DEVICE, but multiple devices are attached.",
        error["message"]
    );

    client.send("?DEVICE;\n").await;
    assert_eq!("tcp://127.0.0.1:1", client.next(&mut daemon).await["path"]);
    assert_eq!("tcp://127.0.0.1:2", client.next(&mut daemon).await["path"]);
}

#[tokio::test]
async fn test_control_add_remove() {
    let mut configuration = Configuration::default();
    configuration.max_devices = 2;

    let mut daemon = Daemon::new(configuration, None);

    let add = |path: &str| ControlCommand::Add(path.to_string());
    let remove = |path: &str| ControlCommand::Remove(path.to_string());

    assert_eq!(ControlReply::Ok, control(&mut daemon, add("tcp://127.0.0.1:1")).await);
    assert_eq!(ControlReply::Error, control(&mut daemon, add("tcp://127.0.0.1:1")).await);
    assert_eq!(ControlReply::Error, control(&mut daemon, add("bogus://here")).await);
    assert_eq!(ControlReply::Error, control(&mut daemon, add(&"x".repeat(200))).await);
    assert_eq!(ControlReply::Ok, control(&mut daemon, add("/dev/ttyUSB9")).await);
    assert_eq!(ControlReply::Error, control(&mut daemon, add("/dev/ttyUSB8")).await);

    assert_eq!(
        ControlReply::Devices(vec![
            "tcp://127.0.0.1:1".to_string(),
            "/dev/ttyUSB9".to_string()
        ]),
        control(&mut daemon, ControlCommand::Devices).await
    );

    // nobody watches, so it was never opened
    assert!(!daemon.is_open("tcp://127.0.0.1:1"));

    let write = ControlCommand::Write {
        path: "tcp://127.0.0.1:1".to_string(),
        data: Bytes::from_static(b"hello"),
    };
    assert_eq!(ControlReply::Error, control(&mut daemon, write).await);

    assert_eq!(ControlReply::Ok, control(&mut daemon, remove("tcp://127.0.0.1:1")).await);
    assert_eq!(ControlReply::Error, control(&mut daemon, remove("tcp://127.0.0.1:1")).await);

    assert_eq!(vec!["/dev/ttyUSB9".to_string()], daemon.device_paths());
}

#[tokio::test]
async fn test_restart_resends_version() {
    let mut daemon = Daemon::new(Configuration::default(), None);
    let mut client = Client::attach(&mut daemon);

    client.until(&mut daemon, "VERSION").await;

    daemon.restart().unwrap();

    assert_eq!("VERSION", client.next(&mut daemon).await["class"]);
    assert_eq!(1, daemon.subscriber_count());
}

#[tokio::test]
async fn test_lost_subscriber_leaves_others() {
    let mut daemon = Daemon::new(Configuration::default(), None);
    let lost = Client::attach(&mut daemon);
    let mut kept = Client::attach(&mut daemon);

    kept.until(&mut daemon, "VERSION").await;
    assert_eq!(2, daemon.subscriber_count());

    drop(lost);

    // the broadcast hits the closed connection while the other stays attached
    daemon.restart().unwrap();

    assert_eq!("VERSION", kept.next(&mut daemon).await["class"]);

    timeout(Duration::from_secs(10), async {
        while daemon.subscriber_count() > 1 {
            daemon.handle_next().await;
        }
    })
    .await
    .expect("closed subscriber still attached");

    assert_eq!(1, daemon.subscriber_count());

    kept.send("?POLL;\n").await;
    assert_eq!("POLL", kept.until(&mut daemon, "POLL").await["class"]);
    assert_eq!(1, daemon.subscriber_count());
}

#[tokio::test]
async fn test_tick_detaches_silent_clients() {
    let mut configuration = Configuration::default();
    configuration.timeouts.command = 0.001;

    let mut daemon = Daemon::new(configuration, None);
    let _client = Client::attach(&mut daemon);

    tokio::time::sleep(Duration::from_millis(10)).await;

    // nothing was ever attached, so no idle shutdown
    assert!(daemon.tick(Utc::now()));
    assert_eq!(0, daemon.subscriber_count());
}

#[test]
fn test_time_warp() {
    let before = Utc.ymd(2022, 6, 1).and_hms(12, 0, 0);

    let after = |millis| before + chrono::Duration::milliseconds(millis);

    assert!(!is_time_warp(before, after(2_000), TICK));
    assert!(!is_time_warp(before, after(2_900), TICK));
    assert!(is_time_warp(before, after(3_000), TICK));
    assert!(is_time_warp(before, after(60_000), TICK));
    assert!(is_time_warp(before, after(-1_000), TICK));
}

#[test]
fn test_pid_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gpsmux.pid");

    let pid_file = PidFile::create(&path).unwrap();

    assert_eq!(path, pid_file.path());
    assert_eq!(
        format!("{}\n", std::process::id()),
        fs::read_to_string(&path).unwrap()
    );

    drop(pid_file);

    assert!(!path.exists());
}

#[tokio::test]
async fn test_device_to_watcher() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let path = format!("tcp://{}", listener.local_addr().unwrap());

    let mut configuration = Configuration::default();
    configuration.nowait = true;
    configuration.devices = vec![DeviceConfig {
        // out of range, keeps the test away from the real refclock segments
        ntp_unit: Some(1000),
        ..DeviceConfig::new(&path)
    }];

    let mut daemon = Daemon::new(configuration, None);
    daemon.start().unwrap();

    assert!(daemon.is_open(&path));

    let (mut gps, _) = listener.accept().await.unwrap();

    let mut client = Client::attach(&mut daemon);
    client.until(&mut daemon, "VERSION").await;

    client.send("?WATCH={\"enable\":true,\"json\":true};\n").await;
    client.until(&mut daemon, "WATCH").await;

    gps.write_all(format!("{}{}{}", DATE, RMC, GGA).as_bytes())
        .await
        .unwrap();

    let tpv = client.until(&mut daemon, "TPV").await;
    assert_eq!(path, tpv["device"]);
    assert_approx_eq!(48.1173, tpv["lat"].as_f64().unwrap(), 1e-6);
    assert_approx_eq!(11.522067, tpv["lon"].as_f64().unwrap(), 1e-6);

    client.send("?POLL;\n").await;
    let poll = client.until(&mut daemon, "POLL").await;
    assert_eq!(1, poll["active"]);
    assert_approx_eq!(48.1173, poll["tpv"][0]["lat"].as_f64().unwrap(), 1e-6);

    let write = ControlCommand::Write {
        path: path.clone(),
        data: Bytes::from_static(b"hello"),
    };
    assert_eq!(ControlReply::Ok, control(&mut daemon, write).await);

    let mut buf = vec![0; 5];
    gps.read_exact(&mut buf).await.unwrap();
    assert_eq!(b"hello", &buf[..]);

    daemon.restart().unwrap();

    loop {
        let device = client.until(&mut daemon, "DEVICE").await;

        if device["activated"] == 0 {
            assert_eq!(path, device["path"]);
            break;
        }
    }

    assert_eq!("VERSION", client.next(&mut daemon).await["class"]);

    // -n devices are opened again
    assert!(daemon.is_open(&path));
}
