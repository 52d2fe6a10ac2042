use super::json::to_line;
use super::*;

use crate::gps::ChangedMask;
use crate::gps::Context;
use crate::gps::Session;
use crate::packet::Lexer;
use crate::packet::Packet;
use crate::packet::PacketType;

use bytes::Bytes;
use bytes::BytesMut;

use serde_json::json;

use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;

const DATE: &str = "# Date: 1994-03-23\n";
const RMC: &str = "$GPRMC,123519.00,A,4807.038,N,01131.324,E,22.4,84.4,230394,003.1,W,A*2C\r\n";
const GGA: &str = "$GPGGA,123519.00,4807.038,N,01131.324,E,1,08,0.9,545.4,M,46.9,M,,*6C\r\n";
const GSV1: &str = "$GPGSV,3,1,10,04,45,045,40,05,30,090,38,09,60,135,42,12,15,180,30*7D\r\n";
const GSV2: &str = "$GPGSV,3,2,10,16,20,225,35,18,40,270,41,22,55,315,44,24,10,030,28*7B\r\n";
const GSV3: &str = "$GPGSV,3,3,10,26,70,100,45,29,25,200,33*75\r\n";

fn session(input: &[&str]) -> Session {
    let mut session = Session::new("/dev/ttyUSB0", Context::default());
    let mut lexer = Lexer::new();

    for line in input {
        lexer.feed(line.as_bytes());
    }

    while let Some(packet) = lexer.next_packet() {
        session.handle(&packet);
    }

    session
}

fn text(line: &Bytes) -> &str {
    std::str::from_utf8(line).unwrap()
}

fn nmea_packet() -> Packet {
    Packet {
        kind: PacketType::Nmea,
        bytes: Bytes::from_static(GGA.as_bytes()),
    }
}

#[test]
fn test_watch_update_defaults() {
    let mut watch = Watch {
        nmea: true,
        pps: true,
        device: Some("/dev/ttyUSB0".to_string()),
        ..Watch::default()
    };

    watch.update(&json!({"json": true})).unwrap();

    assert!(watch.enable);
    assert!(watch.json);
    assert!(watch.nmea);
    assert!(!watch.pps);
    assert_eq!(None, watch.device);
}

#[test]
fn test_watch_update_disable() {
    let mut watch = Watch::default();

    watch.update(&json!({"enable": true, "json": true, "raw": 2})).unwrap();
    watch.update(&json!({"enable": false})).unwrap();

    assert!(!watch.enable);
    assert!(watch.json);
    assert_eq!(2, watch.raw);
}

#[test]
fn test_watch_update_invalid() {
    let mut watch = Watch::default();

    assert_eq!(
        Err("attribute json must be a boolean".to_string()),
        watch.update(&json!({"enable": true, "json": "yes"}))
    );
    assert_eq!(Watch::default(), watch);

    assert!(watch.update(&json!({"class": "POLL"})).is_err());
    assert!(watch.update(&json!([1, 2])).is_err());

    watch.update(&json!({"class": "WATCH", "loglevel": 9})).unwrap();
    assert!(watch.enable);
}

#[test]
fn test_watch_subscribed() {
    let mut watch = Watch::default();

    assert!(!watch.subscribed("/dev/ttyUSB0"));

    watch.update(&json!({"device": "/dev/ttyUSB0"})).unwrap();

    assert!(watch.subscribed("/dev/ttyUSB0"));
    assert!(!watch.subscribed("/dev/ttyUSB1"));

    watch.update(&json!({})).unwrap();

    assert!(watch.subscribed("/dev/ttyUSB1"));
}

#[test]
fn test_watch_json() {
    let line = to_line(&Watch::default()).unwrap();

    assert_eq!(
        "{\"class\":\"WATCH\",\"enable\":false,\"json\":false,\"nmea\":false,\"raw\":0,\
         \"scaled\":false,\"timing\":false,\"split24\":false,\"pps\":false}\r\n",
        text(&line)
    );
}

#[test]
fn test_version_json() {
    let line = to_line(&Version::default()).unwrap();

    let expected = format!(
        "{{\"class\":\"VERSION\",\"release\":\"{0}\",\"rev\":\"{0}\",\"proto_major\":3,\"proto_minor\":15}}\r\n",
        env!("CARGO_PKG_VERSION")
    );

    assert_eq!(expected, text(&line));
}

#[test]
fn test_obfuscate_uri() {
    assert_eq!("/dev/ttyUSB0", obfuscate_uri("/dev/ttyUSB0"));
    assert_eq!("tcp://host:2947", obfuscate_uri("tcp://host:2947"));
    assert_eq!(
        "ntrip://caster.example:2101/MOUNT",
        obfuscate_uri("ntrip://me@example.com:secret@caster.example:2101/MOUNT")
    );
}

#[test]
fn test_device_deactivated_json() {
    let line = to_line(&DeviceInfo::deactivated("ntrip://user:pw@caster:2101/MOUNT")).unwrap();

    assert_eq!(
        "{\"class\":\"DEVICE\",\"path\":\"ntrip://caster:2101/MOUNT\",\"activated\":0}\r\n",
        text(&line)
    );
}

#[test]
fn test_devices_json() {
    let device = DeviceInfo {
        driver: Some("NMEA0183".to_string()),
        bps: Some(9600),
        parity: Some('N'),
        stopbits: Some(1),
        native: Some(0),
        ..DeviceInfo::new("/dev/ttyUSB0")
    };

    let devices = Devices {
        devices: vec![device],
    };

    assert_eq!(
        "{\"class\":\"DEVICES\",\"devices\":[{\"class\":\"DEVICE\",\"path\":\"/dev/ttyUSB0\",\
         \"driver\":\"NMEA0183\",\"native\":0,\"bps\":9600,\"parity\":\"N\",\"stopbits\":1}]}\r\n",
        text(&to_line(&devices).unwrap())
    );
}

#[test]
fn test_error_messages() {
    assert_eq!(
        "Unrecognized request '?FOO;'",
        ErrorMessage::unrecognized("?FOO;\r\n").message
    );
    assert_eq!(
        "No such device as /dev/nope",
        ErrorMessage::no_such_device("/dev/nope").message
    );
}

#[test]
fn test_tpv() {
    let session = session(&[DATE, RMC, GGA]);

    let tpv = Tpv::new(&session, ChangedMask::REPORT);

    assert_eq!("/dev/ttyUSB0", tpv.device);
    assert_eq!(None, tpv.status);
    assert_eq!(Some("1994-03-23T12:35:19.000Z".to_string()), tpv.time);
    assert_approx_eq!(48.1173, tpv.lat.unwrap());
    assert_approx_eq!(11.5220667, tpv.lon.unwrap());
    assert_approx_eq!(545.4, tpv.alt_msl.unwrap());
    assert_approx_eq!(46.9, tpv.geoid_sep.unwrap());
    assert_approx_eq!(84.4, tpv.track.unwrap());

    let line = to_line(&tpv).unwrap();
    let line = text(&line);

    assert!(line.starts_with("{\"class\":\"TPV\",\"device\":\"/dev/ttyUSB0\",\"mode\":3,"));
    assert!(line.ends_with("}\r\n"));
    assert!(!line.contains("null"));
    assert!(!line.contains("\"status\""));
}

#[test]
fn test_tpv_no_fix_omits_position() {
    let mut session = session(&[DATE, RMC, GGA]);
    session.fix.mode = crate::gps::Mode::NoFix;

    let tpv = Tpv::new(&session, ChangedMask::REPORT);

    assert_eq!(None, tpv.lat);
    assert_eq!(None, tpv.speed);
    assert!(tpv.time.is_some());
}

#[test]
fn test_sky() {
    let session = session(&[GSV1, GSV2, GSV3]);

    let sky = Sky::new(&session).unwrap();

    assert_eq!(Some(10), sky.n_sat);
    assert_eq!(Some(0), sky.u_sat);
    assert_eq!(10, sky.satellites.len());
    assert_eq!(4, sky.satellites[0].prn);
    assert_approx_eq!(45.0, sky.satellites[0].el.unwrap());

    let line = to_line(&sky).unwrap();
    assert!(text(&line).contains("{\"PRN\":4,"));
}

#[test]
fn test_sky_and_gst_empty() {
    let session = Session::new("/dev/ttyUSB0", Context::default());

    assert_eq!(None, Sky::new(&session));
    assert_eq!(None, Gst::new(&session));
}

#[test]
fn test_publication_lines_for() {
    let publication = Publication {
        packet: Some(nmea_packet()),
        reports: vec![Bytes::from_static(b"{\"class\":\"TPV\"}\r\n")],
        toff: Some(Bytes::from_static(b"{\"class\":\"TOFF\"}\r\n")),
        pps: Some(Bytes::from_static(b"{\"class\":\"PPS\"}\r\n")),
        ..Publication::new("/dev/ttyUSB0")
    };

    let mut policy = Watch::default();
    assert!(publication.lines_for(&policy).is_empty());

    policy.update(&json!({"json": true})).unwrap();
    assert_eq!(publication.reports, publication.lines_for(&policy));

    policy.update(&json!({"json": false, "nmea": true, "timing": true})).unwrap();
    assert_eq!(
        vec![
            Bytes::from_static(GGA.as_bytes()),
            Bytes::from_static(b"{\"class\":\"TOFF\"}\r\n"),
        ],
        publication.lines_for(&policy)
    );

    policy.update(&json!({"nmea": false, "pps": true, "device": "/dev/ttyUSB1"})).unwrap();
    assert!(publication.lines_for(&policy).is_empty());
}

#[test]
fn test_publication_raw() {
    let publication = Publication {
        packet: Some(Packet {
            kind: PacketType::Ubx,
            bytes: Bytes::from_static(&[0xb5, 0x62, 0x01]),
        }),
        ..Publication::new("/dev/ttyACM0")
    };

    let mut policy = Watch::default();

    policy.update(&json!({"nmea": true})).unwrap();
    assert!(publication.lines_for(&policy).is_empty());

    policy.update(&json!({"raw": 1})).unwrap();
    assert_eq!(
        vec![Bytes::from_static(b"b56201\r\n")],
        publication.lines_for(&policy)
    );

    policy.update(&json!({"raw": 2})).unwrap();
    assert_eq!(
        vec![Bytes::from_static(&[0xb5, 0x62, 0x01])],
        publication.lines_for(&policy)
    );
}

#[test]
fn test_publication_passthrough() {
    let passthrough = Bytes::from_static(b"{\"class\":\"TPV\",\"device\":\"gpsd://host:2947\"}\r\n");

    let publication = Publication {
        packet: Some(nmea_packet()),
        passthrough: Some(passthrough.clone()),
        notice: Some(Bytes::from_static(b"{\"class\":\"DEVICE\"}\r\n")),
        ..Publication::new("gpsd://host:2947")
    };

    let mut policy = Watch::default();
    policy.update(&json!({"json": true, "nmea": true})).unwrap();

    assert_eq!(
        vec![
            Bytes::from_static(b"{\"class\":\"DEVICE\"}\r\n"),
            passthrough
        ],
        publication.lines_for(&policy)
    );
}

#[test]
fn test_codec_lines() {
    let mut codec = Codec::new();
    let mut buf = BytesMut::from(&b"?VERSION;\r\n?POLL"[..]);

    assert_eq!(Some(vec![Command::Version]), codec.decode(&mut buf).unwrap());
    assert_eq!(None, codec.decode(&mut buf).unwrap());

    buf.extend_from_slice(b";\n");
    assert_eq!(Some(vec![Command::Poll]), codec.decode(&mut buf).unwrap());
    assert!(buf.is_empty());
}

#[test]
fn test_codec_overlong() {
    let mut codec = Codec::new();
    let mut buf = BytesMut::new();

    buf.extend_from_slice(&[b'A'; 100]);
    buf.extend_from_slice(b"\n?POLL;\n");

    let expected = format!("Unrecognized request '{}'", "A".repeat(GPS_JSON_COMMAND_MAX));

    assert_eq!(
        Some(vec![Command::Error(expected)]),
        codec.decode(&mut buf).unwrap()
    );
    assert_eq!(Some(vec![Command::Poll]), codec.decode(&mut buf).unwrap());
}

#[test]
fn test_codec_malformed_utf8() {
    let mut codec = Codec::new();
    let mut buf = BytesMut::from(&b"?FOO\xff;\n"[..]);

    let message = match codec.decode(&mut buf).unwrap() {
        Some(commands) => match &commands[..] {
            [Command::Error(message)] => message.clone(),
            other => panic!("expected one error, got {:?}", other),
        },
        None => panic!("expected a request"),
    };

    assert_eq!(
        "{\"class\":\"ERROR\",\"message\":\"Unrecognized request '?FOO\\u00ff;'\"}\r\n",
        text(&to_line(&ErrorMessage::new(message)).unwrap())
    );
}

#[test]
fn test_codec_eof() {
    let mut codec = Codec::new();
    let mut buf = BytesMut::from(&b"?DEVICES;"[..]);

    assert_eq!(Some(vec![Command::Devices]), codec.decode_eof(&mut buf).unwrap());
    assert_eq!(None, codec.decode_eof(&mut buf).unwrap());
}

#[test]
fn test_subscriber_backpressure() {
    let (responses, rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();

    let client = ClientHandle {
        id: 1,
        peer: "127.0.0.1:40000".to_string(),
        responses,
        cancel: cancel.clone(),
    };

    let mut subscriber = Subscriber::new(client);
    let line = Bytes::from_static(b"{}\r\n");
    let long = Duration::from_secs(3600);

    assert!(subscriber.send(line.clone(), long));
    assert!(subscriber.send(line.clone(), long));

    std::thread::sleep(Duration::from_millis(5));
    assert!(!subscriber.send(line.clone(), Duration::from_millis(1)));

    drop(rx);
    assert!(!subscriber.send(line, long));

    drop(subscriber);
    assert!(cancel.is_cancelled());
}

#[test]
fn test_subscriber_idle() {
    let (responses, _rx) = mpsc::channel(1);

    let client = ClientHandle {
        id: 1,
        peer: "peer".to_string(),
        responses,
        cancel: CancellationToken::new(),
    };

    let mut subscriber = Subscriber::new(client);
    std::thread::sleep(Duration::from_millis(2));

    assert!(!subscriber.is_idle(Duration::ZERO));
    assert!(subscriber.is_idle(Duration::from_millis(1)));

    subscriber.policy.enable = true;
    assert!(!subscriber.is_idle(Duration::from_millis(1)));
}

#[tokio::test]
async fn test_client_round_trip() {
    let (local, mut remote) = tokio::io::duplex(1024);
    let (events_tx, mut events) = mpsc::channel(8);

    let client = spawn_client(7, "test".to_string(), local, events_tx, Duration::from_secs(1));

    remote.write_all(b"?VERSION;\n").await.unwrap();

    assert_eq!(
        ClientEvent::Commands {
            id: 7,
            commands: vec![Command::Version]
        },
        events.recv().await.unwrap()
    );

    let reply = b"{\"class\":\"VERSION\"}\r\n";
    client.responses.send(Bytes::from_static(reply)).await.unwrap();

    let mut buf = vec![0; reply.len()];
    remote.read_exact(&mut buf).await.unwrap();
    assert_eq!(&reply[..], &buf[..]);

    drop(remote);

    assert_eq!(ClientEvent::Closed { id: 7 }, events.recv().await.unwrap());
}

#[tokio::test]
async fn test_client_cancel_closes() {
    let (local, mut remote) = tokio::io::duplex(1024);
    let (events_tx, mut events) = mpsc::channel(8);

    let client = spawn_client(3, "test".to_string(), local, events_tx, Duration::from_secs(1));

    client.cancel.cancel();

    assert_eq!(ClientEvent::Closed { id: 3 }, events.recv().await.unwrap());

    let mut buf = vec![];
    assert_eq!(0, remote.read_to_end(&mut buf).await.unwrap());
}
