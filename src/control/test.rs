use super::*;

use tempfile::tempdir;

use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tokio::sync::mpsc;

/// Answers like a daemon with one device, `/dev/ttyUSB0`.
async fn fake_daemon(mut requests: mpsc::Receiver<ControlRequest>) {
    let mut devices = vec!["/dev/ttyUSB0".to_string()];

    while let Some(request) = requests.recv().await {
        let reply = match request.command {
            ControlCommand::Add(path) if devices.contains(&path) => ControlReply::Error,
            ControlCommand::Add(path) => {
                devices.push(path);
                ControlReply::Ok
            }
            ControlCommand::Remove(path) => {
                let before = devices.len();
                devices.retain(|device| device != &path);

                if devices.len() < before {
                    ControlReply::Ok
                } else {
                    ControlReply::Error
                }
            }
            ControlCommand::Write { path, .. } if devices.contains(&path) => ControlReply::Ok,
            ControlCommand::Write { .. } => ControlReply::Error,
            ControlCommand::Devices => ControlReply::Devices(devices.clone()),
        };

        let _ = request.reply.send(reply);
    }
}

#[test]
fn test_reply_display() {
    assert_eq!("OK", ControlReply::Ok.to_string());
    assert_eq!("ERROR", ControlReply::Error.to_string());
    assert_eq!(
        "/dev/ttyUSB0\ntcp://host:2947\nOK",
        ControlReply::Devices(vec!["/dev/ttyUSB0".to_string(), "tcp://host:2947".to_string()])
            .to_string()
    );
    assert_eq!("OK", ControlReply::Devices(vec![]).to_string());
}

#[tokio::test]
async fn test_socket_session() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gpsmux.sock");

    let socket = ControlSocket::bind(&path).unwrap();
    assert!(path.exists());

    let (requests, rx) = mpsc::channel(4);
    tokio::spawn(fake_daemon(rx));

    tokio::spawn(async move {
        let stream = socket.accept().await.unwrap();
        serve(stream, requests).await.unwrap();
    });

    let stream = UnixStream::connect(&path).await.unwrap();
    let (read, mut write) = stream.into_split();
    let mut replies = BufReader::new(read).lines();

    write.write_all(b"+/dev/ttyUSB1\n").await.unwrap();
    assert_eq!("OK", replies.next_line().await.unwrap().unwrap());

    write.write_all(b"+/dev/ttyUSB1\n").await.unwrap();
    assert_eq!("ERROR", replies.next_line().await.unwrap().unwrap());

    write.write_all(b"bogus\n").await.unwrap();
    assert_eq!("ERROR", replies.next_line().await.unwrap().unwrap());

    write.write_all(b"&/dev/ttyUSB1=b562\n").await.unwrap();
    assert_eq!("OK", replies.next_line().await.unwrap().unwrap());

    write.write_all(b"-/dev/ttyUSB0\n?devices\n").await.unwrap();
    assert_eq!("OK", replies.next_line().await.unwrap().unwrap());
    assert_eq!("/dev/ttyUSB1", replies.next_line().await.unwrap().unwrap());
    assert_eq!("OK", replies.next_line().await.unwrap().unwrap());
}

#[test]
fn test_bind_replaces_stale_socket() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stale.sock");

    std::fs::write(&path, b"").unwrap();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let socket = ControlSocket::bind(&path).unwrap();
        assert_eq!(path.as_path(), socket.path());

        drop(socket);
    });

    assert!(!path.exists());
}

#[test]
fn test_bind_missing_directory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("gpsmux.sock");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let result = runtime.block_on(async { ControlSocket::bind(&path) });

    assert!(matches!(result, Err(ControlError::Bind { .. })));
}
