//! End-to-end host/receiver tests over in-memory pipes and loopback TCP.

mod common;

use std::time::Duration;

use common::{
    assert_files_equal, create_temp_dir, create_test_file, random_bytes, wait_until, PipeHost,
};
use ticketshare_core::handshake::{self, Ticket};
use ticketshare_core::protocol::{self, DataChunk, FileInfo, HandshakeResponse, Message};
use ticketshare_core::transfer::{self, ProgressTracker};
use ticketshare_core::{Error, ErrorKind, Host, HostConfig, ReceiveConfig, Receiver};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_receiver_gets_hello_world() {
    let host_dir = create_temp_dir();
    let out_dir = create_temp_dir();
    let source = create_test_file(host_dir.path(), "hello.txt", b"hello world");

    let host = PipeHost::start(HostConfig::new("T1", &source));
    let stream = host.connect("receiver-1", 4096).await;

    let receiver = Receiver::new(ReceiveConfig::new("T1").with_output_dir(out_dir.path()));
    let received = receiver.receive(stream).await.expect("receive");

    assert_eq!(received.path, out_dir.path().join("hello.txt"));
    assert_eq!(std::fs::read(&received.path).unwrap(), b"hello world");
    assert_eq!(received.bytes_received, 11);
    assert!(received.size_matches());

    assert_eq!(host.stop().await, 1);
}

#[tokio::test]
async fn test_wrong_ticket_never_reaches_file_info() {
    let host_dir = create_temp_dir();
    let out_dir = create_temp_dir();
    let source = create_test_file(host_dir.path(), "hello.txt", b"hello world");

    let host = PipeHost::start(HostConfig::new("T1", &source));
    let stream = host.connect("intruder", 4096).await;

    let receiver = Receiver::new(ReceiveConfig::new("WRONG").with_output_dir(out_dir.path()));
    let err = receiver.receive(stream).await.unwrap_err();

    assert!(matches!(err, Error::HandshakeRejected));
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert!(std::fs::read_dir(out_dir.path()).unwrap().next().is_none());
    assert!(host.host.registry().is_empty());

    assert_eq!(host.stop().await, 0);
}

#[tokio::test]
async fn test_host_dropping_mid_transfer_is_connection_lost() {
    let out_dir = create_temp_dir();
    let (receiver_side, mut host_side) = tokio::io::duplex(4096);

    // A host that goes away after the first chunk without sending EOF.
    let fake_host = tokio::spawn(async move {
        let _: Message = protocol::read_message(&mut host_side).await.unwrap();
        protocol::write_message(&mut host_side, &HandshakeResponse::success())
            .await
            .unwrap();
        protocol::write_message(
            &mut host_side,
            &Message::FileInfo(FileInfo {
                filename: "big.bin".to_string(),
                size: 1_000_000,
            }),
        )
        .await
        .unwrap();
        protocol::write_message(
            &mut host_side,
            &Message::Chunk(DataChunk::new(vec![1u8; 1000])),
        )
        .await
        .unwrap();
    });

    let receiver = Receiver::new(ReceiveConfig::new("T1").with_output_dir(out_dir.path()));
    let err = receiver.receive(receiver_side).await.unwrap_err();
    fake_host.await.unwrap();

    assert!(matches!(err, Error::ConnectionLost));
    assert_eq!(err.kind(), ErrorKind::ConnectionLost);

    // The partial file is left for the caller to deal with.
    let partial = out_dir.path().join("big.bin");
    assert_eq!(std::fs::metadata(partial).unwrap().len(), 1000);
}

#[tokio::test]
async fn test_reconstruction_across_chunk_sizes() {
    let host_dir = create_temp_dir();
    let content = random_bytes(10_007);
    let source = create_test_file(host_dir.path(), "random.bin", &content);

    for chunk_size in [1, 1000, 3333, 10_007, 65_536] {
        let out_dir = create_temp_dir();
        let host = PipeHost::start(HostConfig::new("T1", &source).with_chunk_size(chunk_size));
        let stream = host.connect("receiver", 64 * 1024).await;

        let received = Receiver::new(ReceiveConfig::new("T1").with_output_dir(out_dir.path()))
            .receive(stream)
            .await
            .expect("receive");

        assert_eq!(received.bytes_received, content.len() as u64, "chunk size {chunk_size}");
        assert_files_equal(&source, &received.path);
        assert_eq!(host.stop().await, 1);
    }
}

#[tokio::test]
async fn test_zero_byte_file() {
    let host_dir = create_temp_dir();
    let out_dir = create_temp_dir();
    let source = create_test_file(host_dir.path(), "empty.dat", b"");

    let host = PipeHost::start(HostConfig::new("T1", &source));
    let mut stream = host.connect("receiver", 4096).await;

    handshake::initiate(&mut stream, &Ticket::new("T1")).await.unwrap();
    let info = transfer::receive_file_info(&mut stream).await.unwrap();
    assert_eq!(info.size, 0);

    // EOF follows FILE_INFO directly, with no CHUNK in between.
    let next: Message = protocol::read_message(&mut stream).await.unwrap();
    assert_eq!(next, Message::EndOfTransfer);
    drop(stream);

    let stream = host.connect("receiver-2", 4096).await;
    let received = Receiver::new(ReceiveConfig::new("T1").with_output_dir(out_dir.path()))
        .receive(stream)
        .await
        .expect("receive");
    assert_eq!(received.bytes_received, 0);
    assert_eq!(std::fs::metadata(&received.path).unwrap().len(), 0);

    assert_eq!(host.stop().await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_receivers_tracked_in_registry() {
    const RECEIVERS: usize = 5;

    let host_dir = create_temp_dir();
    let content = random_bytes(3 * 1024 * 1024);
    let source = create_test_file(host_dir.path(), "shared.bin", &content);

    let host = PipeHost::start(HostConfig::new("T1", &source).with_chunk_size(64 * 1024));
    let registry = host.host.registry().clone();

    // Small pipes keep every host session blocked mid-stream until its
    // receiver starts reading.
    let mut streams = Vec::new();
    for i in 0..RECEIVERS {
        let mut stream = host.connect(&format!("peer-{i}"), 8 * 1024).await;
        handshake::initiate(&mut stream, &Ticket::new("T1")).await.unwrap();
        streams.push(stream);
    }

    wait_until(WAIT, || registry.len() == RECEIVERS).await;
    for i in 0..RECEIVERS {
        assert!(registry.contains(&format!("peer-{i}")));
    }

    let mut tasks = Vec::new();
    for (i, mut stream) in streams.into_iter().enumerate() {
        let dest = host_dir.path().join(format!("copy-{i}.bin"));
        tasks.push(tokio::spawn(async move {
            let info = transfer::receive_file_info(&mut stream).await?;
            let written =
                transfer::receive_file(&mut stream, &dest, &ProgressTracker::new()).await?;
            Ok::<_, Error>((info, written, dest))
        }));
    }

    for task in tasks {
        let (info, written, dest) = task.await.unwrap().expect("receive");
        assert_eq!(info.filename, "shared.bin");
        assert_eq!(written.bytes_written, content.len() as u64);
        assert_files_equal(&source, &dest);
    }

    wait_until(WAIT, || registry.is_empty()).await;
    assert_eq!(host.stop().await, RECEIVERS);
}

#[tokio::test]
async fn test_failed_session_does_not_affect_others() {
    let host_dir = create_temp_dir();
    let out_dir = create_temp_dir();
    let source = create_test_file(host_dir.path(), "doc.txt", b"shared content");

    let host = PipeHost::start(HostConfig::new("T1", &source));

    // Garbage instead of a handshake request.
    let mut bad = host.connect("garbage", 4096).await;
    protocol::write_frame(&mut bad, b"not json").await.unwrap();
    assert!(protocol::read_frame(&mut bad).await.is_err());

    let good = host.connect("good", 4096).await;
    let received = Receiver::new(ReceiveConfig::new("T1").with_output_dir(out_dir.path()))
        .receive(good)
        .await
        .expect("receive");
    assert_eq!(std::fs::read(&received.path).unwrap(), b"shared content");

    assert_eq!(host.stop().await, 1);
}

#[tokio::test]
async fn test_progress_reaches_full_size() {
    let host_dir = create_temp_dir();
    let out_dir = create_temp_dir();
    let content = random_bytes(200_000);
    let source = create_test_file(host_dir.path(), "progress.bin", &content);

    let host = PipeHost::start(HostConfig::new("T1", &source).with_chunk_size(10_000));
    let stream = host.connect("watcher", 16 * 1024).await;

    let receiver = Receiver::new(ReceiveConfig::new("T1").with_output_dir(out_dir.path()));
    let progress = receiver.progress();
    receiver.receive(stream).await.expect("receive");

    let last = progress.borrow().clone();
    assert_eq!(last.file_name, "progress.bin");
    assert_eq!(last.total_bytes, 200_000);
    assert_eq!(last.bytes_transferred, 200_000);
    assert!((last.percentage() - 100.0).abs() < f64::EPSILON);

    host.stop().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_host_read_failure_is_connection_lost() {
    let host_dir = create_temp_dir();
    let out_dir = create_temp_dir();
    let source = create_test_file(host_dir.path(), "vanishing.txt", b"was a file");

    let host = PipeHost::start(HostConfig::new("T1", &source));

    // Still opens after the swap, but every read fails.
    std::fs::remove_file(&source).unwrap();
    std::fs::create_dir(&source).unwrap();

    let stream = host.connect("reader", 4096).await;
    let err = Receiver::new(ReceiveConfig::new("T1").with_output_dir(out_dir.path()))
        .receive(stream)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ConnectionLost));
    let partial = out_dir.path().join("vanishing.txt");
    assert_eq!(std::fs::metadata(&partial).unwrap().len(), 0);

    wait_until(WAIT, || host.host.registry().is_empty()).await;
    assert_eq!(host.stop().await, 0);
}

#[tokio::test]
async fn test_stalled_receiver_does_not_block_shutdown() {
    let host_dir = create_temp_dir();
    let source = create_test_file(host_dir.path(), "large.bin", &random_bytes(4 * 1024 * 1024));

    let host = PipeHost::start(
        HostConfig::new("T1", &source)
            .with_chunk_size(64 * 1024)
            .with_drain_timeout(Some(Duration::from_millis(300))),
    );
    let mut stream = host.connect("stalled", 8 * 1024).await;
    handshake::initiate(&mut stream, &Ticket::new("T1"))
        .await
        .expect("handshake");
    transfer::receive_file_info(&mut stream)
        .await
        .expect("file info");
    assert!(host.host.registry().contains("stalled"));

    // Never read again.
    let registry = host.host.registry().clone();
    let completed = tokio::time::timeout(Duration::from_secs(3), host.stop())
        .await
        .expect("host did not stop");

    assert_eq!(completed, 0);
    assert!(registry.is_empty());
    drop(stream);
}

async fn tcp_host(
    config: HostConfig,
) -> (
    Host,
    std::net::SocketAddr,
    CancellationToken,
    tokio::task::JoinHandle<usize>,
) {
    let host = Host::new(config).expect("host");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();

    let task = {
        let host = host.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { host.serve(listener, shutdown).await })
    };

    (host, addr, shutdown, task)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tcp_concurrent_receivers() {
    const RECEIVERS: usize = 4;

    let host_dir = create_temp_dir();
    let content = random_bytes(512 * 1024);
    let source = create_test_file(host_dir.path(), "tcp.bin", &content);

    let (host, addr, shutdown, task) = tcp_host(HostConfig::new("T1", &source)).await;

    let mut receivers = Vec::new();
    for _ in 0..RECEIVERS {
        let out_dir = create_temp_dir();
        receivers.push(tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.expect("connect");
            let received = Receiver::new(ReceiveConfig::new("T1").with_output_dir(out_dir.path()))
                .receive(stream)
                .await
                .expect("receive");
            let bytes = std::fs::read(&received.path).unwrap();
            (received, bytes)
        }));
    }

    let mut digests = Vec::new();
    for receiver in receivers {
        let (received, bytes) = receiver.await.unwrap();
        assert_eq!(bytes, content);
        digests.push(received.sha256);
    }
    assert!(digests.windows(2).all(|pair| pair[0] == pair[1]));

    wait_until(WAIT, || host.registry().is_empty()).await;
    shutdown.cancel();
    assert_eq!(task.await.unwrap(), RECEIVERS);
}

#[tokio::test]
async fn test_tcp_silent_client_does_not_block_accept() {
    let host_dir = create_temp_dir();
    let out_dir = create_temp_dir();
    let source = create_test_file(host_dir.path(), "file.txt", b"still served");

    let (host, addr, shutdown, task) = tcp_host(
        HostConfig::new("T1", &source).with_handshake_timeout(Some(Duration::from_secs(1))),
    )
    .await;

    let silent = TcpStream::connect(addr).await.expect("connect");

    let stream = TcpStream::connect(addr).await.expect("connect");
    let received = Receiver::new(ReceiveConfig::new("T1").with_output_dir(out_dir.path()))
        .receive(stream)
        .await
        .expect("receive");
    assert_eq!(std::fs::read(&received.path).unwrap(), b"still served");

    // The silent client is stuck in the handshake and is never registered.
    wait_until(WAIT, || host.registry().is_empty()).await;
    drop(silent);

    shutdown.cancel();
    assert_eq!(task.await.unwrap(), 1);
}

#[tokio::test]
async fn test_tcp_single_transfer_host_stops_on_its_own() {
    let host_dir = create_temp_dir();
    let out_dir = create_temp_dir();
    let source = create_test_file(host_dir.path(), "once.txt", b"one time only");

    let (_host, addr, _shutdown, task) =
        tcp_host(HostConfig::new("T1", &source).with_max_transfers(Some(1))).await;

    // A rejected receiver does not count towards the limit.
    let rejected = Receiver::new(ReceiveConfig::new("nope").with_output_dir(out_dir.path()))
        .receive(TcpStream::connect(addr).await.expect("connect"))
        .await;
    assert!(matches!(rejected, Err(Error::HandshakeRejected)));

    let received = Receiver::new(ReceiveConfig::new("T1").with_output_dir(out_dir.path()))
        .receive(TcpStream::connect(addr).await.expect("connect"))
        .await
        .expect("receive");
    assert!(received.size_matches());

    let completed = tokio::time::timeout(WAIT, task)
        .await
        .expect("host should stop after one transfer")
        .unwrap();
    assert_eq!(completed, 1);
}
