//! End-to-end tests: a real relay on 127.0.0.1:0 in front of an in-test
//! upstream listener.

use std::net::SocketAddr;
use std::time::Duration;

use aqw_bridge::policy::POLICY_RESPONSE;
use aqw_bridge::{RelayConfig, RelayServer, RelayState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn upstream() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

async fn relay_to(target: SocketAddr) -> (RelayServer, SocketAddr) {
    let config = RelayConfig::new(0, target.ip().to_string(), target.port()).unwrap();
    let mut relay = RelayServer::new(config);
    let addr = relay.start().await.unwrap();
    (relay, addr)
}

async fn accept(listener: &TcpListener) -> TcpStream {
    timeout(WAIT, listener.accept())
        .await
        .expect("upstream never saw a connection")
        .unwrap()
        .0
}

async fn read_n(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    timeout(WAIT, stream.read_exact(&mut buf))
        .await
        .expect("timed out reading")
        .unwrap();
    buf
}

/// Wait for the peer to close; a reset counts as closed too
async fn expect_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 64];
    match timeout(WAIT, stream.read(&mut buf))
        .await
        .expect("connection was not closed")
    {
        Ok(0) | Err(_) => {}
        Ok(n) => panic!("expected close, got {n} bytes: {:?}", &buf[..n]),
    }
}

#[tokio::test]
async fn connect_succeeds_after_start() {
    let (_upstream, target) = upstream().await;
    let (mut relay, addr) = relay_to(target).await;

    assert_eq!(relay.state(), RelayState::Running);
    TcpStream::connect(addr).await.unwrap();

    relay.stop().await;
}

#[tokio::test]
async fn policy_request_is_answered_locally() {
    let (upstream, target) = upstream().await;
    let (mut relay, addr) = relay_to(target).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"<policy-file-request/>\0").await.unwrap();

    let mut received = Vec::new();
    timeout(WAIT, client.read_to_end(&mut received))
        .await
        .expect("relay did not close after policy response")
        .unwrap();
    assert_eq!(received, POLICY_RESPONSE);

    // No upstream connection was opened for the policy request.
    assert!(
        timeout(Duration::from_millis(200), upstream.accept())
            .await
            .is_err()
    );

    relay.stop().await;
}

#[tokio::test]
async fn policy_request_with_control_bytes_is_answered() {
    let (_upstream, target) = upstream().await;
    let (mut relay, addr) = relay_to(target).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"\x00\r\n<policy-file-request/>\x00")
        .await
        .unwrap();

    let mut received = Vec::new();
    timeout(WAIT, client.read_to_end(&mut received))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, POLICY_RESPONSE);
    assert_eq!(received.last(), Some(&0u8));

    relay.stop().await;
}

#[tokio::test]
async fn first_chunk_reaches_upstream_unmodified() {
    let (upstream, target) = upstream().await;
    let (mut relay, addr) = relay_to(target).await;

    let handshake = b"<msg t='sys'><body action='verChk' r='0'><ver v='157' /></body></msg>\0";
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(handshake).await.unwrap();

    let mut server = accept(&upstream).await;
    assert_eq!(read_n(&mut server, handshake.len()).await, handshake);

    relay.stop().await;
}

#[tokio::test]
async fn relays_both_directions_in_order() {
    let (upstream, target) = upstream().await;
    let (mut relay, addr) = relay_to(target).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"PING").await.unwrap();
    let mut server = accept(&upstream).await;
    client.write_all(b"PONG").await.unwrap();

    assert_eq!(read_n(&mut server, 8).await, b"PINGPONG");

    server.write_all(b"HELLO").await.unwrap();
    server.write_all(b" WORLD").await.unwrap();
    assert_eq!(read_n(&mut client, 11).await, b"HELLO WORLD");

    relay.stop().await;
}

#[tokio::test]
async fn large_payload_past_first_read_is_intact() {
    let (upstream, target) = upstream().await;
    let (mut relay, addr) = relay_to(target).await;

    let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
    let mut client = TcpStream::connect(addr).await.unwrap();

    let writer = {
        let payload = payload.clone();
        tokio::spawn(async move {
            client.write_all(&payload).await.unwrap();
            client
        })
    };

    let mut server = accept(&upstream).await;
    assert_eq!(read_n(&mut server, payload.len()).await, payload);
    writer.await.unwrap();

    relay.stop().await;
}

#[tokio::test]
async fn silent_client_does_not_hold_up_later_sessions() {
    let (upstream, target) = upstream().await;
    let (mut relay, addr) = relay_to(target).await;

    // Connected but never sends a byte, so its session waits on the first read.
    let _silent = TcpStream::connect(addr).await.unwrap();

    let mut policy = TcpStream::connect(addr).await.unwrap();
    policy.write_all(b"<policy-file-request/>\0").await.unwrap();
    let mut received = Vec::new();
    timeout(WAIT, policy.read_to_end(&mut received))
        .await
        .expect("policy request stalled behind a silent client")
        .unwrap();
    assert_eq!(received, POLICY_RESPONSE);

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"game").await.unwrap();
    let mut server = accept(&upstream).await;
    assert_eq!(read_n(&mut server, 4).await, b"game");

    relay.stop().await;
}

#[tokio::test]
#[allow(deprecated)]
async fn upstream_reset_closes_client() {
    let (upstream, target) = upstream().await;
    let (mut relay, addr) = relay_to(target).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"hi").await.unwrap();
    let server = {
        let mut server = accept(&upstream).await;
        assert_eq!(read_n(&mut server, 2).await, b"hi");
        server
    };

    // Zero linger turns the close into an RST instead of a FIN.
    server.set_linger(Some(Duration::ZERO)).unwrap();
    drop(server);

    expect_closed(&mut client).await;

    // The listener is unaffected by the failed session.
    let mut next = TcpStream::connect(addr).await.unwrap();
    next.write_all(b"next").await.unwrap();
    let mut next_server = accept(&upstream).await;
    assert_eq!(read_n(&mut next_server, 4).await, b"next");

    relay.stop().await;
}

#[tokio::test]
async fn unreachable_upstream_closes_client() {
    let (closed, target) = upstream().await;
    drop(closed);
    let (mut relay, addr) = relay_to(target).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"hello").await.unwrap();
    expect_closed(&mut client).await;

    relay.stop().await;
}

#[tokio::test]
async fn client_close_reaches_upstream_without_disturbing_others() {
    let (upstream, target) = upstream().await;
    let (mut relay, addr) = relay_to(target).await;

    let mut first = TcpStream::connect(addr).await.unwrap();
    first.write_all(b"one").await.unwrap();
    let mut first_server = accept(&upstream).await;
    assert_eq!(read_n(&mut first_server, 3).await, b"one");

    let mut second = TcpStream::connect(addr).await.unwrap();
    second.write_all(b"two").await.unwrap();
    let mut second_server = accept(&upstream).await;
    assert_eq!(read_n(&mut second_server, 3).await, b"two");

    drop(first);
    expect_closed(&mut first_server).await;

    second.write_all(b"still here").await.unwrap();
    assert_eq!(read_n(&mut second_server, 10).await, b"still here");
    second_server.write_all(b"ack").await.unwrap();
    assert_eq!(read_n(&mut second, 3).await, b"ack");

    // The listener keeps accepting.
    let mut third = TcpStream::connect(addr).await.unwrap();
    third.write_all(b"three").await.unwrap();
    let mut third_server = accept(&upstream).await;
    assert_eq!(read_n(&mut third_server, 5).await, b"three");

    relay.stop().await;
}

#[tokio::test]
async fn upstream_close_reaches_client() {
    let (upstream, target) = upstream().await;
    let (mut relay, addr) = relay_to(target).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"hi").await.unwrap();
    let mut server = accept(&upstream).await;
    assert_eq!(read_n(&mut server, 2).await, b"hi");

    server.write_all(b"bye").await.unwrap();
    drop(server);

    assert_eq!(read_n(&mut client, 3).await, b"bye");
    expect_closed(&mut client).await;

    relay.stop().await;
}

#[tokio::test]
async fn stop_refuses_new_connections_but_keeps_sessions() {
    let (upstream, target) = upstream().await;
    let (mut relay, addr) = relay_to(target).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"before").await.unwrap();
    let mut server = accept(&upstream).await;
    assert_eq!(read_n(&mut server, 6).await, b"before");

    relay.stop().await;
    assert_eq!(relay.state(), RelayState::Stopped);
    assert!(TcpStream::connect(addr).await.is_err());

    client.write_all(b"after").await.unwrap();
    assert_eq!(read_n(&mut server, 5).await, b"after");
    server.write_all(b"reply").await.unwrap();
    assert_eq!(read_n(&mut client, 5).await, b"reply");
}

#[tokio::test]
async fn stop_is_idempotent() {
    let (_upstream, target) = upstream().await;

    let config = RelayConfig::new(0, target.ip().to_string(), target.port()).unwrap();
    let mut relay = RelayServer::new(config);
    relay.stop().await;
    assert_eq!(relay.state(), RelayState::Created);

    relay.start().await.unwrap();
    relay.stop().await;
    relay.stop().await;
    assert_eq!(relay.state(), RelayState::Stopped);
}

#[tokio::test]
async fn start_helper_returns_running_relay() {
    let (_upstream, target) = upstream().await;
    let config = RelayConfig::new(0, target.ip().to_string(), target.port()).unwrap();

    let mut relay = aqw_bridge::start(config).await.unwrap();
    let addr = relay.local_addr().unwrap();
    TcpStream::connect(addr).await.unwrap();
    relay.stop().await;
}
