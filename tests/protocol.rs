//! End-to-end protocol traces against a real loopback socket: drive the scripted byte exchange
//! over a live `TcpStream` and assert on the wire bytes received. Covers the seed scenarios of
//! the protocol's testable properties.

use std::net::SocketAddr;
use std::time::Duration;

use robot_server::server::Server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

const TERM: &[u8] = b"\x07\x08";

async fn start_server() -> SocketAddr {
    let port = portpicker::pick_unused_port().expect("a free loopback port");
    let server = Server::bind(SocketAddr::from(([127, 0, 0, 1], port))).await.expect("bind loopback");
    let addr = server.local_addr();
    let (_tx, rx) = broadcast::channel(1);
    tokio::spawn(server.run(rx));
    addr
}

/// Reads bytes until the terminator appears, and returns the message without it.
async fn read_message(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 256];
    loop {
        if let Some(pos) = buf.windows(TERM.len()).position(|w| w == TERM) {
            buf.truncate(pos);
            return buf;
        }
        let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut chunk))
            .await
            .expect("response arrives before the test timeout")
            .expect("read succeeds");
        assert_ne!(n, 0, "peer closed before sending a terminator");
        buf.extend_from_slice(&chunk[..n]);
    }
}

async fn send(stream: &mut TcpStream, body: &[u8]) {
    stream.write_all(body).await.unwrap();
    stream.write_all(TERM).await.unwrap();
}

/// Runs the shared-secret handshake ("Oompa Loompa", key 0) and returns the connected stream
/// positioned right after the server's first `102 MOVE`.
async fn handshake(stream: &mut TcpStream) {
    send(stream, b"Oompa Loompa").await;
    assert_eq!(read_message(stream).await, b"107 KEY REQUEST");

    send(stream, b"0").await;
    assert_eq!(read_message(stream).await, b"64907");

    send(stream, b"8389").await;
    assert_eq!(read_message(stream).await, b"200 OK");
    assert_eq!(read_message(stream).await, b"102 MOVE");
}

#[tokio::test]
async fn happy_path_reaches_logout() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    handshake(&mut stream).await;

    send(&mut stream, b"OK 0 -1").await;
    assert_eq!(read_message(&mut stream).await, b"102 MOVE");

    send(&mut stream, b"OK 0 0").await;
    assert_eq!(read_message(&mut stream).await, b"105 GET MESSAGE");

    send(&mut stream, b"Tajny vzkaz.").await;
    assert_eq!(read_message(&mut stream).await, b"106 LOGOUT");

    // The server closes after LOGOUT: the next read observes EOF.
    let mut trailing = [0u8; 1];
    assert_eq!(stream.read(&mut trailing).await.unwrap(), 0);
}

#[tokio::test]
async fn detour_around_an_obstacle() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    handshake(&mut stream).await;

    let expected = [
        (b"OK -1 -1".as_slice(), b"102 MOVE".as_slice()),
        (b"OK -1 -1", b"104 TURN RIGHT"),
        (b"OK -1 -1", b"102 MOVE"),
        (b"OK 0 -1", b"103 TURN LEFT"),
        (b"OK 0 -1", b"102 MOVE"),
        (b"OK 0 0", b"105 GET MESSAGE"),
    ];
    for (input, response) in expected {
        send(&mut stream, input).await;
        assert_eq!(read_message(&mut stream).await, response);
    }

    send(&mut stream, b"a message").await;
    assert_eq!(read_message(&mut stream).await, b"106 LOGOUT");
}

#[tokio::test]
async fn recharging_is_transparent_to_navigation() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    handshake(&mut stream).await;

    send(&mut stream, b"OK 0 -2").await;
    assert_eq!(read_message(&mut stream).await, b"102 MOVE");

    send(&mut stream, b"RECHARGING").await;
    // No reply to RECHARGING itself.
    tokio::time::sleep(Duration::from_millis(100)).await;

    send(&mut stream, b"FULL POWER").await;
    // No reply to FULL POWER either; the session simply resumes its prior phase.

    send(&mut stream, b"OK 0 -1").await;
    assert_eq!(read_message(&mut stream).await, b"102 MOVE");

    send(&mut stream, b"OK 0 0").await;
    assert_eq!(read_message(&mut stream).await, b"105 GET MESSAGE");

    send(&mut stream, b"message").await;
    assert_eq!(read_message(&mut stream).await, b"106 LOGOUT");
}

#[tokio::test]
async fn logic_error_for_anything_but_full_power_while_recharging() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    handshake(&mut stream).await;

    send(&mut stream, b"OK 0 -2").await;
    assert_eq!(read_message(&mut stream).await, b"102 MOVE");

    send(&mut stream, b"RECHARGING").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    send(&mut stream, b"OK 0 -1").await;
    assert_eq!(read_message(&mut stream).await, b"302 LOGIC ERROR");

    let mut trailing = [0u8; 1];
    assert_eq!(stream.read(&mut trailing).await.unwrap(), 0);
}

#[tokio::test]
async fn key_out_of_range_is_rejected() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    send(&mut stream, b"Oompa Loompa").await;
    assert_eq!(read_message(&mut stream).await, b"107 KEY REQUEST");

    send(&mut stream, b"10").await;
    assert_eq!(read_message(&mut stream).await, b"303 KEY OUT OF RANGE");

    let mut trailing = [0u8; 1];
    assert_eq!(stream.read(&mut trailing).await.unwrap(), 0);
}

#[tokio::test]
async fn empty_first_message_is_a_syntax_error() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(TERM).await.unwrap();
    assert_eq!(read_message(&mut stream).await, b"301 SYNTAX ERROR");

    let mut trailing = [0u8; 1];
    assert_eq!(stream.read(&mut trailing).await.unwrap(), 0);
}

#[tokio::test]
async fn wrong_confirmation_is_login_failed() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    send(&mut stream, b"Oompa Loompa").await;
    assert_eq!(read_message(&mut stream).await, b"107 KEY REQUEST");

    send(&mut stream, b"0").await;
    assert_eq!(read_message(&mut stream).await, b"64907");

    send(&mut stream, b"1").await;
    assert_eq!(read_message(&mut stream).await, b"300 LOGIN FAILED");
}

#[tokio::test]
async fn split_terminator_arriving_over_long_overflows() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    handshake(&mut stream).await;

    // Each piece arrives without a terminator; by the last one the buffer has long since
    // exceeded OK's 10-byte bound, even though a trailing `\x07` could look like a partial
    // terminator if tested naively.
    for piece in [b"OK ".as_slice(), b"4 ", b"4 ", b"2124124 "] {
        stream.write_all(piece).await.unwrap();
    }
    assert_eq!(read_message(&mut stream).await, b"301 SYNTAX ERROR");

    let mut trailing = [0u8; 1];
    assert_eq!(stream.read(&mut trailing).await.unwrap(), 0);
}

#[tokio::test]
async fn idle_client_is_disconnected_after_the_read_timeout() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // Sends nothing; the 1s per-phase timeout should close the connection without a reply.
    let mut trailing = [0u8; 1];
    let n = tokio::time::timeout(Duration::from_secs(3), stream.read(&mut trailing))
        .await
        .expect("server disconnects within TIMEOUT + epsilon")
        .expect("read succeeds");
    assert_eq!(n, 0);
}
