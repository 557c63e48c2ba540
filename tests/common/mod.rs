#![allow(dead_code)]

use ember_web::limits::{ConnLimits, ServerLimits};
use ember_web::Server;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

/// Picks a currently-free ephemeral port.
pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Starts a configured server on a background thread and waits until its
/// listener accepts connections.
pub fn start_server(configure: impl FnOnce(&Server)) -> u16 {
    start_server_with_limits(ServerLimits::default(), ConnLimits::default(), configure)
}

pub fn start_server_with_limits(
    server_limits: ServerLimits,
    conn_limits: ConnLimits,
    configure: impl FnOnce(&Server),
) -> u16 {
    let port = free_port();
    let server = Server::with_limits(server_limits, conn_limits);
    configure(&server);

    thread::spawn(move || {
        let _ = server.run(port);
    });

    wait_ready(port);
    port
}

pub fn connect(port: u16) -> TcpStream {
    let stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream
}

fn wait_ready(port: u16) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        if Instant::now() > deadline {
            panic!("server did not come up on port {port}");
        }
        thread::sleep(Duration::from_millis(10));
    }
}

/// One-shot exchange on a fresh connection; the response must be
/// close-delimited (error pages, `Connection: close` transactions).
pub fn roundtrip(port: u16, request: &[u8]) -> String {
    let mut stream = connect(port);
    stream.write_all(request).unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

/// Reads exactly one response from a (possibly keep-alive) connection.
/// Returns the header block and the body.
pub fn read_response(stream: &mut TcpStream) -> (String, Vec<u8>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut chunk).unwrap();
        assert!(n > 0, "connection closed before a full response head");
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().unwrap())
        })
        .unwrap_or(0);

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).unwrap();
        assert!(n > 0, "connection closed before a full response body");
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    (head, body)
}

pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
