use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};
use triserve::config::{Config, Mode};
use triserve::server::reactive::ReactiveServer;

const SUCCESS_BODY: &str = r#"{"status":200,"message":"success"}"#;

fn start_server() -> ReactiveServer {
    let cfg = Config {
        mode: Mode::Reactive,
        host: "127.0.0.1".to_string(),
        port: 0,
        workers: 0,
        queue_depth: 0,
    };
    ReactiveServer::start(&cfg).expect("server should start")
}

fn send_request(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).expect("connect failed");
    write!(stream, "GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
    stream.flush().unwrap();

    let mut response = String::new();
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    stream.read_to_string(&mut response).expect("read failed");
    response
}

#[test]
fn test_root_endpoint_returns_canned_body() {
    let mut server = start_server();

    let response = send_request(server.local_addr(), "/");

    assert!(response.contains("200 OK"), "got: {response}");
    assert!(response.ends_with(SUCCESS_BODY), "got: {response}");
    server.stop();
}

#[test]
fn test_unknown_path_returns_404() {
    let mut server = start_server();

    let response = send_request(server.local_addr(), "/invalid");

    assert!(response.contains("404 Not Found"), "got: {response}");
    server.stop();
}

#[test]
fn test_io_endpoint_completes_within_latency_window() {
    let mut server = start_server();

    let start = Instant::now();
    let response = send_request(server.local_addr(), "/io");
    let elapsed = start.elapsed();

    assert!(response.contains("200 OK"), "got: {response}");
    assert!(elapsed >= Duration::from_millis(500), "too fast: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "too slow: {elapsed:?}");
    server.stop();
}

#[test]
fn test_compute_endpoint_returns_prime_count() {
    let mut server = start_server();

    let response = send_request(server.local_addr(), "/compute");

    assert!(response.contains("200 OK"), "got: {response}");
    assert!(response.contains("\"primes\":9592"), "got: {response}");
    server.stop();
}

#[test]
fn test_compute_does_not_stall_other_connections() {
    let mut server = start_server();
    let addr = server.local_addr();

    let compute = std::thread::spawn(move || send_request(addr, "/compute"));
    // The reactor must keep serving while the offload runs
    let response = send_request(addr, "/");
    assert!(response.contains("200 OK"), "got: {response}");

    let compute_response = compute.join().unwrap();
    assert!(compute_response.contains("200 OK"), "got: {compute_response}");
    server.stop();
}

#[test]
fn test_stalled_request_gets_503_at_the_deadline() {
    let mut server = start_server();

    let mut stream = TcpStream::connect(server.local_addr()).unwrap();
    stream.write_all(b"GET /io HTTP/1.1\r\n").unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(8)))
        .unwrap();

    let start = Instant::now();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    let elapsed = start.elapsed();

    assert!(response.contains("503"), "got: {response}");
    assert!(elapsed >= Duration::from_millis(2500), "fired early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(6), "fired late: {elapsed:?}");
    server.stop();
}

#[test]
fn test_truncated_body_does_not_hang() {
    let mut server = start_server();

    let mut stream = TcpStream::connect(server.local_addr()).unwrap();
    stream
        .write_all(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello")
        .unwrap();
    stream.shutdown(std::net::Shutdown::Write).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();

    let start = Instant::now();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();

    assert!(response.is_empty(), "got: {response}");
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "server hung on truncated body"
    );

    // A well-formed request still succeeds afterwards
    let follow_up = send_request(server.local_addr(), "/");
    assert!(follow_up.contains("200 OK"), "got: {follow_up}");
    server.stop();
}

#[test]
fn test_stop_releases_the_port() {
    let mut server = start_server();
    let addr = server.local_addr();

    let response = send_request(addr, "/");
    assert!(response.contains("200 OK"));

    server.stop();

    let refused = TcpStream::connect(addr);
    assert!(refused.is_err(), "port still accepting after stop");
}
