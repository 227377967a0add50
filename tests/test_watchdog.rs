use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};
use triserve::server::pool::TaskHandle;
use triserve::server::watchdog::{PendingTask, Watchdog};

fn socket_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).unwrap();
    let (server_side, _) = listener.accept().unwrap();
    (server_side, client)
}

#[test]
fn test_watchdog_fires_503_on_expired_deadline() {
    let watchdog = Watchdog::new();
    let (server_side, mut client) = socket_pair();
    let handle = TaskHandle::new();

    watchdog.watch(PendingTask {
        deadline: Instant::now(),
        handle: handle.clone(),
        stream: server_side,
    });

    client
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let mut response = String::new();
    client.read_to_string(&mut response).unwrap();

    assert!(response.contains("503 Service Unavailable"));
    assert!(handle.is_cancelled());
    assert!(handle.is_done());

    watchdog.shutdown();
}

#[test]
fn test_watchdog_is_noop_when_handler_won_the_claim() {
    let watchdog = Watchdog::new();
    let (server_side, mut client) = socket_pair();
    let handle = TaskHandle::new();

    // Handler finished first
    assert!(handle.try_claim());

    watchdog.watch(PendingTask {
        deadline: Instant::now() + Duration::from_millis(50),
        handle: handle.clone(),
        stream: server_side,
    });

    client
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let mut response = String::new();
    client.read_to_string(&mut response).unwrap();

    assert!(response.is_empty());
    assert!(!handle.is_cancelled());

    watchdog.shutdown();
}

#[test]
fn test_watchdog_tolerates_peer_already_gone() {
    let watchdog = Watchdog::new();
    let (server_side, client) = socket_pair();
    drop(client);

    let handle = TaskHandle::new();
    watchdog.watch(PendingTask {
        deadline: Instant::now(),
        handle: handle.clone(),
        stream: server_side,
    });

    std::thread::sleep(Duration::from_millis(200));
    assert!(handle.is_done());
    assert!(handle.is_cancelled());

    watchdog.shutdown();
}

#[test]
fn test_watchdog_fires_entries_in_accept_order() {
    let watchdog = Watchdog::new();
    let now = Instant::now();
    let mut clients = Vec::new();

    for i in 0..3 {
        let (server_side, client) = socket_pair();
        clients.push(client);
        watchdog.watch(PendingTask {
            deadline: now + Duration::from_millis(50 * i),
            handle: TaskHandle::new(),
            stream: server_side,
        });
    }

    for mut client in clients {
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut response = String::new();
        client.read_to_string(&mut response).unwrap();
        assert!(response.contains("503"));
    }

    watchdog.shutdown();
}
