//! Event-loop server variant: one reactor thread that never blocks.
//!
//! Same routes and same externally observable deadlines as the thread-based
//! servers, but timeouts are competing timers on the reactor's clock and the
//! compute workload is offloaded to the runtime's blocking pool.

use crate::config::Config;
use crate::http::parser::{ParseError, parse_request};
use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::routes::{self, ComputePayload, ErrorPayload, SuccessPayload, Workload};
use crate::server::REQUEST_DEADLINE;
use crate::workload;
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info};

/// Handle to a running event-loop server.
///
/// The reactor runs a current-thread runtime on its own background thread;
/// dropping the handle stops it.
pub struct ReactiveServer {
    shutdown: Arc<Notify>,
    reactor_thread: Option<thread::JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl ReactiveServer {
    /// Binds the listening socket and spins up the reactor thread.
    pub fn start(config: &Config) -> anyhow::Result<ReactiveServer> {
        let addr = config.addr();
        // Bind synchronously so a taken port fails startup, not the reactor
        let listener = std::net::TcpListener::bind(&addr)
            .with_context(|| format!("failed to bind {addr}"))?;
        listener
            .set_nonblocking(true)
            .context("failed to set listener non-blocking")?;
        let local_addr = listener.local_addr().context("listener has no local addr")?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to build reactor runtime")?;

        let shutdown = Arc::new(Notify::new());
        let reactor_thread = {
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("reactor".to_string())
                .spawn(move || {
                    runtime.block_on(run(listener, shutdown));
                })
                .context("failed to spawn reactor thread")?
        };

        info!("Reactive server listening on {local_addr}");
        Ok(ReactiveServer {
            shutdown,
            reactor_thread: Some(reactor_thread),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops the reactor. In-flight request tasks are abandoned with the
    /// runtime; best effort, matching the thread-based shutdown contract.
    pub fn stop(&mut self) {
        let Some(handle) = self.reactor_thread.take() else {
            return;
        };
        self.shutdown.notify_one();
        let _ = handle.join();
        info!("Reactive server stopped");
    }
}

impl Drop for ReactiveServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(listener: std::net::TcpListener, shutdown: Arc<Notify>) {
    let listener = match TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to register listener with reactor: {e}");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!("Reactor shutting down gracefully");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_connection(stream, peer));
                }
                Err(e) => error!("Failed to accept connection: {e}"),
            }
        }
    }
}

enum ReadError {
    Parse(ParseError),
    Io(std::io::Error),
}

async fn handle_connection(mut stream: TcpStream, peer: SocketAddr) {
    let request = match timeout(REQUEST_DEADLINE, read_request(&mut stream)).await {
        Ok(Ok(request)) => request,
        Ok(Err(ReadError::Parse(e))) => {
            error!("Unable to parse request from {peer}: {e}");
            return;
        }
        Ok(Err(ReadError::Io(e))) => {
            error!("Connection error from {peer}: {e}");
            return;
        }
        Err(_) => {
            error!("Read timed out for client {peer}");
            write_response(
                &mut stream,
                &Response::json(
                    StatusCode::ServiceUnavailable,
                    &ErrorPayload::new(503, "service unavailable"),
                ),
                peer,
            )
            .await;
            return;
        }
    };

    debug!("{} {} from {peer}", request.method, request.target);
    let response = match routes::route(&request.target) {
        Some(Workload::NoOp) => {
            info!("Simple HTTP request received");
            Response::json(StatusCode::Ok, &SuccessPayload::new())
        }
        Some(Workload::IoDelay) => io_delay_response().await,
        Some(Workload::Compute) => compute_response().await,
        None => {
            info!("Invalid request target: {}", request.target);
            Response::json(StatusCode::NotFound, &ErrorPayload::new(404, "not found"))
        }
    };

    write_response(&mut stream, &response, peer).await;
}

/// Two competing timers on the reactor clock: the 500 ms success timer
/// against the deadline timer. Whichever fires first wins and the loser is
/// dropped, so exactly one response is ever produced.
async fn io_delay_response() -> Response {
    tokio::select! {
        _ = sleep(workload::IO_DELAY) => {
            info!("IO task successfully completed");
            Response::json(StatusCode::Ok, &SuccessPayload::new())
        }
        _ = sleep(REQUEST_DEADLINE) => {
            error!("IO task missed its deadline");
            Response::json(
                StatusCode::InternalServerError,
                &ErrorPayload::new(500, "internal server error"),
            )
        }
    }
}

/// Offloads the prime count so the reactor thread never stalls, with the
/// same budget the thread-based watchdog enforces.
async fn compute_response() -> Response {
    let offload = tokio::task::spawn_blocking(|| workload::count_primes(workload::COMPUTE_LIMIT));
    match timeout(REQUEST_DEADLINE, offload).await {
        Ok(Ok(primes)) => {
            info!("Compute task result: {primes}");
            Response::json(StatusCode::Ok, &ComputePayload::new(primes))
        }
        Ok(Err(e)) => {
            error!("Compute offload failed: {e}");
            Response::json(
                StatusCode::InternalServerError,
                &ErrorPayload::new(500, "internal server error"),
            )
        }
        Err(_) => {
            error!("Compute task missed its deadline");
            Response::json(
                StatusCode::InternalServerError,
                &ErrorPayload::new(500, "internal server error"),
            )
        }
    }
}

async fn read_request(stream: &mut TcpStream) -> Result<Request, ReadError> {
    let mut buffer = Vec::with_capacity(4096);
    loop {
        match parse_request(&buffer) {
            Ok((request, _consumed)) => return Ok(request),
            Err(ParseError::Incomplete) => {}
            Err(e) => return Err(ReadError::Parse(e)),
        }

        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await.map_err(ReadError::Io)?;

        if n == 0 {
            let reason = if buffer.is_empty() {
                ParseError::EmptyRequestLine
            } else {
                ParseError::TruncatedBody
            };
            return Err(ReadError::Parse(reason));
        }

        buffer.extend_from_slice(&chunk[..n]);
    }
}

async fn write_response(stream: &mut TcpStream, response: &Response, peer: SocketAddr) {
    if let Err(e) = stream.write_all(&response.to_bytes()).await {
        error!("Failed to write response to {peer}: {e}");
    }
}
