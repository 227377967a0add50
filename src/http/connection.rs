use crate::http::parser::{ParseError, parse_request};
use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::routes::{self, ComputePayload, ErrorPayload, SuccessPayload, Workload};
use crate::server::pool::TaskHandle;
use crate::server::send_overflow_response;
use crate::workload;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use tracing::{debug, error, info};

/// Runs the full connection state machine for one accepted stream.
///
/// This is the unit of work the pools execute; the handle is the same one
/// the watchdog races against.
pub fn handle(stream: TcpStream, peer: SocketAddr, handle: TaskHandle) {
    Connection::new(stream, peer, handle).run();
}

/// Per-connection handler for the blocking server variants.
///
/// Orchestrates parse → route → execute workload → write response → close.
/// The stream carries a socket-level read timeout set by the accept loop;
/// the handler only ever writes if it wins the claim race against the
/// watchdog.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    handle: TaskHandle,
    buffer: Vec<u8>,
    state: State,
}

enum State {
    Open,
    Parsed(Request),
    Routed { target: String, route: Option<Workload> },
    Responded,
    Failed(ReadError),
    TimedOut,
    Closed,
}

enum ReadError {
    Parse(ParseError),
    Io(std::io::Error),
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr, handle: TaskHandle) -> Self {
        Self {
            stream,
            peer,
            handle,
            buffer: Vec::with_capacity(4096),
            state: State::Open,
        }
    }

    /// Drives the state machine to `Closed`. The stream is closed exactly
    /// once, when the connection is dropped on return.
    pub fn run(mut self) {
        loop {
            let state = std::mem::replace(&mut self.state, State::Closed);
            self.state = match state {
                State::Open => match self.read_request() {
                    Ok(request) => State::Parsed(request),
                    Err(ReadError::Io(e))
                        if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                    {
                        State::TimedOut
                    }
                    Err(e) => State::Failed(e),
                },

                State::Parsed(request) => {
                    debug!("{} {} from {}", request.method, request.target, self.peer);
                    State::Routed {
                        route: routes::route(&request.target),
                        target: request.target,
                    }
                }

                State::Routed { target, route } => {
                    let response = self.execute(&target, route);
                    // First to claim wins; the watchdog may already have
                    // written a 503 on its clone of this socket
                    if self.handle.try_claim() {
                        self.write_response(&response);
                    } else {
                        debug!("deadline fired first, discarding response for {target}");
                    }
                    State::Responded
                }

                State::Responded => State::Closed,

                State::TimedOut => {
                    error!("Read timed out for client {}", self.peer);
                    if self.handle.try_claim() {
                        send_overflow_response(&mut self.stream);
                    }
                    State::Closed
                }

                State::Failed(e) => {
                    match e {
                        ReadError::Parse(e) => error!("Unable to parse request: {e}"),
                        ReadError::Io(e) => error!("Connection error from {}: {e}", self.peer),
                    }
                    // Claim so the watchdog does not later 503 a dead socket
                    self.handle.try_claim();
                    State::Closed
                }

                State::Closed => break,
            };
        }

        // The watchdog may still hold a clone of this socket; an explicit
        // shutdown ends the TCP stream now instead of at its deadline.
        // Already-closed is a benign outcome of the claim race.
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    /// Accumulates bytes until the parser yields a request.
    ///
    /// End-of-stream while the parser still wants data means the peer sent a
    /// truncated request (or nothing at all).
    fn read_request(&mut self) -> Result<Request, ReadError> {
        loop {
            match parse_request(&self.buffer) {
                Ok((request, _consumed)) => return Ok(request),
                Err(ParseError::Incomplete) => {}
                Err(e) => return Err(ReadError::Parse(e)),
            }

            let mut chunk = [0u8; 1024];
            let n = self.stream.read(&mut chunk).map_err(ReadError::Io)?;

            if n == 0 {
                let reason = if self.buffer.is_empty() {
                    ParseError::EmptyRequestLine
                } else {
                    ParseError::TruncatedBody
                };
                return Err(ReadError::Parse(reason));
            }

            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    fn execute(&self, target: &str, route: Option<Workload>) -> Response {
        match route {
            Some(Workload::NoOp) => {
                workload::no_op();
                Response::json(StatusCode::Ok, &SuccessPayload::new())
            }
            Some(Workload::IoDelay) => {
                workload::io_delay(self.handle.token());
                Response::json(StatusCode::Ok, &SuccessPayload::new())
            }
            Some(Workload::Compute) => {
                let primes = workload::count_primes(workload::COMPUTE_LIMIT);
                if self.handle.is_cancelled() {
                    debug!("compute finished after cancellation, result discarded");
                } else {
                    info!("Compute task result: {primes}");
                }
                Response::json(StatusCode::Ok, &ComputePayload::new(primes))
            }
            None => {
                info!("Invalid request target: {target}");
                Response::json(StatusCode::NotFound, &ErrorPayload::new(404, "not found"))
            }
        }
    }

    fn write_response(&mut self, response: &Response) {
        if let Err(e) = self
            .stream
            .write_all(&response.to_bytes())
            .and_then(|_| self.stream.flush())
        {
            error!("Failed to write response to {}: {e}", self.peer);
        }
    }
}
