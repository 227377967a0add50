//! Server variants and the machinery they share.
//!
//! - **`blocking`**: accept loop + worker pool + watchdog (thread variants)
//! - **`reactive`**: single-threaded event-loop variant
//! - **`pool`**: interchangeable worker-pool backends
//! - **`watchdog`**: per-connection deadline enforcement

pub mod blocking;
pub mod pool;
pub mod reactive;
pub mod watchdog;

use crate::http::response::{Response, StatusCode};
use crate::routes::ErrorPayload;
use std::io::Write;
use std::net::TcpStream;
use std::time::Duration;
use tracing::debug;

/// Budget for one connection: the initial read, and the watchdog racing the
/// handler. The event-loop variant applies the same budget on its timers.
pub const REQUEST_DEADLINE: Duration = Duration::from_secs(3);

/// Graceful-overflow path: a complete, framed 503 written straight on the
/// raw connection, bypassing the connection handler.
///
/// Best effort: the peer may already be gone, or the handler may have closed
/// its clone of the socket first. Either way the failure is benign.
pub(crate) fn send_overflow_response(stream: &mut TcpStream) {
    let response = Response::json(
        StatusCode::ServiceUnavailable,
        &ErrorPayload::new(503, "service unavailable"),
    );
    if let Err(e) = stream
        .write_all(&response.to_bytes())
        .and_then(|_| stream.flush())
    {
        debug!("503 not delivered, peer already gone: {e}");
    }
}
