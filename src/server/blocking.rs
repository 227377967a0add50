//! Thread-based server: a dedicated accept thread dispatching connections to
//! an interchangeable worker pool, supervised by the watchdog.

use crate::config::Config;
use crate::http::connection;
use crate::server::pool::{Job, SubmitError, WorkerPool};
use crate::server::watchdog::{PendingTask, Watchdog};
use crate::server::{REQUEST_DEADLINE, send_overflow_response};
use anyhow::Context;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Externally observable server lifecycle. Transitions only move forward:
/// `Running → Stopping → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Running,
    Stopping,
    Stopped,
}

/// Shared lifecycle flag, read by the accept loop every iteration.
struct ServerState {
    state: AtomicU8,
}

const RUNNING: u8 = 0;
const STOPPING: u8 = 1;
const STOPPED: u8 = 2;

impl ServerState {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(RUNNING),
        }
    }

    fn lifecycle(&self) -> Lifecycle {
        match self.state.load(Ordering::Acquire) {
            RUNNING => Lifecycle::Running,
            STOPPING => Lifecycle::Stopping,
            _ => Lifecycle::Stopped,
        }
    }

    /// Flips `Running → Stopping`; returns false if already past Running.
    fn begin_stop(&self) -> bool {
        self.state
            .compare_exchange(RUNNING, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn mark_stopped(&self) {
        self.state.store(STOPPED, Ordering::Release);
    }
}

/// Handle to a running thread-based server.
///
/// Dropping the handle stops the server.
pub struct BlockingServer {
    state: Arc<ServerState>,
    pool: Arc<dyn WorkerPool>,
    watchdog: Arc<Watchdog>,
    accept_thread: Option<thread::JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl BlockingServer {
    /// Binds the listening socket and spawns the accept thread.
    ///
    /// Failure to bind is the only fatal startup error.
    pub fn start(config: &Config, pool: Arc<dyn WorkerPool>) -> anyhow::Result<BlockingServer> {
        let addr = config.addr();
        let listener =
            TcpListener::bind(&addr).with_context(|| format!("failed to bind {addr}"))?;
        let local_addr = listener.local_addr().context("listener has no local addr")?;

        let state = Arc::new(ServerState::new());
        let watchdog = Arc::new(Watchdog::new());

        let accept_thread = {
            let state = Arc::clone(&state);
            let pool = Arc::clone(&pool);
            let watchdog = Arc::clone(&watchdog);
            thread::Builder::new()
                .name("accept".to_string())
                .spawn(move || accept_loop(listener, state, pool, watchdog))
                .context("failed to spawn accept thread")?
        };

        info!("Listening on {local_addr}");
        Ok(BlockingServer {
            state,
            pool,
            watchdog,
            accept_thread: Some(accept_thread),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lifecycle()
    }

    /// Stops the server: the accept loop exits, the listening socket closes,
    /// and in-flight work is joined best-effort.
    pub fn stop(&mut self) {
        if !self.state.begin_stop() {
            return;
        }
        info!("Shutting down server");

        // The accept call blocks until a peer arrives; a loopback connect
        // wakes it so it can observe the state change
        let _ = TcpStream::connect(self.local_addr);
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }

        self.pool.shutdown();
        self.watchdog.shutdown();
        self.state.mark_stopped();
        info!("Server stopped");
    }
}

impl Drop for BlockingServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Accepts connections until the lifecycle leaves `Running`. The listener is
/// dropped on exit, which releases the port.
fn accept_loop(
    listener: TcpListener,
    state: Arc<ServerState>,
    pool: Arc<dyn WorkerPool>,
    watchdog: Arc<Watchdog>,
) {
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                if state.lifecycle() != Lifecycle::Running {
                    info!("Listener closing, shutting down gracefully");
                    break;
                }
                debug!("Accepted connection from {peer}");
                dispatch(stream, peer, &pool, &watchdog);
            }
            Err(e) => {
                if state.lifecycle() != Lifecycle::Running {
                    info!("Listener closed, shutting down gracefully");
                    break;
                }
                // Local to one connection attempt; the loop keeps serving
                error!("Failed to accept connection: {e}");
            }
        }
    }
}

/// Hands one accepted connection to the pool and registers its watchdog
/// entry, or runs the graceful-overflow path on rejection.
fn dispatch(stream: TcpStream, peer: SocketAddr, pool: &Arc<dyn WorkerPool>, watchdog: &Watchdog) {
    if let Err(e) = stream.set_read_timeout(Some(REQUEST_DEADLINE)) {
        error!("Failed to arm read timeout for {peer}: {e}");
        return;
    }
    // The watchdog needs its own handle on the socket to write the 503;
    // the handler owns the original
    let mut watch_stream = match stream.try_clone() {
        Ok(clone) => clone,
        Err(e) => {
            error!("Failed to clone stream for {peer}: {e}");
            return;
        }
    };

    let deadline = Instant::now() + REQUEST_DEADLINE;
    let job: Job = Box::new(move |handle| connection::handle(stream, peer, handle));

    match pool.submit(job) {
        Ok(handle) => watchdog.watch(PendingTask {
            deadline,
            handle,
            stream: watch_stream,
        }),
        Err(SubmitError::Saturated) => {
            warn!("Pool saturated, rejecting connection from {peer}");
            send_overflow_response(&mut watch_stream);
        }
        Err(SubmitError::ShuttingDown) => {
            debug!("Pool shutting down, rejecting connection from {peer}");
            send_overflow_response(&mut watch_stream);
        }
    }
}
