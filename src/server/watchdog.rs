//! Deadline enforcement for dispatched connections.
//!
//! Every unit of work handed to the pool gets a companion entry here. If the
//! handler has not claimed the connection by the deadline, the watchdog
//! cancels the job and writes the graceful-overflow 503 on its own clone of
//! the stream.

use crate::server::pool::TaskHandle;
use crate::server::send_overflow_response;
use crossbeam_channel::{Sender, unbounded};
use std::net::TcpStream;
use std::sync::Mutex;
use std::thread;
use std::time::Instant;
use tracing::warn;

/// One accepted connection in flight on a worker.
pub struct PendingTask {
    pub deadline: Instant,
    pub handle: TaskHandle,
    pub stream: TcpStream,
}

pub struct Watchdog {
    tx: Mutex<Option<Sender<PendingTask>>>,
    timer: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Watchdog {
    pub fn new() -> Self {
        let (tx, rx) = unbounded::<PendingTask>();

        // Entries arrive in accept order with a fixed per-connection budget,
        // so deadlines are monotone and FIFO processing fires them in order.
        let timer = thread::Builder::new()
            .name("watchdog".to_string())
            .spawn(move || {
                while let Ok(task) = rx.recv() {
                    let now = Instant::now();
                    if task.deadline > now {
                        thread::sleep(task.deadline - now);
                    }
                    if task.handle.try_claim() {
                        warn!("Deadline exceeded, cancelling handler and replying 503");
                        task.handle.cancel();
                        let mut stream = task.stream;
                        send_overflow_response(&mut stream);
                        // Ends the TCP stream even though the handler still
                        // holds its own handle on the socket; this also
                        // unblocks a handler stuck in read
                        let _ = stream.shutdown(std::net::Shutdown::Both);
                    }
                    // Handler finished first: the timer is a no-op
                }
            })
            .expect("failed to spawn watchdog timer");

        Self {
            tx: Mutex::new(Some(tx)),
            timer: Mutex::new(Some(timer)),
        }
    }

    /// Registers a dispatched connection for deadline supervision.
    pub fn watch(&self, task: PendingTask) {
        if let Some(tx) = self.tx.lock().unwrap().as_ref() {
            let _ = tx.send(task);
        }
    }

    /// Stops the timer thread. Entries not yet examined are abandoned.
    pub fn shutdown(&self) {
        self.tx.lock().unwrap().take();
        if let Some(timer) = self.timer.lock().unwrap().take() {
            let _ = timer.join();
        }
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}
