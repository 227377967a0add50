//! The three fixed per-request workloads: a no-op, a simulated I/O wait,
//! and a CPU-bound prime count.

use crate::server::pool::CancelToken;
use std::time::Duration;
use tracing::info;

/// Simulated external-I/O latency for the `/io` route.
pub const IO_DELAY: Duration = Duration::from_millis(500);

/// Upper bound (exclusive) of the `/compute` prime-counting range.
pub const COMPUTE_LIMIT: u64 = 100_000;

/// The `/` workload: nothing to do beyond the log line.
pub fn no_op() {
    info!("Simple HTTP request received");
}

/// The `/io` workload: blocks the calling worker for the simulated latency.
///
/// Honors cooperative cancellation: returns `false` as soon as the token
/// fires during the wait, with no other side effects.
pub fn io_delay(token: &CancelToken) -> bool {
    if token.wait_timeout(IO_DELAY) {
        info!("IO task cancelled mid-wait");
        return false;
    }
    info!("IO task successfully completed");
    true
}

/// The `/compute` workload: counts primes in `[0, limit)` by trial division.
///
/// Pure and bounded; it does not poll for cancellation, so a cancelled
/// request simply finishes and has its result discarded by the caller.
pub fn count_primes(limit: u64) -> u64 {
    (0..limit).filter(|&n| is_prime(n)).count() as u64
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    let mut i = 2;
    while i * i <= n {
        if n % i == 0 {
            return false;
        }
        i += 1;
    }
    true
}
