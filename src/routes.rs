use serde::Serialize;

/// The kind of work a route triggers before its canned response is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    NoOp,
    IoDelay,
    Compute,
}

/// Maps a request target to its workload. Exact-path match only;
/// anything unmapped is a 404.
pub fn route(target: &str) -> Option<Workload> {
    match target {
        "/" => Some(Workload::NoOp),
        "/io" => Some(Workload::IoDelay),
        "/compute" => Some(Workload::Compute),
        _ => None,
    }
}

/// Canned success body for `/` and `/io`.
#[derive(Debug, Serialize)]
pub struct SuccessPayload {
    pub status: u16,
    pub message: &'static str,
}

impl SuccessPayload {
    pub fn new() -> Self {
        Self {
            status: 200,
            message: "success",
        }
    }
}

impl Default for SuccessPayload {
    fn default() -> Self {
        Self::new()
    }
}

/// Success body for `/compute`, carrying the prime count.
#[derive(Debug, Serialize)]
pub struct ComputePayload {
    pub status: u16,
    pub message: &'static str,
    pub primes: u64,
}

impl ComputePayload {
    pub fn new(primes: u64) -> Self {
        Self {
            status: 200,
            message: "success",
            primes,
        }
    }
}

/// Error body for 404/500/503 responses.
#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub status: u16,
    pub message: &'static str,
}

impl ErrorPayload {
    pub fn new(status: u16, message: &'static str) -> Self {
        Self { status, message }
    }
}
