//! Triserve - one HTTP server, three concurrency strategies
//!
//! Serves three fixed routes (`/`, `/io`, `/compute`) interchangeably from
//! thread-pool, thread-per-connection, and event-loop servers.

pub mod config;
pub mod http;
pub mod routes;
pub mod server;
pub mod workload;
