//! HTTP protocol implementation.
//!
//! - **`request`**: parsed request representation
//! - **`parser`**: parses a request out of an accumulated byte buffer
//! - **`response`**: response representation with builder and serializer
//! - **`connection`**: the per-connection handler for the blocking servers
//!
//! Each connection moves through a fixed state machine:
//!
//! ```text
//! Open → Parsed → Routed → Responded → Closed
//!   └──→ Failed ─────────────────────→ Closed
//!   └──→ TimedOut ───────────────────→ Closed
//! ```
//!
//! The stream is closed exactly once on every exit path.

pub mod connection;
pub mod parser;
pub mod request;
pub mod response;
