use std::collections::HashMap;

/// Represents a parsed HTTP request from a client.
///
/// Contains the request line tokens and headers as received. Built once per
/// connection by the parser and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The HTTP method token (e.g., "GET")
    pub method: String,
    /// The request target, used as an exact-match routing key (e.g., "/io")
    pub target: String,
    /// HTTP version token (typically "HTTP/1.1")
    pub version: String,
    /// Request headers as key-value pairs; duplicate names overwrite
    pub headers: HashMap<String, String>,
    /// Request body, present iff a positive Content-Length was fully read
    pub body: Option<String>,
}

impl Request {
    /// Retrieves a header value by name, as received.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }

    /// Retrieves the Content-Length header value and parses it as a usize.
    ///
    /// Returns 0 if the header is missing or not a valid number.
    pub fn content_length(&self) -> usize {
        self.header("Content-Length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}
