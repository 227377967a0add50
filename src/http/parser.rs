use crate::http::request::Request;
use std::collections::HashMap;

/// Reasons a request can fail to parse.
///
/// `Incomplete` is not a failure: it tells the caller to read more bytes and
/// retry. The caller maps end-of-stream while `Incomplete` to either
/// `EmptyRequestLine` (nothing arrived at all) or `TruncatedBody`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("need more data")]
    Incomplete,
    #[error("request line is empty")]
    EmptyRequestLine,
    #[error("request line is not exactly 3 tokens")]
    MalformedRequestLine,
    #[error("malformed header line: {0}")]
    MalformedHeader(String),
    #[error("invalid Content-Length value")]
    BadContentLength,
    #[error("body shorter than declared Content-Length")]
    TruncatedBody,
}

/// Parses one HTTP request from an accumulated byte buffer.
///
/// Returns the request and the number of bytes consumed, or `Incomplete` if
/// the buffer does not yet hold the full head and declared body.
pub fn parse_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    // Look for header/body separator
    let headers_end = find_headers_end(buf).ok_or(ParseError::Incomplete)?;
    let head_bytes = &buf[..headers_end];
    let body_bytes = &buf[headers_end + 4..];

    let head = std::str::from_utf8(head_bytes).map_err(|_| ParseError::MalformedRequestLine)?;

    let mut lines = head.split("\r\n");

    // Request line: exactly METHOD SP TARGET SP VERSION
    let request_line = lines.next().unwrap_or("");
    if request_line.is_empty() {
        return Err(ParseError::EmptyRequestLine);
    }
    let tokens: Vec<&str> = request_line.split_whitespace().collect();
    let &[method, target, version] = tokens.as_slice() else {
        return Err(ParseError::MalformedRequestLine);
    };

    // Headers: last write wins on duplicate names
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| ParseError::MalformedHeader(line.to_string()))?;
        headers.insert(key.trim().to_string(), value.trim().to_string());
    }

    let content_length = headers
        .get("Content-Length")
        .map(|v| v.parse::<usize>().map_err(|_| ParseError::BadContentLength))
        .transpose()?
        .unwrap_or(0);

    if body_bytes.len() < content_length {
        return Err(ParseError::Incomplete);
    }

    let body = if content_length > 0 {
        Some(String::from_utf8_lossy(&body_bytes[..content_length]).into_owned())
    } else {
        None
    };

    let request = Request {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
        headers,
        body,
    };

    let total_consumed = headers_end + 4 + content_length;
    Ok((request, total_consumed))
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
