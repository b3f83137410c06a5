// Raw HTTP message codec
// Converts HTTP/1.x wire text to structured messages and back
//
// - request:  raw request text <-> HttpRequest
// - response: raw response text <-> HttpResponse (chunked bodies decoded)
// - chunked:  transfer-coding decoder used by the response parser
//
// Parsing is permissive on purpose: fuzz targets answer with broken status
// lines and truncated chunks, and the codec keeps whatever it can read.

pub mod chunked;
pub mod request;
pub mod response;

pub use chunked::{decode_chunked, decode_chunks, encode_chunked, Chunk};
pub use request::{dump_request, dump_request_bytes, parse_request, parse_request_with_scheme, reparse_request};
pub use response::{dump_response, dump_response_bytes, parse_response};

use crate::error::Result;
use crate::models::{HeaderMap, HttpRequest, HttpResponse};

pub(crate) const CRLF: &str = "\r\n";
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Structural copy of a message whose body has not been read yet.
///
/// The copy owns its own body buffer and keeps the source's redirect policy
/// and cancel signal. Fails with `Error::BodyConsumed` once the source body
/// was read.
pub trait CloneHttp: Sized {
    fn clone_http(&self) -> Result<Self>;
}

impl CloneHttp for HttpRequest {
    fn clone_http(&self) -> Result<Self> {
        Ok(HttpRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            raw_target: self.raw_target.clone(),
            version: self.version.clone(),
            headers: self.headers.clone(),
            body: self.body.try_clone()?,
            redirect: self.redirect,
            signal: self.signal.clone(),
        })
    }
}

impl CloneHttp for HttpResponse {
    fn clone_http(&self) -> Result<Self> {
        Ok(HttpResponse {
            version: self.version.clone(),
            status: self.status,
            reason: self.reason.clone(),
            headers: self.headers.clone(),
            body: self.body.try_clone()?,
            url: self.url.clone(),
        })
    }
}

/// Free-function form of [`CloneHttp::clone_http`].
pub fn clone_http<M: CloneHttp>(message: &M) -> Result<M> {
    message.clone_http()
}

/// Split raw bytes at the first blank line into (head, body).
/// Without a blank line everything is head.
pub(crate) fn split_head(raw: &[u8]) -> (&[u8], &[u8]) {
    match find(raw, HEAD_TERMINATOR) {
        Some(at) => (&raw[..at], &raw[at + HEAD_TERMINATOR.len()..]),
        None => (raw, &[]),
    }
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Parse `Name: value` lines, keeping casing and order.
///
/// The split is at the first `": "`; a bare `:` is tolerated with the
/// value's leading whitespace trimmed. Lines without a colon are dropped.
pub(crate) fn parse_header_lines<'a>(lines: impl Iterator<Item = &'a str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let split = line
            .split_once(": ")
            .or_else(|| line.split_once(':').map(|(n, v)| (n, v.trim_start())));
        match split {
            Some((name, value)) if !name.is_empty() => headers.append(name, value),
            _ => tracing::debug!(line = %line, "Skipping malformed header line"),
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_head_without_blank_line_is_all_head() {
        let (head, body) = split_head(b"GET / HTTP/1.1\r\nHost: a");
        assert_eq!(head, b"GET / HTTP/1.1\r\nHost: a");
        assert!(body.is_empty());
    }

    #[test]
    fn header_lines_tolerate_missing_space() {
        let headers = parse_header_lines(["A: 1", "B:2", "garbage", ": nameless", "C: x: y"].into_iter());
        let entries: Vec<_> = headers.iter().collect();
        assert_eq!(entries, vec![("A", "1"), ("B", "2"), ("C", "x: y")]);
    }
}
