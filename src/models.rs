// Core data models for fuzzwire
// HTTP messages, ordered headers, single-read bodies and cancellation

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use url::Url;

/// HTTP request methods.
///
/// Extension methods are kept verbatim in `Other` so a capture re-emits the
/// exact token it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    OPTIONS,
    HEAD,
    TRACE,
    CONNECT,
    Other(String),
}

impl Method {
    /// GET and HEAD never carry a body on decode.
    pub fn allows_body(&self) -> bool {
        !matches!(self, Method::GET | Method::HEAD)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::PATCH => "PATCH",
            Method::OPTIONS => "OPTIONS",
            Method::HEAD => "HEAD",
            Method::TRACE => "TRACE",
            Method::CONNECT => "CONNECT",
            Method::Other(token) => token,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let method = match s.to_ascii_uppercase().as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "PATCH" => Method::PATCH,
            "OPTIONS" => Method::OPTIONS,
            "HEAD" => Method::HEAD,
            "TRACE" => Method::TRACE,
            "CONNECT" => Method::CONNECT,
            _ => {
                // RFC 9110 token characters only
                let is_token = !s.is_empty()
                    && s.bytes().all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
                if !is_token {
                    return Err(Error::InvalidMethod(s.to_string()));
                }
                Method::Other(s.to_string())
            }
        };
        Ok(method)
    }
}

/// Ordered header collection.
///
/// Names compare case-insensitively, but every entry keeps the casing and
/// position it was inserted with. A name may appear any number of times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value after all existing entries.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value stored under `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values under `name` joined with `", "`, the way a single-valued
    /// view of a repeated header reads.
    pub fn get_joined(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self.get_all(name).collect();
        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove every entry under `name`. Returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        before - self.entries.len()
    }

    /// Replace all values under `name` with one value.
    ///
    /// The first existing entry is overwritten in place (keeping its casing),
    /// later duplicates are dropped. A new name is appended at the end.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter().position(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(first) => {
                self.entries[first].1 = value;
                let mut index = 0;
                self.entries.retain(|(n, _)| {
                    let keep = index <= first || !n.eq_ignore_ascii_case(&name);
                    index += 1;
                    keep
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Distinct names in first-occurrence order, with their original casing.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (name, _) in &self.entries {
            if !names.iter().any(|seen| seen.eq_ignore_ascii_case(name)) {
                names.push(name);
            }
        }
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = HeaderMap::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

/// Message body: an owned buffer that can be read exactly once.
///
/// Reads go through `&mut self` and flip the consumed flag. A consumed body
/// can no longer be cloned, so anything that needs the bytes twice must
/// clone the message first.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Body {
    data: Vec<u8>,
    consumed: bool,
}

impl Body {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            consumed: false,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Read the raw bytes, consuming the body.
    pub fn bytes(&mut self) -> Result<Vec<u8>> {
        if self.consumed {
            return Err(Error::BodyConsumed);
        }
        self.consumed = true;
        Ok(std::mem::take(&mut self.data))
    }

    /// Read the body as text (lossy UTF-8), consuming it.
    pub fn text(&mut self) -> Result<String> {
        let bytes = self.bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read and decode the body as JSON, consuming it.
    pub fn json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let bytes = self.bytes()?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Independent copy of an unread body.
    pub fn try_clone(&self) -> Result<Body> {
        if self.consumed {
            return Err(Error::BodyConsumed);
        }
        Ok(Body::new(self.data.clone()))
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::new(s.as_bytes().to_vec())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::new(s.into_bytes())
    }
}

impl From<Vec<u8>> for Body {
    fn from(data: Vec<u8>) -> Self {
        Body::new(data)
    }
}

/// What the transport does when the server answers with a redirect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RedirectPolicy {
    #[default]
    Follow,
    /// Hand the 3xx response back to the caller.
    Manual,
    /// Treat any redirect as a transport error.
    Error,
}

/// Shared cancellation flag.
///
/// Clones observe the same state: requests derived from a source request
/// hold a clone of its signal, so cancelling the source cancels them too.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    inner: Arc<CancelState>,
}

#[derive(Debug)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancelState {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called on any clone.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// True when both handles share one underlying flag.
    pub fn same_as(&self, other: &CancelSignal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// `path[?query]` of a URL.
fn origin_form(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Structured HTTP request.
#[derive(Debug)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL used by the transport. `url` normalises dot segments, so
    /// the wire form lives in `raw_target`.
    pub url: Url,
    /// Origin-form target (`path[?query]`) exactly as it goes on the wire.
    pub raw_target: String,
    /// Protocol version from the request line, e.g. `HTTP/1.1`.
    pub version: String,
    pub headers: HeaderMap,
    pub body: Body,
    pub redirect: RedirectPolicy,
    pub signal: CancelSignal,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            raw_target: origin_form(&url),
            url,
            version: "HTTP/1.1".to_string(),
            headers: HeaderMap::new(),
            body: Body::empty(),
            redirect: RedirectPolicy::default(),
            signal: CancelSignal::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_redirect(mut self, redirect: RedirectPolicy) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn with_signal(mut self, signal: CancelSignal) -> Self {
        self.signal = signal;
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    /// Origin-form target as written on the wire.
    pub fn target(&self) -> &str {
        &self.raw_target
    }

    /// Path part of the wire target, dot segments left as they are.
    pub fn raw_path(&self) -> &str {
        self.raw_target.split_once('?').map_or(self.raw_target.as_str(), |(path, _)| path)
    }

    /// Query part of the wire target, without the `?`.
    pub fn raw_query(&self) -> Option<&str> {
        self.raw_target.split_once('?').map(|(_, query)| query)
    }

    /// Replace the URL and take its target as the new wire target.
    pub fn set_url(&mut self, url: Url) {
        self.raw_target = origin_form(&url);
        self.url = url;
    }

    /// `host[:port]` of the URL.
    pub fn authority(&self) -> String {
        let host = self.url.host_str().unwrap_or("localhost");
        match self.url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }
}

/// Structured HTTP response.
#[derive(Debug)]
pub struct HttpResponse {
    /// Version without the `HTTP/` prefix, e.g. `1.1`.
    pub version: String,
    pub status: u16,
    pub reason: String,
    pub headers: HeaderMap,
    pub body: Body,
    /// Final URL when the response came from the network.
    pub url: Option<Url>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            version: "1.1".to_string(),
            status,
            reason: String::new(),
            headers: HeaderMap::new(),
            body: Body::empty(),
            url: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

}
