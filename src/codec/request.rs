// Raw request <-> HttpRequest

use super::{parse_header_lines, split_head, CloneHttp, CRLF};
use crate::error::{Error, Result};
use crate::models::{Body, HttpRequest, Method};
use url::Url;

/// Authority used when a capture has neither a Host header nor an absolute target.
const FALLBACK_HOST: &str = "localhost";

/// Parse a raw HTTP/1.x request, assuming plain `http`.
///
/// GET and HEAD requests always come back with an empty body; any text after
/// their header block is discarded.
pub fn parse_request(raw: impl AsRef<[u8]>) -> Result<HttpRequest> {
    parse_request_with_scheme(raw, "http")
}

/// Parse a raw request, building its URL with `scheme` (raw text does not say
/// whether it travelled over TLS).
pub fn parse_request_with_scheme(raw: impl AsRef<[u8]>, scheme: &str) -> Result<HttpRequest> {
    let (head, body) = split_head(raw.as_ref());
    let head = String::from_utf8_lossy(head);
    let mut lines = head.split(CRLF);

    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split(' ').filter(|part| !part.is_empty());
    let (method, target) = match (parts.next(), parts.next()) {
        (Some(method), Some(target)) => (method, target),
        _ => return Err(Error::InvalidRequestLine(request_line.to_string())),
    };
    let version = parts.next().unwrap_or("HTTP/1.1");
    let method: Method = method.parse()?;

    let headers = parse_header_lines(lines);
    let url = resolve_url(target, headers.get("host"), scheme)?;

    let body = if method.allows_body() {
        Body::new(body.to_vec())
    } else {
        if !body.is_empty() {
            tracing::debug!(method = %method, discarded = body.len(), "Dropping body of body-less method");
        }
        Body::empty()
    };

    let mut request = HttpRequest::new(method, url);
    request.raw_target = wire_target(target);
    request.version = version.to_string();
    request.headers = headers;
    request.body = body;
    Ok(request)
}

fn resolve_url(target: &str, host: Option<&str>, scheme: &str) -> Result<Url> {
    let lowered = target.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        return Ok(Url::parse(target)?);
    }
    let authority = host.map(str::trim).filter(|h| !h.is_empty()).unwrap_or(FALLBACK_HOST);
    let url = if target.starts_with('/') {
        format!("{}://{}{}", scheme, authority, target)
    } else {
        format!("{}://{}/{}", scheme, authority, target)
    };
    Ok(Url::parse(&url)?)
}

/// The request target in origin form, byte for byte. An absolute target
/// loses its scheme and authority; the fragment is never sent.
fn wire_target(target: &str) -> String {
    let target = target.split('#').next().unwrap_or_default();
    let lowered = target.to_ascii_lowercase();
    if !(lowered.starts_with("http://") || lowered.starts_with("https://")) {
        return target.to_string();
    }
    let rest = target.split_once("://").map_or("", |(_, rest)| rest);
    match rest.find(['/', '?']) {
        Some(at) if rest[at..].starts_with('/') => rest[at..].to_string(),
        Some(at) => format!("/{}", &rest[at..]),
        None => "/".to_string(),
    }
}

/// Serialize a request to wire text, consuming its body.
///
/// Headers are written in insertion order, one line per stored entry. A
/// request without a Host header gets one, first, from its URL.
pub fn dump_request(request: &mut HttpRequest) -> Result<String> {
    let bytes = dump_request_bytes(request)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Byte-exact form of [`dump_request`] for non-UTF-8 bodies.
pub fn dump_request_bytes(request: &mut HttpRequest) -> Result<Vec<u8>> {
    let body = request.body.bytes()?;

    let mut head = format!("{} {} {}{}", request.method, request.target(), request.version, CRLF);
    if !request.headers.contains("host") {
        head.push_str(&format!("Host: {}{}", request.authority(), CRLF));
    }
    for (name, value) in request.headers.iter() {
        head.push_str(&format!("{}: {}{}", name, value, CRLF));
    }
    head.push_str(CRLF);

    let mut out = head.into_bytes();
    out.extend_from_slice(&body);
    Ok(out)
}

/// Clone by serializing and parsing again.
///
/// Slower than [`CloneHttp::clone_http`] but proves the request survives the
/// codec unchanged. Redirect policy and cancel signal are carried over.
pub fn reparse_request(request: &HttpRequest) -> Result<HttpRequest> {
    let mut copy = request.clone_http()?;
    let raw = dump_request_bytes(&mut copy)?;
    let mut reparsed = parse_request_with_scheme(raw, request.url.scheme())?;
    reparsed.redirect = request.redirect;
    reparsed.signal = request.signal.clone();
    Ok(reparsed)
}
