// Raw response <-> HttpResponse

use super::chunked::decode_chunked;
use super::{parse_header_lines, split_head, CRLF};
use crate::error::Result;
use crate::models::{Body, HttpResponse};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::StatusCode;

lazy_static! {
    static ref STATUS_LINE: Regex = Regex::new(r"^HTTP/(\d\.\d) (\d{3}) (.*)$").unwrap();
}

/// Parse a raw HTTP/1.x response.
///
/// Never fails. A status line that does not match `HTTP/<ver> <code> <reason>`
/// yields status 200. A `Transfer-Encoding: chunked` body is decoded, the
/// Transfer-Encoding header dropped and Content-Length set to the decoded size.
pub fn parse_response(raw: impl AsRef<[u8]>) -> HttpResponse {
    let (head, body) = split_head(raw.as_ref());
    let head = String::from_utf8_lossy(head);
    let mut lines = head.split(CRLF);
    let status_line = lines.next().unwrap_or_default();

    let mut response = HttpResponse::new(200);
    match STATUS_LINE.captures(status_line) {
        Some(caps) => {
            response.version = caps[1].to_string();
            response.status = caps[2].parse().unwrap_or(200);
            response.reason = caps[3].to_string();
        }
        None => {
            tracing::debug!(status_line = %status_line, "Unrecognized status line, assuming 200");
        }
    }

    response.headers = parse_header_lines(lines);

    if is_chunked(response.headers.get("transfer-encoding")) {
        let decoded = decode_chunked(body);
        response.headers.remove("transfer-encoding");
        response.headers.set("Content-Length", decoded.len().to_string());
        response.body = Body::new(decoded);
    } else {
        response.body = Body::new(body.to_vec());
    }

    response
}

fn is_chunked(transfer_encoding: Option<&str>) -> bool {
    transfer_encoding
        .and_then(|value| value.split(',').last())
        .map(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
        .unwrap_or(false)
}

/// Serialize a response to wire text, consuming its body.
///
/// Each `Set-Cookie` entry keeps its own line, casing and position. Every
/// other header name is written once, at its first position, with repeated
/// values joined by `, `.
pub fn dump_response(response: &mut HttpResponse) -> Result<String> {
    let bytes = dump_response_bytes(response)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Byte-exact form of [`dump_response`].
pub fn dump_response_bytes(response: &mut HttpResponse) -> Result<Vec<u8>> {
    let body = response.body.bytes()?;

    let reason = if response.reason.is_empty() {
        StatusCode::from_u16(response.status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("OK")
    } else {
        response.reason.as_str()
    };

    let mut head = format!("HTTP/{} {} {}{}", response.version, response.status, reason, CRLF);
    let mut written: Vec<&str> = Vec::new();
    for (name, value) in response.headers.iter() {
        if name.eq_ignore_ascii_case("set-cookie") {
            head.push_str(&format!("{}: {}{}", name, value, CRLF));
        } else if !written.iter().any(|w| w.eq_ignore_ascii_case(name)) {
            written.push(name);
            let joined = response.headers.get_joined(name).unwrap_or_else(|| value.to_string());
            head.push_str(&format!("{}: {}{}", name, joined, CRLF));
        }
    }
    head.push_str(CRLF);

    let mut out = head.into_bytes();
    out.extend_from_slice(&body);
    Ok(out)
}
