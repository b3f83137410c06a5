// multipart/form-data parser
// Splits a body on its boundary and reads each part's Content-Disposition

use crate::codec::{find, parse_header_lines};

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    /// Present for file uploads.
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl Part {
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }
}

/// Parse every named part. Parts without a `name` are skipped; a missing
/// closing delimiter ends the body at the last part read.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Vec<Part> {
    let delimiter = format!("--{}", boundary);
    let separator = format!("\r\n--{}", boundary);
    let mut parts = Vec::new();

    let Some(start) = find(body, delimiter.as_bytes()) else {
        return parts;
    };
    let mut pos = start + delimiter.len();

    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            break;
        }
        let Some(rest) = rest.strip_prefix(b"\r\n") else {
            break;
        };
        pos += 2;

        let (raw_part, next) = match find(rest, separator.as_bytes()) {
            Some(end) => (&rest[..end], Some(pos + end + separator.len())),
            None => (rest, None),
        };
        if let Some(part) = parse_part(raw_part) {
            parts.push(part);
        }
        match next {
            Some(next) => pos = next,
            None => break,
        }
    }

    parts
}

fn parse_part(raw: &[u8]) -> Option<Part> {
    let (head, data) = match find(raw, b"\r\n\r\n") {
        Some(at) => (&raw[..at], &raw[at + 4..]),
        None => (raw, &[][..]),
    };
    let head = String::from_utf8_lossy(head);
    let headers = parse_header_lines(head.split("\r\n"));
    let disposition = headers.get("content-disposition")?;

    let name = disposition_param(disposition, "name")?;
    Some(Part {
        name,
        filename: disposition_param(disposition, "filename"),
        content_type: headers.get("content-type").map(str::to_string),
        data: data.to_vec(),
    })
}

/// Value of `key=` in a `;`-separated header such as Content-Disposition or
/// Content-Type, with surrounding quotes removed.
pub fn disposition_param(header: &str, key: &str) -> Option<String> {
    header.split(';').skip(1).find_map(|item| {
        let (k, v) = item.trim().split_once('=')?;
        if k.trim().eq_ignore_ascii_case(key) {
            Some(v.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}
