// HAR import for fuzzwire
// Turns browser HAR exports into the wire text the codec parses

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize, Debug, Clone)]
pub struct Har {
    pub log: HarLog,
}

#[derive(Deserialize, Debug, Clone)]
pub struct HarLog {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub creator: Option<HarCreator>,
    pub entries: Option<Vec<HarEntry>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct HarCreator {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HarEntry {
    #[serde(default)]
    pub started_date_time: String,
    pub request: HarRequest,
    pub response: HarResponse,
}

#[derive(Deserialize, Debug, Clone)]
pub struct HarHeader {
    pub name: String,
    pub value: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HarRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub http_version: String,
    #[serde(default)]
    pub headers: Vec<HarHeader>,
    #[serde(default)]
    pub post_data: Option<HarPostData>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HarPostData {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HarResponse {
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub http_version: String,
    #[serde(default)]
    pub headers: Vec<HarHeader>,
    #[serde(default)]
    pub content: Option<HarContent>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HarContent {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// One HAR entry as raw request and response text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTextPair {
    pub request: String,
    pub response: String,
}

/// Parse HAR JSON, requiring `log.version` and `log.entries`.
pub fn parse_har(content: &str) -> Result<Har> {
    let har: Har = serde_json::from_str(content)?;
    validate(har)
}

/// Like [`parse_har`] for an already decoded JSON value.
pub fn parse_har_value(value: Value) -> Result<Har> {
    let har: Har = serde_json::from_value(value)?;
    validate(har)
}

fn validate(har: Har) -> Result<Har> {
    if har.log.entries.is_none() {
        return Err(Error::InvalidHar("missing log.entries".to_string()));
    }
    if har.log.version.is_empty() {
        return Err(Error::InvalidHar("missing log.version".to_string()));
    }
    Ok(har)
}

/// `HTTP/1.1` from the spellings HAR writers use (`1.1`, `HTTP/1.1`, `h2`, `http/2.0`).
fn protocol(version: &str) -> String {
    let version = version.trim();
    let bare = if version.len() >= 5 && version[..5].eq_ignore_ascii_case("http/") {
        &version[5..]
    } else {
        version
    };
    match bare.to_ascii_lowercase().as_str() {
        "" => "HTTP/1.1".to_string(),
        "h2" | "2" => "HTTP/2.0".to_string(),
        "h3" | "3" => "HTTP/3.0".to_string(),
        other => format!("HTTP/{}", other.to_ascii_uppercase()),
    }
}

fn push_headers(text: &mut String, headers: &[HarHeader]) {
    // HTTP/2 pseudo-headers (`:authority`, `:path`) have no HTTP/1 form
    for header in headers.iter().filter(|h| !h.name.starts_with(':')) {
        text.push_str(&format!("{}: {}\r\n", header.name, header.value));
    }
    text.push_str("\r\n");
}

/// Request line with the absolute URL as target, headers, blank line, post data.
pub fn har_request_to_http_text(request: &HarRequest) -> String {
    let mut text = format!("{} {} {}\r\n", request.method, request.url, protocol(&request.http_version));
    push_headers(&mut text, &request.headers);
    if let Some(body) = request.post_data.as_ref().and_then(|data| data.text.as_deref()) {
        text.push_str(body);
    }
    text
}

pub fn har_response_to_http_text(response: &HarResponse) -> String {
    let mut text = format!(
        "{} {} {}\r\n",
        protocol(&response.http_version),
        response.status,
        response.status_text
    );
    push_headers(&mut text, &response.headers);
    if let Some(body) = response.content.as_ref().and_then(|content| content.text.as_deref()) {
        text.push_str(body);
    }
    text
}

pub fn har_entry_to_http_text(entry: &HarEntry) -> HttpTextPair {
    HttpTextPair {
        request: har_request_to_http_text(&entry.request),
        response: har_response_to_http_text(&entry.response),
    }
}

/// Every entry of a HAR document, in file order.
pub fn har_to_http_text(content: &str) -> Result<Vec<HttpTextPair>> {
    let har = parse_har(content)?;
    let entries = har.log.entries.unwrap_or_default();
    tracing::debug!(entries = entries.len(), version = %har.log.version, "HAR parsed");
    Ok(entries.iter().map(har_entry_to_http_text).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn protocol_spellings() {
        assert_eq!(protocol("1.1"), "HTTP/1.1");
        assert_eq!(protocol("HTTP/1.0"), "HTTP/1.0");
        assert_eq!(protocol("h2"), "HTTP/2.0");
        assert_eq!(protocol("http/2.0"), "HTTP/2.0");
        assert_eq!(protocol(""), "HTTP/1.1");
    }

    #[test]
    fn rejects_missing_entries_and_version() {
        let err = parse_har_value(json!({"log": {"version": "1.2"}})).unwrap_err();
        assert!(matches!(err, Error::InvalidHar(_)));

        let err = parse_har_value(json!({"log": {"entries": []}})).unwrap_err();
        assert!(matches!(err, Error::InvalidHar(_)));

        assert!(matches!(parse_har("not json"), Err(Error::Json(_))));
    }

    #[test]
    fn response_text_skips_pseudo_headers() {
        let response = HarResponse {
            status: 404,
            status_text: "Not Found".to_string(),
            http_version: "h2".to_string(),
            headers: vec![
                HarHeader { name: ":status".to_string(), value: "404".to_string() },
                HarHeader { name: "content-type".to_string(), value: "text/plain".to_string() },
            ],
            content: Some(HarContent { mime_type: "text/plain".to_string(), text: Some("gone".to_string()) }),
        };
        assert_eq!(
            har_response_to_http_text(&response),
            "HTTP/2.0 404 Not Found\r\ncontent-type: text/plain\r\n\r\ngone"
        );
    }
}
