/// HAR import tests for fuzzwire
/// Browser exports become request text the codec parses

use fuzzwire::codec::{parse_request, parse_response};
use fuzzwire::har::{har_to_http_text, parse_har};
use fuzzwire::Method;

const TWO_ENTRIES: &str = r#"{
  "log": {
    "version": "1.2",
    "creator": { "name": "WebInspector", "version": "537.36" },
    "entries": [
      {
        "startedDateTime": "2023-01-01T00:00:00.000Z",
        "time": 200,
        "request": {
          "method": "GET",
          "url": "https://example.com/search?q=shoes",
          "httpVersion": "HTTP/1.1",
          "headers": [
            { "name": "Host", "value": "example.com" },
            { "name": "Accept", "value": "text/html" }
          ],
          "queryString": [{ "name": "q", "value": "shoes" }],
          "cookies": [],
          "headersSize": 150,
          "bodySize": 0
        },
        "response": {
          "status": 200,
          "statusText": "OK",
          "httpVersion": "HTTP/1.1",
          "headers": [{ "name": "Content-Type", "value": "text/html" }],
          "cookies": [],
          "content": { "size": 9, "mimeType": "text/html", "text": "<p>hi</p>" },
          "redirectURL": "",
          "headersSize": 100,
          "bodySize": 9
        },
        "cache": {},
        "timings": { "send": 0, "wait": 100, "receive": 100 }
      },
      {
        "startedDateTime": "2023-01-01T00:00:01.000Z",
        "time": 120,
        "request": {
          "method": "POST",
          "url": "https://example.com/api/login",
          "httpVersion": "h2",
          "headers": [
            { "name": ":authority", "value": "example.com" },
            { "name": "content-type", "value": "application/json" }
          ],
          "queryString": [],
          "cookies": [],
          "postData": { "mimeType": "application/json", "text": "{\"user\":\"alice\"}" },
          "headersSize": -1,
          "bodySize": 16
        },
        "response": {
          "status": 401,
          "statusText": "Unauthorized",
          "httpVersion": "h2",
          "headers": [],
          "cookies": [],
          "content": { "size": 0, "mimeType": "text/plain" },
          "redirectURL": "",
          "headersSize": -1,
          "bodySize": 0
        },
        "cache": {},
        "timings": { "send": 0, "wait": 100, "receive": 20 }
      }
    ]
  }
}"#;

#[test]
fn test_har_entries_become_parsable_requests() {
    let pairs = har_to_http_text(TWO_ENTRIES).expect("HAR should convert");
    assert_eq!(pairs.len(), 2);

    let first = parse_request(&pairs[0].request).expect("first request should parse");
    assert_eq!(first.method, Method::GET);
    assert_eq!(first.url.as_str(), "https://example.com/search?q=shoes");
    assert_eq!(first.target(), "/search?q=shoes");

    let mut second = parse_request(&pairs[1].request).expect("second request should parse");
    assert_eq!(second.method, Method::POST);
    assert_eq!(second.version, "HTTP/2.0");
    assert!(!second.headers.contains(":authority"));
    assert_eq!(second.content_type(), Some("application/json"));
    assert_eq!(second.body.text().unwrap(), r#"{"user":"alice"}"#);

    let mut response = parse_response(&pairs[0].response);
    assert_eq!(response.status, 200);
    assert_eq!(response.body.text().unwrap(), "<p>hi</p>");
    assert_eq!(parse_response(&pairs[1].response).status, 401);
}

#[test]
fn test_har_without_entries_is_rejected() {
    let err = parse_har(r#"{"log": {"version": "1.2"}}"#).unwrap_err();
    assert!(matches!(err, fuzzwire::Error::InvalidHar(_)));
}
