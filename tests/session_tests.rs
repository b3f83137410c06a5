/// Fuzz session tests for fuzzwire
/// Uses a recording transport so nothing touches the network

use fuzzwire::codec::{dump_request, parse_request};
use fuzzwire::parameters::{ParamPosition, ParamValue};
use fuzzwire::{
    CancelSignal, Error, FuzzConfig, FuzzSession, HttpRequest, HttpResponse, Method, RawPostOptions, RedirectPolicy,
    Result, Transport,
};
use std::sync::Mutex;
use std::time::Duration;

/// Records the wire text of every request and answers 200 after `delay`.
#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<String>>,
    delay: Duration,
}

impl RecordingTransport {
    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        if request.signal.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let wire = dump_request(&mut request)?;
        self.sent.lock().unwrap().push(wire);
        Ok(HttpResponse::new(200).with_body("ok"))
    }
}

const SEARCH: &str = "GET /search?q=shoes&page=2 HTTP/1.1\r\nHost: shop.test\r\nCookie: sid=abc; theme=dark\r\n\r\n";

async fn session(raw: &str) -> FuzzSession<RecordingTransport> {
    let request = parse_request(raw).expect("capture should parse");
    FuzzSession::from_request(request, &FuzzConfig::default(), RecordingTransport::default())
        .await
        .expect("session should build")
}

// ============================================================================
// Parameters
// ============================================================================

#[tokio::test]
async fn test_fuzzable_params_exclude_headers_and_cookies() {
    let session = session(SEARCH).await;

    assert_eq!(session.get_all_params().len(), 6);
    let fuzzable: Vec<&str> = session.get_all_fuzzable_params().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(fuzzable, vec!["q", "page"]);
}

// ============================================================================
// Mutation
// ============================================================================

#[tokio::test]
async fn test_query_mutation_leaves_everything_else_alone() {
    let session = session(SEARCH).await;
    let q = session.params().find("q", ParamPosition::Query).unwrap().with_value("x");

    let exchange = session.send_modified_request(&q).await.expect("send should succeed");

    assert_eq!(exchange.response.status, 200);
    assert_eq!(exchange.request.url.query(), Some("page=2&q=x"));
    assert_eq!(exchange.request.headers.get("cookie"), Some("sid=abc; theme=dark"));
    assert_eq!(
        session.transport().sent(),
        vec!["GET /search?page=2&q=x HTTP/1.1\r\nHost: shop.test\r\nCookie: sid=abc; theme=dark\r\n\r\n"]
    );
    // the source request is untouched and can be sent again
    assert_eq!(session.request().url.query(), Some("q=shoes&page=2"));
    session.send_original_request().await.expect("source should still send");
}

#[tokio::test]
async fn test_cookie_mutation_rewrites_one_cookie() {
    let session = session(SEARCH).await;
    let sid = session.params().find("sid", ParamPosition::Cookie).unwrap().with_value("evil");

    let request = session.build_modified_request(&sid).unwrap();
    assert_eq!(request.headers.get("cookie"), Some("theme=dark; sid=evil"));
}

#[tokio::test]
async fn test_header_mutation_strips_prefix() {
    let session = session("GET / HTTP/1.1\r\nHost: h\r\nUser-Agent: curl/8\r\n\r\n").await;
    let agent = session
        .params()
        .find("Header:User-Agent", ParamPosition::Header)
        .unwrap()
        .with_value("fuzz");

    let request = session.build_modified_request(&agent).unwrap();
    assert_eq!(request.headers.get("user-agent"), Some("fuzz"));
    assert!(!request.headers.contains("Header:User-Agent"));
}

#[tokio::test]
async fn test_path_mutation_swaps_bound_segment() {
    let session = session("GET /users/42/posts/7 HTTP/1.1\r\nHost: h\r\n\r\n").await;
    let id = session.params().find("id", ParamPosition::Path).unwrap().with_value("43");

    let request = session.build_modified_request(&id).unwrap();
    assert_eq!(request.url.path(), "/users/43/posts/7");
}

#[tokio::test]
async fn test_path_traversal_value_reaches_the_wire() {
    let session = session("GET /users/42/posts/7?v=1 HTTP/1.1\r\nHost: h\r\n\r\n").await;
    let id = session
        .params()
        .find("id", ParamPosition::Path)
        .unwrap()
        .with_value("../../../../etc/passwd");

    session.send_modified_request(&id).await.unwrap();
    let dotted = session.params().find("postId", ParamPosition::Path).unwrap().with_value("..");
    session.send_modified_request(&dotted).await.unwrap();

    assert_eq!(
        session.transport().sent(),
        vec![
            "GET /users/..%2F..%2F..%2F..%2Fetc%2Fpasswd/posts/7?v=1 HTTP/1.1\r\nHost: h\r\n\r\n",
            "GET /users/42/posts/..?v=1 HTTP/1.1\r\nHost: h\r\n\r\n",
        ]
    );
}

#[tokio::test]
async fn test_json_mutation_updates_body_and_length() {
    let body = r#"{"user":{"id":"5","name":"bob"}}"#;
    let raw = format!(
        "PUT /profile HTTP/1.1\r\nHost: h\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let session = session(&raw).await;
    let id = session
        .params()
        .find("user.id", ParamPosition::Json)
        .unwrap()
        .with_value(ParamValue::Multiple(vec!["1".to_string(), "2".to_string()]));

    let mut request = session.build_modified_request(&id).unwrap();
    let rebuilt = request.body.text().unwrap();
    assert_eq!(rebuilt, r#"{"user":{"id":["1","2"],"name":"bob"}}"#);
    assert_eq!(request.headers.get("content-length"), Some(rebuilt.len().to_string().as_str()));
}

// ============================================================================
// Sending
// ============================================================================

#[tokio::test]
async fn test_timed_send_reports_duration() {
    let request = parse_request(SEARCH).unwrap();
    let transport = RecordingTransport {
        delay: Duration::from_millis(30),
        ..RecordingTransport::default()
    };
    let session = FuzzSession::from_request(request, &FuzzConfig::default(), transport).await.unwrap();
    let page = session.params().find("page", ParamPosition::Query).unwrap().with_value("3");

    let exchange = session.send_modified_request_ex(&page).await.unwrap();
    assert!(exchange.duration >= Duration::from_millis(30));
}

#[tokio::test]
async fn test_derived_requests_share_cancellation() {
    let signal = CancelSignal::new();
    let request = parse_request(SEARCH)
        .unwrap()
        .with_signal(signal.clone())
        .with_redirect(RedirectPolicy::Error);
    let session = FuzzSession::from_request(request, &FuzzConfig::default(), RecordingTransport::default())
        .await
        .unwrap();
    let q = session.params().find("q", ParamPosition::Query).unwrap().with_value("x");

    let derived = session.build_modified_request(&q).unwrap();
    assert!(derived.signal.same_as(&signal));
    assert_eq!(derived.redirect, RedirectPolicy::Error);

    signal.cancel();
    let err = session.send_modified_request(&q).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(session.transport().sent().is_empty());
}

#[tokio::test]
async fn test_raw_post_overrides_method_and_headers() {
    let session = session(SEARCH).await;
    let mut options = RawPostOptions {
        method: Some(Method::PUT),
        ..RawPostOptions::default()
    };
    options.headers.append("Content-Type", "text/plain");

    let exchange = session.fuzz_post_raw("id={{randstr(4)}}", options).await.unwrap();

    assert_eq!(exchange.request.method, Method::PUT);
    assert_eq!(exchange.request.url, session.request().url);
    let sent = session.transport().sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("PUT /search?q=shoes&page=2 HTTP/1.1\r\n"));
    assert!(sent[0].contains("Content-Type: text/plain\r\n"));
    assert!(sent[0].contains("Cookie: sid=abc; theme=dark\r\n"));
    assert!(!sent[0].contains("{{randstr"));
}
