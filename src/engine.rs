// Network send capability for fuzzwire
// A Transport takes a structured request and returns the structured response;
// HttpTransport does this with reqwest on the tokio runtime

use crate::error::{Error, Result};
use crate::models::{HeaderMap, HttpRequest, HttpResponse, RedirectPolicy};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::{Client, Version};
use std::future::Future;

/// Headers the client computes itself from the body it is given.
const CLIENT_MANAGED_HEADERS: &[&str] = &["content-length", "transfer-encoding", "connection"];

/// Something that can put a request on the wire.
///
/// One call is one attempt: implementations must not retry, and failures go
/// back to the caller unchanged.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send;
}

/// reqwest-backed transport. Keeps one client per redirect policy.
#[derive(Clone)]
pub struct HttpTransport {
    follow: Client,
    manual: Client,
    strict: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Ok(Self {
            follow: Self::client(Policy::limited(10))?,
            manual: Self::client(Policy::none())?,
            strict: Self::client(Policy::custom(|attempt| attempt.error("redirects are not allowed")))?,
        })
    }

    fn client(policy: Policy) -> Result<Client> {
        Ok(Client::builder()
            .pool_max_idle_per_host(10)
            .redirect(policy)
            .build()?)
    }

    fn client_for(&self, policy: RedirectPolicy) -> &Client {
        match policy {
            RedirectPolicy::Follow => &self.follow,
            RedirectPolicy::Manual => &self.manual,
            RedirectPolicy::Error => &self.strict,
        }
    }

    fn build(&self, mut request: HttpRequest) -> Result<reqwest::RequestBuilder> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|_| Error::InvalidMethod(request.method.to_string()))?;
        let mut builder = self.client_for(request.redirect).request(method, request.url.clone());

        for (name, value) in request.headers.iter() {
            if CLIENT_MANAGED_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name)) {
                continue;
            }
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
            builder = builder.header(header_name, header_value);
        }

        let body = request.body.bytes()?;
        if !body.is_empty() {
            builder = builder.body(body);
        }
        Ok(builder)
    }

    async fn convert(response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status();
        let mut converted = HttpResponse::new(status.as_u16());
        converted.version = version_label(response.version()).to_string();
        converted.reason = status.canonical_reason().unwrap_or_default().to_string();
        converted.url = Some(response.url().clone());
        converted.headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect::<HeaderMap>();
        converted.body = response.bytes().await?.to_vec().into();
        Ok(converted)
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let signal = request.signal.clone();
        if signal.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tracing::info!(method = %request.method, url = %request.url, "Sending request");
        let builder = self.build(request)?;

        tokio::select! {
            result = async { Self::convert(builder.send().await?).await } => {
                if let Ok(response) = &result {
                    tracing::debug!(status = response.status, bytes = response.body.len(), "Response received");
                }
                result
            }
            _ = signal.cancelled() => {
                tracing::info!("Request cancelled");
                Err(Error::Cancelled)
            }
        }
    }
}

fn version_label(version: Version) -> &'static str {
    if version == Version::HTTP_09 {
        "0.9"
    } else if version == Version::HTTP_10 {
        "1.0"
    } else if version == Version::HTTP_2 {
        "2.0"
    } else if version == Version::HTTP_3 {
        "3.0"
    } else {
        "1.1"
    }
}
