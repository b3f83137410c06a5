// Fuzz session for fuzzwire
// One captured request, its parameters, and the sends derived from it

use crate::codec::CloneHttp;
use crate::config::FuzzConfig;
use crate::engine::Transport;
use crate::error::Result;
use crate::models::{Body, HeaderMap, HttpRequest, HttpResponse, Method};
use crate::mutator::ParameterMutator;
use crate::parameters::{BodyFormatRegistry, FuzzParam, ParamSet, ParameterExtractor};
use crate::payloads::expand_randstr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// A sent request together with the response it produced.
#[derive(Debug)]
pub struct Exchange {
    pub request: HttpRequest,
    pub response: HttpResponse,
}

/// An [`Exchange`] plus the wall-clock time the send took.
#[derive(Debug)]
pub struct TimedExchange {
    pub request: HttpRequest,
    pub response: HttpResponse,
    pub duration: Duration,
}

/// Options for [`FuzzSession::fuzz_post_raw`].
#[derive(Debug, Clone, Default)]
pub struct RawPostOptions {
    /// Defaults to POST.
    pub method: Option<Method>,
    /// Replace same-named headers of the source request.
    pub headers: HeaderMap,
}

/// A source request with its extracted parameters.
///
/// Only built through [`FuzzSession::from_request`], which finishes
/// extraction first, so every accessor sees the complete ParamSet.
pub struct FuzzSession<T: Transport> {
    request: HttpRequest,
    params: ParamSet,
    mutator: ParameterMutator,
    transport: T,
}

impl<T: Transport> FuzzSession<T> {
    pub async fn from_request(request: HttpRequest, config: &FuzzConfig, transport: T) -> Result<Self> {
        Self::from_request_with_formats(request, config, transport, Arc::new(BodyFormatRegistry::default())).await
    }

    /// Like [`from_request`](Self::from_request) with a caller-supplied body format registry.
    pub async fn from_request_with_formats(
        request: HttpRequest,
        config: &FuzzConfig,
        transport: T,
        formats: Arc<BodyFormatRegistry>,
    ) -> Result<Self> {
        let extractor = ParameterExtractor::new(config, Arc::clone(&formats));
        let params = extractor.extract(&request).await?;

        info!(
            method = %request.method,
            url = %request.url,
            params = params.len(),
            fuzzable = params.fuzzable().len(),
            "Fuzz session ready"
        );

        Ok(Self {
            request,
            params,
            mutator: ParameterMutator::new(config, formats),
            transport,
        })
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    pub fn get_all_params(&self) -> &[FuzzParam] {
        self.params.all()
    }

    /// Parameters outside the header and cookie positions.
    pub fn get_all_fuzzable_params(&self) -> Vec<&FuzzParam> {
        self.params.fuzzable()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The source request with `param` applied, without sending it.
    pub fn build_modified_request(&self, param: &FuzzParam) -> Result<HttpRequest> {
        self.mutator.rebuild_request(&self.request, param)
    }

    /// Send a copy of the source request; the source stays reusable.
    pub async fn send_original_request(&self) -> Result<HttpResponse> {
        let request = self.request.clone_http()?;
        self.transport.send(request).await
    }

    pub async fn send_modified_request(&self, param: &FuzzParam) -> Result<Exchange> {
        let exchange = self.send_modified_request_ex(param).await?;
        Ok(Exchange {
            request: exchange.request,
            response: exchange.response,
        })
    }

    /// Send the source with `param` applied and time the round trip.
    pub async fn send_modified_request_ex(&self, param: &FuzzParam) -> Result<TimedExchange> {
        let request = self.build_modified_request(param)?;
        let sent = request.clone_http()?;

        info!(
            param = %param.name,
            position = %param.position,
            value = %param.value,
            "Sending modified request"
        );

        let start = Instant::now();
        let response = self.transport.send(sent).await?;
        let duration = start.elapsed();

        Ok(TimedExchange {
            request,
            response,
            duration,
        })
    }

    /// Send `body` verbatim to the source URL.
    ///
    /// Source headers are kept unless `options.headers` sets the same name.
    /// `{{randstr(n)}}` placeholders in the body are expanded first.
    pub async fn fuzz_post_raw(&self, body: &str, options: RawPostOptions) -> Result<Exchange> {
        let method = options.method.unwrap_or(Method::POST);
        let body = expand_randstr(body);

        let mut headers = self.request.headers.clone();
        for name in options.headers.names() {
            if let Some(value) = options.headers.get_joined(name) {
                headers.set(name, value);
            }
        }
        if headers.contains("content-length") {
            headers.set("Content-Length", body.len().to_string());
        }

        let mut request = HttpRequest::new(method, self.request.url.clone())
            .with_redirect(self.request.redirect)
            .with_signal(self.request.signal.clone());
        request.raw_target = self.request.raw_target.clone();
        request.version = self.request.version.clone();
        request.headers = headers;
        request.body = Body::from(body);

        let sent = request.clone_http()?;
        info!(method = %request.method, url = %request.url, bytes = request.body.len(), "Sending raw body");
        let response = self.transport.send(sent).await?;

        Ok(Exchange { request, response })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::parse_request;
    use crate::error::Error;
    use std::sync::Mutex;

    struct EchoTransport {
        sent: Mutex<Vec<String>>,
    }

    impl Transport for EchoTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            if request.signal.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.sent.lock().unwrap().push(request.target().to_string());
            Ok(HttpResponse::new(200))
        }
    }

    fn transport() -> EchoTransport {
        EchoTransport { sent: Mutex::new(Vec::new()) }
    }

    #[tokio::test]
    async fn modified_request_carries_one_change() {
        let request = parse_request(b"GET /search?q=a&page=2 HTTP/1.1\r\nHost: h\r\n\r\n").unwrap();
        let session = FuzzSession::from_request(request, &FuzzConfig::default(), transport())
            .await
            .unwrap();

        let q = session.params().find("q", crate::parameters::ParamPosition::Query).unwrap().with_value("x");
        let exchange = session.send_modified_request(&q).await.unwrap();

        assert_eq!(exchange.request.url.query(), Some("page=2&q=x"));
        assert_eq!(session.request().url.query(), Some("q=a&page=2"));
        assert_eq!(session.transport().sent.lock().unwrap().as_slice(), ["/search?page=2&q=x"]);
    }

    #[tokio::test]
    async fn raw_post_defaults_to_post_and_expands_randstr() {
        let request = parse_request(b"GET /api HTTP/1.1\r\nHost: h\r\nAccept: */*\r\n\r\n").unwrap();
        let session = FuzzSession::from_request(request, &FuzzConfig::default(), transport())
            .await
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.append("Accept", "application/json");
        let mut exchange = session
            .fuzz_post_raw("token={{randstr(6)}}", RawPostOptions { method: None, headers })
            .await
            .unwrap();

        assert_eq!(exchange.request.method, Method::POST);
        assert_eq!(exchange.request.headers.get_all("accept").collect::<Vec<_>>(), ["application/json"]);
        let body = exchange.request.body.text().unwrap();
        assert!(body.starts_with("token="));
        assert_eq!(body.len(), "token=".len() + 6);
    }
}
