// Parameter extraction across every request surface
//
// Five independent scans (query, path, body, cookie, header) run
// concurrently and are joined into one ParamSet. The body scan works on a
// structural clone so the caller's request keeps its body unread.

use super::body::BodyFormatRegistry;
use super::path::{find_template, PathTemplate};
use super::{group_ordered, FuzzParam, ParamMetadata, ParamPosition, ParamSet, ParamValue};
use crate::codec::CloneHttp;
use crate::config::FuzzConfig;
use crate::error::Result;
use crate::models::{HeaderMap, HttpRequest};
use std::sync::Arc;
use url::Url;

/// Turns a request into its ParamSet.
#[derive(Debug, Clone)]
pub struct ParameterExtractor {
    config: FuzzConfig,
    templates: Vec<PathTemplate>,
    formats: Arc<BodyFormatRegistry>,
}

impl ParameterExtractor {
    pub fn new(config: &FuzzConfig, formats: Arc<BodyFormatRegistry>) -> Self {
        Self {
            config: config.clone(),
            templates: config.path_templates.iter().map(|t| PathTemplate::parse(t)).collect(),
            formats,
        }
    }

    /// Scan all five surfaces and join them in order query, path, body,
    /// cookie, header.
    ///
    /// Fails only when the request body was already consumed.
    pub async fn extract(&self, request: &HttpRequest) -> Result<ParamSet> {
        let body_source = request.clone_http()?;

        let (query, path, body, cookie, header) = tokio::join!(
            self.scan_query(&request.url),
            self.scan_path(request.raw_path()),
            self.scan_body(body_source),
            self.scan_cookies(&request.headers),
            self.scan_headers(&request.headers),
        );

        tracing::debug!(
            query = query.len(),
            path = path.len(),
            body = body.len(),
            cookie = cookie.len(),
            header = header.len(),
            "Parameter surfaces scanned"
        );

        let mut params = query;
        params.extend(path);
        params.extend(body);
        params.extend(cookie);
        params.extend(header);
        Ok(ParamSet::new(params))
    }

    async fn scan_query(&self, url: &Url) -> Vec<FuzzParam> {
        let pairs = url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned()));
        group_ordered(pairs)
            .into_iter()
            .map(|(name, values)| {
                FuzzParam::new(name, ParamValue::from_values(values), ParamPosition::Query).with_metadata(
                    ParamMetadata {
                        path_template: Some(url.path().to_string()),
                        ..ParamMetadata::default()
                    },
                )
            })
            .collect()
    }

    async fn scan_path(&self, path: &str) -> Vec<FuzzParam> {
        let Some((template, matches)) = find_template(&self.templates, path) else {
            return Vec::new();
        };
        matches
            .into_iter()
            .map(|m| {
                FuzzParam::new(m.name, m.value, ParamPosition::Path).with_metadata(ParamMetadata {
                    path_template: Some(template.as_str().to_string()),
                    ..ParamMetadata::default()
                })
            })
            .collect()
    }

    async fn scan_body(&self, mut request: HttpRequest) -> Vec<FuzzParam> {
        let Some(content_type) = request.content_type().map(str::to_string) else {
            return Vec::new();
        };
        let Some(format) = self.formats.lookup(&content_type) else {
            tracing::debug!(content_type = %content_type, "No body format registered");
            return Vec::new();
        };
        let body = match request.body.bytes() {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "Body unavailable for extraction");
                return Vec::new();
            }
        };
        match format.extract(&body, &content_type) {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!(format = format.name(), error = %e, "Body parameters could not be decoded");
                Vec::new()
            }
        }
    }

    async fn scan_cookies(&self, headers: &HeaderMap) -> Vec<FuzzParam> {
        let mut params = Vec::new();
        for header in headers.get_all("cookie") {
            // Every cookie of a header line shares the flag
            let secure = header.contains("Secure");
            for segment in header.split(';') {
                let segment = segment.trim();
                let (name, value) = segment.split_once('=').unwrap_or((segment, ""));
                if name.is_empty() {
                    continue;
                }
                params.push(FuzzParam::new(name, value, ParamPosition::Cookie).with_metadata(
                    ParamMetadata {
                        security: Some(secure),
                        ..ParamMetadata::default()
                    },
                ));
            }
        }
        params
    }

    async fn scan_headers(&self, headers: &HeaderMap) -> Vec<FuzzParam> {
        headers
            .names()
            .into_iter()
            .filter(|name| !self.config.is_sensitive_header(name))
            .filter_map(|name| {
                let value = headers.get_joined(name)?;
                Some(FuzzParam::new(self.config.header_param_name(name), value, ParamPosition::Header))
            })
            .collect()
    }
}
