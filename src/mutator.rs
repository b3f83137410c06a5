// Single-parameter request rebuilding
//
// Given a source request and one FuzzParam carrying replacement value(s),
// produce a new request in which only that parameter changed. The source is
// never touched: every rebuild starts from a structural clone, so method,
// version, redirect policy and cancel signal carry over unchanged.

use crate::codec::CloneHttp;
use crate::config::FuzzConfig;
use crate::error::Result;
use crate::models::{Body, HeaderMap, HttpRequest};
use crate::parameters::body::replace_urlencoded;
use crate::parameters::{BodyFormatRegistry, FuzzParam, ParamPosition, PathTemplate};
use std::sync::Arc;

/// Rebuilds requests with one parameter replaced.
#[derive(Debug, Clone)]
pub struct ParameterMutator {
    config: FuzzConfig,
    formats: Arc<BodyFormatRegistry>,
}

impl ParameterMutator {
    pub fn new(config: &FuzzConfig, formats: Arc<BodyFormatRegistry>) -> Self {
        Self {
            config: config.clone(),
            formats,
        }
    }

    /// New request equal to `source` except for `param`.
    ///
    /// Body positions are rebuilt through the body format registered for the
    /// request's Content-Type; formats without a rebuild rule (xml,
    /// multipart) leave the body as it was.
    pub fn rebuild_request(&self, source: &HttpRequest, param: &FuzzParam) -> Result<HttpRequest> {
        let mut request = source.clone_http()?;
        let values = param.value.values();

        match param.position {
            ParamPosition::Query => replace_query(&mut request, &param.name, values),
            ParamPosition::Header => {
                let name = self.config.header_name(&param.name);
                request.headers.remove(name);
                for value in values {
                    request.headers.append(name, value.as_str());
                }
            }
            ParamPosition::Cookie => replace_cookie(&mut request.headers, &param.name, values),
            ParamPosition::Path => replace_path_segment(&mut request, param),
            ParamPosition::Form
            | ParamPosition::Json
            | ParamPosition::Xml
            | ParamPosition::Multipart
            | ParamPosition::File => self.rebuild_body(&mut request, param)?,
        }

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            param = %param.name,
            position = %param.position,
            "Rebuilt request"
        );
        Ok(request)
    }

    fn rebuild_body(&self, request: &mut HttpRequest, param: &FuzzParam) -> Result<()> {
        let Some(content_type) = request.content_type().map(str::to_string) else {
            tracing::debug!(param = %param.name, "No Content-Type, body left unchanged");
            return Ok(());
        };
        let Some(format) = self.formats.lookup(&content_type) else {
            tracing::debug!(content_type = %content_type, "No body format, body left unchanged");
            return Ok(());
        };

        let original = request.body.bytes()?;
        match format.rebuild(&original, &content_type, &param.name, &param.value) {
            Some(rebuilt) => {
                if request.headers.contains("content-length") {
                    request.headers.set("Content-Length", rebuilt.len().to_string());
                }
                request.body = Body::new(rebuilt);
            }
            None => {
                tracing::debug!(format = format.name(), "Format has no rebuild rule, body left unchanged");
                request.body = Body::new(original);
            }
        }
        Ok(())
    }
}

/// Drop every cookie called `name` and append one `name=value` per value.
/// All Cookie header lines collapse into one, at the first line's position.
fn replace_cookie(headers: &mut HeaderMap, name: &str, values: &[String]) {
    let mut segments: Vec<String> = headers
        .get_all("cookie")
        .flat_map(|header| header.split(';'))
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .filter(|segment| segment.split_once('=').map_or(*segment, |(key, _)| key) != name)
        .map(str::to_string)
        .collect();
    for value in values {
        segments.push(format!("{}={}", name, value));
    }
    headers.set("Cookie", segments.join("; "));
}

/// Rewrite the query on both the wire target and the URL.
fn replace_query(request: &mut HttpRequest, name: &str, values: &[String]) {
    let query = replace_urlencoded(request.raw_query().unwrap_or_default(), name, values);
    let path = request.raw_path().to_string();
    if query.is_empty() {
        request.raw_target = path;
        request.url.set_query(None);
    } else {
        request.raw_target = format!("{}?{}", path, query);
        request.url.set_query(Some(&query));
    }
}

/// Swap the path segment bound to the parameter's wildcard.
///
/// The value is spliced into the wire target as one segment: characters that
/// would end the segment or the target are percent-encoded, dots are not
/// touched, so `../x` goes out as `..%2Fx`.
fn replace_path_segment(request: &mut HttpRequest, param: &FuzzParam) {
    let index = param
        .metadata
        .path_template
        .as_deref()
        .map(PathTemplate::parse)
        .and_then(|template| template.wildcard_index(&param.name));
    let Some(index) = index else {
        tracing::debug!(param = %param.name, "Path parameter without template, path left unchanged");
        return;
    };

    let mut segments: Vec<String> = request.raw_path().split('/').map(str::to_string).collect();
    match (segments.get_mut(index), param.value.first()) {
        (Some(segment), Some(value)) => *segment = encode_segment(value),
        _ => return,
    }
    let path = segments.join("/");
    request.raw_target = match request.raw_query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.clone(),
    };
    request.url.set_path(&path);
}

fn encode_segment(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '/' => encoded.push_str("%2F"),
            '?' => encoded.push_str("%3F"),
            '#' => encoded.push_str("%23"),
            ' ' => encoded.push_str("%20"),
            '\r' => encoded.push_str("%0D"),
            '\n' => encoded.push_str("%0A"),
            _ => encoded.push(c),
        }
    }
    encoded
}
