// Body format registry
//
// Maps a request Content-Type to the format that knows how to pull
// parameters out of that body and how to write one back. Built-in formats:
// urlencoded form, JSON and multipart. Callers can register their own;
// registered formats are consulted before the built-ins.

use super::multipart::{disposition_param, parse_multipart};
use super::{group_ordered, FuzzParam, ParamMetadata, ParamPosition, ParamValue};
use crate::error::Result;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use url::form_urlencoded;

/// A body encoding the fuzzer understands.
pub trait BodyFormat: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Whether this format handles `media_type` (lowercase, no parameters).
    fn matches(&self, media_type: &str) -> bool;

    /// Parameters found in `body`. An error means the body could not be
    /// decoded; the caller treats that as "no body parameters".
    fn extract(&self, body: &[u8], content_type: &str) -> Result<Vec<FuzzParam>>;

    /// New body with `name` set to `value`, or `None` to leave the body as is.
    fn rebuild(&self, _body: &[u8], _content_type: &str, _name: &str, _value: &ParamValue) -> Option<Vec<u8>> {
        None
    }
}

/// `type/subtype` of a Content-Type header, lowercased.
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Ordered set of body formats, searched first to last.
#[derive(Clone)]
pub struct BodyFormatRegistry {
    formats: Vec<Arc<dyn BodyFormat>>,
}

impl BodyFormatRegistry {
    /// Registry with no formats at all; every body passes through.
    pub fn empty() -> Self {
        Self { formats: Vec::new() }
    }

    /// Add a format ahead of everything already registered.
    pub fn register(&mut self, format: impl BodyFormat + 'static) {
        self.formats.insert(0, Arc::new(format));
    }

    pub fn lookup(&self, content_type: &str) -> Option<&dyn BodyFormat> {
        let media_type = media_type(content_type);
        self.formats
            .iter()
            .find(|format| format.matches(&media_type))
            .map(|format| &**format)
    }
}

impl Default for BodyFormatRegistry {
    fn default() -> Self {
        Self {
            formats: vec![Arc::new(FormBody), Arc::new(JsonBody), Arc::new(MultipartBody)],
        }
    }
}

impl fmt::Debug for BodyFormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.formats.iter().map(|format| format.name()))
            .finish()
    }
}

/// Replace every `name=` pair in an urlencoded string.
///
/// Pairs for other keys are kept byte for byte; the replacements are
/// appended at the end, one pair per value.
pub fn replace_urlencoded(raw: &str, name: &str, values: &[String]) -> String {
    let mut pairs: Vec<String> = raw
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            form_urlencoded::parse(pair.as_bytes())
                .next()
                .map(|(key, _)| key != name)
                .unwrap_or(true)
        })
        .map(str::to_string)
        .collect();
    for value in values {
        pairs.push(
            form_urlencoded::Serializer::new(String::new())
                .append_pair(name, value)
                .finish(),
        );
    }
    pairs.join("&")
}

/// `application/x-www-form-urlencoded`
#[derive(Debug, Clone, Copy, Default)]
pub struct FormBody;

impl BodyFormat for FormBody {
    fn name(&self) -> &'static str {
        "form"
    }

    fn matches(&self, media_type: &str) -> bool {
        media_type == "application/x-www-form-urlencoded"
    }

    fn extract(&self, body: &[u8], _content_type: &str) -> Result<Vec<FuzzParam>> {
        let pairs = form_urlencoded::parse(body).map(|(k, v)| (k.into_owned(), v.into_owned()));
        Ok(group_ordered(pairs)
            .into_iter()
            .map(|(name, values)| FuzzParam::new(name, ParamValue::from_values(values), ParamPosition::Form))
            .collect())
    }

    fn rebuild(&self, body: &[u8], _content_type: &str, name: &str, value: &ParamValue) -> Option<Vec<u8>> {
        let raw = String::from_utf8_lossy(body);
        Some(replace_urlencoded(&raw, name, value.values()).into_bytes())
    }
}

/// `application/json` and `+json` media types.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody;

impl JsonBody {
    fn flatten(prefix: &str, value: &Value, out: &mut Vec<FuzzParam>) {
        let entries: Vec<(String, &Value)> = match value {
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
            Value::Array(items) => items.iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect(),
            _ => return,
        };
        for (key, child) in entries {
            let full_key = if prefix.is_empty() {
                key
            } else {
                format!("{}.{}", prefix, key)
            };
            match child {
                Value::Object(_) => Self::flatten(&full_key, child, out),
                Value::Array(items) => {
                    let values = items.iter().map(Self::scalar_text).collect::<Vec<_>>();
                    out.push(Self::param(full_key, ParamValue::Multiple(values)));
                }
                scalar => out.push(Self::param(full_key, ParamValue::Single(Self::scalar_text(scalar)))),
            }
        }
    }

    fn scalar_text(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn param(name: String, value: ParamValue) -> FuzzParam {
        FuzzParam::new(name, value, ParamPosition::Json).with_metadata(ParamMetadata {
            content_type: Some("application/json".to_string()),
            ..ParamMetadata::default()
        })
    }

    /// Follow a dotted key through nested objects; falls back to the literal
    /// top-level key when the path does not resolve.
    fn set_key(map: &mut Map<String, Value>, name: &str, replacement: Value) {
        if map.contains_key(name) {
            map.insert(name.to_string(), replacement);
            return;
        }
        if let Some((head, rest)) = name.split_once('.') {
            if let Some(Value::Object(child)) = map.get_mut(head) {
                if Self::resolves(child, rest) {
                    Self::set_key(child, rest, replacement);
                    return;
                }
            }
        }
        map.insert(name.to_string(), replacement);
    }

    fn resolves(map: &Map<String, Value>, name: &str) -> bool {
        if map.contains_key(name) {
            return true;
        }
        match name.split_once('.') {
            Some((head, rest)) => match map.get(head) {
                Some(Value::Object(child)) => Self::resolves(child, rest),
                _ => false,
            },
            None => false,
        }
    }
}

impl BodyFormat for JsonBody {
    fn name(&self) -> &'static str {
        "json"
    }

    fn matches(&self, media_type: &str) -> bool {
        media_type == "application/json" || media_type.ends_with("+json")
    }

    fn extract(&self, body: &[u8], _content_type: &str) -> Result<Vec<FuzzParam>> {
        let json: Value = serde_json::from_slice(body)?;
        let mut params = Vec::new();
        Self::flatten("", &json, &mut params);
        Ok(params)
    }

    fn rebuild(&self, body: &[u8], _content_type: &str, name: &str, value: &ParamValue) -> Option<Vec<u8>> {
        let mut json: Value = if body.is_empty() {
            Value::Object(Map::new())
        } else {
            match serde_json::from_slice(body) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!(error = %e, "JSON body not rebuildable, sending unchanged");
                    return None;
                }
            }
        };
        let replacement = match value {
            ParamValue::Single(v) => Value::String(v.clone()),
            ParamValue::Multiple(vs) => Value::Array(vs.iter().cloned().map(Value::String).collect()),
        };
        match json.as_object_mut() {
            Some(map) => Self::set_key(map, name, replacement),
            None => {
                tracing::warn!("JSON body is not an object, sending unchanged");
                return None;
            }
        }
        serde_json::to_vec(&json).ok()
    }
}

/// `multipart/form-data`. Extraction only; rebuilding passes the body through.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultipartBody;

impl BodyFormat for MultipartBody {
    fn name(&self) -> &'static str {
        "multipart"
    }

    fn matches(&self, media_type: &str) -> bool {
        media_type == "multipart/form-data"
    }

    fn extract(&self, body: &[u8], content_type: &str) -> Result<Vec<FuzzParam>> {
        let Some(boundary) = disposition_param(content_type, "boundary") else {
            tracing::warn!(content_type = %content_type, "multipart body without boundary");
            return Ok(Vec::new());
        };
        let parts = parse_multipart(body, &boundary);

        let mut params: Vec<FuzzParam> = Vec::new();
        for part in parts {
            let text = String::from_utf8_lossy(&part.data).into_owned();
            if let Some(existing) = params.iter_mut().find(|p| p.name == part.name) {
                let mut values = existing.value.values().to_vec();
                values.push(text);
                existing.value = ParamValue::Multiple(values);
                existing.is_array = true;
                continue;
            }

            let mut metadata = ParamMetadata::default();
            let position = match &part.filename {
                Some(filename) => {
                    metadata.content_type = Some(
                        part.content_type
                            .clone()
                            .unwrap_or_else(|| "application/octet-stream".to_string()),
                    );
                    metadata.extra.insert("filename".to_string(), filename.clone());
                    ParamPosition::File
                }
                None => {
                    metadata.content_type = Some("text/plain".to_string());
                    ParamPosition::Multipart
                }
            };
            params.push(FuzzParam::new(part.name, text, position).with_metadata(metadata));
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_parameters_and_case() {
        let registry = BodyFormatRegistry::default();
        assert_eq!(registry.lookup("Application/JSON; charset=utf-8").unwrap().name(), "json");
        assert_eq!(registry.lookup("application/vnd.api+json").unwrap().name(), "json");
        assert_eq!(registry.lookup("multipart/form-data; boundary=x").unwrap().name(), "multipart");
        assert!(registry.lookup("text/xml").is_none());
    }

    struct XmlStub;

    impl BodyFormat for XmlStub {
        fn name(&self) -> &'static str {
            "xml"
        }
        fn matches(&self, media_type: &str) -> bool {
            media_type.ends_with("xml")
        }
        fn extract(&self, _body: &[u8], _content_type: &str) -> Result<Vec<FuzzParam>> {
            Ok(vec![FuzzParam::new("root", "", ParamPosition::Xml)])
        }
    }

    #[test]
    fn registered_formats_take_precedence() {
        let mut registry = BodyFormatRegistry::default();
        registry.register(XmlStub);
        let format = registry.lookup("application/xml").unwrap();
        assert_eq!(format.name(), "xml");
        assert!(format.rebuild(b"<a/>", "application/xml", "root", &"x".into()).is_none());
    }

    #[test]
    fn json_flattens_nested_keys_and_arrays() {
        let body = br#"{"user":{"name":"bob","age":7,"tags":["a",1]},"ok":true,"none":null}"#;
        let params = JsonBody.extract(body, "application/json").unwrap();
        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["user.name", "user.age", "user.tags", "ok", "none"]);
        assert_eq!(params[1].value, ParamValue::Single("7".to_string()));
        assert_eq!(params[2].value, ParamValue::Multiple(vec!["a".to_string(), "1".to_string()]));
        assert!(params[2].is_array);
        assert_eq!(params[4].value, ParamValue::Single("null".to_string()));
    }

    #[test]
    fn json_rebuild_follows_dotted_path() {
        let body = br#"{"user":{"name":"bob"},"id":1}"#;
        let rebuilt = JsonBody
            .rebuild(body, "application/json", "user.name", &"alice".into())
            .unwrap();
        assert_eq!(rebuilt, br#"{"user":{"name":"alice"},"id":1}"#);

        let rebuilt = JsonBody
            .rebuild(body, "application/json", "id", &ParamValue::Multiple(vec!["1".into(), "2".into()]))
            .unwrap();
        assert_eq!(rebuilt, br#"{"user":{"name":"bob"},"id":["1","2"]}"#);
    }

    #[test]
    fn json_rebuild_passes_through_garbage() {
        assert!(JsonBody.rebuild(b"{not json", "application/json", "a", &"b".into()).is_none());
    }

    #[test]
    fn urlencoded_replace_keeps_other_pairs_verbatim() {
        let raw = "a=1&b=%20x&a=2";
        let replaced = replace_urlencoded(raw, "a", &["9".to_string(), "<x>".to_string()]);
        assert_eq!(replaced, "b=%20x&a=9&a=%3Cx%3E");
    }

    #[test]
    fn form_extract_groups_repeats() {
        let params = FormBody.extract(b"info=sad&tag=1&tag=2", "application/x-www-form-urlencoded").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].value, ParamValue::Single("sad".to_string()));
        assert!(params[1].is_array);
        assert_eq!(params[1].position, ParamPosition::Form);
    }
}
