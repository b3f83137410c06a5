// Request parameter model and extraction
//
// A FuzzParam is one attacker-controllable value found in a request, tagged
// with the surface it came from:
//
// - extractor: scans query, path, body, cookie and header surfaces
// - body:      content-type registry of body formats (extract + rebuild)
// - multipart: multipart/form-data part parser
// - path:      route templates with `:name` wildcards
//
// Architecture:
//   path.rs, multipart.rs (leaves)
//       ↑
//   body.rs (format registry, uses multipart)
//       ↑
//   extractor.rs (uses body + path, produces ParamSet)
//       ↑
//   session.rs / mutator.rs

pub mod body;
pub mod extractor;
pub mod multipart;
pub mod path;

pub use body::{BodyFormat, BodyFormatRegistry, FormBody, JsonBody, MultipartBody};
pub use extractor::ParameterExtractor;
pub use path::PathTemplate;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Where in the request a parameter lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamPosition {
    Query,
    Path,
    Header,
    Cookie,
    Form,
    Json,
    Xml,
    Multipart,
    File,
}

impl ParamPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamPosition::Query => "query",
            ParamPosition::Path => "path",
            ParamPosition::Header => "header",
            ParamPosition::Cookie => "cookie",
            ParamPosition::Form => "form",
            ParamPosition::Json => "json",
            ParamPosition::Xml => "xml",
            ParamPosition::Multipart => "multipart",
            ParamPosition::File => "file",
        }
    }

    /// Header and cookie parameters carry authentication state and are never
    /// offered for fuzzing.
    pub fn is_fuzzable(&self) -> bool {
        !matches!(self, ParamPosition::Header | ParamPosition::Cookie)
    }
}

impl fmt::Display for ParamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter value: one string, or an ordered list for repeated keys and
/// JSON arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Single(String),
    Multiple(Vec<String>),
}

impl ParamValue {
    /// One value stays `Single`, anything else becomes `Multiple`.
    pub fn from_values(mut values: Vec<String>) -> Self {
        if values.len() == 1 {
            ParamValue::Single(values.remove(0))
        } else {
            ParamValue::Multiple(values)
        }
    }

    pub fn values(&self) -> &[String] {
        match self {
            ParamValue::Single(value) => std::slice::from_ref(value),
            ParamValue::Multiple(values) => values,
        }
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self, ParamValue::Multiple(_))
    }

    /// First value, if any.
    pub fn first(&self) -> Option<&str> {
        self.values().first().map(String::as_str)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Single(value) => f.write_str(value),
            ParamValue::Multiple(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Single(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        ParamValue::Multiple(values)
    }
}

/// Extra facts recorded about a parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_template: Option<String>,
    /// Set for cookie parameters: whether `Secure` appeared in their Cookie header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<bool>,
    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// One fuzzable value in a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuzzParam {
    pub name: String,
    pub value: ParamValue,
    pub position: ParamPosition,
    pub is_array: bool,
    pub metadata: ParamMetadata,
}

impl FuzzParam {
    pub fn new(name: impl Into<String>, value: impl Into<ParamValue>, position: ParamPosition) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            is_array: value.is_multiple(),
            value,
            position,
            metadata: ParamMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ParamMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Same parameter carrying a different value; this is what gets handed
    /// to the mutator.
    pub fn with_value(&self, value: impl Into<ParamValue>) -> Self {
        let value = value.into();
        Self {
            name: self.name.clone(),
            is_array: value.is_multiple(),
            value,
            position: self.position,
            metadata: self.metadata.clone(),
        }
    }
}

/// Every parameter found in one request, in surface-scan order
/// (query, path, body, cookie, header). Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSet {
    params: Vec<FuzzParam>,
}

impl ParamSet {
    pub fn new(params: Vec<FuzzParam>) -> Self {
        Self { params }
    }

    /// The full snapshot, header and cookie parameters included.
    pub fn all(&self) -> &[FuzzParam] {
        &self.params
    }

    /// Everything except header and cookie parameters, in original order.
    pub fn fuzzable(&self) -> Vec<&FuzzParam> {
        self.params.iter().filter(|p| p.position.is_fuzzable()).collect()
    }

    pub fn find(&self, name: &str, position: ParamPosition) -> Option<&FuzzParam> {
        self.params.iter().find(|p| p.name == name && p.position == position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FuzzParam> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl<'a> IntoIterator for &'a ParamSet {
    type Item = &'a FuzzParam;
    type IntoIter = std::slice::Iter<'a, FuzzParam>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

/// Group `(key, value)` pairs by key, keeping first-occurrence order of keys
/// and the order of values within each key.
pub(crate) fn group_ordered<I>(pairs: I) -> Vec<(String, Vec<String>)>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for (key, value) in pairs {
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => groups.push((key, vec![value])),
        }
    }
    groups
}
