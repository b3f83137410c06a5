// Configuration for fuzzwire
// Loaded from TOML; every field has a default so an empty file is valid

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Settings shared by extraction, mutation and response analysis.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct FuzzConfig {
    /// Route shapes used to find path parameters, e.g. `/users/:id`.
    #[serde(default = "default_path_templates")]
    pub path_templates: Vec<String>,

    /// Headers never turned into parameters (compared case-insensitively).
    #[serde(default = "default_sensitive_headers")]
    pub sensitive_headers: Vec<String>,

    /// Prefix that marks header parameter names, e.g. `Header:User-Agent`.
    #[serde(default = "default_header_prefix")]
    pub header_prefix: String,

    /// Relative body length change that counts as an anomaly.
    #[serde(default = "default_length_deviation")]
    pub length_deviation: f64,

    /// A probe slower than baseline times this factor counts as an anomaly.
    #[serde(default = "default_slow_factor")]
    pub slow_factor: f64,
}

fn default_path_templates() -> Vec<String> {
    vec!["/users/:id/posts/:postId".to_string(), "/api/:version/products".to_string()]
}

fn default_sensitive_headers() -> Vec<String> {
    vec!["authorization".to_string(), "token".to_string(), "x-api-key".to_string()]
}

fn default_header_prefix() -> String {
    "Header:".to_string()
}

fn default_length_deviation() -> f64 {
    0.1
}

fn default_slow_factor() -> f64 {
    5.0
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            path_templates: default_path_templates(),
            sensitive_headers: default_sensitive_headers(),
            header_prefix: default_header_prefix(),
            length_deviation: default_length_deviation(),
            slow_factor: default_slow_factor(),
        }
    }
}

impl FuzzConfig {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), templates = config.path_templates.len(), "Config loaded");
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: FuzzConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for template in &self.path_templates {
            if !template.starts_with('/') {
                return Err(Error::InvalidConfig(format!(
                    "path template {:?} must start with '/'",
                    template
                )));
            }
            if template.split('/').any(|segment| segment == ":") {
                return Err(Error::InvalidConfig(format!(
                    "path template {:?} has an unnamed wildcard",
                    template
                )));
            }
        }
        if self.header_prefix.is_empty() {
            return Err(Error::InvalidConfig("header-prefix must not be empty".to_string()));
        }
        if self.length_deviation <= 0.0 || self.slow_factor <= 1.0 {
            return Err(Error::InvalidConfig(
                "length-deviation must be > 0 and slow-factor > 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_sensitive_header(&self, name: &str) -> bool {
        self.sensitive_headers.iter().any(|h| h.eq_ignore_ascii_case(name))
    }

    /// Display name of a header parameter, e.g. `Header:User-Agent`.
    pub fn header_param_name(&self, header: &str) -> String {
        format!("{}{}", self.header_prefix, header)
    }

    /// Header name behind a header parameter's display name.
    pub fn header_name<'a>(&self, param_name: &'a str) -> &'a str {
        param_name.strip_prefix(self.header_prefix.as_str()).unwrap_or(param_name)
    }
}
