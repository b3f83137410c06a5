// Error type for fuzzwire
// Codec, extraction, mutation and transport failures share one enum

use thiserror::Error;

/// Errors produced by the codec, the fuzz session and the transport.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading a capture or config file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for `FuzzConfig`.
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Config parsed but failed validation.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// The first line of a raw request is not `METHOD target [VERSION]`.
    #[error("Invalid request line: {0:?}")]
    InvalidRequestLine(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid HTTP method: {0:?}")]
    InvalidMethod(String),

    /// Header name or value the transport cannot put on the wire.
    #[error("Invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// The message body was already read; clone the message before reading it.
    #[error("Body already consumed")]
    BodyConsumed,

    /// A HAR document parsed as JSON but is missing `log.version` or `log.entries`.
    #[error("Invalid HAR: {0}")]
    InvalidHar(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Network failure while sending; never retried.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The request's cancel signal fired before the response arrived.
    #[error("Request cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
