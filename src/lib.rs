pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod har;
pub mod models;
pub mod mutator;
pub mod parameters;
pub mod payloads;
pub mod reporting;
pub mod response_analysis;
pub mod session;

// Re-export commonly used items
pub use codec::{clone_http, dump_request, dump_response, parse_request, parse_response, CloneHttp};
pub use config::FuzzConfig;
pub use engine::{HttpTransport, Transport};
pub use error::{Error, Result};
pub use models::*;
pub use mutator::ParameterMutator;
pub use parameters::{FuzzParam, ParamMetadata, ParamPosition, ParamSet, ParamValue, ParameterExtractor};
pub use session::{Exchange, FuzzSession, RawPostOptions, TimedExchange};
