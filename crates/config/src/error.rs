use thiserror::Error;

/// Fatal at startup. On a hot-reload request, the caller logs this and
/// keeps the previous generation running instead of propagating it further.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("config file is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("config failed schema validation: {0}")]
    SchemaViolation(String),

    #[error("invalid regex in custom PII pattern '{name}': {message}")]
    InvalidCustomPattern { name: String, message: String },
}
