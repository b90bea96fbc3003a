//! Error types for the slicer

use thiserror::Error;

/// Main error type for cube queries
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown cube, fact or other named resource
    #[error("{0}")]
    NotFound(String),

    /// The identity is not allowed to see the requested resource
    #[error("{0}")]
    Forbidden(String),

    /// Malformed client input (ambiguous depth, unknown dimension, bad report body, ...)
    #[error("{0}")]
    Validation(String),

    /// A cut expression could not be parsed
    #[error("Invalid cut '{cut}': {message}")]
    CutParse {
        /// The offending cut text
        cut: String,
        /// What was wrong with it
        message: String,
    },

    /// Failure reported by the browsing engine or the authorizer
    #[error("Engine error: {0}")]
    Engine(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Cube model could not be loaded or is inconsistent
    #[error("Model error: {0}")]
    Model(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Create a cut parse error naming the offending text
    pub fn cut_parse(cut: impl Into<String>, message: impl Into<String>) -> Self {
        Error::CutParse {
            cut: cut.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable error kind used in HTTP error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::Forbidden(_) => "forbidden",
            Error::Validation(_) => "validation_error",
            Error::CutParse { .. } => "cut_parse_error",
            Error::Engine(_) => "engine_error",
            Error::Configuration(_) => "configuration_error",
            Error::Model(_) => "model_error",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
        }
    }

    /// HTTP status code for this error
    ///
    /// Cut parse errors are client errors like any other validation failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::Forbidden(_) => 403,
            Error::Validation(_) | Error::CutParse { .. } => 400,
            _ => 500,
        }
    }

    /// True for errors caused by the request rather than the server
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
