//! Request/response types for the HTTP API

use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub server_version: &'static str,
    pub api_version: u32,
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error kind (`not_found`, `validation_error`, ...)
    pub error: &'static str,
    /// Human-readable message
    pub message: String,
}
