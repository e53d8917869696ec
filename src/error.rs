// SPDX-License-Identifier: MIT

//! Typed error handling for leadflow-rs
//!
//! Nodes surface failures as `LeadflowError`; the scheduler turns them into
//! error-log entries instead of aborting the run. Only seed validation and
//! graph construction errors ever reach the caller.

use thiserror::Error;

/// Top-level error type for leadflow-rs
#[derive(Debug, Error)]
pub enum LeadflowError {
    /// The seed record is missing required data
    #[error("Invalid seed record: {0}")]
    InvalidSeed(String),

    /// Configuration errors (missing env vars, invalid config)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Workflow-specific errors
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Model/LLM errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Collaborator service errors (search, scraping, profile lookup, persistence)
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Graph construction and execution errors
#[derive(Debug, Error, PartialEq)]
pub enum WorkflowError {
    /// Two nodes declared with the same id
    #[error("Duplicate node: {0}")]
    DuplicateNode(String),

    /// An edge references a node that was never declared
    #[error("Unknown node '{node}' referenced by edge {from} -> {to}")]
    UnknownNode {
        node: String,
        from: String,
        to: String,
    },

    /// Circular dependency detected in graph workflow
    #[error("Circular dependency detected: {0:?}")]
    CircularDependency(Vec<String>),

    /// No entry node was declared, or the entry has predecessors
    #[error("Invalid entry node: {0}")]
    InvalidEntry(String),

    /// Terminal node declared with outgoing edges
    #[error("Terminal node '{0}' must not have successors")]
    InvalidTerminal(String),

    /// More than one conditional edge leaving the same node
    #[error("Node '{0}' already has a conditional edge")]
    DuplicateConditional(String),

    /// A spawned node task could not be joined
    #[error("Node task failed to join: {0}")]
    TaskJoin(String),
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Model provider not supported
    #[error("Model provider not supported: {0}")]
    UnsupportedProvider(String),

    /// Provider returned a non-success status
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors raised by external collaborators invoked from nodes
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Credentials or endpoint for the collaborator are missing
    #[error("{0} is not configured")]
    NotConfigured(String),

    /// The per-call timeout elapsed
    #[error("{service} timed out after {secs}s")]
    Timeout { service: String, secs: u64 },

    /// Non-success HTTP status
    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },

    /// Transport errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Response did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Text generation failed
    #[error(transparent)]
    Model(#[from] ModelError),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl LeadflowError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl ServiceError {
    /// Create a non-success status error
    pub fn status(service: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            service: service.into(),
            status,
            body: body.into(),
        }
    }
}

impl ModelError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

impl From<&str> for LeadflowError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for LeadflowError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_display() {
        let err = ServiceError::Timeout {
            service: "text generation".to_string(),
            secs: 30,
        };
        assert_eq!(err.to_string(), "text generation timed out after 30s");

        let err = ServiceError::status("serper", 403, "forbidden");
        assert_eq!(err.to_string(), "serper returned HTTP 403: forbidden");
    }

    #[test]
    fn test_service_error_is_transparent_in_top_level() {
        let err: LeadflowError = ServiceError::NotConfigured("Serper API key".to_string()).into();
        assert_eq!(err.to_string(), "Serper API key is not configured");
    }

    #[test]
    fn test_workflow_error_wrapping() {
        let err: LeadflowError =
            WorkflowError::CircularDependency(vec!["a".to_string(), "b".to_string()]).into();
        assert!(err.to_string().starts_with("Workflow error: Circular dependency"));
    }
}
