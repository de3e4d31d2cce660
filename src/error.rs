//! Error handling for the Hustly inventory client

use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Error body returned by the Postgrest gateway
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiErrorDetails {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl ApiErrorDetails {
    /// Parse an error body, keeping the raw text as the message when it is not JSON
    pub fn from_body(body: &str) -> Self {
        serde_json::from_str::<ApiErrorDetails>(body).unwrap_or_else(|_| ApiErrorDetails {
            message: Some(body.to_string()),
            ..Default::default()
        })
    }

    /// Whether the gateway rejected the caller's JWT
    pub fn is_jwt_error(&self) -> bool {
        matches!(self.code.as_deref(), Some("PGRST301") | Some("PGRST302"))
    }
}

impl fmt::Display for ApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(code) = &self.code {
            parts.push(format!("Code: {}", code));
        }
        if let Some(message) = &self.message {
            parts.push(format!("Message: {}", message));
        }
        if let Some(details) = &self.details {
            parts.push(format!("Details: {}", details));
        }
        if let Some(hint) = &self.hint {
            parts.push(format!("Hint: {}", hint));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// Unified error type for the Hustly inventory client
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing, expired or rejected session
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Error reported by the database gateway
    #[error("Database error: {details} (Status: {status})")]
    Database {
        details: ApiErrorDetails,
        status: StatusCode,
    },

    /// Input rejected before reaching the backend
    #[error("Validation error: {0}")]
    Validation(String),

    /// Row not found for the current tenant
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// JWT errors
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new authentication error
    pub fn auth<T: fmt::Display>(msg: T) -> Self {
        Error::Auth(msg.to_string())
    }

    /// Create a new validation error
    pub fn validation<T: fmt::Display>(msg: T) -> Self {
        Error::Validation(msg.to_string())
    }

    /// Create a new not-found error
    pub fn not_found<T: fmt::Display>(msg: T) -> Self {
        Error::NotFound(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }

    /// Map a non-success gateway response onto the error taxonomy
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let details = ApiErrorDetails::from_body(body);
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || details.is_jwt_error()
        {
            let message = details
                .message
                .clone()
                .unwrap_or_else(|| status.to_string());
            return Error::Auth(message);
        }
        Error::Database { details, status }
    }

    /// Whether the error means the caller has no usable session
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::Jwt(_))
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
