//! Error types and handling for duosida-direct
//!
//! This module defines the error types used throughout the crate. The first
//! four variants are the protocol taxonomy (transport, decode, deadline and
//! parameter problems); the rest belong to the configuration layer.

use thiserror::Error;

/// Result type alias for charger operations
pub type Result<T> = std::result::Result<T, ChargerError>;

/// Main error type for charger communication
#[derive(Debug, Error)]
pub enum ChargerError {
    /// Socket not open, connect/send/recv failure
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Undecodable or internally inconsistent payload
    #[error("Communication error: {message}")]
    Communication { message: String },

    /// No data within the read deadline
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Parameter outside its documented range
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl ChargerError {
    /// Create a new connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        ChargerError::Connection {
            message: message.into(),
        }
    }

    /// Create a new communication error
    pub fn communication<S: Into<String>>(message: S) -> Self {
        ChargerError::Communication {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        ChargerError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        ChargerError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        ChargerError::Config {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        ChargerError::Io {
            message: message.into(),
        }
    }

    /// Whether the error came from rejected input rather than the transport
    pub fn is_validation(&self) -> bool {
        matches!(self, ChargerError::Validation { .. })
    }
}

impl From<std::io::Error> for ChargerError {
    fn from(err: std::io::Error) -> Self {
        ChargerError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for ChargerError {
    fn from(err: serde_yaml::Error) -> Self {
        ChargerError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ChargerError {
    fn from(err: serde_json::Error) -> Self {
        ChargerError::Serialization {
            message: err.to_string(),
        }
    }
}
