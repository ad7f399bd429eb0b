//! Error types for kscp
//!
//! The mutation core is almost entirely total; the only failure a request
//! can hit is encoding the agent configuration. Configuration loading adds
//! validation errors, raised once at startup.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for kscp operations
#[derive(Debug, Error)]
pub enum Error {
    /// Serialization/deserialization error
    #[error("serialization error [{kind}]: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// What was being (de)serialized (e.g., "agent-config")
        kind: String,
    },

    /// Configuration rejected at load time
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The offending setting (e.g., "provider")
        field: Option<String>,
    },
}

impl Error {
    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create a serialization error for a specific payload kind
    pub fn serialization_of(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: kind.into(),
        }
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error naming the offending setting
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// The setting a validation error refers to, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => field.as_deref(),
            Self::Serialization { .. } => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization_of("json", e.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Self::serialization_of("base64", e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_error_display() {
        let err = Error::serialization_of("agent-config", "unexpected value");
        assert_eq!(
            err.to_string(),
            "serialization error [agent-config]: unexpected value"
        );
    }

    #[test]
    fn test_serialization_error_defaults_to_unknown_kind() {
        let err = Error::serialization("boom");
        match err {
            Error::Serialization { kind, .. } => assert_eq!(kind, UNKNOWN_CONTEXT),
            other => panic!("expected serialization error, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_error_carries_field() {
        let err = Error::validation_for_field("provider", "must not be empty");
        assert_eq!(err.field(), Some("provider"));
        assert!(err.to_string().contains("must not be empty"));

        assert_eq!(Error::validation("bad").field(), None);
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization { ref kind, .. } if kind == "json"));
    }

    #[test]
    fn test_from_base64_error() {
        use base64::Engine;
        let b64_err = base64::engine::general_purpose::STANDARD
            .decode("***")
            .unwrap_err();
        let err: Error = b64_err.into();
        assert!(matches!(err, Error::Serialization { ref kind, .. } if kind == "base64"));
    }
}
