//! Error taxonomy shared by every component of the client.
//!
//! Validation failures are split into "field absent" and "field invalid" so
//! callers can branch on the two without string matching. Every variant
//! carries the field, operation id or lookup key that triggered it.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config item '{name}': {reason}")]
    Config { name: String, reason: String },

    #[error("credentials: {0}")]
    Credentials(String),

    #[error("no model '{model}'{}", .variant.as_deref().map(|v| format!(" with variant '{v}'")).unwrap_or_default())]
    UnknownModel {
        model: String,
        variant: Option<String>,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("openapi spec unavailable: {0}")]
    SpecUnavailable(String),

    #[error("openapi spec parse error: {0}")]
    SpecParse(String),

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("{operation}: missing required parameter '{parameter}'")]
    MissingParameter { operation: String, parameter: String },

    #[error("{operation}: unexpected parameter '{parameter}'")]
    UnknownParameter { operation: String, parameter: String },

    #[error("{operation}: transport error{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Transport {
        operation: String,
        status: Option<u16>,
        message: String,
    },

    #[error("no object found matching {0}")]
    NotFound(String),

    #[error("{count} objects match {key}; expected exactly one")]
    AmbiguousMatch { key: String, count: usize },
}

/// Payload validation failure raised by the model validator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{model}: missing required field '{field}'")]
    Missing { model: String, field: String },

    #[error("{model}: invalid value for field '{field}': {reason}")]
    Invalid {
        model: String,
        field: String,
        reason: String,
    },
}

impl ValidationError {
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Missing { field, .. } | ValidationError::Invalid { field, .. } => {
                field
            }
        }
    }
}

impl Error {
    /// True for a required field that was absent or empty.
    pub fn is_missing_field(&self) -> bool {
        matches!(self, Error::Validation(ValidationError::Missing { .. }))
    }

    /// True for a field that was present but had the wrong type or value.
    pub fn is_invalid_value(&self) -> bool {
        matches!(self, Error::Validation(ValidationError::Invalid { .. }))
    }

    pub(crate) fn config(name: &str, reason: impl Into<String>) -> Self {
        Error::Config {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn transport(
        operation: &str,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Error::Transport {
            operation: operation.to_string(),
            status,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_classes_are_distinct() {
        let missing: Error = ValidationError::Missing {
            model: "Network".into(),
            field: "name".into(),
        }
        .into();
        assert!(missing.is_missing_field());
        assert!(!missing.is_invalid_value());

        let invalid: Error = ValidationError::Invalid {
            model: "Connection".into(),
            field: "speed".into(),
            reason: "150 not in allowed values".into(),
        }
        .into();
        assert!(invalid.is_invalid_value());
        assert!(!invalid.is_missing_field());
    }

    #[test]
    fn messages_name_the_context() {
        let err = Error::UnknownModel {
            model: "Connection".into(),
            variant: Some("CARRIER_PIGEON".into()),
        };
        assert_eq!(
            err.to_string(),
            "no model 'Connection' with variant 'CARRIER_PIGEON'"
        );

        let err = Error::transport("getNetworks", Some(404), "not found");
        assert_eq!(
            err.to_string(),
            "getNetworks: transport error (status 404): not found"
        );
    }
}
