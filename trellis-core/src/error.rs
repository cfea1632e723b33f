// Error taxonomy shared by every management operation

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Extra machine-readable fields returned next to `message`.
pub type Details = Map<String, Value>;

/// Failure of a management operation.
///
/// Client errors carry a human readable message; `InvalidArgument` and
/// `Conflict` may also carry details such as the offending ids so the caller
/// can retry with a corrected request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ManagementError {
    #[error("{message}")]
    InvalidArgument { message: String, details: Details },

    #[error("{message}")]
    Conflict { message: String, details: Details },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    /// Unexpected post-condition failure.
    #[error("{0}")]
    Problem(String),
}

pub type Result<T, E = ManagementError> = std::result::Result<T, E>;

impl ManagementError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
            details: Details::new(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            details: Details::new(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn problem(message: impl Into<String>) -> Self {
        Self::Problem(message.into())
    }

    /// Attach a detail field. Ignored for variants without details.
    pub fn with_detail(mut self, key: &str, value: impl Serialize) -> Self {
        if let Self::InvalidArgument { details, .. } | Self::Conflict { details, .. } = &mut self {
            let value = serde_json::to_value(value).unwrap_or(Value::Null);
            details.insert(key.to_string(), value);
        }
        self
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InvalidArgument { message, .. } | Self::Conflict { message, .. } => message,
            Self::NotFound(message)
            | Self::Forbidden(message)
            | Self::Unauthorized(message)
            | Self::Problem(message) => message,
        }
    }

    pub fn details(&self) -> Option<&Details> {
        match self {
            Self::InvalidArgument { details, .. } | Self::Conflict { details, .. } => Some(details),
            _ => None,
        }
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details().and_then(|d| d.get(key))
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidArgument { .. } => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict { .. } => 409,
            Self::Problem(_) => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// JSON body `{message, ...details}`.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("message".into(), Value::String(self.message().to_string()));
        if let Some(details) = self.details() {
            for (key, value) in details {
                body.insert(key.clone(), value.clone());
            }
        }
        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_codes() {
        assert_eq!(ManagementError::invalid("x").status_code(), 400);
        assert_eq!(ManagementError::unauthorized("x").status_code(), 401);
        assert_eq!(ManagementError::forbidden("x").status_code(), 403);
        assert_eq!(ManagementError::not_found("x").status_code(), 404);
        assert_eq!(ManagementError::conflict("x").status_code(), 409);
        assert_eq!(ManagementError::problem("x").status_code(), 500);
        assert!(ManagementError::conflict("x").is_client_error());
        assert!(ManagementError::problem("x").is_server_error());
    }

    #[test]
    fn test_details_are_merged_into_body() {
        let err = ManagementError::invalid("Unknown feature ids detected.")
            .with_detail("unknown", vec!["A", "B"]);

        assert_eq!(err.to_string(), "Unknown feature ids detected.");
        assert_eq!(
            err.to_body(),
            json!({"message": "Unknown feature ids detected.", "unknown": ["A", "B"]})
        );
        assert_eq!(err.detail("unknown"), Some(&json!(["A", "B"])));
    }

    #[test]
    fn test_with_detail_ignored_without_details() {
        let err = ManagementError::not_found("Tenant 'x' was not found.").with_detail("k", 1);
        assert!(err.details().is_none());
        assert_eq!(err.to_body(), json!({"message": "Tenant 'x' was not found."}));
    }
}
