//! Error types for the chat engine.

use thiserror::Error;

use parley_database::StoreError;

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Main error taxonomy for the chat engine.
///
/// Every handler-level failure maps onto one of these; they are returned
/// to the caller as structured error acks and never tear down a
/// connection.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("authentication failed: {reason}")]
    Auth { reason: String },

    #[error("permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("store unavailable: {message}")]
    TransientStore { message: String },
}

impl ChatError {
    pub fn auth(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
        }
    }

    pub fn permission_denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
        }
    }

    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn transient_store(message: impl Into<String>) -> Self {
        Self::TransientStore {
            message: message.into(),
        }
    }

    /// Stable wire code for error acks.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth_error",
            Self::PermissionDenied { .. } => "permission_error",
            Self::NotFound { .. } => "not_found",
            Self::Validation { .. } => "validation_error",
            Self::TransientStore { .. } => "transient_store_error",
        }
    }

    /// Whether a client may safely retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStore { .. })
    }
}

impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RowNotFound { what, id } => Self::NotFound { what, id },
            other => Self::TransientStore {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ChatError::auth("x").code(), "auth_error");
        assert_eq!(ChatError::permission_denied("x").code(), "permission_error");
        assert_eq!(ChatError::not_found("order", "O1").code(), "not_found");
        assert_eq!(ChatError::validation("x").code(), "validation_error");
        assert_eq!(
            ChatError::transient_store("x").code(),
            "transient_store_error"
        );
    }

    #[test]
    fn store_row_not_found_maps_to_not_found() {
        let err: ChatError = StoreError::row_not_found("chat", "c1").into();
        assert!(matches!(err, ChatError::NotFound { what: "chat", .. }));
    }

    #[test]
    fn other_store_errors_are_transient() {
        let err: ChatError = StoreError::Database("locked".to_string()).into();
        assert!(err.is_retryable());
    }
}
