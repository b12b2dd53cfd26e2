//! Error types for Lake Formation backends and the permissions resource

use thiserror::Error;

/// Service error classes the handlers make decisions on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    EntityNotFound,
    InvalidInput,
    ConcurrentModification,
    AccessDenied,
    AlreadyExists,
    Other,
    Transport,
}

/// Errors returned by a [`LakeFormationBackend`](crate::LakeFormationBackend)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("EntityNotFoundException: {0}")]
    EntityNotFound(String),

    #[error("InvalidInputException: {0}")]
    InvalidInput(String),

    #[error("ConcurrentModificationException: {0}")]
    ConcurrentModification(String),

    #[error("AccessDeniedException: {0}")]
    AccessDenied(String),

    #[error("AlreadyExistsException: {0}")]
    AlreadyExists(String),

    /// Any other modeled or unmodeled service error
    #[error("{code}: {message}")]
    Service { code: String, message: String },

    /// The request never got a service answer (dispatch, timeout, bad response)
    #[error("transport error: {0}")]
    Transport(String),
}

impl BackendError {
    /// Map a service error code (e.g. `ConcurrentModificationException`) to an error
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "EntityNotFoundException" => BackendError::EntityNotFound(message),
            "InvalidInputException" => BackendError::InvalidInput(message),
            "ConcurrentModificationException" => BackendError::ConcurrentModification(message),
            "AccessDeniedException" => BackendError::AccessDenied(message),
            "AlreadyExistsException" => BackendError::AlreadyExists(message),
            _ => BackendError::Service {
                code: code.to_string(),
                message,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BackendError::EntityNotFound(_) => ErrorKind::EntityNotFound,
            BackendError::InvalidInput(_) => ErrorKind::InvalidInput,
            BackendError::ConcurrentModification(_) => ErrorKind::ConcurrentModification,
            BackendError::AccessDenied(_) => ErrorKind::AccessDenied,
            BackendError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            BackendError::Service { .. } => ErrorKind::Other,
            BackendError::Transport(_) => ErrorKind::Transport,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            BackendError::EntityNotFound(msg)
            | BackendError::InvalidInput(msg)
            | BackendError::ConcurrentModification(msg)
            | BackendError::AccessDenied(msg)
            | BackendError::AlreadyExists(msg)
            | BackendError::Transport(msg) => msg,
            BackendError::Service { message, .. } => message,
        }
    }

    pub fn is_a(&self, kind: ErrorKind) -> bool {
        self.kind() == kind
    }

    /// Error of class `kind` whose message contains `needle`
    pub fn message_contains(&self, kind: ErrorKind, needle: &str) -> bool {
        self.is_a(kind) && self.message().contains(needle)
    }
}

/// Errors surfaced by the permissions resource handlers
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("{operation} Lake Formation permissions: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("{operation} Lake Formation permissions: empty response")]
    EmptyResponse { operation: &'static str },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ResourceError {
    pub fn backend(operation: &'static str, source: BackendError) -> Self {
        ResourceError::Backend { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code() {
        let err = BackendError::from_code("ConcurrentModificationException", "try again");
        assert_eq!(err.kind(), ErrorKind::ConcurrentModification);
        assert_eq!(err.message(), "try again");

        let err = BackendError::from_code("ThrottlingException", "slow down");
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(err.to_string(), "ThrottlingException: slow down");
    }

    #[test]
    fn test_message_contains_checks_kind() {
        let err = BackendError::InvalidInput("Invalid principal: arn:aws:iam::1:role/x".into());
        assert!(err.message_contains(ErrorKind::InvalidInput, "Invalid principal"));
        assert!(!err.message_contains(ErrorKind::AccessDenied, "Invalid principal"));
    }

    #[test]
    fn test_resource_error_display() {
        let err = ResourceError::backend("creating", BackendError::AccessDenied("nope".into()));
        assert_eq!(
            err.to_string(),
            "creating Lake Formation permissions: AccessDeniedException: nope"
        );
    }
}
