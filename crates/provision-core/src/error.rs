use std::fmt;

use thiserror::Error;

/// Classification of a failed provider call.
///
/// Collaborators tag every error they return so callers can branch on the
/// kind instead of inspecting the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ProviderErrorKind {
    /// The addressed resource does not exist (or no longer exists).
    NotFound,
    /// A transient condition such as a read timeout; the call may be retried.
    Transient,
    /// Any other failure.
    Other,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::Transient => "transient",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// Error returned by a cloud-provider collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
}

impl ProviderError {
    #[must_use]
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::NotFound, message)
    }

    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transient, message)
    }

    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Other, message)
    }

    #[must_use]
    pub fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ProviderErrorKind::NotFound
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind == ProviderErrorKind::Transient
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
