use crate::content::ContentId;
use crate::types::{DomainName, UserName};
use thiserror::Error;

/// Store-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// A missing row is never an error: lookups return `None` or an empty list.
#[derive(Debug, Error)]
pub enum Error {
    /// Store error wrapper.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// A node or record failed its structural checks before a write.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The requesting user lacks the access level an operation needs.
    #[error("access denied: {user} may not {operation} {target}")]
    AccessDenied {
        user: String,
        operation: &'static str,
        target: String,
    },
    /// Parent chain loops back onto itself.
    #[error("parent cycle detected in domain {domain} at content {id}")]
    ParentCycle { domain: DomainName, id: ContentId },
    /// Parent chain is deeper than the configured bound.
    #[error("parent chain depth exceeded in domain {domain} at content {id}; max depth {max_depth}")]
    ParentDepthExceeded {
        domain: DomainName,
        id: ContentId,
        max_depth: usize,
    },
    /// Another user already holds the content lock.
    #[error("content {id} is locked by {owner}")]
    LockHeld { id: ContentId, owner: UserName },
    /// Operation is not defined for this kind of object.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn access_denied(
        user: Option<&crate::model::User>,
        operation: &'static str,
        target: impl ToString,
    ) -> Self {
        Self::AccessDenied {
            user: user.map_or_else(|| "<anonymous>".to_string(), ToString::to_string),
            operation,
            target: target.to_string(),
        }
    }
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}
