//! Application-level error: what a service call can fail with.

use thiserror::Error;

use clubhouse_auth::{AuthzError, TokenValidationError};
use clubhouse_core::{DomainError, ErrorBody, ErrorKind};

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Business-rule failure (validation, not found, forbidden, conflict).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The caller's token claims were rejected before any core operation ran.
    #[error("authentication failed: {0}")]
    Authentication(#[from] TokenValidationError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<AuthzError> for ServiceError {
    fn from(value: AuthzError) -> Self {
        ServiceError::Domain(value.into())
    }
}

impl ServiceError {
    /// Classification used by callers to pick a response status.
    ///
    /// Uniqueness violations and stale writes surface as conflicts, never as
    /// internal failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Domain(e) => e.kind(),
            ServiceError::Store(StoreError::Unique(_) | StoreError::Stale(_)) => ErrorKind::Conflict,
            ServiceError::Store(StoreError::MissingRow(_)) => ErrorKind::NotFound,
            ServiceError::Store(StoreError::Unavailable(_)) => ErrorKind::Internal,
            ServiceError::Authentication(_) => ErrorKind::Forbidden,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody::new(self.kind(), self.to_string())
    }
}
