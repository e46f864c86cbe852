use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AuthFailed(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Expired(String),
    #[error("the user already has the maximum number of checks ({max})")]
    QuotaExceeded { max: usize },
    #[error(transparent)]
    PartialFailure(#[from] PartialFailure),
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::AuthFailed(_) => "auth_failed",
            Self::Forbidden(_) => "forbidden",
            Self::Expired(_) => "expired",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::PartialFailure(_) => "partial_failure",
            Self::Store(_) => "store_error",
        }
    }

    pub(crate) fn forbidden() -> Self {
        Self::Forbidden("missing required token in header, or token is invalid".into())
    }
}

/// The primary effect of an operation committed but a dependent step did not.
///
/// Nothing is rolled back. `orphans` lists ids that may now be left dangling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{committed}, but {cause}")]
pub struct PartialFailure {
    pub committed: String,
    pub cause: LinkFailure,
    pub orphans: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkFailure {
    #[error("owner {phone} does not exist")]
    OwnerMissing { phone: String },
    #[error("check {check_id} is not listed on owner {phone}")]
    NotLinked { check_id: String, phone: String },
    #[error("{failed} of {total} checks could not be deleted")]
    ChecksNotDeleted { failed: usize, total: usize },
    #[error("storage failure: {message}")]
    Store { message: String },
}
