//! Registry use-case services.
//!
//! # Responsibility
//! - Orchestrate phone normalization, name matching and store calls into
//!   resolution and reconciliation use-cases.
//! - Attach operation context to store failures before they reach callers.
//!
//! # Invariants
//! - Services hold no authoritative member state between calls.
//! - Store failures are never retried or swallowed.

use crate::model::validation::ValidationError;
use crate::store::StoreError;
use log::error;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod reconciliation_service;
pub mod resolution_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error surfaced by registry services.
#[derive(Debug)]
pub enum ServiceError {
    /// Caller input violates registry policy.
    Validation(ValidationError),
    /// Persistence failure while running `operation` for `key`.
    Store {
        operation: &'static str,
        key: String,
        source: StoreError,
    },
    /// CSV text could not be read or written.
    Csv {
        operation: &'static str,
        message: String,
    },
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store {
                operation,
                key,
                source,
            } => write!(f, "{operation} failed for `{key}`: {source}"),
            Self::Csv { operation, message } => write!(f, "{operation} failed: {message}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store { source, .. } => Some(source),
            Self::Csv { .. } => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Builds a `map_err` adapter that logs and wraps a store failure.
pub(crate) fn store_failure(
    module: &'static str,
    operation: &'static str,
    key: impl Display,
) -> impl FnOnce(StoreError) -> ServiceError {
    let key = key.to_string();
    move |source| {
        error!(
            "event={operation} module={module} status=error key={key} error_code=store_failed error={source}"
        );
        ServiceError::Store {
            operation,
            key,
            source,
        }
    }
}
