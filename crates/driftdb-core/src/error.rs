use crate::value::Value;
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Not a stable API; intended for internal use and may change without notice.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    #[must_use]
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct the registry-origin conflict raised when two distinct
    /// entries claim the same identity value.
    pub(crate) fn duplicate_identity(column: &str, key: &Value) -> Self {
        Self {
            class: ErrorClass::Conflict,
            origin: ErrorOrigin::Registry,
            message: format!("duplicate value of \"{column}\" column: {key}"),
            detail: Some(ErrorDetail::Registry(RegistryError::DuplicateIdentity {
                column: column.to_string(),
            })),
        }
    }

    /// Construct an executor-origin internal error.
    pub(crate) fn executor_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Executor, message.into())
    }

    /// Construct an executor-origin invariant violation.
    pub(crate) fn executor_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Executor,
            message.into(),
        )
    }

    /// Construct an executor-origin corruption error.
    pub(crate) fn executor_corruption(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Corruption, ErrorOrigin::Executor, message.into())
    }

    /// Construct a store-origin internal error.
    pub fn store_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Store, message.into())
    }

    /// Construct a store-origin conflict error.
    pub fn store_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Conflict, ErrorOrigin::Store, message.into())
    }

    /// Construct a store-origin invariant violation.
    pub fn store_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Store,
            message.into(),
        )
    }

    #[must_use]
    pub const fn is_duplicate_identity(&self) -> bool {
        matches!(
            self.detail,
            Some(ErrorDetail::Registry(RegistryError::DuplicateIdentity { .. }))
        )
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
/// This enum is intentionally extensible.
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Registry(RegistryError),
}

///
/// RegistryError
///
/// Registry-specific structured error detail.
/// Never returned directly; always wrapped in [`ErrorDetail::Registry`].
///

#[derive(Debug, ThisError)]
pub enum RegistryError {
    #[error("duplicate identity value for column: {column}")]
    DuplicateIdentity { column: String },
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Conflict,
    Corruption,
    Internal,
    InvariantViolation,
    NotFound,
    Unsupported,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Conflict => "conflict",
            Self::Corruption => "corruption",
            Self::Internal => "internal",
            Self::InvariantViolation => "invariant_violation",
            Self::NotFound => "not_found",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Codec,
    Executor,
    Registry,
    Store,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Codec => "codec",
            Self::Executor => "executor",
            Self::Registry => "registry",
            Self::Store => "store",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_identity_carries_structured_detail() {
        let err = InternalError::duplicate_identity("id", &Value::Uint(7));
        assert_eq!(err.class, ErrorClass::Conflict);
        assert_eq!(err.origin, ErrorOrigin::Registry);
        assert!(err.is_duplicate_identity());
        assert!(err.message.contains("\"id\""));
    }

    #[test]
    fn display_with_class_prefixes_origin_and_class() {
        let err = InternalError::executor_internal("cannot get insert result from store");
        assert_eq!(
            err.display_with_class(),
            "executor:internal: cannot get insert result from store"
        );
    }

    #[test]
    fn plain_errors_carry_no_detail() {
        let err = InternalError::store_internal("boom");
        assert!(err.detail.is_none());
        assert!(!err.is_duplicate_identity());
    }
}
