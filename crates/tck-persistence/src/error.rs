//! Errores de persistencia.
//! Mapea errores de Diesel / conexión a variantes semánticas, y éstas al
//! `StoreError` que ve el harness.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tck_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("configuration: {0}")]
    Config(String),
    #[error("check violation: {0}")]
    CheckViolation(String),
    #[error("not found")]
    NotFound,
    #[error("serialization conflict (retryable)")]
    SerializationConflict,
    #[error("transient IO / connection pool error: {0}")]
    TransientIo(String),
    #[error("malformed row: {0}")]
    Malformed(String),
    #[error("unknown database error: {0}")]
    Unknown(String),
}

impl From<DieselError> for PersistenceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(kind, info) => match kind {
                DatabaseErrorKind::CheckViolation => Self::CheckViolation(info.message().to_string()),
                DatabaseErrorKind::SerializationFailure => Self::SerializationConflict,
                DatabaseErrorKind::ClosedConnection => Self::TransientIo(info.message().to_string()),
                other => Self::Unknown(format!("db error kind {:?}: {}", other, info.message())),
            },
            DieselError::DeserializationError(e) => Self::Malformed(format!("deser: {e}")),
            DieselError::SerializationError(e) => Self::Unknown(format!("ser: {e}")),
            DieselError::RollbackErrorOnCommit { rollback_error, commit_error } => {
                Self::Unknown(format!("rollback={rollback_error}; commit={commit_error}"))
            }
            DieselError::BrokenTransactionManager => Self::TransientIo("broken transaction manager".into()),
            other => Self::Unknown(format!("unhandled diesel error: {other:?}")),
        }
    }
}

impl From<PersistenceError> for StoreError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::TransientIo(msg) => StoreError::Unavailable(msg),
            PersistenceError::SerializationConflict => StoreError::Transaction("serialization conflict".into()),
            PersistenceError::Malformed(msg) | PersistenceError::CheckViolation(msg) => StoreError::Malformed(msg),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_errors_surface_as_unavailable() {
        let store: StoreError = PersistenceError::TransientIo("pool timed out".into()).into();
        assert_eq!(store, StoreError::Unavailable("pool timed out".into()));
        let store: StoreError = PersistenceError::from(DieselError::NotFound).into();
        assert!(matches!(store, StoreError::Backend(_)));
    }
}
