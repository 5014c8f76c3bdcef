//! Errores del harness.
//!
//! Taxonomía:
//! - `Configuration` / `MissingInstance` / `InstanceTypeMismatch`: el registro
//!   no puede resolver algo requerido. Abortan el setup del test actual.
//! - `State`: cualquier fallo del datastore, envuelto en la frontera del
//!   `TempDataStore`. El caller nunca ve un registro escrito a medias.
//! - `NeverObserved`: la variante de existencia del poller agotó su
//!   presupuesto. La variante por valor NO produce error (devuelve el último
//!   valor observado).
//! - `Interrupted`: la espera fue cancelada; es fatal.

use std::time::Duration;

use thiserror::Error;

/// Fallos del collaborator de datastore.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("transaction failed: {0}")]
    Transaction(String),
    #[error("datastore unavailable: {0}")]
    Unavailable(String),
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("no provider supplied an instance of `{type_name}` for `{owner}`")]
    MissingInstance { owner: String, type_name: &'static str },
    #[error("instance provided for `{owner}` is not a `{type_name}`")]
    InstanceTypeMismatch { owner: String, type_name: &'static str },
    #[error("harness state error: {0}")]
    State(#[from] StoreError),
    #[error("{what} not observed after {attempts} attempts ({waited:?})")]
    NeverObserved { what: String, attempts: u32, waited: Duration },
    #[error("wait interrupted")]
    Interrupted,
    #[error("no such resource: {0}")]
    MissingResource(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;

impl HarnessError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// `true` para errores que deben abortar la fase de setup del test.
    pub fn is_configuration(&self) -> bool {
        matches!(self,
                 Self::Configuration(_) | Self::MissingInstance { .. } | Self::InstanceTypeMismatch { .. })
    }
}
