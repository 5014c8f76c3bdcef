use tck_core::HarnessError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Operación no válida para el modo de la cola (push vs pull).
    #[error("invalid queue mode: {0}")]
    InvalidQueueMode(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("task `{0}` already exists")]
    TaskAlreadyExists(String),
    #[error("unknown queue `{0}`")]
    UnknownQueue(String),
    #[error(transparent)]
    Harness(#[from] HarnessError),
}
