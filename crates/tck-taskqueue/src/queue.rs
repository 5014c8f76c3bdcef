//! Contrato de cola consumido por los tests.
use std::time::Duration;

use crate::error::QueueError;
use crate::options::{TaskHandle, TaskOptions};

/// Nombre de la cola por defecto.
pub const DEFAULT_QUEUE: &str = "default";

/// Headers que acompañan cada entrega push.
pub mod headers {
    pub const QUEUE_NAME: &str = "X-AppEngine-QueueName";
    pub const TASK_NAME: &str = "X-AppEngine-TaskName";
    pub const TASK_RETRY_COUNT: &str = "X-AppEngine-TaskRetryCount";
    pub const TASK_EXECUTION_COUNT: &str = "X-AppEngine-TaskExecutionCount";
    pub const TASK_ETA: &str = "X-AppEngine-TaskETA";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// Entrega a un handler por URL.
    Push,
    /// Requiere arrendamiento explícito por un consumidor.
    Pull,
}

pub trait Queue: Send + Sync {
    fn queue_name(&self) -> &str;

    fn mode(&self) -> QueueMode;

    fn add(&self, options: TaskOptions) -> Result<TaskHandle, QueueError>;

    /// Arrienda hasta `count` tareas durante `lease`. Sólo colas pull.
    fn lease_tasks(&self, lease: Duration, count: usize) -> Result<Vec<TaskHandle>, QueueError>;

    /// Descarta todo lo pendiente.
    fn purge(&self) -> Result<(), QueueError>;
}

/// Reglas de compatibilidad entre opciones y modo de cola:
/// - `PULL` sólo en colas pull, y las colas pull sólo aceptan `PULL`.
/// - `tag` sólo en tareas pull.
pub fn validate(mode: QueueMode, options: &TaskOptions) -> Result<(), QueueError> {
    let method = options.get_method();
    match (mode, method.is_pull()) {
        (QueueMode::Push, true) => {
            return Err(QueueError::InvalidQueueMode("pull tasks cannot be added to a push queue".into()));
        }
        (QueueMode::Pull, false) => {
            return Err(QueueError::InvalidQueueMode(format!("only pull tasks can be added to a pull queue, got {method}")));
        }
        _ => {}
    }
    if options.tag.is_some() && !method.is_pull() {
        return Err(QueueError::InvalidArgument("only pull tasks can have a tag".into()));
    }
    if let Some(name) = &options.task_name {
        let valid = !name.is_empty()
                    && name.len() <= 500
                    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(QueueError::InvalidArgument(format!("invalid task name `{name}`")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Method;

    #[test]
    fn tag_is_rejected_on_push_tasks() {
        let err = validate(QueueMode::Push, &TaskOptions::with_tag("foo")).expect_err("tag");
        assert!(matches!(err, QueueError::InvalidArgument(_)));
        // En una cola pull, un tag sin método PULL falla antes por el modo.
        let err = validate(QueueMode::Pull, &TaskOptions::with_tag("foo")).expect_err("mode");
        assert!(matches!(err, QueueError::InvalidQueueMode(_)));
        validate(QueueMode::Pull, &TaskOptions::with_method(Method::Pull).tag("foo")).expect("pull tag");
    }

    #[test]
    fn task_names_are_restricted() {
        assert!(validate(QueueMode::Push, &TaskOptions::with_task_name("ok-name_1")).is_ok());
        assert!(validate(QueueMode::Push, &TaskOptions::with_task_name("no spaces")).is_err());
    }
}
