//! tck-taskqueue: contrato de colas de tareas y simulador local.
//!
//! - `options`: `TaskOptions`, `Method`, `RetryOptions`, `TaskHandle`.
//! - `queue`: trait `Queue`, modos push/pull y sus reglas de validación.
//! - `local`: servicio de colas en proceso con entrega push en hilos.
//! - `support`: handlers de apoyo (grabador, reintentos con Temp-Data).
pub mod error;
pub mod local;
pub mod options;
pub mod queue;
pub mod request;
pub mod support;

pub use error::QueueError;
pub use local::{LocalQueueRef, LocalQueueService};
pub use options::{Method, RetryOptions, TaskHandle, TaskOptions};
pub use queue::{headers, validate, Queue, QueueMode, DEFAULT_QUEUE};
pub use request::{RequestData, TaskHandler};
