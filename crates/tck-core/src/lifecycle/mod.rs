//! Framework de eventos de ciclo de vida de los tests.

mod dispatcher;
mod events;
mod listener;
mod provider;

pub use dispatcher::Dispatcher;
pub use events::{ContextBuildEvent, EventKind, ExecutionEvent, InstanceEvent, LifecycleEvent, Property, PropertyEvent};
pub use listener::{FnListener, LifecycleListener};
pub use provider::{override_key, EnvironmentProvider, LocalEnvironment, SuiteOverrides};
