//! `Dispatcher`: entrega eventos a los listeners registrados.
//!
//! Orden de invocación: niveles de la jerarquía del más general al más
//! específico y, dentro de cada nivel, orden de registro. Así el registro
//! más específico es el último en escribir el slot y gana.
//!
//! Los errores de un listener NO se capturan: se propagan al caller y cortan
//! el resto del dispatch.
use std::any::Any;
use std::sync::Arc;

use log::debug;

use super::events::{ContextBuildEvent, EventKind, ExecutionEvent, InstanceEvent, LifecycleEvent, Property,
                    PropertyEvent};
use super::listener::{FnListener, LifecycleListener};
use super::provider::EnvironmentProvider;
use crate::context::TestContext;
use crate::errors::{HarnessError, HarnessResult};
use crate::registry::{Hierarchy, Registry, TypeTag};

#[derive(Debug, Default)]
pub struct Dispatcher {
    registry: Registry<EventKind, Arc<dyn LifecycleListener>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher poblado por los proveedores dados, en orden.
    pub fn with_providers(providers: &[&dyn EnvironmentProvider]) -> HarnessResult<Self> {
        let mut dispatcher = Self::new();
        for provider in providers {
            dispatcher.install(*provider)?;
        }
        Ok(dispatcher)
    }

    pub fn install(&mut self, provider: &dyn EnvironmentProvider) -> HarnessResult<()> {
        debug!("install provider={}", provider.name());
        provider.install(self)
    }

    pub fn declare_type(&mut self, child: impl Into<TypeTag>, parent: impl Into<TypeTag>) -> HarnessResult<()> {
        self.registry.declare_type(child, parent)
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        self.registry.hierarchy()
    }

    pub fn register(&mut self, owner: impl Into<TypeTag>, kind: EventKind, listener: impl LifecycleListener + 'static) {
        self.registry.register(owner, kind, Arc::new(listener));
    }

    pub fn on_context_build<F>(&mut self, owner: impl Into<TypeTag>, name: &'static str, f: F)
        where F: Fn(&mut ContextBuildEvent<'_>) -> HarnessResult<()> + Send + Sync + 'static
    {
        self.register(owner,
                      EventKind::ContextBuild,
                      FnListener::new(name, move |ev: &mut LifecycleEvent<'_>| match ev {
                          LifecycleEvent::ContextBuild(e) => f(e),
                          _ => Ok(()),
                      }));
    }

    pub fn on_property<F>(&mut self, owner: impl Into<TypeTag>, name: &'static str, f: F)
        where F: Fn(&mut PropertyEvent) -> HarnessResult<()> + Send + Sync + 'static
    {
        self.register(owner,
                      EventKind::Property,
                      FnListener::new(name, move |ev: &mut LifecycleEvent<'_>| match ev {
                          LifecycleEvent::Property(e) => f(e),
                          _ => Ok(()),
                      }));
    }

    pub fn on_execution<F>(&mut self, owner: impl Into<TypeTag>, name: &'static str, f: F)
        where F: Fn(&mut ExecutionEvent) -> HarnessResult<()> + Send + Sync + 'static
    {
        self.register(owner,
                      EventKind::Execution,
                      FnListener::new(name, move |ev: &mut LifecycleEvent<'_>| match ev {
                          LifecycleEvent::Execution(e) => f(e),
                          _ => Ok(()),
                      }));
    }

    /// Proveedor de instancias de `T`: sólo contesta eventos que piden `T`.
    pub fn provide_instance<T, F>(&mut self, owner: impl Into<TypeTag>, name: &'static str, factory: F)
        where T: Any + Send,
              F: Fn(&TypeTag) -> HarnessResult<T> + Send + Sync + 'static
    {
        self.register(owner,
                      EventKind::Instance,
                      FnListener::new(name, move |ev: &mut LifecycleEvent<'_>| match ev {
                          LifecycleEvent::Instance(e) if e.wants::<T>() => {
                              let owner = e.owner().clone();
                              e.provide(factory(&owner)?)
                          }
                          _ => Ok(()),
                      }));
    }

    pub fn dispatch(&self, event: &mut LifecycleEvent<'_>) -> HarnessResult<()> {
        let kind = event.kind();
        let listeners = self.registry.resolve_all(event.owner(), &kind);
        debug!("dispatch kind={kind:?} owner={} listeners={}", event.owner(), listeners.len());
        for listener in listeners {
            listener.before(event)?;
        }
        Ok(())
    }

    /// Fase de context-build: los listeners mutan `context` en sitio.
    pub fn enhance_context(&self, owner: &TypeTag, context: &mut TestContext) -> HarnessResult<()> {
        let mut event = LifecycleEvent::ContextBuild(ContextBuildEvent::new(owner.clone(), context));
        self.dispatch(&mut event)
    }

    pub fn property(&self, owner: &TypeTag, name: &str) -> HarnessResult<Property> {
        let mut event = LifecycleEvent::Property(PropertyEvent::new(owner.clone(), name));
        self.dispatch(&mut event)?;
        match event {
            LifecycleEvent::Property(e) => Ok(e.into_property()),
            _ => unreachable!("property dispatch keeps the event variant"),
        }
    }

    /// Decisión cruda: `None` = nadie contestó.
    pub fn execution(&self, owner: &TypeTag, context: &str) -> HarnessResult<Option<bool>> {
        let mut event = LifecycleEvent::Execution(ExecutionEvent::new(owner.clone(), context));
        self.dispatch(&mut event)?;
        match event {
            LifecycleEvent::Execution(e) => Ok(e.execute()),
            _ => unreachable!("execution dispatch keeps the event variant"),
        }
    }

    pub fn try_instance<T: Any + Send>(&self, owner: &TypeTag) -> HarnessResult<Option<T>> {
        let mut event = LifecycleEvent::Instance(InstanceEvent::new::<T>(owner.clone()));
        self.dispatch(&mut event)?;
        match event {
            LifecycleEvent::Instance(e) => e.take::<T>(),
            _ => unreachable!("instance dispatch keeps the event variant"),
        }
    }

    /// Como `try_instance`, pero la ausencia es un error de configuración.
    pub fn instance<T: Any + Send>(&self, owner: &TypeTag) -> HarnessResult<T> {
        self.try_instance::<T>(owner)?
            .ok_or_else(|| HarnessError::MissingInstance { owner: owner.to_string(),
                                                           type_name: std::any::type_name::<T>() })
    }
}
