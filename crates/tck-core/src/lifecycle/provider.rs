//! Proveedores de entorno: pueblan el `Dispatcher` con sus listeners.
//!
//! Cada entorno de despliegue (local, remoto, implementación alternativa de
//! la plataforma) aporta su proveedor. Se instalan una vez al arrancar.
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::dispatcher::Dispatcher;
use super::events::parse_bool;
use crate::constants::{EXECUTE_PREFIX, REQUIRED_PREFIX};
use crate::errors::HarnessResult;
use crate::registry::TypeTag;

pub trait EnvironmentProvider: fmt::Debug {
    fn name(&self) -> &str;
    fn install(&self, dispatcher: &mut Dispatcher) -> HarnessResult<()>;
}

/// Normaliza un nombre de propiedad/contexto al sufijo de clave reservada:
/// mayúsculas, y todo lo no alfanumérico pasa a `_`.
pub fn override_key(prefix: &str, name: &str) -> String {
    let suffix: String = name.chars()
                             .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
                             .collect();
    format!("{prefix}{suffix}")
}

/// Overrides de toda la suite leídos de `tck.properties`.
///
/// - `TCK_REQUIRED_<NOMBRE>=false` marca una propiedad como opcional.
/// - `TCK_EXECUTE_<CONTEXTO>=false` desactiva un comportamiento.
/// - Una clave igual al nombre de la propiedad aporta su valor.
#[derive(Debug, Clone)]
pub struct SuiteOverrides {
    values: Arc<IndexMap<String, String>>,
}

impl SuiteOverrides {
    pub fn new(values: IndexMap<String, String>) -> Self {
        Self { values: Arc::new(values) }
    }
}

impl EnvironmentProvider for SuiteOverrides {
    fn name(&self) -> &str {
        "suite-overrides"
    }

    fn install(&self, dispatcher: &mut Dispatcher) -> HarnessResult<()> {
        let values = Arc::clone(&self.values);
        dispatcher.on_property(TypeTag::root(), "suite-overrides.property", move |ev| {
                      let key = override_key(REQUIRED_PREFIX, ev.name());
                      if let Some(raw) = values.get(&key) {
                          ev.set_required(parse_bool(&key, raw)?);
                      }
                      if let Some(value) = values.get(ev.name()) {
                          ev.set_value(value.clone());
                      }
                      Ok(())
                  });
        let values = Arc::clone(&self.values);
        dispatcher.on_execution(TypeTag::root(), "suite-overrides.execution", move |ev| {
                      let key = override_key(EXECUTE_PREFIX, ev.context());
                      if let Some(raw) = values.get(&key) {
                          ev.set_execute(parse_bool(&key, raw)?);
                      }
                      Ok(())
                  });
        Ok(())
    }
}

/// Entorno local/offline: no hay despliegue remoto que lea el marcador de
/// timestamp, y algunos comportamientos no tienen sentido fuera del
/// contenedor.
#[derive(Debug, Clone, Default)]
pub struct LocalEnvironment {
    pub ignore_timestamp: bool,
    pub skipped_contexts: Vec<String>,
}

impl EnvironmentProvider for LocalEnvironment {
    fn name(&self) -> &str {
        "local"
    }

    fn install(&self, dispatcher: &mut Dispatcher) -> HarnessResult<()> {
        if self.ignore_timestamp {
            dispatcher.on_context_build(TypeTag::root(), "local.context", |ev| {
                          ev.context_mut().set_ignore_timestamp(true);
                          Ok(())
                      });
        }
        if !self.skipped_contexts.is_empty() {
            let skipped = self.skipped_contexts.clone();
            dispatcher.on_execution(TypeTag::root(), "local.execution", move |ev| {
                          if skipped.iter().any(|c| c == ev.context()) {
                              ev.set_execute(false);
                          }
                          Ok(())
                      });
        }
        Ok(())
    }
}
