//! Eventos de ciclo de vida.
//!
//! Cada evento es un par petición/respuesta: lleva las claves que lo
//! identifican (tipo dueño, nombre de contexto o propiedad, tipo de
//! instancia) y un slot de salida que los listeners pueden fijar o
//! sobrescribir. Se crean por petición y se descartan tras el dispatch.
use std::any::{Any, TypeId};
use std::fmt;

use crate::context::TestContext;
use crate::errors::{HarnessError, HarnessResult};
use crate::registry::TypeTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ContextBuild,
    Property,
    Instance,
    Execution,
}

#[derive(Debug)]
pub enum LifecycleEvent<'a> {
    ContextBuild(ContextBuildEvent<'a>),
    Property(PropertyEvent),
    Instance(InstanceEvent),
    Execution(ExecutionEvent),
}

impl LifecycleEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ContextBuild(_) => EventKind::ContextBuild,
            Self::Property(_) => EventKind::Property,
            Self::Instance(_) => EventKind::Instance,
            Self::Execution(_) => EventKind::Execution,
        }
    }

    pub fn owner(&self) -> &TypeTag {
        match self {
            Self::ContextBuild(e) => &e.owner,
            Self::Property(e) => &e.owner,
            Self::Instance(e) => &e.owner,
            Self::Execution(e) => &e.owner,
        }
    }
}

/// Mutación del `TestContext` antes de empaquetar. Sin slot de salida: el
/// resultado es el propio contexto mutado.
#[derive(Debug)]
pub struct ContextBuildEvent<'a> {
    owner: TypeTag,
    context: &'a mut TestContext,
}

impl<'a> ContextBuildEvent<'a> {
    pub fn new(owner: TypeTag, context: &'a mut TestContext) -> Self {
        Self { owner, context }
    }

    pub fn owner(&self) -> &TypeTag {
        &self.owner
    }

    pub fn context(&self) -> &TestContext {
        &*self.context
    }

    pub fn context_mut(&mut self) -> &mut TestContext {
        &mut *self.context
    }
}

/// Resolución de una propiedad con `required` tri-estado.
#[derive(Debug, Clone)]
pub struct PropertyEvent {
    owner: TypeTag,
    name: String,
    required: Option<bool>,
    value: Option<String>,
}

impl PropertyEvent {
    pub fn new(owner: TypeTag, name: impl Into<String>) -> Self {
        Self { owner,
               name: name.into(),
               required: None,
               value: None }
    }

    pub fn owner(&self) -> &TypeTag {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_required(&mut self, required: bool) {
        self.required = Some(required);
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }

    pub fn into_property(self) -> Property {
        Property { name: self.name,
                   required: self.required,
                   value: self.value }
    }
}

/// Resultado de una resolución de propiedad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    name: String,
    required: Option<bool>,
    value: Option<String>,
}

impl Property {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Respuesta cruda: `None` si ningún listener contestó.
    pub fn required(&self) -> Option<bool> {
        self.required
    }

    /// Fail-closed: sin respuesta la propiedad se considera requerida.
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(true)
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Valor interpretado como booleano (`true`/`false`, sin distinguir
    /// mayúsculas).
    pub fn as_bool(&self) -> HarnessResult<Option<bool>> {
        self.value.as_deref().map(|v| parse_bool(&self.name, v)).transpose()
    }
}

pub(crate) fn parse_bool(key: &str, raw: &str) -> HarnessResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(HarnessError::config(format!("`{key}` expects true/false, got `{other}`"))),
    }
}

/// Construcción/resolución de una instancia tipada para un tipo de test.
pub struct InstanceEvent {
    owner: TypeTag,
    type_id: TypeId,
    type_name: &'static str,
    instance: Option<Box<dyn Any + Send>>,
}

impl InstanceEvent {
    pub fn new<T: Any + Send>(owner: TypeTag) -> Self {
        Self { owner,
               type_id: TypeId::of::<T>(),
               type_name: std::any::type_name::<T>(),
               instance: None }
    }

    pub fn owner(&self) -> &TypeTag {
        &self.owner
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn wants<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn is_provided(&self) -> bool {
        self.instance.is_some()
    }

    /// Fija (o sobrescribe) la instancia. El tipo debe coincidir con el
    /// solicitado.
    pub fn provide<T: Any + Send>(&mut self, instance: T) -> HarnessResult<()> {
        if !self.wants::<T>() {
            return Err(HarnessError::InstanceTypeMismatch { owner: self.owner.to_string(),
                                                            type_name: self.type_name });
        }
        self.instance = Some(Box::new(instance));
        Ok(())
    }

    pub(crate) fn take<T: Any>(self) -> HarnessResult<Option<T>> {
        match self.instance {
            None => Ok(None),
            Some(boxed) => boxed.downcast::<T>()
                                .map(|b| Some(*b))
                                .map_err(|_| HarnessError::InstanceTypeMismatch { owner: self.owner.to_string(),
                                                                                  type_name: self.type_name }),
        }
    }
}

impl fmt::Debug for InstanceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceEvent")
         .field("owner", &self.owner)
         .field("type_name", &self.type_name)
         .field("provided", &self.instance.is_some())
         .finish()
    }
}

/// Decisión tri-estado "¿se ejecuta este comportamiento aquí?".
#[derive(Debug, Clone)]
pub struct ExecutionEvent {
    owner: TypeTag,
    context: String,
    execute: Option<bool>,
}

impl ExecutionEvent {
    pub fn new(owner: TypeTag, context: impl Into<String>) -> Self {
        Self { owner,
               context: context.into(),
               execute: None }
    }

    pub fn owner(&self) -> &TypeTag {
        &self.owner
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn set_execute(&mut self, execute: bool) {
        self.execute = Some(execute);
    }

    pub fn execute(&self) -> Option<bool> {
        self.execute
    }
}
