//! Contrato de los listeners de ciclo de vida.
//!
//! Un listener recibe el evento mutable y puede fijar su slot de salida. Si
//! devuelve error, el dispatch se corta y el error llega tal cual al caller.
use std::fmt;

use super::events::LifecycleEvent;
use crate::errors::HarnessResult;

pub trait LifecycleListener: Send + Sync + fmt::Debug {
    fn before(&self, event: &mut LifecycleEvent<'_>) -> HarnessResult<()>;
}

/// Adaptador para closures; `name` sólo se usa en logs y `Debug`.
pub struct FnListener<F> {
    name: &'static str,
    f: F,
}

impl<F> FnListener<F>
    where F: Fn(&mut LifecycleEvent<'_>) -> HarnessResult<()> + Send + Sync
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> fmt::Debug for FnListener<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnListener").field(&self.name).finish()
    }
}

impl<F> LifecycleListener for FnListener<F>
    where F: Fn(&mut LifecycleEvent<'_>) -> HarnessResult<()> + Send + Sync
{
    fn before(&self, event: &mut LifecycleEvent<'_>) -> HarnessResult<()> {
        (self.f)(event)
    }
}
