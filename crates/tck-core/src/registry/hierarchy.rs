//! Jerarquía explícita de tipos de test.
//!
//! No hay introspección en runtime: cada suite declara su padre con
//! `declare(child, parent)` y la regla "más específico gana" se evalúa sobre
//! `lineage`. Todo tipo no declarado desciende directamente del tipo raíz.
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use crate::constants::ROOT_TYPE;
use crate::errors::{HarnessError, HarnessResult};

/// Identificador de un tipo de test (clase/suite).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(Cow<'static, str>);

impl TypeTag {
    pub const fn new(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn owned(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub const fn root() -> Self {
        Self::new(ROOT_TYPE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_TYPE
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for TypeTag {
    fn from(s: &'static str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TypeTag {
    fn from(s: String) -> Self {
        Self::owned(s)
    }
}

/// Aristas hijo -> padre (herencia simple).
#[derive(Debug, Default, Clone)]
pub struct Hierarchy {
    parents: HashMap<TypeTag, TypeTag>,
}

impl Hierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declara `parent` como supertipo directo de `child`.
    ///
    /// Redeclarar la misma arista es idempotente; cambiar de padre o cerrar
    /// un ciclo es un error de configuración.
    pub fn declare(&mut self, child: TypeTag, parent: TypeTag) -> HarnessResult<()> {
        if child.is_root() {
            return Err(HarnessError::config(format!("`{child}` is the root type and cannot have a parent")));
        }
        if child == parent {
            return Err(HarnessError::config(format!("`{child}` cannot extend itself")));
        }
        if let Some(existing) = self.parents.get(&child) {
            if *existing == parent {
                return Ok(());
            }
            return Err(HarnessError::config(format!("`{child}` already extends `{existing}`, cannot re-parent to `{parent}`")));
        }
        if self.is_subtype_of(&parent, &child) {
            return Err(HarnessError::config(format!("declaring `{child}` as subtype of `{parent}` would create a cycle")));
        }
        self.parents.insert(child, parent);
        Ok(())
    }

    /// Padre directo. El raíz no tiene padre; un tipo no declarado cuelga del
    /// raíz.
    pub fn parent_of(&self, tag: &TypeTag) -> Option<TypeTag> {
        if tag.is_root() {
            return None;
        }
        Some(self.parents.get(tag).cloned().unwrap_or_else(TypeTag::root))
    }

    /// Cadena de ancestros empezando por `tag` y terminando en el raíz.
    pub fn lineage(&self, tag: &TypeTag) -> Vec<TypeTag> {
        let mut out = vec![tag.clone()];
        let mut current = tag.clone();
        while let Some(parent) = self.parent_of(&current) {
            out.push(parent.clone());
            current = parent;
        }
        out
    }

    /// Distancia de `tag` a `ancestor` (0 si son el mismo tipo). Es la
    /// función de especificidad: menor distancia = registro más específico.
    pub fn distance(&self, tag: &TypeTag, ancestor: &TypeTag) -> Option<usize> {
        self.lineage(tag).iter().position(|t| t == ancestor)
    }

    pub fn is_subtype_of(&self, tag: &TypeTag, ancestor: &TypeTag) -> bool {
        self.distance(tag, ancestor).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undeclared_types_hang_from_root() {
        let h = Hierarchy::new();
        let lineage = h.lineage(&TypeTag::new("TasksTest"));
        assert_eq!(lineage, vec![TypeTag::new("TasksTest"), TypeTag::root()]);
        assert_eq!(h.lineage(&TypeTag::root()), vec![TypeTag::root()]);
    }

    #[test]
    fn declare_rejects_cycles_and_reparenting() {
        let mut h = Hierarchy::new();
        h.declare("QueueTestBase".into(), "TestBase".into()).expect("declare base");
        h.declare("TasksTest".into(), "QueueTestBase".into()).expect("declare leaf");
        h.declare("TasksTest".into(), "QueueTestBase".into()).expect("idempotent");

        assert!(h.declare("QueueTestBase".into(), "TasksTest".into()).is_err());
        assert!(h.declare("TasksTest".into(), "DatastoreTestBase".into()).is_err());
        assert!(h.declare(TypeTag::root(), "TasksTest".into()).is_err());

        assert_eq!(h.distance(&"TasksTest".into(), &TypeTag::root()), Some(2));
        assert!(h.is_subtype_of(&"TasksTest".into(), &"QueueTestBase".into()));
        assert!(!h.is_subtype_of(&"QueueTestBase".into(), &"TasksTest".into()));
    }
}
