//! Registro (tipo de test, clave) -> capacidad.
//!
//! Se construye una vez al arrancar el proceso, lo pueblan los proveedores
//! de entorno y después sólo se lee. Los registros son aditivos: no existe
//! operación de borrado.
//!
//! Reglas de resolución:
//! - Para una misma clave registrada en varios niveles de la jerarquía gana
//!   el tipo más específico.
//! - Empates en el mismo tipo: gana el último registrado.
//! - Claves distintas no interactúan entre sí.

mod hierarchy;

use std::collections::HashMap;
use std::hash::Hash;

pub use hierarchy::{Hierarchy, TypeTag};

use crate::errors::HarnessResult;

#[derive(Debug)]
struct Entry<V> {
    seq: u64,
    value: V,
}

#[derive(Debug)]
pub struct Registry<K, V> {
    hierarchy: Hierarchy,
    entries: HashMap<K, HashMap<TypeTag, Vec<Entry<V>>>>,
    next_seq: u64,
}

impl<K, V> Default for Registry<K, V> {
    fn default() -> Self {
        Self { hierarchy: Hierarchy::new(),
               entries: HashMap::new(),
               next_seq: 0 }
    }
}

impl<K: Eq + Hash, V> Registry<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_type(&mut self, child: impl Into<TypeTag>, parent: impl Into<TypeTag>) -> HarnessResult<()> {
        self.hierarchy.declare(child.into(), parent.into())
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn register(&mut self, owner: impl Into<TypeTag>, key: K, value: V) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries
            .entry(key)
            .or_default()
            .entry(owner.into())
            .or_default()
            .push(Entry { seq, value });
    }

    /// Capacidad más específica para `concrete`, o `None` si ningún ancestro
    /// registró `key`.
    pub fn resolve(&self, concrete: &TypeTag, key: &K) -> Option<&V> {
        let by_owner = self.entries.get(key)?;
        self.hierarchy
            .lineage(concrete)
            .iter()
            .find_map(|tag| by_owner.get(tag).and_then(|level| level.last()))
            .map(|e| &e.value)
    }

    /// Todas las capacidades aplicables a `concrete`: niveles del más general
    /// al más específico y, dentro de cada nivel, en orden de registro.
    pub fn resolve_all(&self, concrete: &TypeTag, key: &K) -> Vec<&V> {
        let Some(by_owner) = self.entries.get(key) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for tag in self.hierarchy.lineage(concrete).iter().rev() {
            if let Some(level) = by_owner.get(tag) {
                debug_assert!(level.windows(2).all(|w| w[0].seq < w[1].seq));
                out.extend(level.iter().map(|e| &e.value));
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.entries.values().flat_map(|m| m.values()).map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
