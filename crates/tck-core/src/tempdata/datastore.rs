//! Contrato del collaborator de datastore consumido por `TempDataStore`.
//!
//! Put/list/delete transaccionales por `kind` con mapas de propiedades, y
//! consulta ordenada por el campo `timestamp`. El modelo de consistencia del
//! backend no se especifica más allá de "eventual entre procesos".
use std::fmt;

use serde::{Deserialize, Serialize};

use super::record::PropertyMap;
use crate::errors::{HarnessResult, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey(pub i64);

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntity {
    pub key: EntityKey,
    pub kind: String,
    pub timestamp: i64,
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Resultado del sondeo "¿estamos contra un despliegue vivo?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Online,
    Offline,
}

/// Operaciones dentro de una transacción abierta.
pub trait Transaction {
    fn put(&mut self, kind: &str, timestamp: i64, properties: &PropertyMap) -> Result<EntityKey, StoreError>;
    /// Entidades del kind visibles en la transacción, por `timestamp`
    /// ascendente.
    fn list(&mut self, kind: &str) -> Result<Vec<StoredEntity>, StoreError>;
    fn delete(&mut self, key: EntityKey) -> Result<(), StoreError>;
}

pub trait Datastore: Send + Sync {
    /// Ejecuta `work` en una transacción (cross-group). Commit si `work`
    /// devuelve `Ok`; rollback ante cualquier error, incluido el del commit.
    fn in_transaction(&self, work: &mut dyn FnMut(&mut dyn Transaction) -> HarnessResult<()>) -> HarnessResult<()>;

    /// Consulta de sólo lectura ordenada por `timestamp` (desempate por key).
    fn query(&self, kind: &str, order: SortOrder, limit: Option<usize>) -> Result<Vec<StoredEntity>, StoreError>;

    /// Sondeo barato: abrir y descartar una transacción vacía. Cualquier
    /// fallo significa que no hay despliegue vivo detrás.
    fn probe(&self) -> Reachability {
        match self.in_transaction(&mut |_tx: &mut dyn Transaction| -> HarnessResult<()> { Ok(()) }) {
            Ok(()) => Reachability::Online,
            Err(_) => Reachability::Offline,
        }
    }
}

/// Orden total usado por todos los backends.
pub(crate) fn sort_entities(entities: &mut [StoredEntity], order: SortOrder) {
    entities.sort_by_key(|e| (e.timestamp, e.key));
    if order == SortOrder::Descending {
        entities.reverse();
    }
}
