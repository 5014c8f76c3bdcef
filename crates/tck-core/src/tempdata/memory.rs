//! Datastore en memoria, compartible entre hilos (`Clone` comparte estado).
//!
//! Simula tanto el contexto "en contenedor" como el local/offline: con
//! `set_reachable(false)` toda operación falla con `Unavailable` y el sondeo
//! devuelve `Offline`. Las transacciones acumulan puts/deletes y los aplican
//! de golpe en el commit, así un lector concurrente nunca ve un registro a
//! medias.
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use super::datastore::{sort_entities, Datastore, EntityKey, Reachability, SortOrder, StoredEntity, Transaction};
use super::record::PropertyMap;
use crate::errors::{HarnessResult, StoreError};

#[derive(Debug)]
struct Shared {
    entities: Mutex<BTreeMap<EntityKey, StoredEntity>>,
    next_key: AtomicI64,
    writes: AtomicU64,
    reachable: AtomicBool,
    fail_next_commit: AtomicBool,
}

#[derive(Debug, Clone)]
pub struct InMemoryDatastore {
    shared: Arc<Shared>,
}

impl Default for InMemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDatastore {
    pub fn new() -> Self {
        Self { shared: Arc::new(Shared { entities: Mutex::new(BTreeMap::new()),
                                         next_key: AtomicI64::new(1),
                                         writes: AtomicU64::new(0),
                                         reachable: AtomicBool::new(true),
                                         fail_next_commit: AtomicBool::new(false) }) }
    }

    /// Datastore que se comporta como un contexto local sin backend.
    pub fn offline() -> Self {
        let ds = Self::new();
        ds.set_reachable(false);
        ds
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.shared.reachable.store(reachable, Ordering::SeqCst);
    }

    /// El próximo commit falla (y la transacción se revierte).
    pub fn fail_next_commit(&self) {
        self.shared.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Número de escrituras (puts + deletes) confirmadas desde la creación.
    pub fn writes(&self) -> u64 {
        self.shared.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.shared.entities.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_reachable(&self) -> Result<(), StoreError> {
        if self.shared.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory datastore is offline".into()))
        }
    }
}

struct MemTxn<'a> {
    shared: &'a Shared,
    puts: Vec<StoredEntity>,
    deletes: Vec<EntityKey>,
}

impl Transaction for MemTxn<'_> {
    fn put(&mut self, kind: &str, timestamp: i64, properties: &PropertyMap) -> Result<EntityKey, StoreError> {
        let key = EntityKey(self.shared.next_key.fetch_add(1, Ordering::SeqCst));
        self.puts.push(StoredEntity { key,
                                      kind: kind.to_string(),
                                      timestamp,
                                      properties: properties.clone() });
        Ok(key)
    }

    fn list(&mut self, kind: &str) -> Result<Vec<StoredEntity>, StoreError> {
        let mut out: Vec<StoredEntity> = {
            let entities = self.shared.entities.lock();
            entities.values()
                    .filter(|e| e.kind == kind && !self.deletes.contains(&e.key))
                    .cloned()
                    .collect()
        };
        out.extend(self.puts
                       .iter()
                       .filter(|e| e.kind == kind && !self.deletes.contains(&e.key))
                       .cloned());
        sort_entities(&mut out, SortOrder::Ascending);
        Ok(out)
    }

    fn delete(&mut self, key: EntityKey) -> Result<(), StoreError> {
        self.deletes.push(key);
        Ok(())
    }
}

impl Datastore for InMemoryDatastore {
    fn in_transaction(&self, work: &mut dyn FnMut(&mut dyn Transaction) -> HarnessResult<()>) -> HarnessResult<()> {
        self.ensure_reachable()?;
        let mut txn = MemTxn { shared: &self.shared,
                               puts: Vec::new(),
                               deletes: Vec::new() };
        // Un error en `work` descarta lo acumulado (rollback).
        work(&mut txn)?;
        if self.shared.fail_next_commit.swap(false, Ordering::SeqCst) {
            debug!("in-memory commit failed on request; rolling back {} puts", txn.puts.len());
            return Err(StoreError::Transaction("commit failed".into()).into());
        }
        let mut entities = self.shared.entities.lock();
        let mut writes = 0u64;
        for key in &txn.deletes {
            if entities.remove(key).is_some() {
                writes += 1;
            }
        }
        for entity in txn.puts.drain(..) {
            if !txn.deletes.contains(&entity.key) {
                entities.insert(entity.key, entity);
                writes += 1;
            }
        }
        self.shared.writes.fetch_add(writes, Ordering::SeqCst);
        Ok(())
    }

    fn query(&self, kind: &str, order: SortOrder, limit: Option<usize>) -> Result<Vec<StoredEntity>, StoreError> {
        self.ensure_reachable()?;
        let mut out: Vec<StoredEntity> = self.shared
                                             .entities
                                             .lock()
                                             .values()
                                             .filter(|e| e.kind == kind)
                                             .cloned()
                                             .collect();
        sort_entities(&mut out, order);
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    fn probe(&self) -> Reachability {
        if self.shared.reachable.load(Ordering::SeqCst) {
            Reachability::Online
        } else {
            Reachability::Offline
        }
    }
}
