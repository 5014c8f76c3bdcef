//! Fachada Temp-Data: escribe y lee registros tipados sobre un `Datastore`
//! bajo el kind namespaceado por el marcador de build.
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use log::{debug, info};
use serde_json::json;

use super::datastore::{Datastore, EntityKey, Reachability, SortOrder, StoredEntity, Transaction};
use super::marker::BuildMarker;
use super::record::TempData;
use crate::constants::ORDERING_FIELD;
use crate::errors::{HarnessError, HarnessResult, StoreError};

/// Reloj de milisegundos estrictamente creciente por instancia.
#[derive(Debug, Default)]
struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    fn next(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let prev = match self.last.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1))) {
            Ok(prev) | Err(prev) => prev,
        };
        now.max(prev + 1)
    }
}

/// Persistencia de registros Temp-Data sobre un `Datastore`.
///
/// Cada registro se escribe en su propia transacción; no hay atomicidad
/// entre registros. Los kinds llevan el marcador de build (ver
/// `BuildMarker::kind_for`).
#[derive(Debug)]
pub struct TempDataStore<D: Datastore> {
    datastore: D,
    marker: BuildMarker,
    clock: MonotonicClock,
}

impl<D: Datastore> TempDataStore<D> {
    pub fn new(datastore: D, marker: BuildMarker) -> Self {
        Self { datastore,
               marker,
               clock: MonotonicClock::default() }
    }

    pub fn datastore(&self) -> &D {
        &self.datastore
    }

    pub fn marker(&self) -> BuildMarker {
        self.marker
    }

    pub fn kind_of<T: TempData>(&self) -> String {
        self.marker.kind_for(T::type_name())
    }

    /// Con marcador, un nombre de tipo terminado en dígito haría ambiguo el
    /// kind (`Probe1` + `23` == `Probe12` + `3`), así que se rechaza.
    fn checked_kind<T: TempData>(&self) -> HarnessResult<String> {
        let type_name = T::type_name();
        if self.marker.timestamp().is_some() && type_name.ends_with(|c: char| c.is_ascii_digit()) {
            return Err(HarnessError::config(format!("temp-data type `{type_name}` must not end in a digit")));
        }
        Ok(self.kind_of::<T>())
    }

    /// `true` sólo contra un despliegue vivo.
    pub fn is_in_container(&self) -> bool {
        self.datastore.probe() == Reachability::Online
    }

    pub fn put<T: TempData>(&self, data: &T) -> HarnessResult<EntityKey> {
        let kind = self.checked_kind::<T>()?;
        let ds: &dyn Datastore = &self.datastore;
        let timestamp = self.clock.next();
        let mut props = data.to_properties();
        props.insert(ORDERING_FIELD.to_string(), json!(timestamp));

        let mut key = None;
        self.datastore.in_transaction(&mut |tx: &mut dyn Transaction| -> HarnessResult<()> {
                          data.pre_put(ds)?;
                          key = Some(tx.put(&kind, timestamp, &props)?);
                          data.post_put(ds)?;
                          Ok(())
                      })?;
        let key = key.ok_or_else(|| StoreError::Transaction(format!("put into `{kind}` committed without a key")))?;
        debug!("temp-data put kind={kind} key={key} ts={timestamp}");
        Ok(key)
    }

    /// Todos los registros del tipo, por `timestamp` ascendente.
    pub fn get_all<T: TempData>(&self) -> HarnessResult<Vec<T>> {
        self.get_all_ordered(SortOrder::Ascending)
    }

    pub fn get_all_ordered<T: TempData>(&self, order: SortOrder) -> HarnessResult<Vec<T>> {
        let kind = self.checked_kind::<T>()?;
        let entities = self.datastore.query(&kind, order, None)?;
        entities.iter().map(|e| self.materialize(e)).collect()
    }

    /// Registro más reciente, o `None` si el kind está vacío.
    pub fn get_last<T: TempData>(&self) -> HarnessResult<Option<T>> {
        let kind = self.checked_kind::<T>()?;
        let entities = self.datastore.query(&kind, SortOrder::Descending, Some(1))?;
        entities.first().map(|e| self.materialize(e)).transpose()
    }

    /// Borra todos los registros del tipo. Sin despliegue vivo es un no-op:
    /// un contexto local nunca acumula registros.
    pub fn delete_all<T: TempData>(&self) -> HarnessResult<usize> {
        let kind = self.checked_kind::<T>()?;
        if !self.is_in_container() {
            debug!("temp-data delete skipped (offline) kind={kind}");
            return Ok(0);
        }
        let ds: &dyn Datastore = &self.datastore;
        let mut deleted = 0usize;
        self.datastore.in_transaction(&mut |tx: &mut dyn Transaction| -> HarnessResult<()> {
                          deleted = 0;
                          for entity in tx.list(&kind)? {
                              let data = T::from_properties(&entity.properties)?;
                              data.pre_delete(ds)?;
                              tx.delete(entity.key)?;
                              data.post_delete(ds)?;
                              deleted += 1;
                          }
                          Ok(())
                      })?;
        info!("temp-data deleted kind={kind} count={deleted}");
        Ok(deleted)
    }

    fn materialize<T: TempData>(&self, entity: &StoredEntity) -> HarnessResult<T> {
        let ds: &dyn Datastore = &self.datastore;
        T::pre_get(ds)?;
        let mut data = T::from_properties(&entity.properties)?;
        data.post_get(ds)?;
        Ok(data)
    }
}
