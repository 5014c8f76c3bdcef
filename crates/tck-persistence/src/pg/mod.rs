//! Implementación Postgres (Diesel) del `Datastore` del harness.
//!
//! - Una fila por registro en `temp_data` (kind, ts, properties JSONB).
//! - Orden total por (`ts`, `id`), igual que el backend en memoria.
//! - Cada `in_transaction` es una transacción read-write de Postgres: si el
//!   trabajo del caller falla, se revierte todo.
//! - Errores transitorios al obtener conexión o en lecturas se reintentan con
//!   un backoff corto.

use std::time::Duration;

use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, warn};
use serde_json::Value;

use tck_core::tempdata::{Datastore, EntityKey, PropertyMap, Reachability, SortOrder, StoredEntity, Transaction};
use tck_core::{HarnessError, HarnessResult, StoreError};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::temp_data;

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Espera máxima por una conexión al sondear si hay base viva.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Proveedor abstracto de conexiones.
///
/// Permite inyectar un pool real o un proveedor de test sin acoplar el
/// datastore a r2d2.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;

    /// Conexión para el sondeo de alcance: un solo intento, espera corta.
    fn probe_connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.connection()
    }
}

/// Implementación concreta de `ConnectionProvider` respaldada por un `PgPool`.
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }

    fn probe_connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool
            .get_timeout(PROBE_TIMEOUT)
            .map_err(|e| PersistenceError::TransientIo(format!("probe: {e}")))
    }
}

/// Fila mapeada de `temp_data`.
#[derive(Queryable, Debug)]
pub struct TempDataRow {
    pub id: i64,
    pub kind: String,
    pub ts: i64,
    pub properties: Value,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = temp_data)]
pub struct NewTempDataRow<'a> {
    pub kind: &'a str,
    pub ts: i64,
    pub properties: &'a Value,
}

impl TryFrom<TempDataRow> for StoredEntity {
    type Error = PersistenceError;

    fn try_from(row: TempDataRow) -> Result<Self, Self::Error> {
        match row.properties {
            Value::Object(properties) => Ok(StoredEntity { key: EntityKey(row.id),
                                                           kind: row.kind,
                                                           timestamp: row.ts,
                                                           properties }),
            other => Err(PersistenceError::Malformed(format!("row {} holds non-object properties: {other}", row.id))),
        }
    }
}

fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict | PersistenceError::TransientIo(_) => true,
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("terminating connection due to administrator command")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

/// Retry simple (hasta 3 reintentos, 15/30/45ms).
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms", attempts + 1, e, delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

fn load_kind(conn: &mut PgConnection, kind: &str, order: SortOrder, limit: Option<usize>)
             -> Result<Vec<StoredEntity>, PersistenceError> {
    let mut query = temp_data::table.filter(temp_data::kind.eq(kind)).into_boxed();
    query = match order {
        SortOrder::Ascending => query.order((temp_data::ts.asc(), temp_data::id.asc())),
        SortOrder::Descending => query.order((temp_data::ts.desc(), temp_data::id.desc())),
    };
    if let Some(limit) = limit {
        query = query.limit(i64::try_from(limit).unwrap_or(i64::MAX));
    }
    let rows: Vec<TempDataRow> = query.load(conn)?;
    rows.into_iter().map(StoredEntity::try_from).collect()
}

/// Error de la transacción Diesel: o falla la base, o falla el trabajo del
/// caller (que se devuelve tal cual tras el rollback).
enum TxError {
    Diesel(diesel::result::Error),
    Work(HarnessError),
}

impl From<diesel::result::Error> for TxError {
    fn from(e: diesel::result::Error) -> Self {
        Self::Diesel(e)
    }
}

struct PgTxn<'c> {
    conn: &'c mut PgConnection,
}

impl Transaction for PgTxn<'_> {
    fn put(&mut self, kind: &str, timestamp: i64, properties: &PropertyMap) -> Result<EntityKey, StoreError> {
        let payload = Value::Object(properties.clone());
        let id: i64 = diesel::insert_into(temp_data::table).values(NewTempDataRow { kind,
                                                                                  ts: timestamp,
                                                                                  properties: &payload })
                                                           .returning(temp_data::id)
                                                           .get_result(self.conn)
                                                           .map_err(PersistenceError::from)?;
        Ok(EntityKey(id))
    }

    fn list(&mut self, kind: &str) -> Result<Vec<StoredEntity>, StoreError> {
        Ok(load_kind(self.conn, kind, SortOrder::Ascending, None)?)
    }

    fn delete(&mut self, key: EntityKey) -> Result<(), StoreError> {
        diesel::delete(temp_data::table.filter(temp_data::id.eq(key.0))).execute(self.conn)
                                                                       .map_err(PersistenceError::from)?;
        Ok(())
    }
}

/// `Datastore` sobre Postgres.
pub struct PgDatastore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgDatastore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Número de registros de un kind (ya namespaceado).
    pub fn count_kind(&self, kind: &str) -> Result<i64, PersistenceError> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            temp_data::table.filter(temp_data::kind.eq(kind))
                            .count()
                            .get_result(&mut conn)
                            .map_err(PersistenceError::from)
        })
    }

    /// Borra todos los registros de un kind sin pasar por hooks de registro.
    pub fn purge_kind(&self, kind: &str) -> Result<usize, PersistenceError> {
        let mut conn = with_retry(|| self.provider.connection())?;
        let deleted = diesel::delete(temp_data::table.filter(temp_data::kind.eq(kind))).execute(&mut conn)?;
        debug!("purge_kind kind={kind} deleted={deleted}");
        Ok(deleted)
    }
}

impl<P: ConnectionProvider> Datastore for PgDatastore<P> {
    fn in_transaction(&self, work: &mut dyn FnMut(&mut dyn Transaction) -> HarnessResult<()>) -> HarnessResult<()> {
        let mut conn = with_retry(|| self.provider.connection()).map_err(StoreError::from)?;
        let outcome = conn.build_transaction().read_write().run(|tx_conn| {
                                                               let mut txn = PgTxn { conn: tx_conn };
                                                               work(&mut txn).map_err(TxError::Work)
                                                           });
        match outcome {
            Ok(()) => Ok(()),
            Err(TxError::Work(e)) => {
                debug!("transaction rolled back: {e}");
                Err(e)
            }
            Err(TxError::Diesel(e)) => Err(StoreError::from(PersistenceError::from(e)).into()),
        }
    }

    fn query(&self, kind: &str, order: SortOrder, limit: Option<usize>) -> Result<Vec<StoredEntity>, StoreError> {
        let entities = with_retry(|| {
                           let mut conn = self.provider.connection()?;
                           load_kind(&mut conn, kind, order, limit)
                       })?;
        debug!("query kind={kind} order={order:?} count={}", entities.len());
        Ok(entities)
    }

    /// Sin reintentos: una base caída debe verse offline en `PROBE_TIMEOUT`.
    fn probe(&self) -> Reachability {
        let outcome = self.provider.probe_connection().and_then(|mut conn| {
                                                          conn.build_transaction()
                                                              .read_only()
                                                              .run(|_| Ok::<(), diesel::result::Error>(()))
                                                              .map_err(PersistenceError::from)
                                                      });
        match outcome {
            Ok(()) => Reachability::Online,
            Err(e) => {
                debug!("probe offline: {e}");
                Reachability::Offline
            }
        }
    }
}

/// Construye un pool Postgres r2d2 a partir de URL y corre las migraciones
/// pendientes.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let max_size = max_size.max(1);
    let min_size = min_size.max(1);
    if min_size > max_size {
        warn!("min_size > max_size ({min_size} > {max_size}), ajustando min=max");
    }
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(min_size.min(max_size)))
                                    .max_size(max_size)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Carga `.env`, lee `DbConfig` y construye un pool ya migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
