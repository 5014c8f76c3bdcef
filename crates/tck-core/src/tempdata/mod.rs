//! Temp-Data: almacenamiento durable de "el hecho X ocurrió en T" entre
//! ejecuciones independientes.
//!
//! - `record`: contrato `TempData` y `PropertyMap`.
//! - `datastore`: contrato del collaborator de datastore.
//! - `memory`: backend en memoria (tests y contexto local).
//! - `marker`: marcador de build que namespacea los kinds.
//! - `store`: `TempDataStore`, la fachada put/get_all/get_last/delete_all.

mod datastore;
mod marker;
mod memory;
mod record;
mod store;

pub use datastore::{Datastore, EntityKey, Reachability, SortOrder, StoredEntity, Transaction};
pub use marker::BuildMarker;
pub use memory::InMemoryDatastore;
pub use record::{prop_i64, prop_opt_str, prop_str, PropertyMap, TempData};
pub use store::TempDataStore;
