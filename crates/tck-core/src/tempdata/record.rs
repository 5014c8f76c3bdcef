//! Contrato de los registros Temp-Data.
//!
//! Un registro sabe convertirse a propiedades almacenables y reconstruirse a
//! partir de ellas. `from_properties` es el constructor explícito del tipo:
//! no hay instanciación reflexiva. Los hooks rodean put/get/delete y por
//! defecto no hacen nada.
use serde_json::Value;

use super::datastore::Datastore;
use crate::errors::{HarnessResult, StoreError};

pub type PropertyMap = serde_json::Map<String, Value>;

pub trait TempData: Sized + Send {
    /// Nombre del tipo; prefijo del kind bajo el que se agrupan los
    /// registros.
    fn type_name() -> &'static str;

    fn to_properties(&self) -> PropertyMap;

    /// Reconstruye el registro. El mapa incluye el campo de orden
    /// `timestamp` asignado al escribir.
    fn from_properties(props: &PropertyMap) -> Result<Self, StoreError>;

    fn pre_put(&self, _ds: &dyn Datastore) -> HarnessResult<()> {
        Ok(())
    }

    fn post_put(&self, _ds: &dyn Datastore) -> HarnessResult<()> {
        Ok(())
    }

    fn pre_get(_ds: &dyn Datastore) -> HarnessResult<()> {
        Ok(())
    }

    fn post_get(&mut self, _ds: &dyn Datastore) -> HarnessResult<()> {
        Ok(())
    }

    fn pre_delete(&self, _ds: &dyn Datastore) -> HarnessResult<()> {
        Ok(())
    }

    fn post_delete(&self, _ds: &dyn Datastore) -> HarnessResult<()> {
        Ok(())
    }
}

// Lectores para implementaciones de `from_properties`.

pub fn prop_i64(props: &PropertyMap, key: &str) -> Result<i64, StoreError> {
    props.get(key)
         .and_then(Value::as_i64)
         .ok_or_else(|| StoreError::Malformed(format!("missing integer property `{key}`")))
}

pub fn prop_str<'a>(props: &'a PropertyMap, key: &str) -> Result<&'a str, StoreError> {
    props.get(key)
         .and_then(Value::as_str)
         .ok_or_else(|| StoreError::Malformed(format!("missing string property `{key}`")))
}

pub fn prop_opt_str<'a>(props: &'a PropertyMap, key: &str) -> Option<&'a str> {
    props.get(key).and_then(Value::as_str)
}
