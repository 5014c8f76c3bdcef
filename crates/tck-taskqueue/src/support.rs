//! Handlers de apoyo para los tests de colas.
//!
//! `RetryTestHandler` es la ejecución disparada del escenario de reintentos:
//! falla las primeras `times-to-fail` entregas y deja constancia durable de
//! cada invocación como Temp-Data, que es lo único que el test puede
//! observar.
use std::sync::Arc;

use log::warn;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tck_core::tempdata::{prop_i64, prop_str, Datastore, PropertyMap, SortOrder, TempData, TempDataStore};
use tck_core::{HarnessResult, StoreError};

use crate::request::{RequestData, TaskHandler};

pub const RETRY_TEST_URL: &str = "/_ah/retryTest";
pub const TESTDATA_KEY_PARAM: &str = "testdata-key";
pub const TIMES_TO_FAIL_PARAM: &str = "times-to-fail";

/// Guarda cada petición recibida y contesta 200.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    requests: Mutex<Vec<RequestData>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn was_invoked(&self) -> bool {
        !self.requests.lock().is_empty()
    }

    pub fn last_request(&self) -> Option<RequestData> {
        self.requests.lock().last().cloned()
    }

    pub fn requests(&self) -> Vec<RequestData> {
        self.requests.lock().clone()
    }

    pub fn reset(&self) {
        self.requests.lock().clear();
    }
}

impl TaskHandler for RecordingHandler {
    fn handle(&self, request: &RequestData) -> u16 {
        self.requests.lock().push(request.clone());
        200
    }
}

/// Valor entero asociado a una clave de test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestData {
    pub key: String,
    pub value: i64,
}

impl TempData for TestData {
    fn type_name() -> &'static str {
        "TestData"
    }

    fn to_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("key".into(), json!(self.key));
        props.insert("value".into(), json!(self.value));
        props
    }

    fn from_properties(props: &PropertyMap) -> Result<Self, StoreError> {
        Ok(Self { key: prop_str(props, "key")?.to_string(),
                  value: prop_i64(props, "value")? })
    }
}

/// Petición capturada por el handler, bajo una clave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRequest {
    pub key: String,
    pub request: RequestData,
}

impl TempData for StoredRequest {
    fn type_name() -> &'static str {
        "RequestData"
    }

    fn to_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("key".into(), json!(self.key));
        props.insert("request".into(), json!(self.request));
        props
    }

    fn from_properties(props: &PropertyMap) -> Result<Self, StoreError> {
        let request = props.get("request")
                           .cloned()
                           .unwrap_or(Value::Null);
        let request = serde_json::from_value(request).map_err(|e| StoreError::Malformed(format!("request: {e}")))?;
        Ok(Self { key: prop_str(props, "key")?.to_string(),
                  request })
    }
}

pub fn invocation_count_key(key: &str) -> String {
    format!("{key}-invocation-count")
}

pub fn request_data_key(key: &str, invocation: i64) -> String {
    format!("{key}-request-{invocation}")
}

/// Último valor registrado para `key`.
pub fn last_test_data<D: Datastore>(store: &TempDataStore<D>, key: &str) -> HarnessResult<Option<i64>> {
    Ok(store.get_all_ordered::<TestData>(SortOrder::Descending)?
            .into_iter()
            .find(|d| d.key == key)
            .map(|d| d.value))
}

pub fn stored_request<D: Datastore>(store: &TempDataStore<D>, key: &str) -> HarnessResult<Option<RequestData>> {
    Ok(store.get_all_ordered::<StoredRequest>(SortOrder::Descending)?
            .into_iter()
            .find(|r| r.key == key)
            .map(|r| r.request))
}

pub struct RetryTestHandler<D: Datastore> {
    store: Arc<TempDataStore<D>>,
}

impl<D: Datastore> RetryTestHandler<D> {
    pub fn new(store: Arc<TempDataStore<D>>) -> Self {
        Self { store }
    }

    fn record(&self, key: &str, request: &RequestData) -> HarnessResult<i64> {
        let count_key = invocation_count_key(key);
        let count = last_test_data(&self.store, &count_key)?.unwrap_or(0) + 1;
        self.store.put(&TestData { key: count_key,
                                   value: count })?;
        self.store.put(&StoredRequest { key: request_data_key(key, count),
                                        request: request.clone() })?;
        Ok(count)
    }
}

impl<D: Datastore> TaskHandler for RetryTestHandler<D> {
    fn handle(&self, request: &RequestData) -> u16 {
        let Some(key) = request.param(TESTDATA_KEY_PARAM) else {
            return 400;
        };
        let times_to_fail: i64 = match request.param(TIMES_TO_FAIL_PARAM).map(str::parse::<i64>) {
            Some(Ok(n)) => n,
            _ => return 400,
        };
        match self.record(key, request) {
            Ok(count) if count <= times_to_fail => 500,
            Ok(_) => 200,
            Err(e) => {
                warn!("retry handler could not record invocation for {key}: {e}");
                500
            }
        }
    }
}
