//! `TestSuite`: punto de entrada de un test concreto.
//!
//! Agrupa el tipo dueño, el `Dispatcher` compartido y la configuración, y
//! expone las consultas que un test hace antes de ejecutar: decisiones de
//! ejecución, propiedades, instancias, plan de despliegue y marcador de
//! build.
use std::any::Any;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, warn};
use once_cell::sync::OnceCell;

use crate::config::HarnessConfig;
use crate::constants::TCK_PROPERTIES;
use crate::context::TestContext;
use crate::deployment::DeploymentPlan;
use crate::errors::{HarnessError, HarnessResult, StoreError};
use crate::lifecycle::{Dispatcher, Property};
use crate::poller::{CancelToken, Poller};
use crate::properties::read_properties;
use crate::registry::TypeTag;
use crate::tempdata::{BuildMarker, Datastore, TempDataStore};

#[derive(Debug)]
pub struct TestSuite {
    owner: TypeTag,
    dispatcher: Arc<Dispatcher>,
    config: HarnessConfig,
    poller: Poller,
    marker: OnceCell<BuildMarker>,
}

impl TestSuite {
    pub fn new(owner: impl Into<TypeTag>, dispatcher: Arc<Dispatcher>, config: HarnessConfig) -> Self {
        let poller = Poller::new(config.poll_policy());
        Self { owner: owner.into(),
               dispatcher,
               config,
               poller,
               marker: OnceCell::new() }
    }

    /// Las esperas de esta suite observan `cancel`.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.poller = Poller::with_cancel(self.config.poll_policy(), cancel);
        self
    }

    pub fn owner(&self) -> &TypeTag {
        &self.owner
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    // Decisiones de ejecución.
    //
    // `execute_raw` distingue "nadie contestó" (`None`) de un `false`
    // explícito. `execution` resuelve `None` como "ejecutar". `execute` es el
    // atajo booleano histórico: sólo un `true` explícito cuenta.

    pub fn execute_raw(&self, context: &str) -> HarnessResult<Option<bool>> {
        self.dispatcher.execution(&self.owner, context)
    }

    pub fn execution(&self, context: &str) -> HarnessResult<bool> {
        Ok(self.execute_raw(context)?.unwrap_or(true))
    }

    pub fn execute(&self, context: &str) -> HarnessResult<bool> {
        Ok(self.execute_raw(context)? == Some(true))
    }

    pub fn do_ignore(&self, context: &str) -> HarnessResult<bool> {
        Ok(!self.execute(context)?)
    }

    pub fn property(&self, name: &str) -> HarnessResult<Property> {
        self.dispatcher.property(&self.owner, name)
    }

    /// Fail-closed: sin respuesta la propiedad es requerida.
    pub fn required(&self, name: &str) -> HarnessResult<bool> {
        Ok(self.property(name)?.is_required())
    }

    pub fn instance<T: Any + Send>(&self) -> HarnessResult<T> {
        self.dispatcher.instance::<T>(&self.owner)
    }

    pub fn try_instance<T: Any + Send>(&self) -> HarnessResult<Option<T>> {
        self.dispatcher.try_instance::<T>(&self.owner)
    }

    pub fn deployment(&self, context: TestContext) -> HarnessResult<DeploymentPlan> {
        DeploymentPlan::prepare(&self.dispatcher, &self.owner, context)
    }

    pub fn sync(&self) -> HarnessResult<()> {
        self.poller.sync()
    }

    pub fn sync_for(&self, duration: Duration) -> HarnessResult<()> {
        self.poller.sync_for(duration)
    }

    /// Valor de `key` en `tck.properties`. El archivo debe existir.
    pub fn test_property(&self, key: &str) -> HarnessResult<Option<String>> {
        let path = self.config.resources_dir.join(TCK_PROPERTIES);
        let mut props = read_properties(&path)?;
        Ok(props.shift_remove(key))
    }

    pub fn test_property_or(&self, key: &str, default: &str) -> HarnessResult<String> {
        Ok(self.test_property(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// Marcador de build, leído una sola vez por suite.
    pub fn read_timestamp(&self) -> HarnessResult<BuildMarker> {
        self.marker
            .get_or_try_init(|| -> HarnessResult<BuildMarker> {
                let marker = BuildMarker::read(&self.config.resources_dir)?;
                debug!("build marker for {}: {marker:?}", self.owner);
                Ok(marker)
            })
            .copied()
    }

    /// Store de Temp-Data namespaceado con el marcador de esta suite.
    pub fn temp_data<D: Datastore>(&self, datastore: D) -> HarnessResult<TempDataStore<D>> {
        Ok(TempDataStore::new(datastore, self.read_timestamp()?))
    }

    /// Espera a un hilo de trabajo. Su error se propaga tal cual; un panic
    /// se reporta como error de estado.
    pub fn wait_on<T>(&self, handle: JoinHandle<HarnessResult<T>>) -> HarnessResult<T> {
        match handle.join() {
            Ok(result) => result,
            Err(payload) => {
                let msg = payload.downcast_ref::<&str>()
                                 .map(|s| s.to_string())
                                 .or_else(|| payload.downcast_ref::<String>().cloned())
                                 .unwrap_or_else(|| "unknown panic".to_string());
                warn!("worker thread panicked: {msg}");
                Err(HarnessError::State(StoreError::Backend(format!("worker panicked: {msg}"))))
            }
        }
    }
}
