//! tck-core: harness de conformidad para la plataforma cloud.
//!
//! Módulos:
//! - `registry`: registro (tipo de test, clave) -> capacidad con jerarquía
//!   explícita.
//! - `lifecycle`: eventos de ciclo de vida, listeners, dispatcher y
//!   proveedores de entorno.
//! - `tempdata`: Temp-Data, señalización durable entre ejecuciones.
//! - `poller`: espera acotada de consistencia eventual.
//! - `deployment`: plan de despliegue y contrato del builder de archivos.
//! - `suite`: fachada por test.
pub mod config;
pub mod constants;
pub mod context;
pub mod deployment;
pub mod errors;
pub mod lifecycle;
pub mod poller;
pub mod properties;
pub mod registry;
pub mod suite;
pub mod tempdata;

pub use config::{init_dotenv, HarnessConfig};
pub use context::{Descriptor, SealedContext, TestContext};
pub use deployment::{ArchiveBuilder, DeploymentPlan, Manifest, ManifestBuilder, PlanEntry, ResourceSource};
pub use errors::{HarnessError, HarnessResult, StoreError};
pub use lifecycle::{Dispatcher, EnvironmentProvider, EventKind, LifecycleEvent, LifecycleListener, LocalEnvironment,
                    Property, SuiteOverrides};
pub use poller::{AttemptTolerance, CancelToken, Observation, PollPolicy, Poller};
pub use registry::{Hierarchy, Registry, TypeTag};
pub use suite::TestSuite;
pub use tempdata::{BuildMarker, Datastore, EntityKey, InMemoryDatastore, PropertyMap, SortOrder, TempData,
                   TempDataStore};
