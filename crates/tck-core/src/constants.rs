//! Constantes del harness.
//!
//! Los nombres de recursos forman parte del contrato con el archivo
//! desplegado: el builder los escribe y el runtime los vuelve a leer. No
//! cambiarlos sin regenerar los despliegues existentes.

/// Intervalo por defecto entre intentos de sondeo y para `sync()`.
pub const DEFAULT_SLEEP_MS: u64 = 3_000;

/// Presupuesto por defecto del poller.
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 30_000;

/// Archivo de propiedades de la suite dentro de los recursos empaquetados.
pub const TCK_PROPERTIES: &str = "tck.properties";

/// Marcador con el timestamp del build.
pub const TIMESTAMP_TXT: &str = "timestamp.txt";

/// Campo de orden de los registros Temp-Data.
pub const ORDERING_FIELD: &str = "timestamp";

/// Tipo raíz implícito de toda jerarquía de tests.
pub const ROOT_TYPE: &str = "TestBase";

/// Sufijo de los archivos desplegables.
pub const ARCHIVE_SUFFIX: &str = ".war";

/// Prefijos reservados para overrides de la suite (ver `SuiteOverrides`).
pub const REQUIRED_PREFIX: &str = "TCK_REQUIRED_";
pub const EXECUTE_PREFIX: &str = "TCK_EXECUTE_";
