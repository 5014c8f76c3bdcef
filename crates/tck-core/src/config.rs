//! Configuración del harness desde variables de entorno.
//! Usa la convención `TCK_*`; el archivo `.env` se carga una sola vez.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

use crate::constants::{DEFAULT_POLL_TIMEOUT_MS, DEFAULT_SLEEP_MS};
use crate::poller::PollPolicy;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Directorio con los recursos empaquetados (`tck.properties`,
    /// `timestamp.txt`, descriptores).
    pub resources_dir: PathBuf,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub poll_max_attempts: Option<u32>,
}

impl HarnessConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let resources_dir = env::var("TCK_RESOURCES_DIR").map(PathBuf::from)
                                                         .unwrap_or_else(|_| PathBuf::from("resources"));
        let poll_interval = env::var("TCK_POLL_INTERVAL_MS").ok()
                                                            .and_then(|v| v.parse().ok())
                                                            .unwrap_or(DEFAULT_SLEEP_MS);
        let poll_timeout = env::var("TCK_POLL_TIMEOUT_MS").ok()
                                                          .and_then(|v| v.parse().ok())
                                                          .unwrap_or(DEFAULT_POLL_TIMEOUT_MS);
        let poll_max_attempts = env::var("TCK_POLL_MAX_ATTEMPTS").ok().and_then(|v| v.parse().ok());
        Self { resources_dir,
               poll_interval: Duration::from_millis(poll_interval),
               poll_timeout: Duration::from_millis(poll_timeout),
               poll_max_attempts }
    }

    /// Config con valores por defecto apuntando a `resources_dir`.
    pub fn with_resources(resources_dir: impl Into<PathBuf>) -> Self {
        Self { resources_dir: resources_dir.into(),
               poll_interval: Duration::from_millis(DEFAULT_SLEEP_MS),
               poll_timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
               poll_max_attempts: None }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy { interval: self.poll_interval,
                     timeout: self.poll_timeout,
                     max_attempts: self.poll_max_attempts }
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
