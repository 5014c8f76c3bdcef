//! Marcador de build: timestamp embebido en el despliegue que namespacea los
//! kinds de Temp-Data. Registros de builds distintos nunca colisionan aunque
//! el datastore sea compartido y longevo.
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::TIMESTAMP_TXT;
use crate::errors::{HarnessError, HarnessResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMarker {
    Stamped(i64),
    /// El contexto no embebió marcador: sin namespacing.
    Unstamped,
}

impl BuildMarker {
    /// Lee `timestamp.txt` de `resources_dir`. La ausencia no es error.
    pub fn read(resources_dir: &Path) -> HarnessResult<Self> {
        let path = resources_dir.join(TIMESTAMP_TXT);
        if !path.is_file() {
            return Ok(Self::Unstamped);
        }
        let raw = fs::read_to_string(&path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> HarnessResult<Self> {
        let line = raw.lines().next().unwrap_or_default().trim();
        line.parse::<i64>()
            .map(Self::Stamped)
            .map_err(|e| HarnessError::config(format!("malformed {TIMESTAMP_TXT} `{line}`: {e}")))
    }

    pub fn write(resources_dir: &Path, timestamp: i64) -> HarnessResult<PathBuf> {
        fs::create_dir_all(resources_dir)?;
        let path = resources_dir.join(TIMESTAMP_TXT);
        fs::write(&path, timestamp.to_string())?;
        Ok(path)
    }

    pub fn timestamp(&self) -> Option<i64> {
        match self {
            Self::Stamped(ts) => Some(*ts),
            Self::Unstamped => None,
        }
    }

    /// Kind = nombre del tipo + timestamp del build, concatenados sin
    /// separador: el nombre del tipo no debe terminar en dígito
    /// (`TempDataStore` lo rechaza).
    pub fn kind_for(&self, type_name: &str) -> String {
        match self {
            Self::Stamped(ts) => format!("{type_name}{ts}"),
            Self::Unstamped => type_name.to_string(),
        }
    }
}
