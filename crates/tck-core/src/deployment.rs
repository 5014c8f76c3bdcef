//! Plan de despliegue: frontera entre el harness y el empaquetado.
//!
//! `DeploymentPlan::prepare` dispara el context-build, sella el contexto y
//! calcula qué recursos lleva el archivo. Producir el desplegable real es
//! cosa de un `ArchiveBuilder`.
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::debug;

use crate::constants::{ARCHIVE_SUFFIX, TIMESTAMP_TXT};
use crate::context::{Descriptor, SealedContext, TestContext};
use crate::errors::{HarnessError, HarnessResult};
use crate::lifecycle::Dispatcher;
use crate::properties::{is_valid_key, write_properties};
use crate::registry::TypeTag;

pub const WEB_XML: &str = "WEB-INF/web.xml";
pub const CONTEXT_ROOT_XML: &str = "WEB-INF/jboss-web.xml";
pub const APP_ENGINE_WEB_XML: &str = "WEB-INF/appengine-web.xml";
pub const CALLBACKS_XML: &str = "WEB-INF/classes/META-INF/datastorecallbacks.xml";
const CLASSES_DIR: &str = "WEB-INF/classes";
const COMPATIBILITY_COMMENT: &str = "GAE TCK testing!";

/// Origen del contenido de un recurso del plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSource {
    Inline(String),
    File(PathBuf),
    /// Recurso por defecto que aporta el builder (relativo a sus recursos).
    Bundled(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub target: String,
    pub source: ResourceSource,
}

#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    archive_name: Option<String>,
    context: SealedContext,
    entries: Vec<PlanEntry>,
}

impl DeploymentPlan {
    /// Enriquece `context` vía `dispatcher`, lo sella y calcula los recursos.
    pub fn prepare(dispatcher: &Dispatcher, owner: &TypeTag, mut context: TestContext) -> HarnessResult<Self> {
        dispatcher.enhance_context(owner, &mut context)?;
        let context = context.seal();

        let archive_name = context.archive_name().map(|name| {
                                                      if name.ends_with(ARCHIVE_SUFFIX) {
                                                          name.to_string()
                                                      } else {
                                                          format!("{name}{ARCHIVE_SUFFIX}")
                                                      }
                                                  });

        let mut entries = Vec::new();
        let web_xml = match context.web_xml() {
            Descriptor::Inline(content) => ResourceSource::Inline(content.clone()),
            Descriptor::File(path) => ResourceSource::File(path.clone()),
        };
        entries.push(PlanEntry { target: WEB_XML.to_string(),
                                 source: web_xml });

        if let Some(root) = context.context_root() {
            let descriptor = format!("<jboss-web>\n  <context-root>{root}</context-root>\n</jboss-web>\n");
            entries.push(PlanEntry { target: CONTEXT_ROOT_XML.to_string(),
                                     source: ResourceSource::Inline(descriptor) });
        }

        let app_engine = match context.app_engine_web_xml_file() {
            Some(path) => ResourceSource::File(path.to_path_buf()),
            None => ResourceSource::Bundled("appengine-web.xml".to_string()),
        };
        entries.push(PlanEntry { target: APP_ENGINE_WEB_XML.to_string(),
                                 source: app_engine });

        if context.has_callbacks() {
            entries.push(PlanEntry { target: CALLBACKS_XML.to_string(),
                                     source: ResourceSource::Bundled("META-INF/datastorecallbacks.xml".to_string()) });
        }

        if let Some(file_name) = context.compatibility_properties() {
            if !context.properties().is_empty() || context.is_use_system_properties() {
                let content = compatibility_properties(&context)?;
                entries.push(PlanEntry { target: format!("{CLASSES_DIR}/{file_name}"),
                                         source: ResourceSource::Inline(content) });
            }
        }

        if !context.is_ignore_timestamp() {
            entries.push(PlanEntry { target: format!("{CLASSES_DIR}/{TIMESTAMP_TXT}"),
                                     source: ResourceSource::Inline(context.timestamp().to_string()) });
        }

        debug!("deployment plan for {owner}: archive={archive_name:?} entries={}", entries.len());
        Ok(Self { archive_name,
                  context,
                  entries })
    }

    /// Nombre con sufijo `.war`, o `None` si lo elige el builder.
    pub fn archive_name(&self) -> Option<&str> {
        self.archive_name.as_deref()
    }

    pub fn context(&self) -> &SealedContext {
        &self.context
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn entry(&self, target: &str) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.target == target)
    }
}

/// Propiedades del contexto, opcionalmente sobre el entorno del proceso.
/// Las variables de entorno con nombres no representables se omiten.
fn compatibility_properties(context: &TestContext) -> HarnessResult<String> {
    let mut merged: IndexMap<String, String> = IndexMap::new();
    if context.is_use_system_properties() {
        let mut ambient: Vec<(String, String)> = env::vars().filter(|(k, _)| is_valid_key(k)).collect();
        ambient.sort();
        merged.extend(ambient);
    }
    for (k, v) in context.properties() {
        merged.insert(k.clone(), v.clone());
    }
    write_properties(&merged, COMPATIBILITY_COMMENT)
}

/// Convierte un plan sellado en una unidad desplegable opaca.
pub trait ArchiveBuilder {
    type Output;

    fn build(&self, plan: &DeploymentPlan) -> HarnessResult<Self::Output>;
}

/// Archivo materializado en memoria: ruta destino -> contenido.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub name: String,
    pub files: IndexMap<String, String>,
}

/// Builder mínimo que resuelve cada recurso a su contenido. Los recursos
/// `Bundled` se buscan bajo `resources_dir`.
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    resources_dir: PathBuf,
}

impl ManifestBuilder {
    pub fn new(resources_dir: impl Into<PathBuf>) -> Self {
        Self { resources_dir: resources_dir.into() }
    }

    fn read(&self, path: &Path) -> HarnessResult<String> {
        if !path.is_file() {
            return Err(HarnessError::MissingResource(path.display().to_string()));
        }
        Ok(fs::read_to_string(path)?)
    }
}

impl ArchiveBuilder for ManifestBuilder {
    type Output = Manifest;

    fn build(&self, plan: &DeploymentPlan) -> HarnessResult<Manifest> {
        let name = plan.archive_name()
                       .map(str::to_string)
                       .unwrap_or_else(|| format!("tck-{}{ARCHIVE_SUFFIX}", plan.context().timestamp()));
        let mut files = IndexMap::new();
        for entry in plan.entries() {
            let content = match &entry.source {
                ResourceSource::Inline(content) => content.clone(),
                ResourceSource::File(path) => self.read(path)?,
                ResourceSource::Bundled(name) => self.read(&self.resources_dir.join(name))?,
            };
            files.insert(entry.target.clone(), content);
        }
        Ok(Manifest { name, files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_name_gains_suffix_once() {
        let dispatcher = Dispatcher::new();
        let owner = TypeTag::new("TasksTest");
        let plan = DeploymentPlan::prepare(&dispatcher, &owner, TestContext::named("tasks")).expect("plan");
        assert_eq!(plan.archive_name(), Some("tasks.war"));
        let plan = DeploymentPlan::prepare(&dispatcher, &owner, TestContext::named("tasks.war")).expect("plan");
        assert_eq!(plan.archive_name(), Some("tasks.war"));
        let plan = DeploymentPlan::prepare(&dispatcher, &owner, TestContext::new()).expect("plan");
        assert_eq!(plan.archive_name(), None);
    }

    #[test]
    fn compatibility_file_needs_something_to_write() {
        let dispatcher = Dispatcher::new();
        let owner = TypeTag::new("TasksTest");
        let ctx = TestContext::new().with_compatibility_properties("capedwarf-compatibility.properties");
        let plan = DeploymentPlan::prepare(&dispatcher, &owner, ctx).expect("plan");
        assert!(plan.entry("WEB-INF/classes/capedwarf-compatibility.properties").is_none());
    }
}
