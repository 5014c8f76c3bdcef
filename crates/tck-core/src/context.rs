//! `TestContext`: describe la unidad desplegable bajo test.
//!
//! Sólo es mutable durante el context-build (listeners `ContextBuild`). Una
//! vez entregado al builder del archivo queda sellado en `SealedContext`, que
//! únicamente expone lectura.
use std::ops::Deref;
use std::path::{Path, PathBuf};

use chrono::Utc;
use indexmap::IndexMap;

const DEFAULT_WEB_XML: &str = "<web-app/>";

/// Origen de un descriptor: contenido en línea o archivo en disco.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    Inline(String),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestContext {
    archive_name: Option<String>,
    web_xml: Descriptor,
    app_engine_web_xml: Option<PathBuf>,
    context_root: Option<String>,
    callbacks: bool,
    compatibility_properties: Option<String>,
    properties: IndexMap<String, String>,
    use_system_properties: bool,
    ignore_timestamp: bool,
    timestamp: i64,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    /// Contexto vacío con el timestamp del build fijado a "ahora" (ms).
    pub fn new() -> Self {
        Self { archive_name: None,
               web_xml: Descriptor::Inline(DEFAULT_WEB_XML.to_string()),
               app_engine_web_xml: None,
               context_root: None,
               callbacks: false,
               compatibility_properties: None,
               properties: IndexMap::new(),
               use_system_properties: false,
               ignore_timestamp: false,
               timestamp: Utc::now().timestamp_millis() }
    }

    pub fn named(archive_name: impl Into<String>) -> Self {
        Self::new().with_archive_name(archive_name)
    }

    pub fn with_archive_name(mut self, name: impl Into<String>) -> Self {
        self.archive_name = Some(name.into());
        self
    }

    pub fn with_web_xml_content(mut self, content: impl Into<String>) -> Self {
        self.web_xml = Descriptor::Inline(content.into());
        self
    }

    pub fn with_web_xml_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.web_xml = Descriptor::File(path.into());
        self
    }

    pub fn with_app_engine_web_xml_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.app_engine_web_xml = Some(path.into());
        self
    }

    pub fn with_context_root(mut self, root: impl Into<String>) -> Self {
        self.context_root = Some(root.into());
        self
    }

    pub fn with_callbacks(mut self, callbacks: bool) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_compatibility_properties(mut self, file_name: impl Into<String>) -> Self {
        self.compatibility_properties = Some(file_name.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_use_system_properties(mut self, flag: bool) -> Self {
        self.use_system_properties = flag;
        self
    }

    pub fn with_ignore_timestamp(mut self, flag: bool) -> Self {
        self.ignore_timestamp = flag;
        self
    }

    // Mutadores usados por los listeners de context-build.

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn set_ignore_timestamp(&mut self, flag: bool) {
        self.ignore_timestamp = flag;
    }

    pub fn set_use_system_properties(&mut self, flag: bool) {
        self.use_system_properties = flag;
    }

    pub fn set_callbacks(&mut self, flag: bool) {
        self.callbacks = flag;
    }

    pub fn set_compatibility_properties(&mut self, file_name: impl Into<String>) {
        self.compatibility_properties = Some(file_name.into());
    }

    pub fn archive_name(&self) -> Option<&str> {
        self.archive_name.as_deref()
    }

    pub fn web_xml(&self) -> &Descriptor {
        &self.web_xml
    }

    pub fn app_engine_web_xml_file(&self) -> Option<&Path> {
        self.app_engine_web_xml.as_deref()
    }

    pub fn context_root(&self) -> Option<&str> {
        self.context_root.as_deref()
    }

    pub fn has_callbacks(&self) -> bool {
        self.callbacks
    }

    pub fn compatibility_properties(&self) -> Option<&str> {
        self.compatibility_properties.as_deref()
    }

    pub fn properties(&self) -> &IndexMap<String, String> {
        &self.properties
    }

    pub fn is_use_system_properties(&self) -> bool {
        self.use_system_properties
    }

    pub fn is_ignore_timestamp(&self) -> bool {
        self.ignore_timestamp
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub(crate) fn seal(self) -> SealedContext {
        SealedContext(self)
    }
}

/// Contexto ya entregado al builder: sólo lectura.
#[derive(Debug, Clone, PartialEq)]
pub struct SealedContext(TestContext);

impl Deref for SealedContext {
    type Target = TestContext;

    fn deref(&self) -> &TestContext {
        &self.0
    }
}
