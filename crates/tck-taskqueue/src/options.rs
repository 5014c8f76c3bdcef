//! Opciones de encolado, al estilo builder.
//!
//! ```ignore
//! let opts = TaskOptions::with_url("/_ah/test").method(Method::Put).param("k", "v");
//! ```
use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    /// Tarea de cola pull: nunca se entrega, se arrienda.
    Pull,
}

impl Method {
    pub const PUSH_METHODS: [Method; 5] = [Method::Get, Method::Post, Method::Put, Method::Delete, Method::Head];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Pull => "PULL",
        }
    }

    pub fn is_pull(&self) -> bool {
        matches!(self, Method::Pull)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Política de reintentos de una tarea push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryOptions {
    pub task_retry_limit: Option<u32>,
    pub min_backoff: Option<Duration>,
}

impl RetryOptions {
    pub fn with_task_retry_limit(limit: u32) -> Self {
        Self { task_retry_limit: Some(limit),
               ..Self::default() }
    }

    pub fn min_backoff(mut self, backoff: Duration) -> Self {
        self.min_backoff = Some(backoff);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskOptions {
    pub(crate) url: Option<String>,
    pub(crate) method: Method,
    pub(crate) payload: Vec<u8>,
    pub(crate) headers: IndexMap<String, String>,
    pub(crate) params: Vec<(String, String)>,
    pub(crate) tag: Option<String>,
    pub(crate) task_name: Option<String>,
    pub(crate) retry_options: Option<RetryOptions>,
    pub(crate) eta_millis: Option<i64>,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self { url: None,
               method: Method::Post,
               payload: Vec::new(),
               headers: IndexMap::new(),
               params: Vec::new(),
               tag: None,
               task_name: None,
               retry_options: None,
               eta_millis: None }
    }
}

impl TaskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    // Constructores de conveniencia.

    pub fn with_url(url: impl Into<String>) -> Self {
        Self::new().url(url)
    }

    pub fn with_method(method: Method) -> Self {
        Self::new().method(method)
    }

    pub fn with_payload(payload: impl Into<Vec<u8>>) -> Self {
        Self::new().payload(payload)
    }

    pub fn with_header(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new().header(name, value)
    }

    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self::new().tag(tag)
    }

    pub fn with_task_name(name: impl Into<String>) -> Self {
        Self::new().task_name(name)
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Los parámetros admiten múltiples valores por nombre.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn task_name(mut self, name: impl Into<String>) -> Self {
        self.task_name = Some(name.into());
        self
    }

    pub fn retry_options(mut self, retry: RetryOptions) -> Self {
        self.retry_options = Some(retry);
        self
    }

    pub fn eta_millis(mut self, eta: i64) -> Self {
        self.eta_millis = Some(eta);
        self
    }

    pub fn get_method(&self) -> Method {
        self.method
    }

    pub fn get_url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

/// Resultado de un `add`, o una tarea arrendada de una cola pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub(crate) queue_name: String,
    pub(crate) name: String,
    pub(crate) payload: Vec<u8>,
    pub(crate) eta_millis: i64,
    pub(crate) retry_count: u32,
    pub(crate) tag: Option<String>,
}

impl TaskHandle {
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    pub fn eta_millis(&self) -> i64 {
        self.eta_millis
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}
