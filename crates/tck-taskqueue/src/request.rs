use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Petición tal como la recibe un handler push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestData {
    pub method: String,
    pub url: String,
    pub headers: IndexMap<String, String>,
    pub params: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RequestData {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Primer valor del parámetro.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn param_values(&self, name: &str) -> Vec<&str> {
        self.params
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// Handler de entregas push. Un status 2xx confirma la tarea; cualquier otro
/// provoca un reintento según su `RetryOptions`.
pub trait TaskHandler: Send + Sync {
    fn handle(&self, request: &RequestData) -> u16;
}

impl<F> TaskHandler for F where F: Fn(&RequestData) -> u16 + Send + Sync
{
    fn handle(&self, request: &RequestData) -> u16 {
        self(request)
    }
}
