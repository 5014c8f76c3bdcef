//! Simulador local del servicio de colas.
//!
//! - Colas push: cada `add` lanza un hilo de trabajo que espera al ETA y
//!   entrega la petición al handler registrado para la URL, reintentando
//!   según `RetryOptions` mientras el status no sea 2xx.
//! - Colas pull: las tareas quedan pendientes hasta que alguien las arrienda.
//! - `purge` invalida las entregas en curso (generación) y vacía lo pendiente.
//!
//! La ejecución disparada corre en otro hilo, así que el test sólo puede
//! observar sus efectos (p. ej. registros Temp-Data), igual que contra un
//! despliegue real.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use dashmap::{DashMap, DashSet};
use log::{debug, warn};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::QueueError;
use crate::options::{TaskHandle, TaskOptions};
use crate::queue::{headers, validate, Queue, QueueMode, DEFAULT_QUEUE};
use crate::request::{RequestData, TaskHandler};

/// Límite de reintentos cuando la tarea no declara uno.
const DEFAULT_RETRY_LIMIT: u32 = 5;
const DEFAULT_MIN_BACKOFF: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
struct PullTask {
    handle: TaskHandle,
    leased_until: i64,
}

struct LocalQueue {
    name: String,
    mode: QueueMode,
    generation: AtomicU64,
    names: DashSet<String>,
    pull_tasks: Mutex<Vec<PullTask>>,
}

#[derive(Default)]
struct ServiceInner {
    queues: DashMap<String, Arc<LocalQueue>>,
    routes: DashMap<String, Arc<dyn TaskHandler>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct LocalQueueService {
    inner: Arc<ServiceInner>,
}

impl Default for LocalQueueService {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalQueueService {
    /// Servicio con la cola push `default` ya declarada.
    pub fn new() -> Self {
        let service = Self { inner: Arc::new(ServiceInner::default()) };
        service.declare(DEFAULT_QUEUE, QueueMode::Push);
        service
    }

    /// Declara una cola; redeclarar una existente no la altera.
    pub fn declare(&self, name: &str, mode: QueueMode) {
        self.inner.queues.entry(name.to_string()).or_insert_with(|| {
                                                       Arc::new(LocalQueue { name: name.to_string(),
                                                                             mode,
                                                                             generation: AtomicU64::new(0),
                                                                             names: DashSet::new(),
                                                                             pull_tasks: Mutex::new(Vec::new()) })
                                                   });
    }

    /// Handler para las entregas push dirigidas a `url`.
    pub fn route(&self, url: impl Into<String>, handler: impl TaskHandler + 'static) {
        self.route_shared(url, Arc::new(handler));
    }

    /// Como `route`, para handlers que el test conserva para inspeccionar.
    pub fn route_shared(&self, url: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        self.inner.routes.insert(url.into(), handler);
    }

    pub fn queue(&self, name: &str) -> Result<LocalQueueRef, QueueError> {
        let state = self.inner
                        .queues
                        .get(name)
                        .map(|q| Arc::clone(q.value()))
                        .ok_or_else(|| QueueError::UnknownQueue(name.to_string()))?;
        Ok(LocalQueueRef { service: Arc::clone(&self.inner),
                           state })
    }

    pub fn default_queue(&self) -> Result<LocalQueueRef, QueueError> {
        self.queue(DEFAULT_QUEUE)
    }

    /// URL a la que va una tarea push sin URL explícita.
    pub fn default_url(queue_name: &str) -> String {
        format!("/_ah/queue/{queue_name}")
    }

    /// Espera a que terminen todas las entregas lanzadas hasta ahora.
    pub fn join_workers(&self) {
        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.inner.workers.lock());
        for worker in workers {
            if worker.join().is_err() {
                warn!("push worker panicked");
            }
        }
    }
}

/// Vista de una cola concreta del servicio local.
#[derive(Clone)]
pub struct LocalQueueRef {
    service: Arc<ServiceInner>,
    state: Arc<LocalQueue>,
}

impl LocalQueueRef {
    fn spawn_push(&self, options: TaskOptions, handle: TaskHandle) {
        let service = Arc::clone(&self.service);
        let queue = Arc::clone(&self.state);
        let generation = queue.generation.load(Ordering::SeqCst);
        let worker = thread::spawn(move || deliver(&service, &queue, generation, &options, &handle));
        self.service.workers.lock().push(worker);
    }
}

impl Queue for LocalQueueRef {
    fn queue_name(&self) -> &str {
        &self.state.name
    }

    fn mode(&self) -> QueueMode {
        self.state.mode
    }

    fn add(&self, options: TaskOptions) -> Result<TaskHandle, QueueError> {
        validate(self.state.mode, &options)?;
        let name = options.task_name
                          .clone()
                          .unwrap_or_else(|| format!("task-{}", Uuid::new_v4().simple()));
        if !self.state.names.insert(name.clone()) {
            return Err(QueueError::TaskAlreadyExists(name));
        }
        let handle = TaskHandle { queue_name: self.state.name.clone(),
                                  name,
                                  payload: options.payload.clone(),
                                  eta_millis: options.eta_millis.unwrap_or_else(|| Utc::now().timestamp_millis()),
                                  retry_count: 0,
                                  tag: options.tag.clone() };
        debug!("add queue={} task={} method={}", handle.queue_name, handle.name, options.method);
        match self.state.mode {
            QueueMode::Push => self.spawn_push(options, handle.clone()),
            QueueMode::Pull => self.state.pull_tasks.lock().push(PullTask { handle: handle.clone(),
                                                                            leased_until: 0 }),
        }
        Ok(handle)
    }

    fn lease_tasks(&self, lease: Duration, count: usize) -> Result<Vec<TaskHandle>, QueueError> {
        if self.state.mode != QueueMode::Pull {
            return Err(QueueError::InvalidQueueMode(format!("cannot lease tasks from push queue `{}`", self.state.name)));
        }
        let now = Utc::now().timestamp_millis();
        let until = now.saturating_add(i64::try_from(lease.as_millis()).unwrap_or(i64::MAX));
        let mut tasks = self.state.pull_tasks.lock();
        let leased: Vec<TaskHandle> = tasks.iter_mut()
                                           .filter(|t| t.leased_until <= now && t.handle.eta_millis <= now)
                                           .take(count)
                                           .map(|t| {
                                               t.leased_until = until;
                                               t.handle.retry_count += 1;
                                               t.handle.clone()
                                           })
                                           .collect();
        debug!("lease queue={} leased={}", self.state.name, leased.len());
        Ok(leased)
    }

    fn purge(&self) -> Result<(), QueueError> {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
        let dropped = {
            let mut tasks = self.state.pull_tasks.lock();
            let n = tasks.len();
            tasks.clear();
            n
        };
        debug!("purge queue={} dropped_pull={dropped}", self.state.name);
        Ok(())
    }
}

fn request_for(queue: &LocalQueue, options: &TaskOptions, handle: &TaskHandle, attempt: u32) -> RequestData {
    let url = options.url
                     .clone()
                     .unwrap_or_else(|| LocalQueueService::default_url(&queue.name));
    let mut request_headers = options.headers.clone();
    request_headers.insert(headers::QUEUE_NAME.to_string(), queue.name.clone());
    request_headers.insert(headers::TASK_NAME.to_string(), handle.name.clone());
    request_headers.insert(headers::TASK_RETRY_COUNT.to_string(), attempt.to_string());
    request_headers.insert(headers::TASK_EXECUTION_COUNT.to_string(), attempt.to_string());
    request_headers.insert(headers::TASK_ETA.to_string(),
                           format!("{}.{:03}", handle.eta_millis / 1000, handle.eta_millis.rem_euclid(1000)));
    RequestData { method: options.method.as_str().to_string(),
                  url,
                  headers: request_headers,
                  params: options.params.clone(),
                  body: options.payload.clone() }
}

fn deliver(service: &ServiceInner, queue: &LocalQueue, generation: u64, options: &TaskOptions, handle: &TaskHandle) {
    let delay = handle.eta_millis.saturating_sub(Utc::now().timestamp_millis());
    if delay > 0 {
        thread::sleep(Duration::from_millis(delay.unsigned_abs()));
    }
    let retry = options.retry_options.unwrap_or_default();
    let limit = retry.task_retry_limit.unwrap_or(DEFAULT_RETRY_LIMIT);
    let backoff = retry.min_backoff.unwrap_or(DEFAULT_MIN_BACKOFF);
    let mut attempt = 0u32;
    loop {
        if queue.generation.load(Ordering::SeqCst) != generation {
            debug!("task {} dropped by purge", handle.name);
            return;
        }
        let request = request_for(queue, options, handle, attempt);
        let handler = service.routes.get(&request.url).map(|h| Arc::clone(h.value()));
        let status = match handler {
            Some(handler) => handler.handle(&request),
            None => 404,
        };
        if (200..300).contains(&status) {
            debug!("task {} delivered to {} on attempt {}", handle.name, request.url, attempt + 1);
            return;
        }
        if attempt >= limit {
            warn!("task {} gave up after {} attempts (last status {status})", handle.name, attempt + 1);
            return;
        }
        debug!("task {} failed with {status}; retrying", handle.name);
        attempt += 1;
        thread::sleep(backoff);
    }
}
