//! Poller de consistencia eventual.
//!
//! Quien dispara trabajo asíncrono (p. ej. una tarea encolada que ejecuta
//! otro proceso) no puede esperar un future: sólo puede observar los efectos
//! durables que la ejecución disparada decidió registrar. El poller evalúa un
//! lookup con una pausa fija entre intentos hasta ver el valor esperado o
//! agotar el presupuesto. Sin backoff: los tiempos de convergencia esperados
//! son acotados (segundos a decenas de segundos).
//!
//! - Variante por valor: al agotar el presupuesto devuelve el último valor
//!   observado, sin error. El caller compara y falla el test.
//! - Variante de existencia: al agotar el presupuesto falla con
//!   `NeverObserved` ("nunca ocurrió" es distinto de "ocurrió con otro
//!   valor").
//!
//! Las pausas pasan por un `CancelToken`; cancelar es fatal (`Interrupted`)
//! y queda latcheado para las esperas siguientes.
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use parking_lot::{Condvar, Mutex};

use crate::constants::{DEFAULT_POLL_TIMEOUT_MS, DEFAULT_SLEEP_MS};
use crate::errors::{HarnessError, HarnessResult};

/// Presupuesto e intervalo del poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pausa fija entre intentos.
    pub interval: Duration,
    /// Presupuesto total de tiempo.
    pub timeout: Duration,
    /// Tope opcional de intentos (lookups).
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self { interval: Duration::from_millis(DEFAULT_SLEEP_MS),
               timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
               max_attempts: None }
    }
}

impl PollPolicy {
    /// Presupuesto de exactamente `attempts` lookups separados por
    /// `interval`. Sin tope de tiempo: la latencia del lookup no consume
    /// intentos.
    pub fn attempts(attempts: u32, interval: Duration) -> Self {
        Self { interval,
               timeout: Duration::MAX,
               max_attempts: Some(attempts.max(1)) }
    }

    fn exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        if self.max_attempts.is_some_and(|max| attempts >= max) {
            return true;
        }
        elapsed.saturating_add(self.interval) > self.timeout
    }
}

/// Señal de cancelación compartible entre hilos.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (lock, cv) = &*self.inner;
        *lock.lock() = true;
        cv.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Espera `duration` salvo cancelación.
    pub fn sleep(&self, duration: Duration) -> HarnessResult<()> {
        let (lock, cv) = &*self.inner;
        let deadline = Instant::now() + duration;
        let mut cancelled = lock.lock();
        loop {
            if *cancelled {
                warn!("wait interrupted by cancellation");
                return Err(HarnessError::Interrupted);
            }
            if cv.wait_until(&mut cancelled, deadline).timed_out() {
                return if *cancelled { Err(HarnessError::Interrupted) } else { Ok(()) };
            }
        }
    }
}

/// Resultado de un sondeo por valor.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation<V> {
    pub value: V,
    pub attempts: u32,
    pub elapsed: Duration,
    pub converged: bool,
}

/// Banda de tolerancia para comparar conteos de intentos.
///
/// Un intento que falla con un estado de error puede no llegar a registrarse
/// (la ejecución disparada no reporta su propio fallo), así que el conteo
/// observado puede quedarse corto en `short_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttemptTolerance {
    pub short_by: u32,
}

impl AttemptTolerance {
    pub const EXACT: Self = Self { short_by: 0 };

    pub const fn one_short() -> Self {
        Self { short_by: 1 }
    }

    pub fn accepts(&self, expected: i64, observed: i64) -> bool {
        observed <= expected && expected - observed <= i64::from(self.short_by)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Poller {
    policy: PollPolicy,
    cancel: CancelToken,
}

impl Poller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy,
               cancel: CancelToken::new() }
    }

    pub fn with_cancel(policy: PollPolicy, cancel: CancelToken) -> Self {
        Self { policy, cancel }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Evalúa `lookup` hasta observar `expected` o agotar el presupuesto.
    /// Un error del lookup es un fallo del harness y se propaga.
    pub fn observe<V, F>(&self, expected: &V, mut lookup: F) -> HarnessResult<Observation<V>>
        where V: PartialEq + Debug,
              F: FnMut() -> HarnessResult<V>
    {
        let start = Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let value = lookup()?;
            debug!("poll attempt={attempts} observed={value:?} expected={expected:?}");
            if value == *expected {
                return Ok(Observation { value,
                                        attempts,
                                        elapsed: start.elapsed(),
                                        converged: true });
            }
            if self.policy.exhausted(attempts, start.elapsed()) {
                debug!("poll budget exhausted after {attempts} attempts; last={value:?}");
                return Ok(Observation { value,
                                        attempts,
                                        elapsed: start.elapsed(),
                                        converged: false });
            }
            self.cancel.sleep(self.policy.interval)?;
        }
    }

    /// Devuelve el valor esperado si converge, o el último observado.
    pub fn wait_for_value<V, F>(&self, expected: &V, lookup: F) -> HarnessResult<V>
        where V: PartialEq + Debug,
              F: FnMut() -> HarnessResult<V>
    {
        self.observe(expected, lookup).map(|o| o.value)
    }

    /// Espera a que `lookup` devuelva `Some`. Agotar el presupuesto es
    /// `NeverObserved`.
    pub fn wait_for_existence<T, F>(&self, what: &str, mut lookup: F) -> HarnessResult<T>
        where F: FnMut() -> HarnessResult<Option<T>>
    {
        let start = Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if let Some(found) = lookup()? {
                debug!("{what} observed after {attempts} attempts");
                return Ok(found);
            }
            if self.policy.exhausted(attempts, start.elapsed()) {
                return Err(HarnessError::NeverObserved { what: what.to_string(),
                                                         attempts,
                                                         waited: start.elapsed() });
            }
            self.cancel.sleep(self.policy.interval)?;
        }
    }

    /// Pausa fija de un intervalo.
    pub fn sync(&self) -> HarnessResult<()> {
        self.cancel.sleep(self.policy.interval)
    }

    pub fn sync_for(&self, duration: Duration) -> HarnessResult<()> {
        self.cancel.sleep(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerance_band_accepts_only_short_counts() {
        let band = AttemptTolerance::one_short();
        assert!(band.accepts(3, 3));
        assert!(band.accepts(3, 2));
        assert!(!band.accepts(3, 1));
        assert!(!band.accepts(3, 4));
        assert!(!AttemptTolerance::EXACT.accepts(3, 2));
    }

    #[test]
    fn attempts_policy_caps_lookups() {
        let policy = PollPolicy::attempts(5, Duration::from_millis(1));
        assert!(!policy.exhausted(4, Duration::ZERO));
        assert!(policy.exhausted(5, Duration::ZERO));
        // El tiempo transcurrido no cuenta con tope de intentos.
        assert!(!policy.exhausted(2, Duration::from_secs(3600)));
    }

    #[test]
    fn cancelled_token_stays_latched() {
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(token.sleep(Duration::from_millis(1)), Err(HarnessError::Interrupted)));
        assert!(matches!(token.sleep(Duration::from_millis(1)), Err(HarnessError::Interrupted)));
    }
}
