//! Cloud TCK
//!
//! Fachada del workspace:
//! - `harness`: lifecycle, Temp-Data, poller y plan de despliegue.
//! - `persistence`: `Datastore` sobre Postgres (Diesel).
//! - `taskqueue`: contrato de colas y simulador local.
//!
//! Los tests de conformidad dependen de este crate en lugar de los miembros
//! sueltos.

pub use tck_core as harness;
pub use tck_persistence as persistence;
pub use tck_taskqueue as taskqueue;

pub use tck_core::{Dispatcher, HarnessConfig, HarnessError, HarnessResult, PollPolicy, Poller, TempData,
                   TempDataStore, TestContext, TestSuite, TypeTag};

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn facade_exposes_members() {
		let tag = TypeTag::new("Facade");
		assert_eq!(tag.to_string(), "Facade");
		assert_eq!(taskqueue::LocalQueueService::default_url("q"), "/_ah/queue/q");
	}
}
