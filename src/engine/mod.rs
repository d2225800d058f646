//! Exclusive access to the external statistical engine.
//!
//! The engine is an opaque, stateful, single-instance external process: two
//! concurrent instantiations corrupt it. [`EngineGateway`] guards the
//! singleton behind a reserve/acquire/release capability-token protocol;
//! [`EngineSession`] is the abstract command surface the orchestrator
//! consumes through a lease.

mod gateway;
mod session;

pub use gateway::{EngineGateway, EngineLease, ReservationToken, ScopedReservation};
pub use session::{EngineError, EngineSession, EngineValue, ResultArtifact, ResultHandle};
