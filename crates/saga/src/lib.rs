//! The order-processing saga engine.
//!
//! The coordinator is a persistent state machine per order: it receives
//! domain events, advances the saga through payment → inventory → shipping,
//! retries transient step failures, and compensates partially completed work
//! in reverse order on fatal failures. The reconciler sweeps for sagas that
//! stalled between events and hands them back to the coordinator.

pub mod coordinator;
mod error;
pub mod reconciler;

pub use coordinator::{SagaCoordinator, SweepReport};
pub use error::CoordinatorError;
pub use reconciler::{Reconciler, ReconcilerSettings};
