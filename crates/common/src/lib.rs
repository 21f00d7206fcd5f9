//! Shared identifier and value types for the order-processing service.

mod ids;
mod money;
mod version;

pub use ids::{CorrelationId, EventId, OrderId, SagaId};
pub use money::Money;
pub use version::Version;
