//! Broker integration: the adapter abstraction, the outbound publisher and
//! the inbound event ingress.
//!
//! The broker adapter is a small capability set (`publish`, `is_healthy`,
//! `provider_name`, `initialize`, `shutdown`) with pluggable variants; a
//! configuration key selects the variant at startup. The publisher and the
//! ingress are broker-agnostic and talk only to the adapter.

mod adapter;
mod amqp;
mod context;
mod error;
mod ingress;
mod memory;
mod publisher;

pub use adapter::{BrokerAdapter, BrokerProvider, MessageHeaders, X_CORRELATION_ID};
pub use amqp::{AmqpBroker, AmqpSettings, run_consumers};
pub use context::{Disposition, EventContext, EventHandler, HandlerError};
pub use error::{MessagingError, Result};
pub use ingress::{EventIngress, IngressError};
pub use memory::{InMemoryBroker, PublishedMessage};
pub use publisher::EventPublisher;
