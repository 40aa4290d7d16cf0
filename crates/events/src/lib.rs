//! `storecore-events` — event model and pub/sub plumbing.
//!
//! Domain crates define their event enums against the [`Event`] trait; the
//! infrastructure crate wraps them in [`EventEnvelope`]s and distributes them
//! over an [`EventBus`].

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
