//! Event transport for the payment saga.
//!
//! Messages are opaque byte payloads addressed to a topic. The only
//! implementation shipped here is [`InMemoryEventBus`], an in-process
//! fan-out broker; a durable broker can be swapped in behind the
//! [`EventBus`] trait without touching the saga.

pub mod bus;
pub mod error;
pub mod memory;

pub use bus::{EventBus, Message, MessageHandler, handler_fn};
pub use error::{EventBusError, Result};
pub use memory::InMemoryEventBus;
