//! Transport adapters.

pub mod memory_transport;
pub mod ws_transport;

pub use memory_transport::{InMemoryTransport, MemoryTransportHandle};
pub use ws_transport::WsTransport;
