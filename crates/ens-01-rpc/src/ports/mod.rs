//! Ports (trait seams) of the RPC layer.

pub mod transport;

pub use transport::{TransportChannel, TransportEvent, TransportState};
