//! WebSocket connection handling for the relay.

pub mod handler;

pub use handler::{handle_socket, ConnectParams};
