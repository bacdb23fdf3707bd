//! Ports (driven)

pub mod store;

pub use store::KvStore;
