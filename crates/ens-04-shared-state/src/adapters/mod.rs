//! Adapters

pub mod memory_store;

pub use memory_store::InMemoryKvStore;
