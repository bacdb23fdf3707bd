//! # Adapter Implementations
//!
//! Concrete implementations of the [`KvStore`](ens_04_shared_state::KvStore)
//! port used by the binary.

pub mod json_store;

pub use json_store::JsonFileKvStore;
