//! # Node Runtime Library
//!
//! Wires the coordination crates into something an application can start:
//!
//! - `engine/` - [`EngineBuilder`], the [`Module`] trait, typed exports
//! - `config` - environment-driven [`NodeConfig`] for the binary
//! - `adapters/` - [`JsonFileKvStore`]
//! - `events` - coordination event logging
//!
//! The `ensemble-node` binary runs the relay and, optionally, an embedded
//! peer engine in the same process.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod engine;
pub mod events;

pub use adapters::JsonFileKvStore;
pub use config::{ConfigError, NodeConfig};
pub use engine::{
    Engine, EngineBuilder, EngineError, Module, ModuleApi, ModuleExports, Ping, Pong,
    SystemActions, SystemModule, DEFAULT_CONNECT_TIMEOUT, SYSTEM_MODULE_ID,
};
pub use events::log_coordination_events;
