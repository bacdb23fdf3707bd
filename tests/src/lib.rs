//! # Ensemble Test Suite
//!
//! Multi-peer tests that run real engines against a real relay on loopback.
//!
//! ## Structure
//!
//! - `harness` - relay and peer fixtures shared by every test
//! - `integration/` - end-to-end coordination scenarios
//!
//! Benchmarks live in `benches/relay_benchmarks.rs`.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

pub mod harness;
pub mod integration;
