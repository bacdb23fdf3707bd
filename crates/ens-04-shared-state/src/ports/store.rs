//! Key-value collaborator contract.
//!
//! Persistent and user-agent state write through to a store implementing
//! [`KvStore`]. The storage engine behind it is the host's concern.

use crate::errors::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// The whole key space. Used once at startup to warm the cache.
    async fn get_all(&self) -> Result<HashMap<String, Value>, StoreError>;
}
