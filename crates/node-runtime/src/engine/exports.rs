//! Typed registry of values modules produce for each other.
//!
//! One value per type: a module calls `provide(value)` during registration
//! and any later module (or the host) looks it up with `get::<T>()`.

use dashmap::DashMap;
use std::any::{type_name, Any, TypeId};
use std::sync::Arc;
use tracing::debug;

use super::EngineError;

#[derive(Default)]
pub struct ModuleExports {
    values: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ModuleExports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` as the export of type `T`. Returns true if it
    /// replaced an earlier export of that type.
    pub fn provide<T: Any + Send + Sync>(&self, value: T) -> bool {
        let replaced = self
            .values
            .insert(TypeId::of::<T>(), Arc::new(value))
            .is_some();
        debug!(export = type_name::<T>(), replaced = replaced, "Export provided");
        replaced
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let value = Arc::clone(self.values.get(&TypeId::of::<T>())?.value());
        value.downcast::<T>().ok()
    }

    /// Like [`get`](Self::get), failing with [`EngineError::MissingExport`].
    pub fn require<T: Any + Send + Sync>(&self) -> Result<Arc<T>, EngineError> {
        self.get::<T>()
            .ok_or(EngineError::MissingExport(type_name::<T>()))
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
