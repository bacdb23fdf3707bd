//! # Hierarchical Names
//!
//! Actions and state entries are addressed by `|`-separated names derived
//! from the module that declares them:
//!
//! ```text
//! engine|module|<moduleId>|action|<actionName>
//! engine|module|<moduleId>|state.shared|<name>
//! engine|module|<moduleId>|state.persistent|<name>
//! engine|module|<moduleId>|state.useragent|<name>
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default top-level scope for module-declared names.
pub const ENGINE_SCOPE: &str = "engine";

/// Which supervisor variant owns a state key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    Shared,
    Persistent,
    UserAgent,
}

impl StateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKind::Shared => "shared",
            StateKind::Persistent => "persistent",
            StateKind::UserAgent => "useragent",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment.strip_prefix("state.")? {
            "shared" => Some(StateKind::Shared),
            "persistent" => Some(StateKind::Persistent),
            "useragent" => Some(StateKind::UserAgent),
            _ => None,
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully-qualified state key: `<scope>|state.<kind>|<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateKey(String);

impl StateKey {
    pub fn new(scope: &str, kind: StateKind, name: &str) -> Self {
        Self(format!("{}|state.{}|{}", scope, kind, name))
    }

    /// Wrap a key received from the wire without validating it.
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The kind segment, if the key follows the naming scheme.
    pub fn kind(&self) -> Option<StateKind> {
        self.0.split('|').find_map(StateKind::from_segment)
    }

    /// The last segment.
    pub fn name(&self) -> &str {
        self.0.rsplit('|').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StateKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Naming scope of one module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleScope {
    prefix: String,
    module_id: String,
}

impl ModuleScope {
    /// Scope under the default `engine` prefix.
    pub fn new(module_id: impl Into<String>) -> Self {
        Self::with_prefix(ENGINE_SCOPE, module_id)
    }

    pub fn with_prefix(prefix: impl Into<String>, module_id: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            module_id: module_id.into(),
        }
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    /// `<prefix>|module|<moduleId>`
    pub fn scope(&self) -> String {
        format!("{}|module|{}", self.prefix, self.module_id)
    }

    /// `<prefix>|module|<moduleId>|action|<name>`
    pub fn action_method(&self, action_name: &str) -> String {
        format!("{}|action|{}", self.scope(), action_name)
    }

    pub fn state_key(&self, kind: StateKind, name: &str) -> StateKey {
        StateKey::new(&self.scope(), kind, name)
    }
}
