use ens_04_shared_state::StoreError;
use shared_types::StateKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    /// The key has no value in the cache.
    #[error("State not initialised: {0}")]
    Uninitialised(StateKey),

    #[error("Serialization error for {key}: {message}")]
    Serialization { key: StateKey, message: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl StateError {
    pub(crate) fn serialization(key: &StateKey, error: serde_json::Error) -> Self {
        StateError::Serialization {
            key: key.clone(),
            message: error.to_string(),
        }
    }
}
