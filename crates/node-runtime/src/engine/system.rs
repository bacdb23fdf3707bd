//! Built-in `system` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ens_03_action_dispatch::Action;
use serde::{Deserialize, Serialize};
use shared_types::PeerId;

use super::module::{Module, ModuleApi};
use super::EngineError;

pub const SYSTEM_MODULE_ID: &str = "system";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Answer from whichever peer ran the ping, i.e. the maestro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pong {
    pub answered_by: PeerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub at: DateTime<Utc>,
}

/// Export of the system module.
#[derive(Clone)]
pub struct SystemActions {
    pub ping: Action<Ping, Pong>,
}

/// Registers `engine|module|system|action|ping` and exports [`SystemActions`].
#[derive(Debug, Default)]
pub struct SystemModule;

#[async_trait]
impl Module for SystemModule {
    fn id(&self) -> &str {
        SYSTEM_MODULE_ID
    }

    async fn register(&self, api: &ModuleApi) -> Result<(), EngineError> {
        let own_id = api.peer_id().clone();
        let ping = api.create_action("ping", move |args: Ping| {
            let answered_by = own_id.clone();
            async move {
                Ok(Pong {
                    answered_by,
                    message: args.message,
                    at: Utc::now(),
                })
            }
        });

        api.exports().provide(SystemActions { ping });
        Ok(())
    }
}
