//! # End-to-End Coordination Tests
//!
//! Every test starts its own relay and engines over loopback.
//!
//! | File | Covers |
//! |------|--------|
//! | `actions` | forwarded actions, failures, mid-flight disconnects |
//! | `state` | shared state fan-out, ordering, persistence |
//! | `maestro` | election, demotion, loss policies |
//! | `protocol` | raw envelopes against the relay |

pub mod actions;
pub mod maestro;
pub mod protocol;
pub mod state;

use async_trait::async_trait;
use ens_03_action_dispatch::{Action, HandlerError};
use ens_05_state_supervisor::{SharedStateSupervisor, StateSupervisor};
use node_runtime::{EngineError, Module, ModuleApi};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// TEST FIXTURES
// =============================================================================

pub const SCOREBOARD_MODULE_ID: &str = "scoreboard";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddPoints {
    pub points: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reject {
    pub reason: String,
}

/// What the scoreboard module exports to host code.
#[derive(Clone)]
pub struct Scoreboard {
    pub add_points: Action<AddPoints, u32>,
    pub reject: Action<Reject, ()>,
    pub stall: Action<(), ()>,
    pub score: SharedStateSupervisor<u32>,
}

/// Small application module: a shared score and the actions that change it.
///
/// `executions` counts how often a handler body ran on this peer.
#[derive(Clone)]
pub struct ScoreboardModule {
    pub executions: Arc<AtomicUsize>,
    pub stall_for: Duration,
}

impl ScoreboardModule {
    pub fn new() -> Self {
        Self {
            executions: Arc::new(AtomicUsize::new(0)),
            stall_for: Duration::from_secs(2),
        }
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

impl Default for ScoreboardModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for ScoreboardModule {
    fn id(&self) -> &str {
        SCOREBOARD_MODULE_ID
    }

    async fn register(&self, api: &ModuleApi) -> Result<(), EngineError> {
        let score = api.create_shared_state("score", 0u32)?;

        let executions = self.executions.clone();
        let handler_score = score.clone();
        let add_points = api.create_action("add_points", move |args: AddPoints| {
            executions.fetch_add(1, Ordering::SeqCst);
            let score = handler_score.clone();
            async move {
                score
                    .set_state_with(|current| current + args.points)
                    .map_err(|e| HandlerError::new(e.to_string()))
            }
        });

        let reject = api.create_action("reject", |args: Reject| async move {
            Err::<(), _>(HandlerError::new(args.reason))
        });

        let stall_for = self.stall_for;
        let stall = api.create_action("stall", move |_: ()| async move {
            tokio::time::sleep(stall_for).await;
            Ok(())
        });

        api.exports().provide(Scoreboard {
            add_points,
            reject,
            stall,
            score,
        });
        Ok(())
    }
}
