//! Election, demotion and what happens when the maestro goes away.

#[cfg(test)]
mod tests {
    use super::super::{AddPoints, Scoreboard, ScoreboardModule};
    use crate::harness::{eventually, TestRelay, SETTLE};
    use async_trait::async_trait;
    use ens_02_peer_registry::MaestroLossPolicy;
    use ens_03_action_dispatch::ActionError;
    use ens_04_shared_state::{InMemoryKvStore, KvStore};
    use node_runtime::{EngineError, Module, ModuleApi};
    use serde_json::json;
    use shared_types::{ModuleScope, PeerId, PeerRole, StateKind};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// Creates persistent state and runs an action while registering, and
    /// records what it saw.
    #[derive(Clone, Default)]
    struct PresetsModule {
        maestro_at_register: Arc<AtomicBool>,
        warmup: Arc<Mutex<Option<Result<u32, String>>>>,
    }

    #[async_trait]
    impl Module for PresetsModule {
        fn id(&self) -> &str {
            "presets"
        }

        async fn register(&self, api: &ModuleApi) -> Result<(), EngineError> {
            self.maestro_at_register
                .store(api.is_maestro(), Ordering::SeqCst);
            api.create_persistent_state("preset", "default".to_string())
                .await?;

            let warmup = api.create_action("warmup", |_: ()| async { Ok(7u32) });
            let outcome = match tokio::time::timeout(SETTLE, warmup.call(())).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err("warmup timed out".to_string()),
            };
            *self.warmup.lock().unwrap() = Some(outcome);
            Ok(())
        }
    }

    fn maestro_count(relay: &TestRelay) -> usize {
        relay
            .registry()
            .snapshot()
            .iter()
            .filter(|peer| peer.is_maestro)
            .count()
    }

    #[tokio::test]
    async fn test_first_peer_is_elected_without_claim() {
        let relay = TestRelay::start().await;
        let a = relay.peer("A").build().await.unwrap();

        assert!(a.wait_until_maestro(SETTLE).await);
        assert_eq!(relay.registry().maestro(), Some(PeerId::new("A")));
    }

    #[tokio::test]
    async fn test_elected_first_peer_registers_modules_as_maestro() {
        let relay = TestRelay::start().await;
        let store = Arc::new(InMemoryKvStore::new());
        let presets = PresetsModule::default();
        let a = relay
            .peer("A")
            .persistent_store(store.clone())
            .register_module(presets.clone())
            .build()
            .await
            .unwrap();

        assert!(a.is_maestro());
        assert!(presets.maestro_at_register.load(Ordering::SeqCst));
        assert_eq!(relay.registry().maestro(), Some(PeerId::new("A")));
        assert_eq!(*presets.warmup.lock().unwrap(), Some(Ok(7)));

        a.shutdown().await;
        let key = ModuleScope::new("presets").state_key(StateKind::Persistent, "preset");
        assert_eq!(store.get(key.as_str()).await.unwrap(), Some(json!("default")));
    }

    #[tokio::test]
    async fn test_flagged_peer_takes_over_and_demotes_previous() {
        let relay = TestRelay::start().await;
        let a = relay.maestro("A").build().await.unwrap();
        assert!(a.wait_until_maestro(SETTLE).await);
        let b = relay.peer("B").build().await.unwrap();
        relay.wait_connected("B").await;
        let c = relay.maestro("C").build().await.unwrap();

        assert!(c.wait_until_maestro(SETTLE).await);
        assert!(a.endpoint().role().wait_for(PeerRole::Follower, SETTLE).await);
        assert!(!b.is_maestro());
        assert_eq!(relay.registry().maestro(), Some(PeerId::new("C")));
        assert_eq!(maestro_count(&relay), 1);
    }

    #[tokio::test]
    async fn test_actions_follow_the_new_maestro() {
        let relay = TestRelay::start().await;
        let on_a = ScoreboardModule::new();
        let on_c = ScoreboardModule::new();
        let a = relay
            .maestro("A")
            .register_module(on_a.clone())
            .build()
            .await
            .unwrap();
        assert!(a.wait_until_maestro(SETTLE).await);
        let b = relay
            .peer("B")
            .register_module(ScoreboardModule::new())
            .build()
            .await
            .unwrap();
        relay.wait_connected("B").await;
        let c = relay
            .maestro("C")
            .register_module(on_c.clone())
            .build()
            .await
            .unwrap();
        assert!(c.wait_until_maestro(SETTLE).await);

        let board = b.exports().require::<Scoreboard>().unwrap();
        board.add_points.call(AddPoints { points: 1 }).await.unwrap();

        assert_eq!(on_a.executions(), 0);
        assert_eq!(on_c.executions(), 1);
    }

    #[tokio::test]
    async fn test_reject_policy_answers_maestro_unavailable() {
        let relay = TestRelay::with_policy(MaestroLossPolicy::Reject).await;
        let a = relay
            .maestro("A")
            .register_module(ScoreboardModule::new())
            .build()
            .await
            .unwrap();
        assert!(a.wait_until_maestro(SETTLE).await);
        let b = relay
            .peer("B")
            .register_module(ScoreboardModule::new())
            .build()
            .await
            .unwrap();
        relay.wait_connected("B").await;

        a.shutdown().await;
        relay.wait_disconnected("A").await;

        assert_eq!(relay.registry().maestro(), Some(PeerId::new("A")));
        assert!(relay.registry().connected_maestro().is_none());
        assert!(!b.is_maestro());

        let board = b.exports().require::<Scoreboard>().unwrap();
        let err = board
            .add_points
            .call(AddPoints { points: 1 })
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::Failed("Maestro unavailable".into()));
    }

    #[tokio::test]
    async fn test_reject_policy_restores_returning_maestro() {
        let relay = TestRelay::with_policy(MaestroLossPolicy::Reject).await;
        let a = relay.maestro("A").build().await.unwrap();
        assert!(a.wait_until_maestro(SETTLE).await);
        let b = relay.peer("B").build().await.unwrap();
        relay.wait_connected("B").await;

        a.shutdown().await;
        relay.wait_disconnected("A").await;

        // Same id, no flag: authority is given back.
        let again = relay.peer("A").build().await.unwrap();
        assert!(again.wait_until_maestro(SETTLE).await);
        assert!(!b.is_maestro());
        assert_eq!(maestro_count(&relay), 1);
    }

    #[tokio::test]
    async fn test_promote_next_hands_authority_to_longest_connected() {
        let relay = TestRelay::with_policy(MaestroLossPolicy::PromoteNext).await;
        let a = relay.maestro("A").build().await.unwrap();
        assert!(a.wait_until_maestro(SETTLE).await);
        let b = relay.peer("B").build().await.unwrap();
        relay.wait_connected("B").await;
        let c = relay.peer("C").build().await.unwrap();
        relay.wait_connected("C").await;

        a.shutdown().await;

        assert!(b.wait_until_maestro(SETTLE).await);
        assert!(!c.is_maestro());
        eventually("B to own the maestro slot", || {
            relay.registry().maestro() == Some(PeerId::new("B"))
        })
        .await;
        assert_eq!(maestro_count(&relay), 1);
    }

    #[tokio::test]
    async fn test_promoted_maestro_serves_actions() {
        let relay = TestRelay::with_policy(MaestroLossPolicy::PromoteNext).await;
        let a = relay
            .maestro("A")
            .register_module(ScoreboardModule::new())
            .build()
            .await
            .unwrap();
        assert!(a.wait_until_maestro(SETTLE).await);
        let on_b = ScoreboardModule::new();
        let b = relay
            .peer("B")
            .register_module(on_b.clone())
            .build()
            .await
            .unwrap();
        relay.wait_connected("B").await;
        let c = relay
            .peer("C")
            .register_module(ScoreboardModule::new())
            .build()
            .await
            .unwrap();
        relay.wait_connected("C").await;

        a.shutdown().await;
        assert!(b.wait_until_maestro(SETTLE).await);

        let board = c.exports().require::<Scoreboard>().unwrap();
        assert_eq!(board.add_points.call(AddPoints { points: 4 }).await.unwrap(), 4);
        assert_eq!(on_b.executions(), 1);
    }
}
