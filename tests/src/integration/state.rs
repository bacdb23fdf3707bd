//! Shared, persistent and user-agent state across peers.

#[cfg(test)]
mod tests {
    use super::super::{Scoreboard, ScoreboardModule};
    use crate::harness::{TestRelay, SETTLE};
    use ens_04_shared_state::KvStore;
    use ens_05_state_supervisor::StateSupervisor;
    use node_runtime::{Engine, JsonFileKvStore};
    use serde_json::json;
    use shared_types::{ModuleScope, StateKind};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    async fn maestro_and_follower(relay: &TestRelay) -> (Engine, Engine) {
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
        (a, b)
    }

    #[tokio::test]
    async fn test_maestro_change_reaches_follower_subscription_and_cache() {
        let relay = TestRelay::start().await;
        let (a, b) = maestro_and_follower(&relay).await;

        let on_a = a.exports().require::<Scoreboard>().unwrap();
        let on_b = b.exports().require::<Scoreboard>().unwrap();
        let mut view = on_b.score.attach().unwrap();
        assert_eq!(*view.initial(), 0);

        on_a.score.set_state(42).unwrap();

        let seen = tokio::time::timeout(SETTLE, view.next_value())
            .await
            .expect("update")
            .unwrap();
        assert_eq!(seen, 42);
        assert_eq!(on_b.score.get_state().unwrap(), 42);
        assert_eq!(
            b.shared_state().get_cached_value(on_b.score.key()),
            Some(json!(42))
        );
    }

    #[tokio::test]
    async fn test_follower_sees_changes_in_maestro_order() {
        let relay = TestRelay::start().await;
        let (a, b) = maestro_and_follower(&relay).await;

        let on_a = a.exports().require::<Scoreboard>().unwrap();
        let on_b = b.exports().require::<Scoreboard>().unwrap();
        let mut view = on_b.score.attach().unwrap();

        for value in 1..=20 {
            on_a.score.set_state(value).unwrap();
        }

        let mut seen = Vec::new();
        while seen.len() < 20 {
            let next = tokio::time::timeout(SETTLE, view.next_value())
                .await
                .expect("update")
                .unwrap();
            seen.push(next);
        }
        assert_eq!(seen, (1..=20).collect::<Vec<u32>>());
        assert_eq!(on_b.score.get_state().unwrap(), 20);
    }

    #[tokio::test]
    async fn test_follower_change_converges_without_echo() {
        let relay = TestRelay::start().await;
        let (a, b) = maestro_and_follower(&relay).await;
        let c = relay
            .peer("C")
            .register_module(ScoreboardModule::new())
            .build()
            .await
            .unwrap();
        relay.wait_connected("C").await;

        let on_a = a.exports().require::<Scoreboard>().unwrap();
        let on_b = b.exports().require::<Scoreboard>().unwrap();
        let on_c = c.exports().require::<Scoreboard>().unwrap();
        let mut view_a = on_a.score.attach().unwrap();
        let mut view_b = on_b.score.attach().unwrap();
        let mut view_c = on_c.score.attach().unwrap();

        on_b.score.set_state(9).unwrap();

        for view in [&mut view_a, &mut view_b, &mut view_c] {
            let seen = tokio::time::timeout(SETTLE, view.next_value())
                .await
                .expect("update")
                .unwrap();
            assert_eq!(seen, 9);
        }

        // The maestro's rebroadcast must not come back to B.
        let echo = tokio::time::timeout(Duration::from_millis(300), view_b.next_value()).await;
        assert!(echo.is_err(), "origin received its own change back");
        assert_eq!(on_a.score.get_state().unwrap(), 9);
        assert_eq!(on_c.score.get_state().unwrap(), 9);
    }

    #[tokio::test]
    async fn test_late_joiner_starts_from_its_own_initial_value() {
        let relay = TestRelay::start().await;
        let a = relay
            .maestro("A")
            .register_module(ScoreboardModule::new())
            .build()
            .await
            .unwrap();
        assert!(a.wait_until_maestro(SETTLE).await);
        a.exports()
            .require::<Scoreboard>()
            .unwrap()
            .score
            .set_state(5)
            .unwrap();

        let b = relay
            .peer("B")
            .register_module(ScoreboardModule::new())
            .build()
            .await
            .unwrap();
        relay.wait_connected("B").await;

        // No snapshot is sent on connect; B only learns later changes.
        let on_b = b.exports().require::<Scoreboard>().unwrap();
        assert_eq!(on_b.score.get_state().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_user_agent_state_stays_on_its_peer() {
        let relay = TestRelay::start().await;
        let (a, b) = maestro_and_follower(&relay).await;

        let volume = b
            .api("mixer")
            .create_user_agent_state("volume", 5u8)
            .await
            .unwrap();
        volume.set_state(11).unwrap();
        assert_eq!(volume.get_state().unwrap(), 11);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(a.shared_state().get_cached_value(volume.key()).is_none());
    }

    #[tokio::test]
    async fn test_maestro_persists_follower_change_across_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let key = ModuleScope::new("studio").state_key(StateKind::Persistent, "preset");

        {
            let relay = TestRelay::start().await;
            let store = Arc::new(JsonFileKvStore::open(&path).await.unwrap());
            let a = relay
                .maestro("A")
                .persistent_store(store)
                .build()
                .await
                .unwrap();
            assert!(a.wait_until_maestro(SETTLE).await);
            let b = relay.peer("B").build().await.unwrap();
            relay.wait_connected("B").await;

            let on_a = a
                .api("studio")
                .create_persistent_state("preset", "default".to_string())
                .await
                .unwrap();
            let on_b = b
                .api("studio")
                .create_persistent_state("preset", "default".to_string())
                .await
                .unwrap();
            let mut view = on_a.attach().unwrap();

            on_b.set_state("jazz".to_string()).unwrap();
            let seen = tokio::time::timeout(SETTLE, view.next_value())
                .await
                .expect("update")
                .unwrap();
            assert_eq!(seen, "jazz");

            a.shutdown().await;
            b.shutdown().await;
        }

        let reopened = JsonFileKvStore::open(&path).await.unwrap();
        assert_eq!(reopened.get(key.as_str()).await.unwrap(), Some(json!("jazz")));

        let relay = TestRelay::start().await;
        let store = Arc::new(reopened);
        let a = relay
            .maestro("A")
            .persistent_store(store)
            .build()
            .await
            .unwrap();
        let preset = a
            .api("studio")
            .create_persistent_state("preset", "default".to_string())
            .await
            .unwrap();
        assert_eq!(preset.get_state().unwrap(), "jazz");
    }
}
