//! Actions called from a non-maestro peer run on the maestro.

#[cfg(test)]
mod tests {
    use super::super::{AddPoints, Reject, Scoreboard, ScoreboardModule};
    use crate::harness::{short_timeouts, TestRelay, SETTLE};
    use ens_01_rpc::CallError;
    use ens_03_action_dispatch::{ActionError, ErrorNotifier};
    use ens_05_state_supervisor::StateSupervisor;
    use node_runtime::{Pong, SystemActions, SystemModule};
    use serde_json::json;
    use shared_types::codes;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingNotifier(Mutex<Vec<String>>);

    impl ErrorNotifier for RecordingNotifier {
        fn show_error(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    #[tokio::test]
    async fn test_forwarded_action_runs_once_on_maestro() {
        let relay = TestRelay::start().await;
        let on_a = ScoreboardModule::new();
        let on_b = ScoreboardModule::new();

        let a = relay
            .maestro("A")
            .register_module(on_a.clone())
            .build()
            .await
            .unwrap();
        assert!(a.wait_until_maestro(SETTLE).await);
        let b = relay
            .peer("B")
            .register_module(on_b.clone())
            .build()
            .await
            .unwrap();
        relay.wait_connected("B").await;

        let board = b.exports().require::<Scoreboard>().unwrap();
        let total = board.add_points.call(AddPoints { points: 5 }).await.unwrap();

        assert_eq!(total, 5);
        assert_eq!(on_a.executions(), 1);
        assert_eq!(on_b.executions(), 0);
    }

    #[tokio::test]
    async fn test_maestro_runs_its_own_actions_locally() {
        let relay = TestRelay::start().await;
        let module = ScoreboardModule::new();
        let a = relay
            .maestro("A")
            .register_module(module.clone())
            .build()
            .await
            .unwrap();
        assert!(a.wait_until_maestro(SETTLE).await);

        let board = a.exports().require::<Scoreboard>().unwrap();
        assert_eq!(board.add_points.call(AddPoints { points: 2 }).await.unwrap(), 2);
        assert_eq!(board.add_points.call(AddPoints { points: 3 }).await.unwrap(), 5);

        assert_eq!(module.executions(), 2);
        assert_eq!(a.endpoint().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_action_side_effects_reach_the_caller() {
        let relay = TestRelay::start().await;
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

        let board = b.exports().require::<Scoreboard>().unwrap();
        let mut view = board.score.attach().unwrap();
        board.add_points.call(AddPoints { points: 7 }).await.unwrap();

        let seen = tokio::time::timeout(SETTLE, view.next_value())
            .await
            .expect("score update")
            .unwrap();
        assert_eq!(seen, 7);
        assert_eq!(board.score.get_state().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_handler_failure_reaches_caller_and_notifier() {
        let relay = TestRelay::start().await;
        let a = relay
            .maestro("A")
            .register_module(ScoreboardModule::new())
            .build()
            .await
            .unwrap();
        assert!(a.wait_until_maestro(SETTLE).await);

        let notifier = Arc::new(RecordingNotifier::default());
        let b = relay
            .peer("B")
            .register_module(ScoreboardModule::new())
            .error_notifier(notifier.clone())
            .build()
            .await
            .unwrap();
        relay.wait_connected("B").await;

        let board = b.exports().require::<Scoreboard>().unwrap();
        let err = board
            .reject
            .call(Reject {
                reason: "No chord selected".into(),
            })
            .await
            .unwrap_err();

        assert_eq!(err, ActionError::Failed("No chord selected".into()));
        assert_eq!(
            *notifier.0.lock().unwrap(),
            vec!["No chord selected".to_string()]
        );
    }

    #[tokio::test]
    async fn test_raw_call_round_trips_through_relay() {
        let relay = TestRelay::start().await;
        let a = relay.maestro("A").build().await.unwrap();
        assert!(a.wait_until_maestro(SETTLE).await);
        a.endpoint().register_method("math.sum", |params, ctx| async move {
            let sum: i64 = params["values"]
                .as_array()
                .map(|values| values.iter().filter_map(|v| v.as_i64()).sum())
                .unwrap_or_default();
            Ok(json!({ "sum": sum, "caller": ctx.caller }))
        });

        let b = relay.peer("B").build().await.unwrap();
        relay.wait_connected("B").await;

        let result = b
            .endpoint()
            .call("math.sum", json!({ "values": [1, 2, 3, 4] }))
            .await
            .unwrap();
        assert_eq!(result, json!({ "sum": 10, "caller": "B" }));
        assert_eq!(b.endpoint().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_method_is_reported_by_maestro() {
        let relay = TestRelay::start().await;
        let a = relay.maestro("A").build().await.unwrap();
        assert!(a.wait_until_maestro(SETTLE).await);
        let b = relay.peer("B").build().await.unwrap();
        relay.wait_connected("B").await;

        let err = b
            .endpoint()
            .call("engine|module|nowhere|action|nothing", json!({}))
            .await
            .unwrap_err();
        match err {
            CallError::Remote(error) => assert_eq!(error.code, codes::METHOD_NOT_FOUND),
            other => panic!("expected method-not-found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_system_ping_is_answered_by_maestro() {
        let relay = TestRelay::start().await;
        let a = relay
            .maestro("A")
            .register_module(SystemModule)
            .build()
            .await
            .unwrap();
        assert!(a.wait_until_maestro(SETTLE).await);
        let b = relay
            .peer("B")
            .register_module(SystemModule)
            .build()
            .await
            .unwrap();
        relay.wait_connected("B").await;

        let system = b.exports().require::<SystemActions>().unwrap();
        let pong: Pong = system.ping.call(Default::default()).await.unwrap();
        assert_eq!(pong.answered_by.as_str(), "A");
    }

    #[tokio::test]
    async fn test_caller_disconnect_rejects_outstanding_call() {
        let relay = TestRelay::start().await;
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

        let board = b.exports().require::<Scoreboard>().unwrap();
        let call = tokio::spawn(async move { board.stall.call(()).await });

        tokio::time::sleep(Duration::from_millis(200)).await;
        b.shutdown().await;

        let outcome = tokio::time::timeout(SETTLE, call)
            .await
            .expect("call settles")
            .unwrap();
        assert_eq!(outcome, Err(ActionError::Call(CallError::ConnectionLost)));
        assert_eq!(b.endpoint().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_maestro_disconnect_mid_call_times_out() {
        let relay = TestRelay::start().await;
        let a = relay
            .maestro("A")
            .register_module(ScoreboardModule::new())
            .build()
            .await
            .unwrap();
        assert!(a.wait_until_maestro(SETTLE).await);
        let b = relay
            .peer("B")
            .endpoint_config(short_timeouts(Duration::from_millis(600)))
            .register_module(ScoreboardModule::new())
            .build()
            .await
            .unwrap();
        relay.wait_connected("B").await;

        let board = b.exports().require::<Scoreboard>().unwrap();
        let call = tokio::spawn(async move { board.stall.call(()).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        a.shutdown().await;

        let outcome = tokio::time::timeout(SETTLE, call)
            .await
            .expect("call settles")
            .unwrap();
        assert!(
            matches!(outcome, Err(ActionError::Call(CallError::Timeout { .. }))),
            "expected timeout, got {:?}",
            outcome
        );
        assert_eq!(b.endpoint().pending_count(), 0);
    }
}
