//! Raw envelopes against the relay, with engines on the other side.

#[cfg(test)]
mod tests {
    use super::super::{Scoreboard, ScoreboardModule};
    use crate::harness::{TestRelay, SETTLE};
    use ens_04_shared_state::SET_SHARED_STATE_METHOD;
    use ens_05_state_supervisor::StateSupervisor;
    use futures::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use shared_types::{PeerId, RequestId, RpcEnvelope, ROLE_METHOD};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpStream, ToSocketAddrs};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type RawSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn raw_connect(relay: &TestRelay, query: &str) -> RawSocket {
        let url = format!("{}?{}", relay.url(), query);
        let (ws, _) = connect_async(url).await.unwrap();
        ws
    }

    async fn next_envelope(ws: &mut RawSocket) -> RpcEnvelope {
        loop {
            let frame = tokio::time::timeout(SETTLE, ws.next())
                .await
                .expect("frame before timeout")
                .expect("socket open")
                .unwrap();
            if let Message::Text(text) = frame {
                return RpcEnvelope::parse(text.as_str()).unwrap();
            }
        }
    }

    async fn send(ws: &mut RawSocket, envelope: &RpcEnvelope) {
        ws.send(Message::Text(envelope.to_text().unwrap().into()))
            .await
            .unwrap();
    }

    async fn http_get(addr: impl ToSocketAddrs, path: &str) -> Value {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let response = String::from_utf8(raw).unwrap();
        let (head, body) = response.split_once("\r\n\r\n").unwrap();
        assert!(head.starts_with("HTTP/1.1 200"), "unexpected response: {}", head);
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn test_relay_stamps_sender_and_routes_response_back() {
        let relay = TestRelay::start().await;
        let a = relay.maestro("A").build().await.unwrap();
        assert!(a.wait_until_maestro(SETTLE).await);
        a.endpoint().register_method("math.double", |params, _| async move {
            Ok(json!(params["n"].as_i64().unwrap_or_default() * 2))
        });

        let mut raw = raw_connect(&relay, "clientId=R").await;
        let role = next_envelope(&mut raw).await;
        assert_eq!(role.method.as_deref(), Some(ROLE_METHOD));
        assert_eq!(role.params.unwrap()["isMaestro"], false);

        send(
            &mut raw,
            &RpcEnvelope::request("math.double", json!({ "n": 21 }), RequestId::Number(7)),
        )
        .await;

        let response = next_envelope(&mut raw).await;
        assert_eq!(response.id, Some(RequestId::Number(7)));
        assert_eq!(response.result, Some(json!(42)));
        assert_eq!(response.client_id, Some(PeerId::new("R")));
    }

    #[tokio::test]
    async fn test_malformed_frames_do_not_break_the_connection() {
        let relay = TestRelay::start().await;
        let a = relay.maestro("A").build().await.unwrap();
        assert!(a.wait_until_maestro(SETTLE).await);
        a.endpoint()
            .register_method("echo", |params, _| async move { Ok(params) });

        let mut raw = raw_connect(&relay, "clientId=R").await;
        let _role = next_envelope(&mut raw).await;

        raw.send(Message::Text("{not json".into())).await.unwrap();
        raw.send(Message::Text(r#"{"jsonrpc":"2.0"}"#.into()))
            .await
            .unwrap();
        send(
            &mut raw,
            &RpcEnvelope::request("echo", json!(["still here"]), RequestId::Number(1)),
        )
        .await;

        let response = next_envelope(&mut raw).await;
        assert_eq!(response.result, Some(json!(["still here"])));
        assert!(relay.registry().is_connected(&PeerId::new("R")));
    }

    #[tokio::test]
    async fn test_maestro_request_is_dropped_but_broadcast_delivered() {
        let relay = TestRelay::start().await;
        let mut maestro = raw_connect(&relay, "clientId=M&is_maestro=true").await;
        let role = next_envelope(&mut maestro).await;
        assert_eq!(role.params.unwrap()["isMaestro"], true);

        let b = relay
            .peer("B")
            .register_module(ScoreboardModule::new())
            .build()
            .await
            .unwrap();
        relay.wait_connected("B").await;
        let board = b.exports().require::<Scoreboard>().unwrap();
        let mut view = board.score.attach().unwrap();

        // A maestro has nobody to send requests to.
        send(
            &mut maestro,
            &RpcEnvelope::request("anything", json!({}), RequestId::Number(1)),
        )
        .await;
        send(
            &mut maestro,
            &RpcEnvelope::notification(
                SET_SHARED_STATE_METHOD,
                json!({ "key": board.score.key(), "data": 12 }),
            ),
        )
        .await;

        let seen = tokio::time::timeout(SETTLE, view.next_value())
            .await
            .expect("broadcast")
            .unwrap();
        assert_eq!(seen, 12);
        assert!(relay.registry().is_connected(&PeerId::new("M")));
    }

    #[tokio::test]
    async fn test_health_reports_peers_and_maestro() {
        let relay = TestRelay::start().await;
        let a = relay.maestro("A").build().await.unwrap();
        assert!(a.wait_until_maestro(SETTLE).await);
        let _b = relay.peer("B").build().await.unwrap();
        relay.wait_connected("B").await;

        let health = http_get(relay.addr(), "/health").await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["peers"], 2);
        assert_eq!(health["maestro"], "A");
        assert_eq!(health["maestroConnected"], true);
    }
}
