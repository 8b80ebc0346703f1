use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use txwatch_api::{Action, LiveEvent};

use super::AppState;
use crate::http::{ApiError, caller};

// ═══════════════════════════════════════════════════════════════
//  WebSocket: /ws
// ═══════════════════════════════════════════════════════════════

/// Права проверяются до upgrade: без `ViewTransactions` соединение не открывается.
pub(crate) async fn handle_ws(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let caller = caller(&state, &headers);
    state
        .coordinator
        .authorize(&caller, Action::ViewTransactions)
        .await?;
    tracing::debug!(principal = %caller.principal, "ws connected");
    Ok(ws.on_upgrade(move |socket| ws_connection(socket, state)))
}

// ═══════════════════════════════════════════════════════════════
//  Protocol types
// ═══════════════════════════════════════════════════════════════

/// `{"action": "subscribe" | "unsubscribe", "topic": "<index>"}`
#[derive(Deserialize)]
struct WsAction {
    action: String,
    #[serde(default)]
    topic: String,
}

async fn send_json(socket: &mut WebSocket, value: serde_json::Value) -> bool {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .is_ok()
}

// ═══════════════════════════════════════════════════════════════
//  Connection handler
// ═══════════════════════════════════════════════════════════════

/// One task per topic drains its subscription into `mux`; the loop below
/// is the only writer to the socket.
async fn ws_connection(mut socket: WebSocket, state: AppState) {
    let (mux_tx, mut mux_rx) = mpsc::channel::<LiveEvent>(state.ws_buffer.max(1));

    let mut subs: HashMap<String, JoinHandle<()>> = HashMap::new();

    loop {
        tokio::select! {
            biased;

            msg = socket.recv() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    _ => break,
                };

                let text = match msg {
                    Message::Text(t) => t,
                    Message::Close(_) => break,
                    _ => continue,
                };

                let action: WsAction = match serde_json::from_str(&text) {
                    Ok(a) => a,
                    Err(e) => {
                        send_json(&mut socket, json!({"error": format!("parse: {e}")})).await;
                        continue;
                    }
                };

                if action.topic.is_empty() {
                    send_json(&mut socket, json!({"error": "topic is required"})).await;
                    continue;
                }

                match action.action.as_str() {
                    "subscribe" => {
                        if !subs.contains_key(&action.topic) {
                            let handle = spawn_forwarder(&state, &action.topic, mux_tx.clone()).await;
                            subs.insert(action.topic.clone(), handle);
                            tracing::debug!(topic = %action.topic, "ws subscribed");
                        }
                        send_json(&mut socket, json!({"type": "subscribed", "topic": action.topic})).await;
                    }
                    "unsubscribe" => {
                        if let Some(handle) = subs.remove(&action.topic) {
                            handle.abort();
                            tracing::debug!(topic = %action.topic, "ws unsubscribed");
                        }
                        send_json(&mut socket, json!({"type": "unsubscribed", "topic": action.topic})).await;
                    }
                    _ => {
                        send_json(&mut socket, json!({"error": "unknown action"})).await;
                    }
                }
            }

            event = mux_rx.recv() => {
                let Some(event) = event else { break };
                match serde_json::to_value(&event) {
                    Ok(value) => {
                        if !send_json(&mut socket, value).await {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(event = event.name(), error = %e, "ws encode failed"),
                }
            }
        }
    }

    for (_, handle) in subs {
        handle.abort();
    }
}

async fn spawn_forwarder(
    state: &AppState,
    topic: &str,
    tx: mpsc::Sender<LiveEvent>,
) -> JoinHandle<()> {
    let mut subscription = state
        .subscriber
        .subscribe(topic, state.ws_buffer, state.ws_overflow)
        .await;
    tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            if tx.send(event).await.is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::{Value, json};
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;

    use crate::PRINCIPAL_HEADER;
    use crate::testing::{Running, start};

    type Client = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn next_json(ws: &mut Client) -> Value {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
                .await
                .expect("no ws message in time")
                .expect("ws closed")
                .expect("ws error");
            if let WsMessage::Text(t) = msg {
                return serde_json::from_str(&t).unwrap();
            }
        }
    }

    async fn connect(
        srv: &Running,
        principal: &str,
    ) -> Result<Client, tokio_tungstenite::tungstenite::Error> {
        let mut req = format!("ws://{}/ws", srv.addr).into_client_request()?;
        req.headers_mut()
            .insert(PRINCIPAL_HEADER, principal.parse().unwrap());
        let (ws, _) = tokio_tungstenite::connect_async(req).await?;
        Ok(ws)
    }

    async fn send(ws: &mut Client, value: Value) {
        ws.send(WsMessage::Text(value.to_string().into())).await.unwrap();
    }

    #[tokio::test]
    async fn pushes_annotation_updates_to_subscribers() {
        let srv = start().await;
        let mut ws = connect(&srv, "ana").await.unwrap();

        send(&mut ws, json!({"action": "subscribe", "topic": "txn"})).await;
        assert_eq!(next_json(&mut ws).await["type"], "subscribed");

        reqwest::Client::new()
            .post(srv.url("/api/transactions/txn/r1/remark"))
            .header(PRINCIPAL_HEADER, "ana")
            .json(&json!({"remark": "checked"}))
            .send()
            .await
            .unwrap();

        let event = next_json(&mut ws).await;
        assert_eq!(
            event,
            json!({"type": "transaction_updated", "id": "r1", "field": "remark", "value": "checked"})
        );
    }

    #[tokio::test]
    async fn pushes_new_data_on_first_page_view() {
        let srv = start().await;
        let mut ws = connect(&srv, "ana").await.unwrap();
        send(&mut ws, json!({"action": "subscribe", "topic": "txn"})).await;
        next_json(&mut ws).await;

        reqwest::Client::new()
            .get(srv.url("/api/transactions?index=txn"))
            .header(PRINCIPAL_HEADER, "ana")
            .send()
            .await
            .unwrap();

        let event = next_json(&mut ws).await;
        assert_eq!(event, json!({"type": "new_data_available", "stream": "txn"}));
    }

    #[tokio::test]
    async fn unsubscribed_client_gets_nothing() {
        let srv = start().await;
        let mut ws = connect(&srv, "ana").await.unwrap();
        send(&mut ws, json!({"action": "subscribe", "topic": "txn"})).await;
        next_json(&mut ws).await;
        send(&mut ws, json!({"action": "unsubscribe", "topic": "txn"})).await;
        assert_eq!(next_json(&mut ws).await["type"], "unsubscribed");

        reqwest::Client::new()
            .post(srv.url("/api/transactions/txn/r2/tickbox"))
            .header(PRINCIPAL_HEADER, "ana")
            .json(&json!({"tickbox": true}))
            .send()
            .await
            .unwrap();

        // The next frame must be the reply to this action, not an event.
        send(&mut ws, json!({"action": "bogus", "topic": "txn"})).await;
        assert_eq!(next_json(&mut ws).await, json!({"error": "unknown action"}));
    }

    #[tokio::test]
    async fn reports_malformed_actions() {
        let srv = start().await;
        let mut ws = connect(&srv, "ana").await.unwrap();
        ws.send(WsMessage::Text("not json".into())).await.unwrap();
        assert!(next_json(&mut ws).await["error"].as_str().unwrap().starts_with("parse"));

        send(&mut ws, json!({"action": "subscribe"})).await;
        assert_eq!(next_json(&mut ws).await, json!({"error": "topic is required"}));
    }

    #[tokio::test]
    async fn upgrade_requires_view_permission() {
        let srv = start().await;
        for principal in ["", "mallory"] {
            match connect(&srv, principal).await {
                Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => {
                    assert_eq!(resp.status().as_u16(), 403);
                }
                Err(e) => panic!("unexpected error: {e}"),
                Ok(_) => panic!("'{principal}' was let in"),
            }
        }

        // Rule makers may read, so they may watch.
        let mut ws = connect(&srv, "rui").await.unwrap();
        send(&mut ws, json!({"action": "subscribe", "topic": "txn"})).await;
        assert_eq!(next_json(&mut ws).await["type"], "subscribed");
    }
}
