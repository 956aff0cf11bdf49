//! Streaming surface: a WebSocket command loop.
//!
//! A client sends `{"type": "workloads", "payload": {"namespace": "..."}}`
//! and receives a freshly built snapshot every second until it disconnects
//! or issues a new command. Ticks are serialized per connection, so two
//! builds for the same client never overlap.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::ServerState;

const BROADCAST_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct Command {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

impl Command {
    fn namespace(&self) -> Option<&str> {
        self.payload.get("namespace")?.as_str()
    }
}

pub(super) async fn ws_handler(
    State(state): State<Arc<ServerState>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<ServerState>) {
    while let Some(message) = socket.recv().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        let command: Command = match serde_json::from_str(&text) {
            Ok(command) => command,
            Err(err) => {
                warn!("unparseable command: {err}");
                continue;
            }
        };

        if command.kind != "workloads" {
            debug!(command = %command.kind, "ignoring unknown command");
            continue;
        }
        let Some(namespace) = command.namespace().map(str::to_string) else {
            warn!("workloads command without a namespace");
            continue;
        };

        if stream_workloads(&mut socket, &state, namespace).await.is_err() {
            break;
        }
    }
}

enum StreamEnd {
    /// The client went away or the transport failed.
    Closed,
    /// The client issued a new workloads command for another namespace.
    Switch(String),
}

async fn stream_workloads(
    socket: &mut WebSocket,
    state: &Arc<ServerState>,
    namespace: String,
) -> Result<(), ()> {
    let mut namespace = namespace;

    loop {
        match stream_one_namespace(socket, state, &namespace).await {
            StreamEnd::Closed => return Err(()),
            StreamEnd::Switch(next) => namespace = next,
        }
    }
}

async fn stream_one_namespace(
    socket: &mut WebSocket,
    state: &Arc<ServerState>,
    namespace: &str,
) -> StreamEnd {
    let mut ticks = tokio::time::interval(BROADCAST_INTERVAL);
    let cancel = CancellationToken::new();

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                let nodes = match state.builder().build(&cancel, namespace) {
                    Ok(nodes) => nodes,
                    Err(err) => {
                        warn!(%namespace, "graph build failed: {err}");
                        return StreamEnd::Closed;
                    }
                };

                let payload = json!({
                    "type": "nodes",
                    "data": { "nodes": nodes },
                });
                if socket
                    .send(Message::Text(payload.to_string().into()))
                    .await
                    .is_err()
                {
                    return StreamEnd::Closed;
                }
            }
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(command) = serde_json::from_str::<Command>(&text) {
                            if command.kind == "workloads" {
                                if let Some(next) = command.namespace() {
                                    if next != namespace {
                                        return StreamEnd::Switch(next.to_string());
                                    }
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return StreamEnd::Closed,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
