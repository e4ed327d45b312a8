use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.plan_events_tx.subscribe();

    info!("plan feed subscriber connected");

    let send_task = tokio::spawn(async move {
        loop {
            let plan = match rx.recv().await {
                Ok(plan) => plan,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "ws subscriber lagged; dropping plan events");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let json = match serde_json::to_string(&plan) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, robot_id = %plan.robot_id, "failed to serialize plan for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("plan feed subscriber disconnected");
}
