use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ProtocolError, ServerMessage},
    state::{ClientConnection, SharedState, game::ConnectionId},
};

/// Handle the full lifecycle of one session WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound frames flowing while we await inbound ones.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id: ConnectionId = Uuid::new_v4();
    state.connections().insert(
        connection_id,
        ClientConnection {
            id: connection_id,
            tx: outbound_tx.clone(),
        },
    );
    info!(connection_id = %connection_id, "client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(connection_id = %connection_id, payload = %text, "received frame");
                handle_frame(&state, connection_id, &outbound_tx, text.as_str());
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(connection_id = %connection_id, "client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {
                warn!(connection_id = %connection_id, "ignoring binary frame");
            }
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection_id = %connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.connections().remove(&connection_id);
    state.session().disconnected(connection_id);
    info!(connection_id = %connection_id, "client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Turn one text frame into a session command, answering protocol errors where appropriate.
fn handle_frame(
    state: &SharedState,
    connection_id: ConnectionId,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    text: &str,
) {
    match ClientMessage::parse_command(text) {
        Ok(command) => {
            if !state.session().client(connection_id, command) {
                warn!(connection_id = %connection_id, "session controller is gone");
            }
        }
        Err(ProtocolError::InvalidChoice(index)) => {
            debug!(connection_id = %connection_id, index, "dropping out-of-range answer");
        }
        Err(err @ ProtocolError::InvalidSettings(_)) => {
            warn!(connection_id = %connection_id, error = %err, "rejected game settings");
            state.session().rejected(connection_id, err.to_string());
        }
        Err(err @ ProtocolError::Malformed(_)) => {
            warn!(connection_id = %connection_id, error = %err, "failed to parse client frame");
            send_message_to_websocket(outbound_tx, &ServerMessage::error("malformed message"));
        }
    }
}

/// Serialize a frame and push it onto the provided WebSocket sender.
pub fn send_message_to_websocket(tx: &mpsc::UnboundedSender<Message>, value: &ServerMessage) {
    match serde_json::to_string(value) {
        Ok(payload) => {
            if tx.send(Message::Text(payload.into())).is_err() {
                debug!(event = value.event_name(), "writer closed before send");
            }
        }
        Err(err) => {
            warn!(error = %err, event = value.event_name(), "failed to serialize frame");
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
