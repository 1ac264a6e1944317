//! services/tracker/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! Each connection follows at most one feed; a forwarding task pushes the
//! feed's full record list to the client every time it changes.

use crate::web::{
    protocol::{ClientMessage, FeedRequest, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use employee_tracker_core::sync::{Feed, FeedSource};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, error, info, warn};

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established");

    // The sender is shared with the forwarding task.
    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));
    let mut forward_handle: Option<JoinHandle<()>> = None;

    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                handle_text_message(text.as_str(), &app_state, &ws_sender, &mut forward_handle).await;
            }
            Some(Ok(Message::Close(_))) => {
                info!("Client sent close message.");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("WebSocket receive failed: {}", e);
                break;
            }
            None => {
                info!("Client disconnected.");
                break;
            }
        }
    }

    // --- Cleanup ---
    if let Some(handle) = forward_handle {
        handle.abort();
    }
    info!("WebSocket connection closed.");
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: &str,
    app_state: &Arc<AppState>,
    ws_sender: &WsSender,
    forward_handle: &mut Option<JoinHandle<()>>,
) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Subscribe { feed }) => {
            info!(feed = feed.label(), "Subscribe message received.");
            if let Some(previous) = forward_handle.take() {
                previous.abort();
            }
            let label = feed.label();
            if send_message(ws_sender, &ServerMessage::Subscribed { feed: label.to_string() })
                .await
                .is_err()
            {
                error!("Failed to send Subscribed message.");
                return;
            }
            *forward_handle = Some(start_feed(app_state, feed, ws_sender.clone()));
        }
        Ok(ClientMessage::Unsubscribe) => {
            info!("Unsubscribe message received.");
            if let Some(previous) = forward_handle.take() {
                previous.abort();
            }
        }
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            let reply = ServerMessage::Error {
                message: format!("Unrecognised message: {e}"),
            };
            let _ = send_message(ws_sender, &reply).await;
        }
    }
}

/// Opens the feed the client asked for and spawns its forwarding task.
fn start_feed(app_state: &AppState, request: FeedRequest, ws_sender: WsSender) -> JoinHandle<()> {
    let services = &app_state.services;
    let label = request.label();
    match request {
        FeedRequest::Employees => spawn_forward(services.employees.watch_employees(), label, ws_sender),
        FeedRequest::Users => spawn_forward(services.employees.watch_users(), label, ws_sender),
        FeedRequest::Tasks { employee_id: Some(id) } => {
            spawn_forward(services.tasks.watch_for_employee(id), label, ws_sender)
        }
        FeedRequest::Tasks { employee_id: None } => spawn_forward(services.tasks.watch_all(), label, ws_sender),
        FeedRequest::Reviews { employee_id: Some(id) } => {
            spawn_forward(services.reviews.watch_for_employee(id), label, ws_sender)
        }
        FeedRequest::Reviews { employee_id: None } => spawn_forward(services.reviews.watch_all(), label, ws_sender),
        FeedRequest::Messages { user_id } => {
            spawn_forward(services.messages.watch_for_user(user_id), label, ws_sender)
        }
        FeedRequest::Conversation { user_id, other_id } => spawn_forward(
            services.messages.watch_conversation(user_id, other_id),
            label,
            ws_sender,
        ),
        FeedRequest::Attendance { date: Some(date), .. } => {
            spawn_forward(services.attendance.watch_for_date(date), label, ws_sender)
        }
        FeedRequest::Attendance {
            employee_id: Some(id),
            date: None,
        } => spawn_forward(services.attendance.watch_for_employee(id), label, ws_sender),
        FeedRequest::Attendance {
            employee_id: None,
            date: None,
        } => spawn_forward(services.attendance.watch_all(), label, ws_sender),
    }
}

fn spawn_forward<T>(feed: Feed<T>, label: &'static str, ws_sender: WsSender) -> JoinHandle<()>
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    tokio::spawn(forward(feed, label, ws_sender))
}

/// Pushes a snapshot for every published state until the feed stops or the
/// client goes away. Dropping `feed` on exit cancels its background task.
async fn forward<T>(mut feed: Feed<T>, label: &'static str, ws_sender: WsSender)
where
    T: Serialize + Clone,
{
    loop {
        let state = feed.snapshot();
        if state.source != FeedSource::Connecting {
            let records = match serde_json::to_value(&*state.records) {
                Ok(records) => records,
                Err(e) => {
                    error!(feed = label, "Failed to serialize records: {:?}", e);
                    return;
                }
            };
            let snapshot = ServerMessage::Snapshot {
                feed: label.to_string(),
                source: state.source,
                records,
                last_error: state.last_error,
            };
            if send_message(&ws_sender, &snapshot).await.is_err() {
                debug!(feed = label, "Client went away; stopping feed.");
                return;
            }
        }
        if !feed.changed().await {
            debug!(feed = label, "Feed stopped.");
            return;
        }
    }
}

async fn send_message(ws_sender: &WsSender, msg: &ServerMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|e| {
        error!("Failed to serialize server message: {:?}", e);
    })?;
    ws_sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| {
            debug!("Failed to send WebSocket message: {}", e);
        })
}
