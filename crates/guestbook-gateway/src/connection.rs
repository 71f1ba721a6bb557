use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use guestbook_chat::{ChatEngine, ChatError, DEFAULT_PAGE_LIMIT, LiveHub};
use guestbook_types::events::{ChatEvent, ClientCommand};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle one viewer connection on a direct-hub deployment.
///
/// Registering with the hub both subscribes this connection to the scope
/// feed and bumps the presence count; the new count reaches every
/// subscriber, this one included, through the feed itself.
pub async fn handle_connection(socket: WebSocket, engine: Arc<ChatEngine>, live: Arc<LiveHub>) {
    let (mut sender, mut receiver) = socket.split();
    let scope = engine.scope().to_string();

    let (count, mut broadcast_rx) = live.connect(&scope);
    info!("Viewer connected to '{}' ({} online)", scope, count);

    // Targeted replies (messages_loaded, error_message) bypass the scope
    // feed: they belong to this connection only.
    let (direct_tx, mut direct_rx) = mpsc::unbounded_channel::<ChatEvent>();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward scope broadcasts + targeted replies -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                result = direct_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };

                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let engine_recv = engine.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(cmd) => handle_command(&engine_recv, &direct_tx, cmd).await,
                    Err(e) => {
                        warn!("bad command: {} -- raw: {}", e, truncate_frame(&text, 200));
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    let count = live.disconnect(&scope);
    info!("Viewer disconnected from '{}' ({} online)", scope, count);
}

/// Cap a raw frame for logging. The cut must land on a char boundary;
/// slicing at a raw byte offset panics inside multi-byte UTF-8.
fn truncate_frame(text: &str, max: usize) -> &str {
    let mut end = text.len().min(max);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Run one inbound command through the engine. Mutations fan out through
/// the hub on their own; rejections and page loads go back to the
/// requesting connection only.
async fn handle_command(
    engine: &ChatEngine,
    replies: &mpsc::UnboundedSender<ChatEvent>,
    cmd: ClientCommand,
) {
    let result = match cmd {
        ClientCommand::SendMessage {
            name,
            content,
            reply_to_id,
        } => engine.send_message(&name, &content, reply_to_id).await.map(|_| ()),

        ClientCommand::AdminReply {
            content,
            reply_to_id,
            token,
        } => engine.admin_reply(&content, reply_to_id, &token).await.map(|_| ()),

        ClientCommand::AdminDelete { id, token } => engine.admin_delete(id, &token).await,

        ClientCommand::LoadMessages { cursor } => {
            match engine.load_messages(cursor, DEFAULT_PAGE_LIMIT).await {
                Ok(threads) => {
                    let _ = replies.send(ChatEvent::MessagesLoaded(threads));
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
    };

    if let Err(e) = result {
        if let ChatError::Store(detail) = &e {
            error!("Store failure on live command: {:#}", detail);
        }
        let _ = replies.send(ChatEvent::ErrorMessage {
            message: e.to_string(),
        });
    }
}

/// Answer a live connection attempt on a deployment whose transport keeps
/// no in-process subscribers (hosted relay). The client is told once and
/// the socket closed; it degrades to pull-only REST.
pub async fn handle_unavailable(mut socket: WebSocket) {
    warn!("Live connection refused: no in-process subscribers on this deployment");

    let event = ChatEvent::ErrorMessage {
        message: ChatError::TransportUnavailable.to_string(),
    };
    let text = serde_json::to_string(&event).unwrap();
    let _ = socket.send(Message::Text(text.into())).await;
    let _ = socket.send(Message::Close(None)).await;
}
