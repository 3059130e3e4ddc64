//! Realtime channel: `GET /api/ws`.
//!
//! Server → client only. Each session forwards every [`UpdateBus`] message
//! as a `{"event", "payload"}` text frame. Inbound frames are read solely to
//! notice the close.
//!
//! [`UpdateBus`]: crate::broadcast::UpdateBus

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use gramseva_types::{ChannelMessage, Collection};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::AppState;
use crate::constants::WS_PING_INTERVAL;

type Sender = SplitSink<WebSocket, Message>;

pub async fn handle_websocket(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    // Subscribe before anything else so no write slips past this session.
    let mut updates = state.bus.subscribe();
    let (mut sender, mut receiver) = socket.split();
    info!(subscribers = state.bus.subscriber_count(), "realtime client connected");

    let mut reader = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "websocket receive error");
                    break;
                }
            }
        }
    });

    let mut ping = tokio::time::interval(WS_PING_INTERVAL);
    ping.tick().await;

    let result: Result<(), axum::Error> = loop {
        tokio::select! {
            _ = &mut reader => break Ok(()),
            _ = ping.tick() => {
                if let Err(e) = sender.send(Message::Ping(Bytes::new())).await {
                    break Err(e);
                }
            }
            update = updates.recv() => match update {
                Ok(update) => {
                    if let Err(e) = send(&mut sender, &update.to_message()).await {
                        break Err(e);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "realtime subscriber lagged; resyncing");
                    if let Err(e) = resync(&state, &mut sender).await {
                        break Err(e);
                    }
                }
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    reader.abort();
    if let Err(e) = result {
        debug!(error = %e, "realtime send failed");
    }
    info!("realtime client disconnected");
}

async fn send(sender: &mut Sender, msg: &ChannelMessage) -> Result<(), axum::Error> {
    let text = serde_json::to_string(msg).map_err(axum::Error::new)?;
    sender.send(Message::Text(text.into())).await
}

/// Push the current state of every collection.
async fn resync(state: &AppState, sender: &mut Sender) -> Result<(), axum::Error> {
    for collection in Collection::all() {
        let payload = state.store.read_raw(collection).await;
        send(sender, &ChannelMessage::update(collection, payload)).await?;
    }
    Ok(())
}
