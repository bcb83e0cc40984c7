//! WebSocket push channel: one hub subscription per connected client.

use crate::hub::{BroadcastHub, Subscription};
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use std::sync::Arc;
use std::time::Duration;

/// Serve one client until it disconnects or can no longer be written to.
///
/// The writer drains this client's queue (catch-up frame first) and pings
/// on an interval. A client that fell behind skips ahead to the newest
/// frames; the reader only watches for close. Either side ending
/// tears the connection down and drops the subscription.
pub async fn serve_client(socket: WebSocket, hub: Arc<BroadcastHub>, heartbeat: Duration) {
    let Subscription { id, mut receiver } = hub.subscribe();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(heartbeat);
        ping.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                frame = receiver.recv() => match frame {
                    Ok(frame) => {
                        if ws_tx.send(Message::Text(frame.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(subscriber = id, skipped = n, "client fell behind, oldest frames skipped");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = ping.tick() => {
                    if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                    tracing::trace!(subscriber = id, "sent ping");
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    let mut reader = tokio::spawn(async move {
        // clients only listen; anything they send besides close is ignored
        while let Some(Ok(msg)) = ws_rx.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    hub.unsubscribe(id);
}
