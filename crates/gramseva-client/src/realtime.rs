//! Realtime Invalidation Channel, client side.
//!
//! One websocket per client session. Every frame replaces a whole
//! collection; the channel has no replay, so each successful (re)connect is
//! announced as [`ServerEvent::Connected`] and the consumer re-fetches.
//!
//! ```text
//!   connect ──ok──▶ Connected ──frames──▶ CollectionUpdated …
//!      ▲                │ close / error
//!      │                ▼
//!      └── sleep(backoff) ◀── Reconnecting { attempt }
//! ```

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use gramseva_types::{ChannelMessage, Collection};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;

/// Events pushed from the server.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerEvent {
    /// A session was (re)established; anything missed is gone.
    Connected,
    /// Authoritative replacement for one collection.
    CollectionUpdated { collection: Collection, payload: Value },
}

/// Connection lifecycle status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting { attempt: u32 },
    Error(String),
}

/// Exponential backoff: `initial`, doubling, capped at `max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl ReconnectPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            initial: config.reconnect_initial,
            max: config.reconnect_max,
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial.saturating_mul(1 << shift).min(self.max)
    }
}

enum SessionEnd {
    Cancelled,
    Closed,
    ConsumerGone,
}

pub struct RealtimeClient {
    url: String,
    policy: ReconnectPolicy,
}

impl RealtimeClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            url: config.ws_url(),
            policy: ReconnectPolicy::from_config(config),
        }
    }

    /// Run the connect/read/reconnect loop until `cancel` fires or `events`
    /// has no receiver.
    pub fn spawn(
        self,
        events: mpsc::UnboundedSender<ServerEvent>,
        status: watch::Sender<ConnectionStatus>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(events, status, cancel).await })
    }

    async fn run(
        self,
        events: mpsc::UnboundedSender<ServerEvent>,
        status: watch::Sender<ConnectionStatus>,
        cancel: CancellationToken,
    ) {
        let mut attempt: u32 = 0;
        loop {
            let connected = tokio::select! {
                _ = cancel.cancelled() => break,
                r = tokio_tungstenite::connect_async(self.url.as_str()) => r,
            };

            match connected {
                Ok((mut ws, _)) => {
                    attempt = 0;
                    info!(url = %self.url, "realtime channel connected");
                    status.send_replace(ConnectionStatus::Connected);
                    if events.send(ServerEvent::Connected).is_err() {
                        break;
                    }

                    let end = loop {
                        let frame = tokio::select! {
                            _ = cancel.cancelled() => break SessionEnd::Cancelled,
                            frame = ws.next() => frame,
                        };
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                if !forward(text.as_str(), &events) {
                                    break SessionEnd::ConsumerGone;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break SessionEnd::Closed,
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                debug!(error = %e, "realtime receive error");
                                break SessionEnd::Closed;
                            }
                        }
                    };

                    match end {
                        SessionEnd::Cancelled => {
                            let _ = ws.close(None).await;
                            break;
                        }
                        SessionEnd::ConsumerGone => break,
                        SessionEnd::Closed => {
                            warn!("realtime channel closed");
                            status.send_replace(ConnectionStatus::Disconnected);
                        }
                    }
                }
                Err(e) => {
                    debug!(url = %self.url, error = %e, "realtime connect failed");
                    status.send_replace(ConnectionStatus::Error(e.to_string()));
                }
            }

            attempt = attempt.saturating_add(1);
            let delay = self.policy.delay(attempt);
            info!(attempt, delay_ms = delay.as_millis() as u64, "realtime reconnecting");
            status.send_replace(ConnectionStatus::Reconnecting { attempt });
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        status.send_replace(ConnectionStatus::Disconnected);
        debug!("realtime task stopped");
    }
}

/// Parse one text frame and hand it on. Returns false once nobody listens.
fn forward(text: &str, events: &mpsc::UnboundedSender<ServerEvent>) -> bool {
    let msg: ChannelMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "ignoring malformed realtime frame");
            return true;
        }
    };
    let Some(collection) = msg.collection() else {
        debug!(event = %msg.event, "ignoring unknown realtime event");
        return true;
    };
    events
        .send(ServerEvent::CollectionUpdated {
            collection,
            payload: msg.payload,
        })
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = ReconnectPolicy {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_secs(1));
        assert_eq!(policy.delay(3), Duration::from_secs(2));
        assert_eq!(policy.delay(7), Duration::from_secs(30));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_forward_parses_known_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let frame = json!({"event": "data-update-notices", "payload": []}).to_string();
        assert!(forward(&frame, &tx));
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::CollectionUpdated {
                collection: Collection::Notices,
                payload: json!([]),
            }
        );

        assert!(forward("not json", &tx));
        assert!(forward(r#"{"event":"data-update-widgets","payload":[]}"#, &tx));
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert!(!forward(&frame, &tx));
    }

    #[tokio::test]
    async fn test_cancel_stops_reconnect_loop() {
        let mut config = ClientConfig::new("http://127.0.0.1:9", "/tmp/unused");
        config.reconnect_initial = Duration::from_millis(10);
        let (tx, _rx) = mpsc::unbounded_channel();
        let (status_tx, mut status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let cancel = CancellationToken::new();
        let handle = RealtimeClient::new(&config).spawn(tx, status_tx, cancel.clone());

        let reconnecting = tokio::time::timeout(
            Duration::from_secs(5),
            status_rx.wait_for(|s| matches!(s, ConnectionStatus::Reconnecting { .. })),
        )
        .await
        .is_ok_and(|r| r.is_ok());
        assert!(reconnecting);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert_eq!(*status_rx.borrow(), ConnectionStatus::Disconnected);
    }
}
