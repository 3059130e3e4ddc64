//! Shared harness: a real server on an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures::StreamExt;
use gramseva_server::{AppState, ServerConfig};
use gramseva_types::ChannelMessage;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub dir: tempfile::TempDir,
    pub http: reqwest::Client,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(tweak: impl FnOnce(&mut ServerConfig)) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let mut config = ServerConfig::with_data_dir(dir.path());
        config.min_officer_keys = 10;
        tweak(&mut config);

        let state = AppState::init(&config).await?;
        let app = gramseva_server::routes::router(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            state,
            dir,
            http: reqwest::Client::new(),
            handle,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/api/{}", self.addr, path.trim_start_matches('/'))
    }

    /// Open a realtime session and wait until the server has subscribed it.
    pub async fn connect_ws(&self) -> Result<WsStream> {
        let before = self.state.bus.subscriber_count();
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/api/ws", self.addr)).await?;
        for _ in 0..200 {
            if self.state.bus.subscriber_count() > before {
                return Ok(ws);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        bail!("server never subscribed the websocket session")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn read_event(ws: &mut WsStream) -> Result<ChannelMessage> {
    while let Some(msg) = ws.next().await {
        match msg? {
            Message::Text(text) => return Ok(serde_json::from_str(text.as_str())?),
            Message::Close(_) => bail!("socket closed"),
            _ => continue,
        }
    }
    bail!("socket ended")
}

/// Next `{"event","payload"}` frame, skipping control frames.
pub async fn next_event(ws: &mut WsStream) -> Result<ChannelMessage> {
    tokio::time::timeout(Duration::from_secs(5), read_event(ws))
        .await
        .context("timed out waiting for a realtime event")?
}

/// Skip frames until one for `event` arrives.
pub async fn expect_event(ws: &mut WsStream, event: &str) -> Result<ChannelMessage> {
    loop {
        let msg = next_event(ws).await?;
        if msg.event == event {
            return Ok(msg);
        }
    }
}
