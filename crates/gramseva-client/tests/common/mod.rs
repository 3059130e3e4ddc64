//! Shared harness: a real server on an ephemeral port and portals on it.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Result, bail};
use gramseva_client::{ClientConfig, ConnectionStatus, Portal};
use gramseva_server::{AppState, ServerConfig};
use gramseva_types::LocationStamp;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub dir: tempfile::TempDir,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Server with the demo accounts loaded.
    pub async fn start() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let mut config = ServerConfig::with_data_dir(dir.path().join("server"));
        config.min_officer_keys = 10;
        config.seed_demo = true;

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
            handle,
        })
    }

    pub fn client_config(&self, profile: &str) -> ClientConfig {
        let mut config = ClientConfig::new(format!("http://{}", self.addr), self.dir.path().join(profile));
        config.push_backoff = Duration::from_millis(10);
        config.reconnect_initial = Duration::from_millis(50);
        config
    }

    /// A started portal whose realtime session the server has subscribed.
    pub async fn portal(&self, profile: &str) -> Result<Portal> {
        let before = self.state.bus.subscriber_count();
        let portal = Portal::start(self.client_config(profile)).await?;
        let mut status = portal.connection_status();
        tokio::time::timeout(
            Duration::from_secs(5),
            status.wait_for(|s| *s == ConnectionStatus::Connected),
        )
        .await??;
        for _ in 0..500 {
            if self.state.bus.subscriber_count() > before {
                return Ok(portal);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        bail!("server never subscribed the portal's realtime session")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn wagholi() -> LocationStamp {
    LocationStamp::new("Maharashtra", "Pune", "Haveli", "Wagholi", "412207")
}

/// Poll `check` until it holds, for up to five seconds.
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) -> Result<()> {
    for _ in 0..500 {
        if check() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    bail!("timed out waiting for {what}")
}
