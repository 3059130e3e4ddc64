//! GramSeva server binary
//!
//! ## Usage
//!
//! ```bash
//! gramseva-server                                # 127.0.0.1:3001, ./data
//! gramseva-server --port 8080 --data-dir /srv/gramseva
//! gramseva-server --config gramseva.toml --seed-demo
//! ```

use clap::Parser;
use gramseva_server::{ServerArgs, ServerConfig};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = ServerArgs::parse();
    let config = ServerConfig::resolve(&args)?;
    let addr = config.listen_addr()?;

    let app = gramseva_server::app(&config).await?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, seed_demo = config.seed_demo, "gramseva server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
