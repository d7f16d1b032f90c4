//! `ocrgate serve`: run the HTTP gateway until Ctrl-C or SIGTERM.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use ocrgate_config::Settings;
use ocrgate_gateway::{start_server, GatewayState};
use tracing::info;

pub async fn run(settings: Settings) -> Result<()> {
    let ip: IpAddr = settings
        .bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", settings.bind))?;
    let addr = SocketAddr::new(ip, settings.port);

    info!(
        addr = %addr,
        engine = %settings.engine_binary,
        model_dir = %settings.model_dir.display(),
        staging_dir = %settings.staging_dir.display(),
        "Starting ocrgate"
    );

    let service = Arc::new(crate::build_service(&settings));
    service.start_reclaimer();

    let served = start_server(addr, GatewayState::new(Arc::clone(&service)), shutdown_signal()).await;
    service.shutdown().await;
    served?;

    info!("ocrgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received; shutting down"),
        _ = terminate => info!("SIGTERM received; shutting down"),
    }
}
