use db::DBService;
use server::{AppState, Config, build_router};
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let _sentry = utils::telemetry::init("info,server=debug,services=debug", config.sentry_dsn.as_deref());

    tracing::info!(addr = %config.listen_addr, ai_keys = config.ai_keys.len(), "Starting server");
    if config.ai_keys.is_empty() {
        tracing::warn!("No AI keys configured; plan and build requests will fail");
    }
    if config.vercel_token.is_none() {
        tracing::warn!("VERCEL_TOKEN not set; deployments are disabled");
    }

    let db = DBService::new(&config.database_url).await?;
    let state = AppState::from_config(db, &config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
