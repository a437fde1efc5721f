use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use centinela_api::background::alert_scan;
use centinela_api::config::{AppConfig, ProviderConfig};
use centinela_api::router::build_app_router;
use centinela_api::state::AppState;
use centinela_notify::{GatewayProvider, Provider, RecordingProvider};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "centinela_api=info,centinela_notify=info,tower_http=info".into());
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let pool = match centinela_db::create_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            std::process::exit(1);
        }
    };
    tracing::info!("Database connection pool created");

    if let Err(e) = centinela_db::health_check(&pool).await {
        tracing::warn!(error = %e, "Database health check failed; scans will retry");
    }

    if config.run_migrations {
        if let Err(e) = centinela_db::run_migrations(&pool).await {
            tracing::error!(error = %e, "Failed to run database migrations");
            std::process::exit(1);
        }
        tracing::info!("Database migrations applied");
    }

    // --- Provider ---
    let provider: Arc<dyn Provider> = match &config.provider {
        ProviderConfig::Gateway(gateway) => match GatewayProvider::new(gateway.clone()) {
            Ok(provider) => Arc::new(provider),
            Err(e) => {
                tracing::error!(error = %e, "Failed to build provider client");
                std::process::exit(1);
            }
        },
        ProviderConfig::DryRun => {
            tracing::warn!("PROVIDER_DRY_RUN is set; notifications are logged, not sent");
            Arc::new(RecordingProvider::new())
        }
    };

    let status = provider.status().await;
    tracing::info!(
        connected = status.connected,
        authorized = status.authorized,
        "Provider session status"
    );

    // --- Engine and dispatcher ---
    let (state, dispatcher) = AppState::new(pool, config.clone(), provider);
    let dispatcher_handle = tokio::spawn(dispatcher.run());
    tracing::info!("Dispatcher started");

    // Spawn the periodic alert scan.
    let scan_cancel = CancellationToken::new();
    let scan_handle = tokio::spawn(alert_scan::run(
        Arc::clone(&state.engine),
        config.scan_interval,
        scan_cancel.clone(),
    ));

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let host = match config.host.parse() {
        Ok(host) => host,
        Err(e) => {
            tracing::error!(host = %config.host, error = %e, "Invalid HOST address");
            std::process::exit(1);
        }
    };
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind to address");
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Stop the scan loop. Once it and the router are gone the last
    // dispatcher handle drops and the dispatcher drains its queue.
    scan_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), scan_handle).await;
    tracing::info!("Alert scan stopped");

    if tokio::time::timeout(Duration::from_secs(30), dispatcher_handle)
        .await
        .is_err()
    {
        tracing::warn!("Dispatcher did not drain in time, abandoning queued jobs");
    } else {
        tracing::info!("Dispatcher stopped");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or (on Unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
