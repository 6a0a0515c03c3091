mod auth;
mod config;
mod dto;
mod request_id;
mod routes;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::middleware::from_fn_with_state;
use clap::Parser;
use config::{CliOverrides, Config};
use cp_container_reconciler::ContainerReconciler;
use cp_database_reconciler::DatabaseReconciler;
use cp_naming::NamingService;
use cp_orchestrator::ClaimOrchestrator;
use cp_quota::QuotaEngine;
use cp_store::SeaOrmStore;
use cp_zones::ZoneRegistry;
use state::AppState;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Control plane HTTP edge.
#[derive(Parser)]
#[command(name = "cp-server")]
#[command(about = "Multi-zone container-as-a-service control plane")]
struct Cli {
    /// Path to a YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override for the HTTP listener (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the effective configuration and exit.
    #[arg(long)]
    print_config: bool,

    /// Log verbosity (-v info, -vv debug, -vvv trace); overrides `log_filter`.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use an in-memory admin database regardless of configuration.
    #[arg(long)]
    mock: bool,
}

fn verbosity_filter(count: u8) -> Option<&'static str> {
    match count {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_cli(&CliOverrides {
        port: cli.port,
        log_filter: verbosity_filter(cli.verbose).map(str::to_owned),
        mock: cli.mock,
    });

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .init();

    if cli.print_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    tracing::info!(listen_url = %config.listen_url, "control plane starting");

    let sea_orm_store = SeaOrmStore::connect(&config.admin_db_connection_url).await?;
    sea_orm_store.migrate().await?;
    let store: Arc<dyn cp_store::AuthoritativeStore> = Arc::new(sea_orm_store);

    let zones = Arc::new(ZoneRegistry::bootstrap(&config.kube_clients, &config.user_db_connections, &*store).await?);
    let quota = Arc::new(QuotaEngine::new(store.clone()));
    let naming = Arc::new(NamingService::new(store.clone()));
    let container_reconciler = Arc::new(ContainerReconciler::new(store.clone(), zones.clone(), naming.clone()));
    let database_reconciler = Arc::new(DatabaseReconciler::new(store.clone(), zones.clone()));
    let orchestrator = Arc::new(ClaimOrchestrator::new(store.clone(), quota, naming, container_reconciler, database_reconciler, 32));

    let app_state = AppState {
        store,
        zones,
        orchestrator: orchestrator.clone(),
        shutdown_timeout: config.shutdown_timeout,
    };

    let app = routes::router()
        .layer(from_fn_with_state(app_state.clone(), auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(request_id::MakeUuidRequestId))
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_url).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    tracing::info!(timeout = ?config.shutdown_timeout, "draining outstanding reconcilers");
    if orchestrator.shutdown(config.shutdown_timeout).await.is_err() {
        tracing::error!("shutdown deadline exceeded; exiting anyway");
    }

    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received, draining HTTP surface");
}
