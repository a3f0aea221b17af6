mod app;
mod discovery;

use anyhow::Context;
use app::{app_router, AppState};
use dotenvy::dotenv;
use spout_core::{
    AttachManager, DockerRuntime, Forwarders, Route, RouteFileStore, RouteManager, Target,
    DEFAULT_DATETIME_FORMAT,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";
const DEFAULT_ROUTES_PATH: &str = "/var/lib/spout";

/// Route ids of the targets installed at startup; re-adding replaces them.
const ETCD_ROUTE_ID: &str = "etcd";
const ARG_ROUTE_ID: &str = "default";

#[derive(Debug, Clone, PartialEq)]
struct ApiConfig {
    bind: SocketAddr,
    docker_host: String,
    /// Persistence is enabled only if this exists.
    routes_path: PathBuf,
    etcd_host: Option<String>,
    debug: bool,
    datetime_format: String,
    /// Allowed CORS origins; empty allows any.
    cors_origins: Vec<String>,
    /// `syslog://host:port` given on the command line.
    default_target: Option<String>,
}

impl ApiConfig {
    fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok(), std::env::args().nth(1))
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>, default_target: Option<String>) -> Self {
        let non_empty = |key: &str| {
            var(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let port = non_empty("PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let cors_origins = non_empty("CORS_ORIGINS")
            .filter(|s| s != "*")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], port)),
            docker_host: non_empty("DOCKER_HOST").unwrap_or_else(|| DEFAULT_DOCKER_HOST.into()),
            routes_path: non_empty("ROUTESPATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ROUTES_PATH)),
            etcd_host: non_empty("ETCD_HOST"),
            debug: non_empty("DEBUG").is_some(),
            datetime_format: non_empty("DATETIME_FORMAT")
                .unwrap_or_else(|| DEFAULT_DATETIME_FORMAT.into()),
            cors_origins,
            default_target: default_target.filter(|s| !s.is_empty()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // load .env when present
    let _ = dotenv();
    let config = ApiConfig::from_env();
    init_tracing(config.debug);
    info!(docker_host = %config.docker_host, "starting spout on {}", config.bind);

    let runtime = DockerRuntime::connect(&config.docker_host)
        .with_context(|| format!("connect to {}", config.docker_host))?;
    let attacher = AttachManager::new(Arc::new(runtime));
    attacher
        .start()
        .await
        .context("attach to running containers")?;

    let routes = Arc::new(RouteManager::new(
        attacher.clone(),
        Forwarders::with_syslog(&config.datetime_format),
    ));
    if config.routes_path.exists() {
        let store = RouteFileStore::new(&config.routes_path);
        info!(path = %store.path().display(), "loading and persisting routes");
        routes
            .load(Arc::new(store))
            .await
            .context("load persisted routes")?;
    }
    install_default_routes(&config, &routes).await?;

    let state = AppState { attacher, routes };
    let app = app_router(state, config.cors_origins.clone());
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shut down");
    Ok(())
}

fn init_tracing(debug: bool) {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let default_level = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_level.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Routes everything to the etcd-published syslog target and to the target
/// given on the command line. An unreachable etcd only costs its route.
async fn install_default_routes(config: &ApiConfig, routes: &RouteManager) -> anyhow::Result<()> {
    if let Some(etcd_host) = &config.etcd_host {
        match discovery::etcd_target(etcd_host).await {
            Ok(target) => {
                info!(addr = %target.addr, "routing all to etcd syslog target");
                routes
                    .add(Route::new(target).with_id(ETCD_ROUTE_ID))
                    .await
                    .context("install etcd route")?;
            }
            Err(e) => {
                tracing::warn!(etcd_host = %etcd_host, error = %e, "etcd lookup failed, no default route");
            }
        }
    }

    if let Some(raw) = &config.default_target {
        let target = Target::from_url(raw).with_context(|| format!("parse target {raw}"))?;
        info!(target = %raw, "routing all to command line target");
        routes
            .add(Route::new(target).with_id(ARG_ROUTE_ID))
            .await
            .context("install command line route")?;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
