use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tollgate::config::TollgateConfig;
use tollgate::gate::{enforce, Gate};
use tollgate::ratelimit::RateLimiter;
use tollgate::store::RedisStore;

/// Demo HTTP server with Redis-backed rate limits.
#[derive(Debug, Parser)]
#[command(name = "tollgate", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "TOLLGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Redis connection URL, overriding the configuration file
    #[arg(long, env = "TOLLGATE_REDIS_URL")]
    redis_url: Option<String>,

    /// Address to listen on, overriding the configuration file
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init();
    }

    info!("Starting Tollgate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = TollgateConfig::load(args.config.as_deref())?;
    if let Some(url) = args.redis_url {
        config.store.url = url;
    }
    if let Some(addr) = args.listen {
        config.server.listen_addr = addr;
    }
    info!(
        listen_addr = %config.server.listen_addr,
        enforcement = ?config.limiter.enforcement,
        failure_policy = ?config.limiter.failure_policy,
        "Configuration loaded"
    );

    let store = Arc::new(RedisStore::connect(&config.store).await?);
    let limiter = RateLimiter::with_enforcement(store, config.limiter.enforcement);

    let gate = |limit: &str| -> tollgate::error::Result<Gate<RedisStore>> {
        Ok(Gate::new(limiter.clone(), limit)?.with_failure_policy(config.limiter.failure_policy))
    };

    let fast_routes = Router::new()
        .route("/fast", get(fast))
        .route_layer(from_fn_with_state(gate("100/second")?, enforce::<RedisStore>));

    let slow_routes = Router::new()
        .route("/slow", get(slow))
        .route_layer(from_fn_with_state(gate("5/minute")?, enforce::<RedisStore>));

    // These routes each have a rate limit of 100 requests per hour.
    let slow_group_routes = Router::new()
        .route("/slow-group/one", get(slow_one))
        .route("/slow-group/two", get(slow_two))
        .route_layer(from_fn_with_state(gate("100/hour")?, enforce::<RedisStore>));

    let app = Router::new()
        .merge(fast_routes)
        .merge(slow_routes)
        .merge(slow_group_routes);

    let listener = tokio::net::TcpListener::bind(config.server.listen_addr).await?;
    info!("Listening on {}", config.server.listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Tollgate stopped");
    Ok(())
}

async fn fast() -> &'static str {
    "Fast"
}

async fn slow() -> &'static str {
    "Slow"
}

async fn slow_one() -> &'static str {
    "SlowOne"
}

async fn slow_two() -> &'static str {
    "SlowTwo"
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
