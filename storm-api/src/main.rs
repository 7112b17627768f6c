use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use common_kafka::supervisor::{shutdown_signal, Supervisor};
use common_metrics::setup_metrics_routes;
use envconfig::Envconfig;
use storm_sink::store::postgres::PgStormStore;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use config::Config;

mod config;
mod handlers;
mod metrics_consts;

fn setup_tracing() {
    let log_layer = tracing_subscriber::fmt::layer().with_filter(
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy(),
    );
    tracing_subscriber::registry().with(log_layer).init();
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    setup_tracing();
    info!("Starting storm api...");

    let config = Config::init_from_env().context("failed to load configuration")?;
    let mut shutdown = shutdown_signal().context("failed to install signal handlers")?;

    let supervisor = Supervisor::new(config.connect_retry_interval());
    let Some(store) = supervisor
        .connect(
            "postgres",
            || PgStormStore::connect(&config.database_url, config.max_pg_connections),
            &mut shutdown,
        )
        .await
    else {
        info!("Shutdown before the database connected");
        return Ok(());
    };
    let store = Arc::new(store);

    let app = handlers::add_routes(Router::new(), store.clone());
    let app = setup_metrics_routes(app).context("failed to install metrics recorder")?;

    let bind = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    info!("Listening on {}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            // Err means the signal task is gone, stop either way
            shutdown.wait_for(|stop| *stop).await.ok();
        })
        .await
        .context("api server failed")?;

    store.close().await;
    info!("Storm api shut down");
    Ok(())
}
