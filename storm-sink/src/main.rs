use std::future::ready;
use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Router};
use common_kafka::consumer::ClaimConsumer;
use common_kafka::supervisor::{shutdown_signal, Supervisor};
use common_metrics::{serve, setup_metrics_routes};
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use storm_sink::config::Config;
use storm_sink::handler::DedupHandler;
use storm_sink::store::postgres::PgStormStore;

fn setup_tracing() -> anyhow::Result<()> {
    let log_layer = tracing_subscriber::fmt::layer().with_filter(
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy()
            .add_directive("rdkafka=warn".parse()?)
            .add_directive("sqlx=warn".parse()?),
    );
    tracing_subscriber::registry().with(log_layer).init();
    Ok(())
}

pub async fn index() -> &'static str {
    "storm sink"
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    setup_tracing()?;
    info!("Starting storm sink...");

    let config = Config::init_with_defaults().context("failed to load configuration")?;
    info!(
        topic = config.consumer.kafka_consumer_topic,
        group_id = config.consumer.kafka_consumer_group,
        "Configuration loaded"
    );

    let bind = config.bind_address();
    let health_router = Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route("/_liveness", get(|| ready("ok")));
    let health_router =
        setup_metrics_routes(health_router).context("failed to install metrics recorder")?;
    tokio::task::spawn(async move {
        if let Err(e) = serve(health_router, &bind).await {
            error!("Health server failed: {}", e);
        }
    });

    let mut shutdown = shutdown_signal().context("failed to install signal handlers")?;
    let supervisor = Supervisor::new(config.kafka.connect_retry_interval());

    let Some(store) = supervisor
        .connect(
            "postgres",
            || PgStormStore::connect(&config.database_url, config.max_pg_connections),
            &mut shutdown,
        )
        .await
    else {
        info!("Shutdown before the store connected");
        return Ok(());
    };
    store.migrate().await.context("failed to run migrations")?;

    let store = Arc::new(store);
    let handler = Arc::new(DedupHandler::new(store.clone()));

    supervisor
        .run_supervised(
            "processed consumer",
            |shutdown| {
                let handler = handler.clone();
                let config = &config;
                async move {
                    let consumer = ClaimConsumer::new(&config.kafka, &config.consumer, handler)?;
                    consumer.run(shutdown).await
                }
            },
            shutdown,
        )
        .await;

    info!("Graceful shutdown: closing database pool");
    store.close().await;
    info!("Storm sink shut down");
    Ok(())
}
