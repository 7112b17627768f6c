use std::future::ready;
use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Router};
use common_kafka::consumer::ClaimConsumer;
use common_kafka::kafka_producer::create_kafka_producer;
use common_kafka::supervisor::{shutdown_signal, Supervisor};
use common_metrics::{serve, setup_metrics_routes};
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use storm_etl::config::Config;
use storm_etl::handler::EtlHandler;
use storm_etl::publisher::KafkaPublisher;

fn setup_tracing() -> anyhow::Result<()> {
    let log_layer = tracing_subscriber::fmt::layer().with_filter(
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy()
            .add_directive("rdkafka=warn".parse()?),
    );
    tracing_subscriber::registry().with(log_layer).init();
    Ok(())
}

pub async fn index() -> &'static str {
    "storm etl"
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    setup_tracing()?;
    info!("Starting storm etl...");

    let config = Config::init_with_defaults().context("failed to load configuration")?;
    info!(
        source = config.consumer.kafka_consumer_topic,
        processed = config.processed_topic,
        dead_letter = ?config.dead_letter_topic(),
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

    let Some(producer) = supervisor
        .connect(
            "kafka producer",
            || create_kafka_producer(&config.kafka),
            &mut shutdown,
        )
        .await
    else {
        info!("Shutdown before the producer connected");
        return Ok(());
    };

    let publisher = Arc::new(KafkaPublisher::new(producer, config.send_timeout()));
    let handler = Arc::new(EtlHandler::new(
        publisher.clone(),
        config.processed_topic.clone(),
        config.dead_letter_topic(),
        config.max_message_bytes,
    ));

    supervisor
        .run_supervised(
            "raw consumer",
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

    info!("Graceful shutdown: flushing producer");
    publisher.flush();
    info!("Storm etl shut down");
    Ok(())
}
