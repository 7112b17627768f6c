use std::future::ready;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{routing::get, Router};
use common_kafka::kafka_producer::create_kafka_producer;
use common_kafka::publisher::KafkaPublisher;
use common_kafka::supervisor::{shutdown_signal, Supervisor};
use common_metrics::{serve, setup_metrics_routes};
use envconfig::Envconfig;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use storm_producer::config::Config;
use storm_producer::fetch::build_http_client;
use storm_producer::producer::ReportProducer;

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
    "storm producer"
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    setup_tracing()?;
    info!("Starting storm producer...");

    let config = Config::init_from_env().context("failed to load configuration")?;
    let report_date = config.report_date().context("REPORT_DATE must be unix seconds")?;
    info!(
        topic = config.raw_topic,
        base_url = config.spc_base_url,
        report_date,
        interval = ?config.fetch_interval(),
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
    let client = build_http_client(config.http_timeout()).context("failed to build http client")?;
    let reports = ReportProducer::new(
        client,
        publisher.clone(),
        config.spc_base_url.clone(),
        config.raw_topic.clone(),
        config.max_message_bytes,
    );

    // The first tick completes immediately, and a zero period would panic
    let mut ticker = tokio::time::interval(config.fetch_interval().max(Duration::from_secs(1)));
    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        match reports.run_once(report_date).await {
            Ok(summary) => info!(
                published = summary.published,
                oversize = summary.oversize,
                failed_feeds = summary.failed_feeds,
                "Published storm reports"
            ),
            Err(e) => error!("Storm report run failed: {}", e),
        }

        if config.run_once {
            break;
        }
    }

    info!("Graceful shutdown: flushing producer");
    publisher.flush();
    info!("Storm producer shut down");
    Ok(())
}
