use anyhow::Context;
use common_kafka::kafka_consumer::SingleTopicConsumer;
use common_kafka::kafka_producer::create_kafka_producer;
use discipline_importer::{
    bus::KafkaDisciplineWriter,
    config::Config,
    event_loop::EventLoop,
    extractor::PgDisciplineSource,
    importer::Importer,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn setup_tracing() {
    let log_layer = tracing_subscriber::fmt::layer().with_filter(
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy()
            .add_directive("rdkafka=warn".parse().expect("static directive is valid")),
    );
    tracing_subscriber::registry().with(log_layer).init();
}

async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("received SIGINT");
        }
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigquit.recv() => info!("received SIGQUIT"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    setup_tracing();
    info!("Starting discipline importer...");

    let config = Config::load().context("Failed to load config")?;

    PrometheusBuilder::new()
        .with_http_listener(config.metrics_bind()?)
        .install()
        .context("Failed to start metrics exporter")?;

    let source = PgDisciplineSource::connect_lazy(
        &config.secondary_dekanat_db_dsn,
        config.max_pg_connections,
    )
    .context("Wrong connection configuration for secondary Dekanat DB")?;

    let producer = create_kafka_producer(&config.kafka)
        .await
        .context("Failed to create Kafka producer")?;
    let writer = KafkaDisciplineWriter::new(producer, config.kafka_disciplines_topic.clone());

    let consumer = SingleTopicConsumer::new(config.kafka.clone(), config.consumer.clone())
        .context("Failed to create Kafka consumer")?;
    info!(
        topic = consumer.topic(),
        group_id = config.consumer.kafka_consumer_group,
        "Kafka consumer subscribed"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            warn!("Failed to listen for shutdown signals: {}", e);
            return;
        }
        if shutdown_tx.send(true).is_err() {
            warn!("Event loop already stopped");
        }
    });

    let importer = Importer::new(source, writer, config.write_threshold);
    let mut event_loop = EventLoop::new(consumer, importer, shutdown_rx);

    // Only ever returns an error, shutdown included
    event_loop.run().await.context("Event loop stopped")
}
