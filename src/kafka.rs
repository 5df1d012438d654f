use crate::config::AppConfig;
use crate::error::IngestError;
use crate::models::payload::Transport;
use crate::processor::Pipeline;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::FutureProducer;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Broker connection settings shared by the consumer and the producer.
fn client_config(config: &AppConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.kafka_bootstrap_servers)
        // SASL Configuration
        .set("security.protocol", &config.kafka_security_protocol)
        .set("sasl.mechanism", &config.kafka_sasl_mechanism)
        .set("sasl.username", &config.kafka_username)
        .set("sasl.password", &config.kafka_password);
    client_config
}

pub fn create_producer(config: &AppConfig) -> anyhow::Result<FutureProducer> {
    let producer: FutureProducer = client_config(config)
        .set("message.timeout.ms", "10000")
        .create()?;
    Ok(producer)
}

/// Consumes webhook-shaped fixes relayed by the device gateway, with a circuit
/// breaker that pauses consumption after repeated broker errors.
pub async fn start_kafka_consumer(
    config: &AppConfig,
    pipeline: Arc<Pipeline>,
) -> anyhow::Result<()> {
    info!("Initializing Kafka consumer for topic: {}", config.kafka_topic);

    let consumer: StreamConsumer = client_config(config)
        .set("group.id", &config.kafka_group_id)
        .set("auto.offset.reset", &config.kafka_auto_offset_reset)
        .create()?;

    consumer.subscribe(&[&config.kafka_topic])?;
    info!("Subscribed to topic: {}", config.kafka_topic);

    let mut consecutive_failures = 0;
    let max_retries = config.kafka_max_retries;
    let cooldown_duration = Duration::from_secs(config.kafka_circuit_breaker_cooldown);

    loop {
        if consecutive_failures >= max_retries {
            warn!(
                "Circuit breaker tripped ({} consecutive failures)! Sleeping for {} seconds...",
                consecutive_failures, config.kafka_circuit_breaker_cooldown
            );
            tokio::time::sleep(cooldown_duration).await;
            consecutive_failures = 0;
            info!("Circuit breaker reset. Resuming consumption.");
        }

        match consumer.recv().await {
            Ok(m) => {
                consecutive_failures = 0;

                let payload = match m.payload() {
                    None => {
                        warn!("Received empty payload from Kafka");
                        continue;
                    }
                    Some(p) => p.to_vec(),
                };

                let pipeline = Arc::clone(&pipeline);
                // One task per fix so a slow truck update never stalls the partition.
                tokio::spawn(async move {
                    match pipeline.ingest(&Transport::Webhook, &payload).await {
                        Ok(ack) => debug!(truck_id = %ack.truck_id, outcome = ?ack.outcome, "Kafka fix ingested"),
                        // Already logged by the pipeline.
                        Err(IngestError::InvalidPayload(_)) | Err(IngestError::UnknownSource(_)) => {}
                        Err(e) => error!("Error processing message: {}", e),
                    }
                });
            }
            Err(e) => {
                error!(
                    "Kafka error: {}. Incrementing failure count ({} / {})",
                    e,
                    consecutive_failures + 1,
                    max_retries
                );
                consecutive_failures += 1;

                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }
}
