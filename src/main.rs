mod config;
mod db;
mod error;
mod geo;
mod http;
mod kafka;
mod models;
mod notify;
mod processor;
mod store;
mod telegram;

use actix_web::{web, App, HttpServer};
use config::AppConfig;
use db::store::PgFleetStore;
use db::telegram_access::PgTelegramAccess;
use notify::kafka::KafkaNotifier;
use notify::{Dispatcher, LogNotifier, Notifier};
use processor::Pipeline;
use std::sync::Arc;
use telegram::TelegramGate;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting fleet tracking service...");

    // Init DB
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;
    info!("Connected to database");

    let notifier: Arc<dyn Notifier> = match &config.kafka_notification_topic {
        Some(topic) => {
            info!("Publishing arrival notices to topic: {}", topic);
            Arc::new(KafkaNotifier::new(
                kafka::create_producer(&config)?,
                topic.clone(),
            ))
        }
        None => {
            warn!("KAFKA_NOTIFICATION_TOPIC not set, arrival notices will only be logged");
            Arc::new(LogNotifier)
        }
    };
    if config.arrival_contacts.is_empty() {
        warn!("ARRIVAL_CONTACTS is empty, no arrival notices will be sent");
    }
    let dispatcher = Arc::new(Dispatcher::new(
        notifier,
        config.arrival_contacts.clone(),
        config.map_link_base.clone(),
    ));

    let store = Arc::new(PgFleetStore::new(pool.clone()));
    let pipeline = Arc::new(Pipeline::new(store, dispatcher));

    // Start Kafka
    if config.kafka_enabled {
        let consumer_config = config.clone();
        let consumer_pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            if let Err(e) = kafka::start_kafka_consumer(&consumer_config, consumer_pipeline).await
            {
                error!("Kafka consumer stopped: {}", e);
            }
        });
    }

    let state = web::Data::new(http::AppState {
        telegram: TelegramGate::new(
            Arc::new(PgTelegramAccess::new(pool)),
            Arc::clone(&pipeline),
        ),
        pipeline,
    });

    info!(
        "Listening on {}:{}",
        config.http_host, config.http_port
    );
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(http::routes)
    })
    .bind((config.http_host.as_str(), config.http_port))?
    .run()
    .await?;

    Ok(())
}
