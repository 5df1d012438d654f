use super::{ArrivalNotice, NotifyError, Notifier};
use async_trait::async_trait;
use prost::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;

/// Publishes protobuf-encoded notices for the messaging gateway, keyed by truck id.
pub struct KafkaNotifier {
    producer: FutureProducer,
    topic: String,
    queue_timeout: Duration,
}

impl KafkaNotifier {
    pub fn new(producer: FutureProducer, topic: String) -> Self {
        Self {
            producer,
            topic,
            queue_timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl Notifier for KafkaNotifier {
    async fn send(&self, notice: &ArrivalNotice) -> Result<(), NotifyError> {
        let payload = notice.encode_to_vec();
        let record = FutureRecord::to(&self.topic)
            .key(notice.truck_id.as_str())
            .payload(&payload);

        self.producer
            .send(record, self.queue_timeout)
            .await
            .map(|_| ())
            .map_err(|(e, _)| NotifyError::Transport(e.to_string()))
    }
}
