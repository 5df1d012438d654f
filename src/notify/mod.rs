//! First-arrival notices and their fire-and-forget dispatch.

pub mod kafka;

use crate::geo::Coordinate;
use crate::models::truck::Truck;
use crate::processor::geofence::names_match;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Truck snapshot sent to the destination's contact when the truck first arrives.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ArrivalNotice {
    #[prost(string, tag = "1")]
    pub truck_id: String,
    #[prost(string, tag = "2")]
    pub plate_number: String,
    #[prost(int32, tag = "3")]
    pub arrival_number: i32,
    #[prost(string, tag = "4")]
    pub destination: String,
    #[prost(string, tag = "5")]
    pub recipient: String,
    #[prost(string, optional, tag = "6")]
    pub product_type: Option<String>,
    #[prost(string, optional, tag = "7")]
    pub supplier_name: Option<String>,
    #[prost(string, optional, tag = "8")]
    pub cargo_type: Option<String>,
    #[prost(string, optional, tag = "9")]
    pub driver_phone: Option<String>,
    /// Shipping date, `YYYY-MM-DD`.
    #[prost(string, tag = "10")]
    pub ship_date: String,
    #[prost(string, optional, tag = "11")]
    pub map_link: Option<String>,
    #[prost(int64, tag = "12")]
    pub notified_at_ms: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notice: &ArrivalNotice) -> Result<(), NotifyError>;
}

/// Used when no outbound channel is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notice: &ArrivalNotice) -> Result<(), NotifyError> {
        info!(
            plate = %notice.plate_number,
            arrival_number = notice.arrival_number,
            destination = %notice.destination,
            recipient = %notice.recipient,
            "Arrival notice (no outbound channel configured)"
        );
        Ok(())
    }
}

/// Builds arrival notices and hands them to a [`Notifier`] on a detached task.
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    contacts: Vec<(String, String)>,
    map_link_base: String,
}

impl Dispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        contacts: Vec<(String, String)>,
        map_link_base: String,
    ) -> Self {
        Self {
            notifier,
            contacts,
            map_link_base,
        }
    }

    fn recipient_for(&self, destination: &str) -> Option<&str> {
        self.contacts
            .iter()
            .find(|(city, _)| names_match(city, destination))
            .map(|(_, contact)| contact.as_str())
    }

    fn map_link(&self, position: Coordinate) -> String {
        format!(
            "{}{},{}",
            self.map_link_base, position.latitude, position.longitude
        )
    }

    /// `None` when the destination has no configured contact.
    pub fn notice_for(&self, truck: &Truck, arrival_number: i32) -> Option<ArrivalNotice> {
        let recipient = self.recipient_for(&truck.destination)?;
        Some(ArrivalNotice {
            truck_id: truck.id.to_string(),
            plate_number: truck.plate_number.clone(),
            arrival_number,
            destination: truck.destination.clone(),
            recipient: recipient.to_string(),
            product_type: truck.product_type.clone(),
            supplier_name: truck.supplier_name.clone(),
            cargo_type: truck.cargo_type.clone(),
            driver_phone: truck.driver_phone.clone(),
            ship_date: truck.created_at.format("%Y-%m-%d").to_string(),
            map_link: truck.position.map(|p| self.map_link(p)),
            notified_at_ms: Utc::now().timestamp_millis(),
        })
    }

    /// Spawns delivery of the truck's first-arrival notice and returns at once.
    /// Returns whether a notice was handed off. Delivery errors are only logged.
    pub fn dispatch_arrival(&self, truck: &Truck, arrival_number: i32) -> bool {
        let Some(notice) = self.notice_for(truck, arrival_number) else {
            warn!(
                truck_id = %truck.id,
                destination = %truck.destination,
                "No arrival contact configured for destination"
            );
            return false;
        };

        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            match notifier.send(&notice).await {
                Ok(()) => info!(
                    plate = %notice.plate_number,
                    arrival_number = notice.arrival_number,
                    "Arrival notice sent"
                ),
                Err(e) => error!(
                    plate = %notice.plate_number,
                    arrival_number = notice.arrival_number,
                    "Failed to send arrival notice: {}",
                    e
                ),
            }
        });
        true
    }
}
