pub mod actions;
pub mod geofence;
pub mod ingest;
pub mod speed;
pub mod transition;

use crate::models::truck::TruckStatus;
use crate::notify::Dispatcher;
use crate::store::{FleetStore, StoreError};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Runs inbound fixes and operator actions against the fleet store.
///
/// Stateless apart from its collaborators; share it behind an `Arc`.
pub struct Pipeline {
    store: Arc<dyn FleetStore>,
    dispatcher: Arc<Dispatcher>,
}

impl Pipeline {
    pub fn new(store: Arc<dyn FleetStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { store, dispatcher }
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixOutcome {
    Applied,
    /// Older than the truck's last update; stored raw only.
    Stale,
    /// Truck already discharged; stored raw only.
    Retired,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub truck_id: Uuid,
    pub outcome: FixOutcome,
    pub status: TruckStatus,
    pub speed_kmh: i32,
    pub arrival_number: Option<i32>,
    /// A first-arrival notice was handed off for delivery.
    pub notified: bool,
}
