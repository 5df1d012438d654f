//! Persistence boundary for the ingestion core.

use crate::geo::Coordinate;
use crate::models::arrival::ArrivalRecord;
use crate::models::geofence::Geofence;
use crate::models::position_fix::{PositionFix, SourceIdentity};
use crate::models::truck::{TrackingMethod, Truck, TruckStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[cfg(test)]
pub mod memory;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// How a caller names the truck it wants to change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TruckRef {
    Id(Uuid),
    Source(SourceIdentity),
}

/// Field values to write for one truck, decided while its row is locked.
#[derive(Debug, Clone, PartialEq)]
pub struct TruckUpdate {
    /// `None` keeps the stored position.
    pub position: Option<Coordinate>,
    pub speed_kmh: i32,
    pub status: TruckStatus,
    pub updated_at: DateTime<Utc>,
    /// `None` keeps the stored tracking method.
    pub tracking_method: Option<TrackingMethod>,
    /// Assign the next arrival number if the truck has none yet.
    pub claim_arrival_number: bool,
}

/// Decides the update for a locked truck. `None` leaves the truck untouched.
pub type UpdatePlan<'a> = dyn Fn(&Truck) -> Option<TruckUpdate> + Send + Sync + 'a;

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    NotFound,
    /// The plan declined to change the truck; carries the current state.
    Unchanged(Truck),
    Applied {
        truck: Truck,
        /// Set only when this update assigned the truck its arrival number.
        assigned_arrival_number: Option<i32>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DischargeOutcome {
    NotFound,
    AlreadyDischarged,
    Discharged(ArrivalRecord),
}

/// Check details recorded when a truck is discharged.
#[derive(Debug, Clone, PartialEq)]
pub struct Discharge {
    pub checked_by: String,
    pub checked_at: DateTime<Utc>,
    /// Overrides the delivery note stored on the truck when present.
    pub bon_livraison: Option<String>,
}

#[async_trait]
pub trait FleetStore: Send + Sync {
    /// Cheap round trip used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Appends a raw fix to the audit log.
    async fn record_fix(&self, fix: &PositionFix) -> Result<(), StoreError>;

    async fn geofences(&self) -> Result<Vec<Geofence>, StoreError>;

    /// Locks the truck, runs `plan` on its current state and writes the result
    /// in one transaction. When the plan claims an arrival number the store
    /// assigns `1 + max(arrival_number)` atomically with respect to every
    /// other claim.
    async fn update_truck(
        &self,
        truck: &TruckRef,
        plan: &UpdatePlan<'_>,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Archives an arrival record and marks the truck discharged, atomically.
    async fn discharge_truck(
        &self,
        truck_id: Uuid,
        discharge: &Discharge,
    ) -> Result<DischargeOutcome, StoreError>;
}
