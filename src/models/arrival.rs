use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Snapshot of a truck taken when it is checked and discharged.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalRecord {
    pub truck_id: Uuid,
    pub plate_number: String,
    pub bon_livraison: Option<String>,
    pub arrival_number: Option<i32>,
    pub destination: String,
    pub product_type: Option<String>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub checked_at: DateTime<Utc>,
    pub checked_by: String,
}
