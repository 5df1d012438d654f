use super::{queries, DbPool};
use crate::models::arrival::ArrivalRecord;
use crate::models::geofence::{Geofence, GeofenceRow};
use crate::models::position_fix::{PositionFix, SourceIdentity};
use crate::models::truck::{Truck, TruckRow};
use crate::store::{
    Discharge, DischargeOutcome, FleetStore, StoreError, TruckRef, UpdateOutcome, UpdatePlan,
};
use async_trait::async_trait;
use sqlx::PgConnection;
use tracing::{debug, warn};
use uuid::Uuid;

/// Advisory lock key guarding arrival-number assignment.
const ARRIVAL_SEQUENCE_LOCK: i64 = 0x4152_5256;

pub struct PgFleetStore {
    pool: DbPool,
}

impl PgFleetStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Loads the truck with its row locked for the rest of the transaction.
async fn lock_truck(
    conn: &mut PgConnection,
    truck: &TruckRef,
) -> Result<Option<Truck>, StoreError> {
    let row = match truck {
        TruckRef::Id(id) => {
            sqlx::query_as::<_, TruckRow>(queries::LOCK_TRUCK_BY_ID)
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?
        }
        TruckRef::Source(SourceIdentity::Device(device_id)) => {
            sqlx::query_as::<_, TruckRow>(queries::LOCK_TRUCK_BY_DEVICE)
                .bind(device_id)
                .fetch_optional(&mut *conn)
                .await?
        }
        TruckRef::Source(SourceIdentity::Telegram(user_id)) => {
            sqlx::query_as::<_, TruckRow>(queries::LOCK_TRUCK_BY_TELEGRAM)
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?
        }
        TruckRef::Source(SourceIdentity::TrackingToken(token)) => {
            sqlx::query_as::<_, TruckRow>(queries::LOCK_TRUCK_BY_TRACKING_TOKEN)
                .bind(token)
                .fetch_optional(&mut *conn)
                .await?
        }
    };

    row.map(Truck::try_from)
        .transpose()
        .map_err(StoreError::Corrupt)
}

#[async_trait]
impl FleetStore for PgFleetStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query(queries::PING).execute(&self.pool).await?;
        Ok(())
    }

    async fn record_fix(&self, fix: &PositionFix) -> Result<(), StoreError> {
        sqlx::query(queries::INSERT_POSITION_FIX)
            .bind(fix.source.kind())
            .bind(fix.source.key())
            .bind(fix.position.latitude)
            .bind(fix.position.longitude)
            .bind(fix.speed)
            .bind(fix.heading)
            .bind(fix.altitude)
            .bind(fix.accuracy)
            .bind(fix.observed_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn geofences(&self) -> Result<Vec<Geofence>, StoreError> {
        let rows = sqlx::query_as::<_, GeofenceRow>(queries::SELECT_GEOFENCES)
            .fetch_all(&self.pool)
            .await?;

        // A broken zone must not take the others down with it.
        let mut zones = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match Geofence::try_from(row) {
                Ok(zone) => zones.push(zone),
                Err(e) => warn!(geofence_id = %id, "Skipping invalid geofence: {}", e),
            }
        }
        Ok(zones)
    }

    async fn update_truck(
        &self,
        truck: &TruckRef,
        plan: &UpdatePlan<'_>,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let Some(current) = lock_truck(&mut tx, truck).await? else {
            return Ok(UpdateOutcome::NotFound);
        };

        let Some(update) = plan(&current) else {
            tx.rollback().await?;
            return Ok(UpdateOutcome::Unchanged(current));
        };

        let mut assigned_arrival_number = None;
        if update.claim_arrival_number && current.arrival_number.is_none() {
            sqlx::query(queries::LOCK_ARRIVAL_SEQUENCE)
                .bind(ARRIVAL_SEQUENCE_LOCK)
                .execute(&mut *tx)
                .await?;
            let next: i32 = sqlx::query_scalar(queries::NEXT_ARRIVAL_NUMBER)
                .fetch_one(&mut *tx)
                .await?;
            debug!(truck_id = %current.id, arrival_number = next, "Claimed arrival number");
            assigned_arrival_number = Some(next);
        }

        let row = sqlx::query_as::<_, TruckRow>(queries::UPDATE_TRUCK_STATE)
            .bind(current.id)
            .bind(update.position.map(|p| p.latitude))
            .bind(update.position.map(|p| p.longitude))
            .bind(update.speed_kmh)
            .bind(update.status.as_str())
            .bind(update.updated_at)
            .bind(update.tracking_method.map(|m| m.as_str()))
            .bind(assigned_arrival_number)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        let truck = Truck::try_from(row).map_err(StoreError::Corrupt)?;
        Ok(UpdateOutcome::Applied {
            truck,
            assigned_arrival_number,
        })
    }

    async fn discharge_truck(
        &self,
        truck_id: Uuid,
        discharge: &Discharge,
    ) -> Result<DischargeOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let Some(truck) = lock_truck(&mut tx, &TruckRef::Id(truck_id)).await? else {
            return Ok(DischargeOutcome::NotFound);
        };
        if truck.status.is_terminal() {
            tx.rollback().await?;
            return Ok(DischargeOutcome::AlreadyDischarged);
        }

        let bon_livraison = discharge
            .bon_livraison
            .clone()
            .or_else(|| truck.bon_livraison.clone());

        let record = sqlx::query_as::<_, ArrivalRecord>(queries::INSERT_ARRIVAL_HISTORY)
            .bind(truck.id)
            .bind(&truck.plate_number)
            .bind(bon_livraison)
            .bind(truck.arrival_number)
            .bind(&truck.destination)
            .bind(&truck.product_type)
            .bind(truck.last_update)
            .bind(discharge.checked_at)
            .bind(&discharge.checked_by)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(queries::UPDATE_TRUCK_DISCHARGED)
            .bind(truck.id)
            .bind(&discharge.checked_by)
            .bind(discharge.checked_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(DischargeOutcome::Discharged(record))
    }
}
