use super::{transition, Ack, FixOutcome, Pipeline};
use crate::error::IngestError;
use crate::models::payload::{parse_fix, Transport};
use crate::models::position_fix::PositionFix;
use crate::models::truck::Truck;
use crate::store::{TruckRef, UpdateOutcome};
use chrono::Utc;
use tracing::{debug, info, warn};

impl Pipeline {
    /// Parses `raw` with the adapter for `transport` and ingests the fix.
    pub async fn ingest(&self, transport: &Transport, raw: &[u8]) -> Result<Ack, IngestError> {
        let fix = parse_fix(transport, raw, Utc::now()).map_err(|reason| {
            warn!(?transport, "Rejected position payload: {}", reason);
            IngestError::InvalidPayload(reason)
        })?;
        self.ingest_fix(fix).await
    }

    /// Stores the raw fix, then moves the owning truck forward.
    ///
    /// The raw fix stays stored even when the truck lookup or update fails.
    pub async fn ingest_fix(&self, fix: PositionFix) -> Result<Ack, IngestError> {
        self.store.record_fix(&fix).await?;

        let zones = self.store.geofences().await?;
        let outcome = self
            .store
            .update_truck(&TruckRef::Source(fix.source.clone()), &|truck: &Truck| {
                transition::plan_fix(truck, &fix, &zones)
            })
            .await?;

        match outcome {
            UpdateOutcome::NotFound => {
                warn!(source = %fix.source, "No truck registered for position source");
                Err(IngestError::UnknownSource(fix.source.to_string()))
            }
            UpdateOutcome::Unchanged(truck) => {
                let outcome = if truck.status.is_terminal() {
                    FixOutcome::Retired
                } else {
                    FixOutcome::Stale
                };
                debug!(
                    truck_id = %truck.id,
                    observed_at = %fix.observed_at,
                    ?outcome,
                    "Fix stored without updating truck"
                );
                Ok(ack(&truck, outcome, false))
            }
            UpdateOutcome::Applied {
                truck,
                assigned_arrival_number,
            } => {
                let notified = match assigned_arrival_number {
                    Some(number) => {
                        info!(
                            truck_id = %truck.id,
                            plate = %truck.plate_number,
                            destination = %truck.destination,
                            arrival_number = number,
                            "Truck arrived at destination"
                        );
                        self.dispatcher.dispatch_arrival(&truck, number)
                    }
                    None => false,
                };
                info!(
                    truck_id = %truck.id,
                    status = %truck.status,
                    speed_kmh = truck.speed_kmh,
                    "Position updated"
                );
                Ok(ack(&truck, FixOutcome::Applied, notified))
            }
        }
    }
}

fn ack(truck: &Truck, outcome: FixOutcome, notified: bool) -> Ack {
    Ack {
        truck_id: truck.id,
        outcome,
        status: truck.status,
        speed_kmh: truck.speed_kmh,
        arrival_number: truck.arrival_number,
        notified,
    }
}
