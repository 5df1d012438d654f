use super::{transition, Pipeline};
use crate::error::ActionError;
use crate::models::arrival::ArrivalRecord;
use crate::models::truck::Truck;
use crate::store::{Discharge, DischargeOutcome, TruckRef, UpdateOutcome};
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalAck {
    pub truck_id: Uuid,
    pub arrival_number: Option<i32>,
    pub notified: bool,
}

impl Pipeline {
    /// Operator override: marks the truck arrived, numbering it on first arrival.
    pub async fn mark_arrived(&self, truck_id: Uuid) -> Result<ArrivalAck, ActionError> {
        let now = Utc::now();
        let outcome = self
            .store
            .update_truck(&TruckRef::Id(truck_id), &|truck: &Truck| {
                transition::plan_manual_arrival(truck, now)
            })
            .await?;

        match outcome {
            UpdateOutcome::NotFound => Err(ActionError::TruckNotFound(truck_id)),
            UpdateOutcome::Unchanged(_) => Err(ActionError::AlreadyDischarged(truck_id)),
            UpdateOutcome::Applied {
                truck,
                assigned_arrival_number,
            } => {
                info!(
                    truck_id = %truck.id,
                    plate = %truck.plate_number,
                    arrival_number = ?truck.arrival_number,
                    "Truck marked arrived"
                );
                let notified = assigned_arrival_number
                    .map(|number| self.dispatcher.dispatch_arrival(&truck, number))
                    .unwrap_or(false);
                Ok(ArrivalAck {
                    truck_id: truck.id,
                    arrival_number: truck.arrival_number,
                    notified,
                })
            }
        }
    }

    /// Archives the truck's arrival and retires it from the active queue.
    pub async fn check_truck(
        &self,
        truck_id: Uuid,
        checked_by: String,
        bon_livraison: Option<String>,
    ) -> Result<ArrivalRecord, ActionError> {
        let discharge = Discharge {
            checked_by,
            checked_at: Utc::now(),
            bon_livraison,
        };

        match self.store.discharge_truck(truck_id, &discharge).await? {
            DischargeOutcome::NotFound => Err(ActionError::TruckNotFound(truck_id)),
            DischargeOutcome::AlreadyDischarged => Err(ActionError::AlreadyDischarged(truck_id)),
            DischargeOutcome::Discharged(record) => {
                info!(
                    truck_id = %truck_id,
                    plate = %record.plate_number,
                    checked_by = %record.checked_by,
                    "Truck checked and discharged"
                );
                Ok(record)
            }
        }
    }
}
