//! In-process [`FleetStore`] for tests. One mutex guards everything, so every
//! update is trivially serialized.

use super::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    trucks: HashMap<Uuid, Truck>,
    devices: HashMap<String, Uuid>,
    fixes: Vec<PositionFix>,
    geofences: Vec<Geofence>,
    history: Vec<ArrivalRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_updates: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_truck(&self, truck: Truck) {
        self.state.lock().unwrap().trucks.insert(truck.id, truck);
    }

    pub fn bind_device(&self, device_id: &str, truck_id: Uuid) {
        self.state
            .lock()
            .unwrap()
            .devices
            .insert(device_id.to_string(), truck_id);
    }

    pub fn add_geofence(&self, zone: Geofence) {
        self.state.lock().unwrap().geofences.push(zone);
    }

    pub fn truck(&self, id: Uuid) -> Option<Truck> {
        self.state.lock().unwrap().trucks.get(&id).cloned()
    }

    pub fn fixes(&self) -> Vec<PositionFix> {
        self.state.lock().unwrap().fixes.clone()
    }

    pub fn history(&self) -> Vec<ArrivalRecord> {
        self.state.lock().unwrap().history.clone()
    }

    /// Makes truck writes fail with `Unavailable` until reset.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

fn resolve(state: &State, truck: &TruckRef) -> Option<Uuid> {
    match truck {
        TruckRef::Id(id) => state.trucks.contains_key(id).then_some(*id),
        TruckRef::Source(SourceIdentity::Device(device)) => state.devices.get(device).copied(),
        TruckRef::Source(SourceIdentity::Telegram(user)) => state
            .trucks
            .values()
            .find(|t| t.telegram_user_id == Some(*user))
            .map(|t| t.id),
        TruckRef::Source(SourceIdentity::TrackingToken(token)) => state
            .trucks
            .values()
            .find(|t| t.tracking_token.as_deref() == Some(token.as_str()))
            .map(|t| t.id),
    }
}

#[async_trait]
impl FleetStore for MemoryStore {
    async fn record_fix(&self, fix: &PositionFix) -> Result<(), StoreError> {
        self.state.lock().unwrap().fixes.push(fix.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    async fn geofences(&self) -> Result<Vec<Geofence>, StoreError> {
        Ok(self.state.lock().unwrap().geofences.clone())
    }

    async fn update_truck(
        &self,
        truck: &TruckRef,
        plan: &UpdatePlan<'_>,
    ) -> Result<UpdateOutcome, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        let Some(id) = resolve(&state, truck) else {
            return Ok(UpdateOutcome::NotFound);
        };

        let next_arrival = state
            .trucks
            .values()
            .filter_map(|t| t.arrival_number)
            .max()
            .unwrap_or(0)
            + 1;

        let current = state.trucks.get_mut(&id).expect("resolved truck exists");
        let Some(update) = plan(current) else {
            return Ok(UpdateOutcome::Unchanged(current.clone()));
        };

        if let Some(position) = update.position {
            current.position = Some(position);
        }
        current.speed_kmh = update.speed_kmh;
        current.status = update.status;
        current.last_update = Some(update.updated_at);
        if let Some(method) = update.tracking_method {
            current.tracking_method = Some(method);
        }
        let mut assigned = None;
        if update.claim_arrival_number && current.arrival_number.is_none() {
            current.arrival_number = Some(next_arrival);
            assigned = Some(next_arrival);
        }

        Ok(UpdateOutcome::Applied {
            truck: current.clone(),
            assigned_arrival_number: assigned,
        })
    }

    async fn discharge_truck(
        &self,
        truck_id: Uuid,
        discharge: &Discharge,
    ) -> Result<DischargeOutcome, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        let Some(truck) = state.trucks.get_mut(&truck_id) else {
            return Ok(DischargeOutcome::NotFound);
        };
        if truck.status == TruckStatus::Discharged {
            return Ok(DischargeOutcome::AlreadyDischarged);
        }

        let record = ArrivalRecord {
            truck_id: truck.id,
            plate_number: truck.plate_number.clone(),
            bon_livraison: discharge
                .bon_livraison
                .clone()
                .or_else(|| truck.bon_livraison.clone()),
            arrival_number: truck.arrival_number,
            destination: truck.destination.clone(),
            product_type: truck.product_type.clone(),
            arrived_at: truck.last_update,
            checked_at: discharge.checked_at,
            checked_by: discharge.checked_by.clone(),
        };
        truck.status = TruckStatus::Discharged;
        state.history.push(record.clone());
        Ok(DischargeOutcome::Discharged(record))
    }
}
