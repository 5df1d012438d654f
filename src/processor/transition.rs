//! Truck status state machine.
//!
//! `waiting -> en_route -> arrived -> depot -> discharged`. Position fixes can
//! only move a truck between `en_route`, `arrived` and `depot`; `discharged`
//! is reached through an explicit check and is terminal.

use crate::models::geofence::{Geofence, ZoneKind};
use crate::models::position_fix::PositionFix;
use crate::models::truck::{Truck, TruckStatus};
use crate::processor::geofence::{match_zones, names_match};
use crate::processor::speed::{self, Sample};
use crate::store::TruckUpdate;
use chrono::{DateTime, Utc};

/// Status implied by the zones a truck is in.
///
/// Only zones named after the destination count. A destination warehouse
/// outranks the destination city, which outranks being anywhere else.
pub fn next_status(current: TruckStatus, matched: &[&Geofence], destination: &str) -> TruckStatus {
    if current.is_terminal() {
        return current;
    }

    let mut in_city = false;
    for zone in matched.iter().filter(|z| names_match(&z.name, destination)) {
        match zone.kind {
            ZoneKind::Warehouse => return TruckStatus::Depot,
            ZoneKind::CityBoundary => in_city = true,
        }
    }

    if in_city {
        TruckStatus::Arrived
    } else {
        TruckStatus::EnRoute
    }
}

/// Update for `truck` after `fix`, or `None` when the fix must not touch it:
/// the truck is discharged, or the fix is older than the truck's last update.
pub fn plan_fix(truck: &Truck, fix: &PositionFix, zones: &[Geofence]) -> Option<TruckUpdate> {
    if truck.status.is_terminal() {
        return None;
    }
    if truck.last_update.is_some_and(|last| fix.observed_at < last) {
        return None;
    }

    let previous = match (truck.position, truck.last_update) {
        (Some(position), Some(at)) => Some(Sample { position, at }),
        _ => None,
    };
    let speed_kmh = speed::estimate(
        previous,
        truck.speed_kmh,
        Sample {
            position: fix.position,
            at: fix.observed_at,
        },
    );

    let matched = match_zones(fix.position, zones);
    let status = next_status(truck.status, &matched, &truck.destination);

    Some(TruckUpdate {
        position: Some(fix.position),
        speed_kmh,
        status,
        updated_at: fix.observed_at,
        tracking_method: Some(fix.source.tracking_method()),
        claim_arrival_number: status == TruckStatus::Arrived && truck.arrival_number.is_none(),
    })
}

/// Update for an operator marking the truck arrived by hand.
pub fn plan_manual_arrival(truck: &Truck, now: DateTime<Utc>) -> Option<TruckUpdate> {
    if truck.status.is_terminal() {
        return None;
    }
    Some(TruckUpdate {
        position: None,
        speed_kmh: 0,
        status: TruckStatus::Arrived,
        updated_at: now,
        tracking_method: None,
        claim_arrival_number: truck.arrival_number.is_none(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::models::position_fix::SourceIdentity;
    use crate::models::truck::TrackingMethod;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn zone(name: &str, kind: ZoneKind, lat: f64, lon: f64, radius_m: f64) -> Geofence {
        Geofence {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind,
            center: Coordinate::new(lat, lon),
            radius_m,
            color: None,
        }
    }

    fn laayoune_zones() -> Vec<Geofence> {
        vec![
            zone("Laayoune", ZoneKind::CityBoundary, 27.1536, -13.2033, 5000.0),
            zone("Laayoune", ZoneKind::Warehouse, 27.1500, -13.2000, 300.0),
            zone("Dakhla", ZoneKind::Warehouse, 23.6848, -15.9580, 300.0),
        ]
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    fn truck(status: TruckStatus) -> Truck {
        Truck {
            id: Uuid::new_v4(),
            plate_number: "12345-A-6".to_string(),
            driver_name: None,
            driver_phone: None,
            status,
            position: Some(Coordinate::new(33.5731, -7.5898)),
            speed_kmh: 0,
            destination: "Laayoune".to_string(),
            arrival_number: None,
            last_update: Some(t0()),
            tracking_method: None,
            telegram_user_id: None,
            tracking_token: None,
            product_type: None,
            supplier_name: None,
            cargo_type: None,
            bon_livraison: None,
            created_at: t0(),
        }
    }

    fn fix(lat: f64, lon: f64, at: DateTime<Utc>) -> PositionFix {
        PositionFix {
            source: SourceIdentity::Device("GPS001".to_string()),
            position: Coordinate::new(lat, lon),
            speed: None,
            heading: None,
            altitude: None,
            accuracy: None,
            observed_at: at,
        }
    }

    #[test]
    fn test_warehouse_outranks_city() {
        let zones = laayoune_zones();
        let matched: Vec<&Geofence> = zones.iter().take(2).collect();
        // Order of matches must not matter.
        let reversed: Vec<&Geofence> = matched.iter().rev().copied().collect();

        assert_eq!(next_status(TruckStatus::EnRoute, &matched, "Laayoune"), TruckStatus::Depot);
        assert_eq!(next_status(TruckStatus::EnRoute, &reversed, "Laayoune"), TruckStatus::Depot);
    }

    #[test]
    fn test_city_only_is_arrived() {
        let zones = laayoune_zones();
        let matched = vec![&zones[0]];
        assert_eq!(next_status(TruckStatus::Waiting, &matched, "laayoune "), TruckStatus::Arrived);
    }

    #[test]
    fn test_zones_of_other_cities_are_ignored() {
        let zones = laayoune_zones();
        let matched = vec![&zones[2]];
        assert_eq!(next_status(TruckStatus::Arrived, &matched, "Laayoune"), TruckStatus::EnRoute);
        assert_eq!(next_status(TruckStatus::Waiting, &[], "Laayoune"), TruckStatus::EnRoute);
    }

    #[test]
    fn test_discharged_is_terminal() {
        let zones = laayoune_zones();
        let matched: Vec<&Geofence> = zones.iter().collect();
        assert_eq!(
            next_status(TruckStatus::Discharged, &matched, "Laayoune"),
            TruckStatus::Discharged
        );
    }

    #[test]
    fn test_plan_first_arrival_claims_number() {
        let truck = truck(TruckStatus::EnRoute);
        let update = plan_fix(&truck, &fix(27.1536, -13.2033, t0() + Duration::hours(10)), &laayoune_zones())
            .unwrap();

        assert_eq!(update.status, TruckStatus::Arrived);
        assert!(update.claim_arrival_number);
        assert_eq!(update.tracking_method, Some(TrackingMethod::Gps));
        assert_eq!(update.position, Some(Coordinate::new(27.1536, -13.2033)));
    }

    #[test]
    fn test_plan_re_arrival_does_not_claim() {
        let mut truck = truck(TruckStatus::EnRoute);
        truck.arrival_number = Some(3);
        let update = plan_fix(&truck, &fix(27.1536, -13.2033, t0() + Duration::hours(1)), &laayoune_zones())
            .unwrap();

        assert_eq!(update.status, TruckStatus::Arrived);
        assert!(!update.claim_arrival_number);
    }

    #[test]
    fn test_plan_skips_older_fix() {
        let truck = truck(TruckStatus::EnRoute);
        assert_eq!(
            plan_fix(&truck, &fix(27.1536, -13.2033, t0() - Duration::seconds(1)), &laayoune_zones()),
            None
        );
    }

    #[test]
    fn test_plan_skips_discharged_truck() {
        let truck = truck(TruckStatus::Discharged);
        assert_eq!(
            plan_fix(&truck, &fix(27.1536, -13.2033, t0() + Duration::hours(1)), &laayoune_zones()),
            None
        );
    }

    #[test]
    fn test_manual_arrival() {
        let mut moving = truck(TruckStatus::EnRoute);
        moving.speed_kmh = 70;
        let update = plan_manual_arrival(&moving, t0() + Duration::hours(1)).unwrap();
        assert_eq!(update.status, TruckStatus::Arrived);
        assert_eq!(update.speed_kmh, 0);
        assert_eq!(update.position, None);
        assert!(update.claim_arrival_number);

        assert_eq!(plan_manual_arrival(&truck(TruckStatus::Discharged), t0()), None);
    }
}
