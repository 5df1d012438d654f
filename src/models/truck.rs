use crate::geo::Coordinate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruckStatus {
    Waiting,
    EnRoute,
    Arrived,
    Depot,
    Discharged,
}

impl TruckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TruckStatus::Waiting => "waiting",
            TruckStatus::EnRoute => "en_route",
            TruckStatus::Arrived => "arrived",
            TruckStatus::Depot => "depot",
            TruckStatus::Discharged => "discharged",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TruckStatus::Discharged)
    }
}

impl fmt::Display for TruckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TruckStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(TruckStatus::Waiting),
            "en_route" => Ok(TruckStatus::EnRoute),
            "arrived" => Ok(TruckStatus::Arrived),
            "depot" => Ok(TruckStatus::Depot),
            "discharged" => Ok(TruckStatus::Discharged),
            other => Err(format!("unknown truck status '{other}'")),
        }
    }
}

/// Transport that last delivered a position for the truck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMethod {
    Gps,
    Telegram,
    Whatsapp,
}

impl TrackingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingMethod::Gps => "gps",
            TrackingMethod::Telegram => "telegram",
            TrackingMethod::Whatsapp => "whatsapp",
        }
    }
}

impl FromStr for TrackingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gps" => Ok(TrackingMethod::Gps),
            "telegram" => Ok(TrackingMethod::Telegram),
            "whatsapp" => Ok(TrackingMethod::Whatsapp),
            other => Err(format!("unknown tracking method '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Truck {
    pub id: Uuid,
    pub plate_number: String,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub status: TruckStatus,
    pub position: Option<Coordinate>,
    pub speed_kmh: i32,
    pub destination: String,
    pub arrival_number: Option<i32>,
    pub last_update: Option<DateTime<Utc>>,
    pub tracking_method: Option<TrackingMethod>,
    pub telegram_user_id: Option<i64>,
    pub tracking_token: Option<String>,
    pub product_type: Option<String>,
    pub supplier_name: Option<String>,
    pub cargo_type: Option<String>,
    pub bon_livraison: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row shape of the `trucks` table.
#[derive(Debug, FromRow)]
pub struct TruckRow {
    pub id: Uuid,
    pub plate_number: String,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub status: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<i32>,
    pub destination: String,
    pub arrival_number: Option<i32>,
    pub updated_at: Option<DateTime<Utc>>,
    pub tracking_method: Option<String>,
    pub telegram_user_id: Option<i64>,
    pub whatsapp_tracking_token: Option<String>,
    pub product_type: Option<String>,
    pub supplier_name: Option<String>,
    pub cargo_type: Option<String>,
    pub bon_livraison: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TruckRow> for Truck {
    type Error = String;

    fn try_from(row: TruckRow) -> Result<Self, Self::Error> {
        let position = match (row.latitude, row.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        };
        let tracking_method = row
            .tracking_method
            .as_deref()
            .map(TrackingMethod::from_str)
            .transpose()?;

        Ok(Truck {
            id: row.id,
            plate_number: row.plate_number,
            driver_name: row.driver_name,
            driver_phone: row.driver_phone,
            status: row.status.parse()?,
            position,
            speed_kmh: row.speed.unwrap_or(0).max(0),
            destination: row.destination,
            arrival_number: row.arrival_number,
            last_update: row.updated_at,
            tracking_method,
            telegram_user_id: row.telegram_user_id,
            tracking_token: row.whatsapp_tracking_token,
            product_type: row.product_type,
            supplier_name: row.supplier_name,
            cargo_type: row.cargo_type,
            bon_livraison: row.bon_livraison,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> TruckRow {
        TruckRow {
            id: Uuid::new_v4(),
            plate_number: "12345-A-6".to_string(),
            driver_name: Some("Driver".to_string()),
            driver_phone: Some("+212600000000".to_string()),
            status: "en_route".to_string(),
            latitude: Some(33.5731),
            longitude: Some(-7.5898),
            speed: Some(64),
            destination: "Laayoune".to_string(),
            arrival_number: None,
            updated_at: Some(Utc::now()),
            tracking_method: Some("telegram".to_string()),
            telegram_user_id: Some(42),
            whatsapp_tracking_token: None,
            product_type: Some("flour".to_string()),
            supplier_name: None,
            cargo_type: None,
            bon_livraison: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_maps_into_truck() {
        let truck = Truck::try_from(row()).unwrap();
        assert_eq!(truck.status, TruckStatus::EnRoute);
        assert_eq!(truck.position, Some(Coordinate::new(33.5731, -7.5898)));
        assert_eq!(truck.speed_kmh, 64);
        assert_eq!(truck.tracking_method, Some(TrackingMethod::Telegram));
    }

    #[test]
    fn test_half_set_position_is_unset() {
        let mut r = row();
        r.longitude = None;
        let truck = Truck::try_from(r).unwrap();
        assert_eq!(truck.position, None);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let mut r = row();
        r.status = "in_transit".to_string();
        assert!(Truck::try_from(r).is_err());
    }
}
