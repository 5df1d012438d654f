use crate::geo::Coordinate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    CityBoundary,
    Warehouse,
}

impl FromStr for ZoneKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "city_boundary" => Ok(ZoneKind::CityBoundary),
            "warehouse" => Ok(ZoneKind::Warehouse),
            other => Err(format!("unknown geofence type '{other}'")),
        }
    }
}

/// Named circular zone around a city or warehouse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Geofence {
    pub id: Uuid,
    pub name: String,
    pub kind: ZoneKind,
    pub center: Coordinate,
    pub radius_m: f64,
    /// Display only.
    pub color: Option<String>,
}

#[derive(Debug, FromRow)]
pub struct GeofenceRow {
    pub id: Uuid,
    pub city_name: String,
    pub geofence_type: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
    pub color: Option<String>,
}

impl TryFrom<GeofenceRow> for Geofence {
    type Error = String;

    fn try_from(row: GeofenceRow) -> Result<Self, Self::Error> {
        if !(row.radius > 0.0) {
            return Err(format!(
                "geofence {} has non-positive radius {}",
                row.id, row.radius
            ));
        }
        Ok(Geofence {
            id: row.id,
            name: row.city_name,
            kind: row.geofence_type.parse()?,
            center: Coordinate::new(row.latitude, row.longitude),
            radius_m: row.radius,
            color: row.color,
        })
    }
}
