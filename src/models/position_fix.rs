use crate::geo::Coordinate;
use crate::models::truck::TrackingMethod;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Who sent a fix. Each variant resolves to a truck through a different column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SourceIdentity {
    Device(String),
    Telegram(i64),
    TrackingToken(String),
}

impl SourceIdentity {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceIdentity::Device(_) => "device",
            SourceIdentity::Telegram(_) => "telegram",
            SourceIdentity::TrackingToken(_) => "tracking_token",
        }
    }

    pub fn key(&self) -> String {
        match self {
            SourceIdentity::Device(id) => id.clone(),
            SourceIdentity::Telegram(id) => id.to_string(),
            SourceIdentity::TrackingToken(token) => token.clone(),
        }
    }

    pub fn tracking_method(&self) -> TrackingMethod {
        match self {
            SourceIdentity::Device(_) => TrackingMethod::Gps,
            SourceIdentity::Telegram(_) => TrackingMethod::Telegram,
            SourceIdentity::TrackingToken(_) => TrackingMethod::Whatsapp,
        }
    }
}

impl fmt::Display for SourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Tracking tokens are credentials; only show a prefix.
            SourceIdentity::TrackingToken(token) => {
                let prefix: String = token.chars().take(6).collect();
                write!(f, "tracking_token:{prefix}…")
            }
            other => write!(f, "{}:{}", other.kind(), other.key()),
        }
    }
}

/// One raw GPS observation, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionFix {
    pub source: SourceIdentity,
    pub position: Coordinate,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub altitude: Option<f64>,
    pub accuracy: Option<f64>,
    /// Device-supplied time, or the server receive time when the device sent none.
    pub observed_at: DateTime<Utc>,
}
