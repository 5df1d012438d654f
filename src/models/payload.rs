//! Inbound position payloads and the adapters that turn them into a [`PositionFix`].

use crate::geo::Coordinate;
use crate::models::position_fix::{PositionFix, SourceIdentity};
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

/// Transport a raw payload arrived on. Selects the adapter used to parse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// Device webhook or gateway relay: generic, vendor A or vendor B shape.
    Webhook,
    /// Location event relayed from the Telegram bot.
    Telegram,
    /// Browser geolocation POST, keyed by the truck's tracking token.
    TrackingLink { token: String },
}

/// Generic device shape. Some gateways send `deviceId` instead of `device_id`.
#[derive(Debug, Deserialize)]
pub struct GenericFix {
    #[serde(alias = "deviceId", deserialize_with = "parse_identity")]
    pub device_id: String,
    #[serde(deserialize_with = "parse_f64")]
    pub latitude: f64,
    #[serde(deserialize_with = "parse_f64")]
    pub longitude: f64,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub speed: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub heading: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub altitude: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<RawTimestamp>,
}

/// Vendor A: IMEI plus a batch of records. Only the first record is used.
#[derive(Debug, Deserialize)]
pub struct VendorAFix {
    #[serde(deserialize_with = "parse_identity")]
    pub imei: String,
    pub records: Vec<VendorARecord>,
}

#[derive(Debug, Deserialize)]
pub struct VendorARecord {
    #[serde(deserialize_with = "parse_f64")]
    pub lat: f64,
    #[serde(deserialize_with = "parse_f64")]
    pub lng: f64,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub speed: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub direction: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<RawTimestamp>,
}

/// Vendor B: camelCase device id with a nested location object.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorBFix {
    #[serde(deserialize_with = "parse_identity")]
    pub device_id: String,
    pub location: VendorBLocation,
    #[serde(default)]
    pub timestamp: Option<RawTimestamp>,
}

#[derive(Debug, Deserialize)]
pub struct VendorBLocation {
    #[serde(deserialize_with = "parse_f64")]
    pub latitude: f64,
    #[serde(deserialize_with = "parse_f64")]
    pub longitude: f64,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub speed: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub heading: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WebhookPayload {
    Generic(GenericFix),
    VendorA(VendorAFix),
    VendorB(VendorBFix),
}

/// Location event produced by the Telegram transport.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramLocation {
    #[serde(deserialize_with = "parse_telegram_id")]
    pub telegram_user_id: i64,
    #[serde(deserialize_with = "parse_f64")]
    pub latitude: f64,
    #[serde(deserialize_with = "parse_f64")]
    pub longitude: f64,
    #[serde(default)]
    pub timestamp: Option<RawTimestamp>,
}

/// Browser tracking page body. The truck comes from the link token, not the body.
#[derive(Debug, Deserialize)]
pub struct LinkLocation {
    #[serde(deserialize_with = "parse_f64")]
    pub latitude: f64,
    #[serde(deserialize_with = "parse_f64")]
    pub longitude: f64,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub accuracy: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub speed: Option<f64>,
}

/// Device timestamps arrive as epoch seconds, epoch millis, RFC 3339 or
/// `YYYY-MM-DD HH:MM:SS` (taken as UTC).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Epoch(f64),
    Text(String),
}

impl RawTimestamp {
    pub fn resolve(&self) -> Result<DateTime<Utc>, String> {
        match self {
            RawTimestamp::Epoch(value) => {
                // Anything past 1e12 is in milliseconds (year 33658 in seconds).
                let millis = if value.abs() >= 1e12 {
                    *value
                } else {
                    *value * 1000.0
                };
                if !millis.is_finite() {
                    return Err(format!("invalid epoch timestamp {value}"));
                }
                Utc.timestamp_millis_opt(millis.round() as i64)
                    .single()
                    .ok_or_else(|| format!("epoch timestamp {value} out of range"))
            }
            RawTimestamp::Text(text) => {
                let text = text.trim();
                if let Ok(value) = text.parse::<f64>() {
                    return RawTimestamp::Epoch(value).resolve();
                }
                if let Ok(t) = DateTime::parse_from_rfc3339(text) {
                    return Ok(t.with_timezone(&Utc));
                }
                NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                    .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
                    .map(|naive| naive.and_utc())
                    .map_err(|_| format!("invalid timestamp '{text}'"))
            }
        }
    }
}

/// Device clocks may run this far ahead of the server before the fix is
/// re-stamped with the receive time.
pub const MAX_CLOCK_SKEW_SECS: i64 = 300;

/// A missing timestamp, or one too far in the future, becomes `received_at`.
fn resolve_time(
    raw: Option<&RawTimestamp>,
    received_at: DateTime<Utc>,
) -> Result<DateTime<Utc>, String> {
    let observed = raw
        .map(RawTimestamp::resolve)
        .transpose()?
        .unwrap_or(received_at);
    if observed - received_at > Duration::seconds(MAX_CLOCK_SKEW_SECS) {
        return Ok(received_at);
    }
    Ok(observed)
}

fn checked_position(latitude: f64, longitude: f64) -> Result<Coordinate, String> {
    let position = Coordinate::new(latitude, longitude);
    if position.is_valid() {
        Ok(position)
    } else {
        Err(format!(
            "coordinates out of range: lat={latitude}, lon={longitude}"
        ))
    }
}

/// Parses a raw body with the adapter for `transport`.
///
/// The error is a human-readable reason; nothing here touches storage.
pub fn parse_fix(
    transport: &Transport,
    raw: &[u8],
    received_at: DateTime<Utc>,
) -> Result<PositionFix, String> {
    match transport {
        Transport::Webhook => {
            let payload: WebhookPayload = serde_json::from_slice(raw)
                .map_err(|e| format!("unrecognized GPS payload: {e}"))?;
            payload.into_fix(received_at)
        }
        Transport::Telegram => {
            let event: TelegramLocation = serde_json::from_slice(raw)
                .map_err(|e| format!("invalid telegram location: {e}"))?;
            event.into_fix(received_at)
        }
        Transport::TrackingLink { token } => {
            if token.trim().is_empty() {
                return Err("empty tracking token".to_string());
            }
            let body: LinkLocation = serde_json::from_slice(raw)
                .map_err(|e| format!("invalid tracking location: {e}"))?;
            Ok(PositionFix {
                source: SourceIdentity::TrackingToken(token.clone()),
                position: checked_position(body.latitude, body.longitude)?,
                speed: body.speed,
                heading: None,
                altitude: None,
                accuracy: body.accuracy,
                observed_at: received_at,
            })
        }
    }
}

impl WebhookPayload {
    pub fn into_fix(self, received_at: DateTime<Utc>) -> Result<PositionFix, String> {
        match self {
            WebhookPayload::Generic(g) => Ok(PositionFix {
                position: checked_position(g.latitude, g.longitude)?,
                observed_at: resolve_time(g.timestamp.as_ref(), received_at)?,
                source: SourceIdentity::Device(g.device_id),
                speed: g.speed,
                heading: g.heading,
                altitude: g.altitude,
                accuracy: g.accuracy,
            }),
            WebhookPayload::VendorA(a) => {
                let record = a
                    .records
                    .into_iter()
                    .next()
                    .ok_or_else(|| "vendor payload has no records".to_string())?;
                Ok(PositionFix {
                    position: checked_position(record.lat, record.lng)?,
                    observed_at: resolve_time(record.timestamp.as_ref(), received_at)?,
                    source: SourceIdentity::Device(a.imei),
                    speed: record.speed,
                    heading: record.direction,
                    altitude: record.altitude,
                    accuracy: None,
                })
            }
            WebhookPayload::VendorB(b) => Ok(PositionFix {
                position: checked_position(b.location.latitude, b.location.longitude)?,
                observed_at: resolve_time(b.timestamp.as_ref(), received_at)?,
                source: SourceIdentity::Device(b.device_id),
                speed: b.location.speed,
                heading: b.location.heading,
                altitude: None,
                accuracy: None,
            }),
        }
    }
}

impl TelegramLocation {
    pub fn into_fix(self, received_at: DateTime<Utc>) -> Result<PositionFix, String> {
        Ok(PositionFix {
            position: checked_position(self.latitude, self.longitude)?,
            observed_at: resolve_time(self.timestamp.as_ref(), received_at)?,
            source: SourceIdentity::Telegram(self.telegram_user_id),
            speed: None,
            heading: None,
            altitude: None,
            accuracy: None,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrFloat {
    String(String),
    Float(f64),
}

fn parse_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match StringOrFloat::deserialize(deserializer)? {
        StringOrFloat::Float(f) => Ok(f),
        StringOrFloat::String(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}

fn parse_f64_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v: Option<StringOrFloat> = Option::deserialize(deserializer)?;
    match v {
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        Some(StringOrFloat::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                s.trim().parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrInt {
    String(String),
    Int(i64),
}

/// Device ids may be sent as numbers; empty ids are rejected.
fn parse_identity<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let id = match StringOrInt::deserialize(deserializer)? {
        StringOrInt::String(s) => s.trim().to_string(),
        StringOrInt::Int(i) => i.to_string(),
    };
    if id.is_empty() {
        return Err(serde::de::Error::custom("empty device identity"));
    }
    Ok(id)
}

fn parse_telegram_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match StringOrInt::deserialize(deserializer)? {
        StringOrInt::Int(i) => Ok(i),
        StringOrInt::String(s) => s.trim().parse::<i64>().map_err(serde::de::Error::custom),
    }
}
