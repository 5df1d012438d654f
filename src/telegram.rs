//! Telegram transport: Bot API updates in, position fixes out, behind an
//! access gate of whitelisted users and invite-code sessions.

use crate::error::{AppError, IngestError};
use crate::models::payload::{RawTimestamp, TelegramLocation};
use crate::processor::{Ack, Pipeline};
use crate::store::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    /// Live locations arrive as edits of the original location message.
    #[serde(default)]
    pub edited_message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    /// Unix time in seconds. Edits keep the original send time here.
    pub date: i64,
    /// Set on edited messages; live-location updates are edits.
    #[serde(default)]
    pub edit_date: Option<i64>,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Durable authorization state for bot users.
#[async_trait]
pub trait TelegramAccess: Send + Sync {
    async fn is_whitelisted(&self, user_id: i64) -> Result<bool, StoreError>;

    async fn has_authorized_session(&self, user_id: i64) -> Result<bool, StoreError>;

    /// Consumes an unused, unexpired invite and opens an authorized session.
    /// Returns `false` when the code cannot be redeemed.
    async fn redeem_invite(
        &self,
        code: &str,
        user_id: i64,
        username: Option<&str>,
    ) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GateOutcome {
    Ingested { ack: Ack },
    Authorized,
    InviteRejected,
    /// Nothing actionable in the update.
    Ignored,
}

impl GateOutcome {
    pub fn reply_text(&self) -> Option<&'static str> {
        match self {
            GateOutcome::Authorized => {
                Some("Access granted. Share your live location to start tracking.")
            }
            GateOutcome::InviteRejected => Some("This invite code is invalid or has expired."),
            GateOutcome::Ingested { .. } | GateOutcome::Ignored => None,
        }
    }
}

pub struct TelegramGate {
    access: Arc<dyn TelegramAccess>,
    pipeline: Arc<Pipeline>,
}

impl TelegramGate {
    pub fn new(access: Arc<dyn TelegramAccess>, pipeline: Arc<Pipeline>) -> Self {
        Self { access, pipeline }
    }

    pub async fn handle_update(&self, update: Update) -> Result<GateOutcome, AppError> {
        let Some(message) = update.message.or(update.edited_message) else {
            debug!(update_id = update.update_id, "Ignoring update without message");
            return Ok(GateOutcome::Ignored);
        };
        let Some(from) = message.from else {
            return Ok(GateOutcome::Ignored);
        };

        if let Some(code) = message.text.as_deref().and_then(start_code) {
            let redeemed = self
                .access
                .redeem_invite(code, from.id, from.username.as_deref())
                .await
                .map_err(IngestError::from)?;
            return Ok(if redeemed {
                info!(telegram_user_id = from.id, "Invite redeemed, session authorized");
                GateOutcome::Authorized
            } else {
                warn!(telegram_user_id = from.id, "Invite code rejected");
                GateOutcome::InviteRejected
            });
        }

        let Some(location) = message.location else {
            return Ok(GateOutcome::Ignored);
        };

        if !self.is_authorized(from.id).await.map_err(IngestError::from)? {
            warn!(telegram_user_id = from.id, "Location from unauthorized Telegram user");
            return Err(AppError::Unauthorized(from.id));
        }

        let event = TelegramLocation {
            telegram_user_id: from.id,
            latitude: location.latitude,
            longitude: location.longitude,
            timestamp: Some(RawTimestamp::Epoch(
                message.edit_date.unwrap_or(message.date) as f64,
            )),
        };
        let fix = event
            .into_fix(Utc::now())
            .map_err(IngestError::InvalidPayload)?;
        let ack = self.pipeline.ingest_fix(fix).await?;
        Ok(GateOutcome::Ingested { ack })
    }

    async fn is_authorized(&self, user_id: i64) -> Result<bool, StoreError> {
        if self.access.is_whitelisted(user_id).await? {
            return Ok(true);
        }
        self.access.has_authorized_session(user_id).await
    }
}

/// Reply for a rejected update that Telegram must not redeliver. `None` for
/// failures worth a retry.
pub fn rejection_text(err: &AppError) -> Option<&'static str> {
    match err {
        AppError::Unauthorized(_) => {
            Some("You are not authorized. Send /start <invite code> to get access.")
        }
        AppError::Ingest(IngestError::UnknownSource(_)) => {
            Some("No truck is linked to your account yet.")
        }
        AppError::Ingest(IngestError::InvalidPayload(_)) => {
            Some("This location could not be read, please share it again.")
        }
        _ => None,
    }
}

/// Extracts the invite code from `/start <code>` (also `/start@BotName <code>`).
fn start_code(text: &str) -> Option<&str> {
    let mut parts = text.split_whitespace();
    let command = parts.next()?;
    if command != "/start" && !command.starts_with("/start@") {
        return None;
    }
    parts.next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::models::truck::{TrackingMethod, Truck, TruckStatus};
    use crate::notify::testing::{dispatcher, RecordingNotifier};
    use crate::processor::FixOutcome;
    use crate::store::memory::MemoryStore;
    use chrono::{DateTime, Duration};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct MemoryAccess {
        whitelist: HashSet<i64>,
        sessions: Mutex<HashSet<i64>>,
        invites: Mutex<HashMap<String, (DateTime<Utc>, bool)>>,
    }

    #[async_trait]
    impl TelegramAccess for MemoryAccess {
        async fn is_whitelisted(&self, user_id: i64) -> Result<bool, StoreError> {
            Ok(self.whitelist.contains(&user_id))
        }

        async fn has_authorized_session(&self, user_id: i64) -> Result<bool, StoreError> {
            Ok(self.sessions.lock().unwrap().contains(&user_id))
        }

        async fn redeem_invite(
            &self,
            code: &str,
            user_id: i64,
            _username: Option<&str>,
        ) -> Result<bool, StoreError> {
            let mut invites = self.invites.lock().unwrap();
            match invites.get_mut(code) {
                Some((expires_at, used)) if !*used && *expires_at > Utc::now() => {
                    *used = true;
                    self.sessions.lock().unwrap().insert(user_id);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }

    const DRIVER: i64 = 555_001;

    fn setup(access: MemoryAccess) -> (TelegramGate, Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let truck = Truck {
            id: Uuid::new_v4(),
            plate_number: "4455-A-9".to_string(),
            driver_name: None,
            driver_phone: None,
            status: TruckStatus::Waiting,
            position: None,
            speed_kmh: 0,
            destination: "Laayoune".to_string(),
            arrival_number: None,
            last_update: None,
            tracking_method: None,
            telegram_user_id: Some(DRIVER),
            tracking_token: None,
            product_type: None,
            supplier_name: None,
            cargo_type: None,
            bon_livraison: None,
            created_at: Utc::now(),
        };
        let id = truck.id;
        store.add_truck(truck);
        let (notifier, _rx) = RecordingNotifier::new(false);
        let pipeline = Arc::new(Pipeline::new(store.clone(), Arc::new(dispatcher(notifier))));
        (TelegramGate::new(Arc::new(access), pipeline), store, id)
    }

    fn update(body: serde_json::Value) -> Update {
        serde_json::from_value(body).unwrap()
    }

    fn location_update(user: i64) -> Update {
        update(serde_json::json!({
            "update_id": 1,
            "message": {
                "date": Utc::now().timestamp(),
                "chat": { "id": user },
                "from": { "id": user, "username": "driver" },
                "location": { "latitude": 28.0, "longitude": -11.0 }
            }
        }))
    }

    fn start_update(user: i64, text: &str) -> Update {
        update(serde_json::json!({
            "update_id": 2,
            "message": {
                "date": Utc::now().timestamp(),
                "chat": { "id": user },
                "from": { "id": user },
                "text": text
            }
        }))
    }

    #[test]
    fn test_start_code() {
        assert_eq!(start_code("/start ABC123"), Some("ABC123"));
        assert_eq!(start_code("/start@FleetBot XYZ"), Some("XYZ"));
        assert_eq!(start_code("/start"), None);
        assert_eq!(start_code("/status ABC"), None);
        assert_eq!(start_code("/started ABC"), None);
    }

    #[tokio::test]
    async fn test_whitelisted_location_is_ingested() {
        let access = MemoryAccess {
            whitelist: HashSet::from([DRIVER]),
            ..Default::default()
        };
        let (gate, store, id) = setup(access);

        let outcome = gate.handle_update(location_update(DRIVER)).await.unwrap();
        match outcome {
            GateOutcome::Ingested { ack } => {
                assert_eq!(ack.truck_id, id);
                assert_eq!(ack.outcome, FixOutcome::Applied);
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        let truck = store.truck(id).unwrap();
        assert_eq!(truck.status, TruckStatus::EnRoute);
        assert_eq!(truck.position, Some(Coordinate::new(28.0, -11.0)));
        assert_eq!(truck.tracking_method, Some(TrackingMethod::Telegram));
    }

    #[tokio::test]
    async fn test_live_location_edit_advances_time_and_speed() {
        let access = MemoryAccess {
            whitelist: HashSet::from([DRIVER]),
            ..Default::default()
        };
        let (gate, store, id) = setup(access);
        let sent_at = 1_740_830_400; // 2025-03-01T12:00:00Z

        gate.handle_update(update(serde_json::json!({
            "update_id": 10,
            "message": {
                "date": sent_at,
                "chat": { "id": DRIVER },
                "from": { "id": DRIVER },
                "location": { "latitude": 28.0, "longitude": -11.0 }
            }
        })))
        .await
        .unwrap();

        // Ten minutes later, ~11.1 km north. `date` still carries the send time.
        let outcome = gate
            .handle_update(update(serde_json::json!({
                "update_id": 11,
                "edited_message": {
                    "date": sent_at,
                    "edit_date": sent_at + 600,
                    "chat": { "id": DRIVER },
                    "from": { "id": DRIVER },
                    "location": { "latitude": 28.1, "longitude": -11.0 }
                }
            })))
            .await
            .unwrap();
        match outcome {
            GateOutcome::Ingested { ack } => assert_eq!(ack.outcome, FixOutcome::Applied),
            other => panic!("unexpected outcome {other:?}"),
        }

        let truck = store.truck(id).unwrap();
        assert_eq!(truck.speed_kmh, 67);
        assert_eq!(
            truck.last_update.map(|t| t.timestamp()),
            Some(sent_at + 600)
        );
    }

    #[tokio::test]
    async fn test_unauthorized_location_is_rejected_and_not_stored() {
        let (gate, store, id) = setup(MemoryAccess::default());

        let err = gate.handle_update(location_update(DRIVER)).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(DRIVER)));
        assert!(store.fixes().is_empty());
        assert_eq!(store.truck(id).unwrap().status, TruckStatus::Waiting);
    }

    #[tokio::test]
    async fn test_invite_opens_session_once() {
        let access = MemoryAccess::default();
        access
            .invites
            .lock()
            .unwrap()
            .insert("JOIN42".to_string(), (Utc::now() + Duration::hours(1), false));
        let (gate, store, _) = setup(access);

        let outcome = gate
            .handle_update(start_update(DRIVER, "/start JOIN42"))
            .await
            .unwrap();
        assert_eq!(outcome, GateOutcome::Authorized);
        assert!(outcome.reply_text().is_some());

        let again = gate
            .handle_update(start_update(DRIVER + 1, "/start JOIN42"))
            .await
            .unwrap();
        assert_eq!(again, GateOutcome::InviteRejected);

        gate.handle_update(location_update(DRIVER)).await.unwrap();
        assert_eq!(store.fixes().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_invite_is_rejected() {
        let access = MemoryAccess::default();
        access
            .invites
            .lock()
            .unwrap()
            .insert("OLD".to_string(), (Utc::now() - Duration::minutes(1), false));
        let (gate, _, _) = setup(access);

        let outcome = gate
            .handle_update(start_update(DRIVER, "/start OLD"))
            .await
            .unwrap();
        assert_eq!(outcome, GateOutcome::InviteRejected);
    }

    #[test]
    fn test_rejections_that_must_not_be_retried() {
        assert!(rejection_text(&AppError::Unauthorized(DRIVER)).is_some());
        assert!(rejection_text(&AppError::from(IngestError::UnknownSource(
            "telegram:1".to_string()
        )))
        .is_some());
        assert!(rejection_text(&AppError::from(IngestError::Persistence(
            StoreError::Unavailable("down".to_string())
        )))
        .is_none());
    }

    #[tokio::test]
    async fn test_plain_text_is_ignored() {
        let (gate, _, _) = setup(MemoryAccess::default());
        let outcome = gate
            .handle_update(start_update(DRIVER, "hello"))
            .await
            .unwrap();
        assert_eq!(outcome, GateOutcome::Ignored);
    }
}
