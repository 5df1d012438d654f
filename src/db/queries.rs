// Column types: latitude/longitude/speed are NUMERIC, telegram_user_id is
// BIGINT, timestamps are TIMESTAMPTZ. The casts below pin the decoded types.
macro_rules! truck_columns {
    () => {
        "t.id, t.plate_number, t.driver_name, t.driver_phone, t.status, \
         t.latitude::float8 AS latitude, t.longitude::float8 AS longitude, \
         ROUND(t.speed)::int4 AS speed, \
         t.destination, t.arrival_number, t.updated_at, t.tracking_method, \
         t.telegram_user_id::int8 AS telegram_user_id, t.whatsapp_tracking_token, t.product_type, \
         t.supplier_name, t.cargo_type, t.bon_livraison, t.created_at"
    };
}

pub const PING: &str = "SELECT 1;";

pub const LOCK_TRUCK_BY_ID: &str = concat!(
    "SELECT ",
    truck_columns!(),
    " FROM trucks t WHERE t.id = $1 FOR UPDATE OF t;"
);

pub const LOCK_TRUCK_BY_DEVICE: &str = concat!(
    "SELECT ",
    truck_columns!(),
    " FROM trucks t JOIN gps_devices g ON g.truck_id = t.id \
     WHERE g.device_id = $1 LIMIT 1 FOR UPDATE OF t;"
);

pub const LOCK_TRUCK_BY_TELEGRAM: &str = concat!(
    "SELECT ",
    truck_columns!(),
    " FROM trucks t WHERE t.telegram_user_id = $1 LIMIT 1 FOR UPDATE OF t;"
);

pub const LOCK_TRUCK_BY_TRACKING_TOKEN: &str = concat!(
    "SELECT ",
    truck_columns!(),
    " FROM trucks t WHERE t.whatsapp_tracking_token = $1 LIMIT 1 FOR UPDATE OF t;"
);

/// Null position/tracking parameters keep the stored values; an arrival
/// number is only written when the truck has none.
pub const UPDATE_TRUCK_STATE: &str = concat!(
    "UPDATE trucks AS t \
     SET latitude = COALESCE($2, latitude), \
         longitude = COALESCE($3, longitude), \
         speed = $4, \
         status = $5, \
         updated_at = $6, \
         tracking_method = COALESCE($7, tracking_method), \
         arrival_number = COALESCE(arrival_number, $8) \
     WHERE t.id = $1 \
     RETURNING ",
    truck_columns!(),
    ";"
);

/// Serializes arrival-number assignment until the transaction ends.
pub const LOCK_ARRIVAL_SEQUENCE: &str = r#"
SELECT pg_advisory_xact_lock($1);
"#;

pub const NEXT_ARRIVAL_NUMBER: &str = r#"
SELECT COALESCE(MAX(arrival_number), 0) + 1 FROM trucks;
"#;

pub const INSERT_POSITION_FIX: &str = r#"
INSERT INTO position_fixes (
    source_kind, source_id, latitude, longitude, speed, heading, altitude, accuracy, observed_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9);
"#;

pub const SELECT_GEOFENCES: &str = r#"
SELECT id, city_name, geofence_type,
       latitude::float8 AS latitude, longitude::float8 AS longitude, radius::float8 AS radius,
       color
FROM city_geofences
ORDER BY city_name, geofence_type;
"#;

pub const INSERT_ARRIVAL_HISTORY: &str = r#"
INSERT INTO arrival_history (
    truck_id, plate_number, bon_livraison, arrival_number,
    destination, product_type, arrived_at, checked_at, checked_by
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
RETURNING truck_id, plate_number, bon_livraison, arrival_number,
          destination, product_type, arrived_at, checked_at, checked_by;
"#;

pub const UPDATE_TRUCK_DISCHARGED: &str = r#"
UPDATE trucks
SET status = 'discharged',
    is_checked = true,
    checked_by = $2,
    checked_at = $3
WHERE id = $1;
"#;

pub const IS_TELEGRAM_WHITELISTED: &str = r#"
SELECT EXISTS (SELECT 1 FROM telegram_whitelist WHERE telegram_user_id = $1);
"#;

pub const HAS_AUTHORIZED_SESSION: &str = r#"
SELECT EXISTS (
    SELECT 1 FROM telegram_sessions WHERE telegram_user_id = $1 AND authorized = true
);
"#;

pub const CLAIM_TELEGRAM_INVITE: &str = r#"
UPDATE telegram_invites
SET used = true, used_by = $2, used_at = NOW()
WHERE code = $1 AND used = false AND expires_at > NOW()
RETURNING truck_id;
"#;

pub const UPSERT_TELEGRAM_SESSION: &str = r#"
INSERT INTO telegram_sessions (telegram_user_id, username, authorized, authorization_method, authorized_at)
VALUES ($1, $2, true, 'invite_code', NOW())
ON CONFLICT (telegram_user_id) DO UPDATE
SET username = EXCLUDED.username,
    authorized = true,
    authorization_method = 'invite_code',
    authorized_at = NOW();
"#;

pub const BIND_TRUCK_TELEGRAM_USER: &str = r#"
UPDATE trucks SET telegram_user_id = $2, tracking_method = 'telegram' WHERE id = $1;
"#;
