pub mod arrival;
pub mod geofence;
pub mod payload;
pub mod position_fix;
pub mod truck;
