use crate::geo::{self, Coordinate};
use chrono::{DateTime, Utc};

/// Fixes closer together than this keep the previously stored speed.
pub const MIN_ELAPSED_SECS: f64 = 5.0;

/// Upper bound for an estimate; anything faster is a bad fix or bad clock.
pub const MAX_SPEED_KMH: i32 = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub position: Coordinate,
    pub at: DateTime<Utc>,
}

/// Estimates speed in km/h between the previous sample and `next`.
///
/// `stored_speed_kmh` is what the truck currently reports; it is returned
/// unchanged when the two samples are less than [`MIN_ELAPSED_SECS`] apart.
pub fn estimate(previous: Option<Sample>, stored_speed_kmh: i32, next: Sample) -> i32 {
    let Some(previous) = previous else {
        return 0;
    };

    let elapsed_secs = (next.at - previous.at).num_milliseconds() as f64 / 1000.0;
    if elapsed_secs <= 0.0 {
        // Clock skew or out-of-order delivery.
        return 0;
    }
    if elapsed_secs < MIN_ELAPSED_SECS {
        return stored_speed_kmh;
    }

    let Some(meters) = geo::distance(previous.position, next.position) else {
        return 0;
    };
    let kmh = (meters / 1000.0) / (elapsed_secs / 3600.0);
    (kmh.round() as i32).clamp(0, MAX_SPEED_KMH)
}
