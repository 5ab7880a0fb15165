//! Domain Services
//!
//! Pure domain logic: great-circle distance, geofence verdicts, and the
//! wall clock used to stamp transitions.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::entities::GeofenceLocation;
use crate::domain::value_objects::LatLng;

/// Mean Earth radius used by the Haversine formula
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two points (Haversine, spherical Earth)
pub fn distance_meters(a: impl Into<LatLng>, b: impl Into<LatLng>) -> f64 {
    let a = a.into();
    let b = b.into();

    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let delta_phi = (b.latitude - a.latitude).to_radians();
    let delta_lambda = (b.longitude - a.longitude).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// True iff the point lies inside the location's circle (boundary inclusive)
pub fn within_geofence(point: impl Into<LatLng>, location: &GeofenceLocation) -> bool {
    distance_meters(point, location.center()) <= location.radius_meters
}

/// Distance and verdict for one point against one location
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeofenceVerdict {
    pub distance_meters: f64,
    pub radius_meters: f64,
    pub within: bool,
}

impl GeofenceVerdict {
    /// Distance rounded to whole metres, for display
    pub fn rounded_distance(&self) -> u64 {
        self.distance_meters.round().max(0.0) as u64
    }
}

/// Evaluate a point against a location
pub fn evaluate(point: impl Into<LatLng>, location: &GeofenceLocation) -> GeofenceVerdict {
    let distance_meters = distance_meters(point, location.center());
    GeofenceVerdict {
        distance_meters,
        radius_meters: location.radius_meters,
        within: distance_meters <= location.radius_meters,
    }
}

/// Source of "now" for transition timestamps and the day key
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar day the attendance record belongs to
    fn today(&self) -> NaiveDate;
}

/// Wall clock; the day key follows the device's local time zone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}
