//! Great-circle distance and radius filtering.

use crate::domain::{DisasterEvent, GeoPoint};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Slack applied to the inclusive radius comparison.
const RADIUS_EPSILON_KM: f64 = 1e-9;

/// Haversine distance in kilometres.
pub fn haversine_km(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.latitude().to_radians();
    let lat2 = to.latitude().to_radians();
    let d_lat = (to.latitude() - from.latitude()).to_radians();
    let d_lon = (to.longitude() - from.longitude()).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Anything with a coordinate that can be radius-filtered.
pub trait Located {
    fn position(&self) -> GeoPoint;
}

impl Located for DisasterEvent {
    fn position(&self) -> GeoPoint {
        self.location
    }
}

impl Located for GeoPoint {
    fn position(&self) -> GeoPoint {
        *self
    }
}

/// Keeps records within `radius_km` of `center` (boundary inclusive),
/// preserving input order.
pub fn filter_within<T: Located>(records: Vec<T>, center: GeoPoint, radius_km: f64) -> Vec<T> {
    records
        .into_iter()
        .filter(|record| haversine_km(center, record.position()) <= radius_km + RADIUS_EPSILON_KM)
        .collect()
}

/// Box enclosing a circle. Longitudes wrap, so a box that crosses the
/// antimeridian has `min_longitude > max_longitude`; use [`Self::split`] to
/// get boxes a provider API accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub min_longitude: f64,
    pub max_latitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    pub fn around(center: GeoPoint, radius_km: f64) -> Self {
        let lat_delta = (radius_km / EARTH_RADIUS_KM).to_degrees();
        let min_latitude = (center.latitude() - lat_delta).max(-90.0);
        let max_latitude = (center.latitude() + lat_delta).min(90.0);

        let cos_lat = center.latitude().to_radians().cos().abs();
        let lon_delta = if cos_lat < 0.01 { 180.0 } else { lat_delta / cos_lat };
        // A circle over a pole spans every meridian.
        if lon_delta >= 180.0 || min_latitude <= -90.0 || max_latitude >= 90.0 {
            return Self {
                min_latitude,
                min_longitude: -180.0,
                max_latitude,
                max_longitude: 180.0,
            };
        }

        Self {
            min_latitude,
            min_longitude: wrap_longitude(center.longitude() - lon_delta),
            max_latitude,
            max_longitude: wrap_longitude(center.longitude() + lon_delta),
        }
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.min_longitude > self.max_longitude
    }

    /// One box, or two when the antimeridian cuts this one.
    pub fn split(self) -> Vec<Self> {
        if !self.crosses_antimeridian() {
            return vec![self];
        }
        vec![
            Self {
                max_longitude: 180.0,
                ..self
            },
            Self {
                min_longitude: -180.0,
                ..self
            },
        ]
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        let latitude_ok =
            point.latitude() >= self.min_latitude && point.latitude() <= self.max_latitude;
        let longitude = point.longitude();
        let longitude_ok = if self.crosses_antimeridian() {
            longitude >= self.min_longitude || longitude <= self.max_longitude
        } else {
            longitude >= self.min_longitude && longitude <= self.max_longitude
        };
        latitude_ok && longitude_ok
    }
}

fn wrap_longitude(longitude: f64) -> f64 {
    if longitude > 180.0 {
        longitude - 360.0
    } else if longitude < -180.0 {
        longitude + 360.0
    } else {
        longitude
    }
}
