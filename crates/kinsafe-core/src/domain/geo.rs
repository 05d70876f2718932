use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Validated WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    pub const ORIGIN: Self = Self {
        latitude: 0.0,
        longitude: 0.0,
    };

    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        if !latitude.is_finite() {
            return Err(ValidationError::NonFiniteValue { field: "latitude" });
        }
        if !longitude.is_finite() {
            return Err(ValidationError::NonFiniteValue { field: "longitude" });
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::InvalidLatitude { value: latitude });
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::InvalidLongitude { value: longitude });
        }

        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub const fn latitude(self) -> f64 {
        self.latitude
    }

    pub const fn longitude(self) -> f64 {
        self.longitude
    }

    /// Coordinate rounded to four decimal places (~11m), with negative zero
    /// folded into zero so equivalent points share a key.
    pub fn rounded(self) -> (f64, f64) {
        (round4(self.latitude), round4(self.longitude))
    }
}

impl Display for GeoPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4},{:.4}", self.latitude, self.longitude)
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0 + 0.0
}
