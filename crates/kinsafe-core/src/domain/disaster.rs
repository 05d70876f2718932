use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{GeoPoint, UtcDateTime};
use crate::{ProviderId, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisasterCategory {
    Earthquake,
    Fire,
    Flood,
    Storm,
    Traffic,
    CivilUnrest,
    Other,
}

impl DisasterCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Earthquake => "earthquake",
            Self::Fire => "fire",
            Self::Flood => "flood",
            Self::Storm => "storm",
            Self::Traffic => "traffic",
            Self::CivilUnrest => "civil-unrest",
            Self::Other => "other",
        }
    }
}

impl Display for DisasterCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisasterCategory {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "earthquake" => Ok(Self::Earthquake),
            "fire" | "wildfire" => Ok(Self::Fire),
            "flood" => Ok(Self::Flood),
            "storm" => Ok(Self::Storm),
            "traffic" => Ok(Self::Traffic),
            "civil-unrest" | "civil_unrest" => Ok(Self::CivilUnrest),
            "other" => Ok(Self::Other),
            _ => Err(ValidationError::InvalidCategory {
                value: value.to_owned(),
            }),
        }
    }
}

/// Severity tier, ordered `Minor < Moderate < Severe < Extreme`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Moderate,
    Severe,
    Extreme,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
            Self::Extreme => "extreme",
        }
    }

    /// Lenient mapping for provider severity labels; unknown labels are minor.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(Self::Minor)
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "minor" => Ok(Self::Minor),
            "moderate" => Ok(Self::Moderate),
            "severe" => Ok(Self::Severe),
            "extreme" => Ok(Self::Extreme),
            _ => Err(ValidationError::InvalidSeverity {
                value: value.to_owned(),
            }),
        }
    }
}

/// One discrete hazard occurrence reported by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisasterEvent {
    /// Provider-stable identifier, unique per source.
    pub id: String,
    pub category: DisasterCategory,
    pub severity: Severity,
    pub title: String,
    pub description: Option<String>,
    pub location: GeoPoint,
    pub radius_km: f64,
    pub started_at: UtcDateTime,
    pub ended_at: Option<UtcDateTime>,
    pub source: ProviderId,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<f64>,
}

/// Severity and affected radius derived from an earthquake magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuakeImpact {
    pub severity: Severity,
    pub radius_km: f64,
}

/// Single monotonic magnitude table used for both severity and radius.
pub fn earthquake_impact(magnitude: f64) -> QuakeImpact {
    let (severity, radius_km) = if magnitude >= 8.0 {
        (Severity::Extreme, 1_000.0)
    } else if magnitude >= 7.0 {
        (Severity::Severe, 500.0)
    } else if magnitude >= 6.0 {
        (Severity::Moderate, 200.0)
    } else if magnitude >= 5.0 {
        (Severity::Moderate, 100.0)
    } else if magnitude >= 4.0 {
        (Severity::Minor, 50.0)
    } else {
        (Severity::Minor, 25.0)
    };

    QuakeImpact {
        severity,
        radius_km,
    }
}

/// An earthquake counts as active for 24 hours after it occurred.
pub fn earthquake_is_active(occurred_at: UtcDateTime, now: UtcDateTime) -> bool {
    now.since(occurred_at).whole_seconds() <= 24 * 60 * 60
}

pub fn fire_radius_km(acres: f64) -> f64 {
    if acres > 10_000.0 {
        50.0
    } else if acres > 1_000.0 {
        20.0
    } else if acres > 100.0 {
        10.0
    } else {
        5.0
    }
}

pub fn fire_severity(acres: f64) -> Severity {
    if acres > 100_000.0 {
        Severity::Extreme
    } else if acres > 10_000.0 {
        Severity::Severe
    } else if acres > 1_000.0 {
        Severity::Moderate
    } else {
        Severity::Minor
    }
}

pub fn traffic_radius_km(severity: Severity) -> f64 {
    match severity {
        Severity::Extreme => 10.0,
        Severity::Severe => 5.0,
        Severity::Moderate => 3.0,
        Severity::Minor => 1.0,
    }
}

/// Radius for area alerts that carry no explicit footprint.
pub fn alert_radius_km(severity: Severity) -> f64 {
    match severity {
        Severity::Extreme => 100.0,
        Severity::Severe => 50.0,
        Severity::Moderate => 25.0,
        Severity::Minor => 10.0,
    }
}

/// Buckets a weather alert's event name into a hazard category.
pub fn categorize_alert_event(event: &str) -> DisasterCategory {
    let event = event.to_ascii_lowercase();
    if event.contains("flood") {
        DisasterCategory::Flood
    } else if event.contains("fire") || event.contains("red flag") {
        DisasterCategory::Fire
    } else if [
        "tornado",
        "thunderstorm",
        "hurricane",
        "tropical",
        "storm",
        "wind",
        "blizzard",
        "winter",
    ]
    .iter()
    .any(|needle| event.contains(needle))
    {
        DisasterCategory::Storm
    } else {
        DisasterCategory::Other
    }
}
