use serde::{Deserialize, Serialize};

use crate::domain::{GeoPoint, Severity, UtcDateTime};

pub const PLACEHOLDER_TEMPERATURE_F: f64 = 70.0;
pub const PLACEHOLDER_HUMIDITY_PCT: f64 = 50.0;
pub const PLACEHOLDER_PRESSURE_HPA: f64 = 1013.0;
pub const PLACEHOLDER_VISIBILITY_MI: f64 = 10.0;

/// Short condition classification plus provider wording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherCondition {
    pub code: String,
    pub description: String,
}

impl WeatherCondition {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }

    /// Builds a condition from free-form provider text.
    pub fn from_text(text: &str) -> Self {
        let description = text.trim();
        let description = if description.is_empty() {
            "Unknown"
        } else {
            description
        };
        Self::new(classify_condition(description), description)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherLocation {
    pub point: GeoPoint,
    pub name: String,
}

/// Point-in-time observation in imperial units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature_f: f64,
    pub feels_like_f: f64,
    pub humidity_pct: f64,
    pub pressure_hpa: f64,
    pub visibility_mi: f64,
    pub wind_speed_mph: f64,
    pub wind_direction_deg: Option<f64>,
    pub condition: WeatherCondition,
    pub observed_at: UtcDateTime,
    /// Names of fields the provider left empty and that carry a placeholder.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub substitutes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: String,
    pub high_f: f64,
    pub low_f: f64,
    pub condition: WeatherCondition,
    pub precipitation_chance_pct: Option<f64>,
    pub max_wind_mph: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Weather,
    /// Synthesized by the engine itself, e.g. to announce degraded data.
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub id: String,
    pub kind: AlertKind,
    pub event: String,
    pub severity: Severity,
    pub headline: String,
    pub description: String,
    pub starts_at: Option<UtcDateTime>,
    pub ends_at: Option<UtcDateTime>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub location: WeatherLocation,
    pub current: CurrentConditions,
    #[serde(default)]
    pub forecast: Vec<ForecastDay>,
    #[serde(default)]
    pub alerts: Vec<WeatherAlert>,
}

/// Tracks which reading fields fell back to placeholders while mapping a
/// provider response.
#[derive(Debug, Default)]
pub(crate) struct ReadingFields {
    substitutes: Vec<String>,
}

impl ReadingFields {
    pub(crate) fn take(&mut self, field: &'static str, value: Option<f64>, fallback: f64) -> f64 {
        match value.filter(|value| value.is_finite()) {
            Some(value) => value,
            None => {
                self.substitutes.push(field.to_owned());
                fallback
            }
        }
    }

    pub(crate) fn into_substitutes(self) -> Vec<String> {
        self.substitutes
    }
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn kph_to_mph(kph: f64) -> f64 {
    kph * 0.621_371
}

pub fn meters_to_miles(meters: f64) -> f64 {
    meters / 1_609.344
}

pub fn pascals_to_hpa(pascals: f64) -> f64 {
    pascals / 100.0
}

/// Maps free-form condition wording onto a short code.
pub fn classify_condition(text: &str) -> &'static str {
    let text = text.to_ascii_lowercase();
    let rules: [(&[&str], &'static str); 8] = [
        (&["snow", "sleet", "blizzard", "flurr"], "snow"),
        (&["thunder", "storm"], "thunderstorm"),
        (&["drizzle"], "drizzle"),
        (&["rain", "shower"], "rain"),
        (&["fog", "mist", "haze", "smoke"], "fog"),
        (&["overcast", "cloud"], "cloudy"),
        (&["clear", "sunny", "fair"], "clear"),
        (&["wind", "breez"], "windy"),
    ];

    rules
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| text.contains(needle)))
        .map_or("unknown", |(_, code)| *code)
}

/// WMO weather interpretation codes used by Open-Meteo.
pub fn wmo_condition(code: i64) -> WeatherCondition {
    let (short, description) = match code {
        0 => ("clear", "Clear sky"),
        1 | 2 => ("cloudy", "Partly cloudy"),
        3 => ("cloudy", "Overcast"),
        45 | 48 => ("fog", "Fog"),
        51 | 53 | 55 | 56 | 57 => ("drizzle", "Drizzle"),
        61 | 63 | 65 | 66 | 67 | 80 | 81 | 82 => ("rain", "Rain"),
        71 | 73 | 75 | 77 | 85 | 86 => ("snow", "Snow"),
        95 | 96 | 99 => ("thunderstorm", "Thunderstorm"),
        _ => ("unknown", "Unknown"),
    };
    WeatherCondition::new(short, description)
}
