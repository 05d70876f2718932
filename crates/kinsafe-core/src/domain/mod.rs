mod disaster;
mod geo;
mod timestamp;
mod weather;

pub use disaster::{
    alert_radius_km, categorize_alert_event, earthquake_impact, earthquake_is_active,
    fire_radius_km, fire_severity, traffic_radius_km, DisasterCategory, DisasterEvent,
    QuakeImpact, Severity,
};
pub use geo::GeoPoint;
pub use timestamp::UtcDateTime;
pub use weather::{
    celsius_to_fahrenheit, classify_condition, kph_to_mph, meters_to_miles, pascals_to_hpa,
    wmo_condition, AlertKind, CurrentConditions, ForecastDay, WeatherAlert, WeatherCondition,
    WeatherLocation, WeatherReading, PLACEHOLDER_HUMIDITY_PCT, PLACEHOLDER_PRESSURE_HPA,
    PLACEHOLDER_TEMPERATURE_F, PLACEHOLDER_VISIBILITY_MI,
};

pub(crate) use weather::ReadingFields;
