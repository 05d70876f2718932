use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheMode;
use crate::domain::{DisasterEvent, ForecastDay, GeoPoint, WeatherAlert, WeatherReading};
use crate::provider_policy::ProviderPolicy;
use crate::{ProviderId, ValidationError};

pub const MAX_FORECAST_DAYS: u32 = 16;
pub const MAX_WINDOW_HOURS: u32 = 720;

/// Request type served by the orchestrator. Each kind has its own TTL and
/// provider chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    CurrentConditions,
    Forecast,
    WeatherAlerts,
    Earthquakes,
    Wildfires,
    SevereWeather,
    CivilUnrest,
    Traffic,
}

impl RequestKind {
    pub const ALL: [Self; 8] = [
        Self::CurrentConditions,
        Self::Forecast,
        Self::WeatherAlerts,
        Self::Earthquakes,
        Self::Wildfires,
        Self::SevereWeather,
        Self::CivilUnrest,
        Self::Traffic,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CurrentConditions => "current_conditions",
            Self::Forecast => "forecast",
            Self::WeatherAlerts => "weather_alerts",
            Self::Earthquakes => "earthquakes",
            Self::Wildfires => "wildfires",
            Self::SevereWeather => "severe_weather",
            Self::CivilUnrest => "civil_unrest",
            Self::Traffic => "traffic",
        }
    }

    /// Safety-critical kinds refresh faster.
    pub const fn default_ttl(self) -> Duration {
        let seconds = match self {
            Self::CurrentConditions => 10 * 60,
            Self::Forecast => 30 * 60,
            Self::WeatherAlerts | Self::Earthquakes | Self::SevereWeather => 5 * 60,
            Self::Wildfires | Self::CivilUnrest => 15 * 60,
            Self::Traffic => 2 * 60,
        };
        Duration::from_secs(seconds)
    }

    pub const fn requires_location(self) -> bool {
        matches!(
            self,
            Self::CurrentConditions | Self::Forecast | Self::WeatherAlerts | Self::Traffic
        )
    }

    pub const fn is_disaster(self) -> bool {
        matches!(
            self,
            Self::Earthquakes
                | Self::Wildfires
                | Self::SevereWeather
                | Self::CivilUnrest
                | Self::Traffic
        )
    }
}

impl Display for RequestKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ValidationError::InvalidRequestKind {
                value: value.to_owned(),
            })
    }
}

/// Kinds a provider adapter can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySet(&'static [RequestKind]);

impl CapabilitySet {
    pub const fn new(kinds: &'static [RequestKind]) -> Self {
        Self(kinds)
    }

    pub fn supports(self, kind: RequestKind) -> bool {
        self.0.contains(&kind)
    }

    pub const fn kinds(self) -> &'static [RequestKind] {
        self.0
    }
}

/// Options that shape a fetch. Every field except `cache_mode` is part of
/// the cache fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchOptions {
    pub days: Option<u32>,
    pub min_magnitude: Option<f64>,
    pub window_hours: Option<u32>,
    pub limit: Option<usize>,
    pub radius_km: Option<f64>,
    #[serde(default)]
    pub cache_mode: CacheMode,
}

impl FetchOptions {
    pub fn with_days(mut self, days: u32) -> Self {
        self.days = Some(days);
        self
    }

    pub fn with_min_magnitude(mut self, min_magnitude: f64) -> Self {
        self.min_magnitude = Some(min_magnitude);
        self
    }

    pub fn with_window_hours(mut self, window_hours: u32) -> Self {
        self.window_hours = Some(window_hours);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_radius_km(mut self, radius_km: f64) -> Self {
        self.radius_km = Some(radius_km);
        self
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(days) = self.days {
            if !(1..=MAX_FORECAST_DAYS).contains(&days) {
                return Err(ValidationError::InvalidForecastDays { value: days });
            }
        }
        if let Some(min_magnitude) = self.min_magnitude {
            if !min_magnitude.is_finite() {
                return Err(ValidationError::NonFiniteValue {
                    field: "min_magnitude",
                });
            }
        }
        if let Some(window_hours) = self.window_hours {
            if !(1..=MAX_WINDOW_HOURS).contains(&window_hours) {
                return Err(ValidationError::InvalidTimeWindow {
                    value: window_hours,
                });
            }
        }
        if self.limit == Some(0) {
            return Err(ValidationError::InvalidLimit);
        }
        if let Some(radius_km) = self.radius_km {
            if !radius_km.is_finite() || radius_km <= 0.0 {
                return Err(ValidationError::InvalidRadius { value: radius_km });
            }
        }
        Ok(())
    }

    fn fingerprint_fragment(&self) -> String {
        let mut parts = Vec::with_capacity(5);
        if let Some(days) = self.days {
            parts.push(format!("d={days}"));
        }
        if let Some(min_magnitude) = self.min_magnitude {
            parts.push(format!("m={min_magnitude}"));
        }
        if let Some(window_hours) = self.window_hours {
            parts.push(format!("w={window_hours}"));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("l={limit}"));
        }
        if let Some(radius_km) = self.radius_km {
            parts.push(format!("r={radius_km}"));
        }

        if parts.is_empty() {
            String::from("-")
        } else {
            parts.join(";")
        }
    }
}

/// A validated fetch request: kind, optional location and options.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub kind: RequestKind,
    pub location: Option<GeoPoint>,
    pub options: FetchOptions,
}

impl FetchRequest {
    pub fn new(
        kind: RequestKind,
        location: Option<GeoPoint>,
        options: FetchOptions,
    ) -> Result<Self, ValidationError> {
        if kind.requires_location() && location.is_none() {
            return Err(ValidationError::LocationRequired {
                kind: kind.as_str(),
            });
        }
        options.validate()?;

        Ok(Self {
            kind,
            location,
            options,
        })
    }

    pub fn at(kind: RequestKind, location: GeoPoint) -> Self {
        Self {
            kind,
            location: Some(location),
            options: FetchOptions::default(),
        }
    }

    /// Deterministic cache key: kind, coordinate rounded to four places and
    /// the material options.
    pub fn fingerprint(&self) -> String {
        let place = match self.location {
            Some(point) => {
                let (latitude, longitude) = point.rounded();
                format!("{latitude:.4}:{longitude:.4}")
            }
            None => String::from("global"),
        };
        format!(
            "{}:{}:{}",
            self.kind.as_str(),
            place,
            self.options.fingerprint_fragment()
        )
    }
}

/// Normalized provider output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Conditions(Box<WeatherReading>),
    Forecast(Vec<ForecastDay>),
    Alerts(Vec<WeatherAlert>),
    Events(Vec<DisasterEvent>),
}

impl Payload {
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Conditions(_) => "conditions",
            Self::Forecast(_) => "forecast",
            Self::Alerts(_) => "alerts",
            Self::Events(_) => "events",
        }
    }

    /// Whether this payload has the shape expected for `kind`.
    pub const fn satisfies(&self, kind: RequestKind) -> bool {
        match self {
            Self::Conditions(_) => matches!(kind, RequestKind::CurrentConditions),
            Self::Forecast(_) => matches!(kind, RequestKind::Forecast),
            Self::Alerts(_) => matches!(kind, RequestKind::WeatherAlerts),
            Self::Events(_) => kind.is_disaster(),
        }
    }

    pub fn into_reading(self) -> Option<WeatherReading> {
        match self {
            Self::Conditions(reading) => Some(*reading),
            _ => None,
        }
    }

    pub fn into_forecast(self) -> Option<Vec<ForecastDay>> {
        match self {
            Self::Forecast(days) => Some(days),
            _ => None,
        }
    }

    pub fn into_alerts(self) -> Option<Vec<WeatherAlert>> {
        match self {
            Self::Alerts(alerts) => Some(alerts),
            _ => None,
        }
    }

    pub fn into_events(self) -> Option<Vec<DisasterEvent>> {
        match self {
            Self::Events(events) => Some(events),
            _ => None,
        }
    }
}

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    Unavailable,
    Timeout,
    Malformed,
    RateLimited,
    InvalidRequest,
    UnsupportedKind,
    Internal,
}

/// Structured adapter failure consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Unavailable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Timeout, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Malformed, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::RateLimited, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::InvalidRequest, message)
    }

    pub fn unsupported_kind(kind: RequestKind) -> Self {
        Self::new(
            SourceErrorKind::UnsupportedKind,
            format!("request kind '{kind}' is not supported by this source"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Internal, message)
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::Timeout => "source.timeout",
            SourceErrorKind::Malformed => "source.malformed",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::UnsupportedKind => "source.unsupported_kind",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Provider adapter contract: one provider, one HTTP exchange per call, one
/// schema mapping. Adapters never retry; fallback belongs to the
/// orchestrator.
pub trait DataSource: Send + Sync {
    fn id(&self) -> ProviderId;

    fn capabilities(&self) -> CapabilitySet;

    /// Timeout, budget and endpoint settings for this adapter.
    fn policy(&self) -> &ProviderPolicy;

    /// Performs the provider call for `request` and maps the response into
    /// the normalized model.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport failure, non-success status or a
    /// response body that does not match the provider's schema.
    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> SourceFuture<'a, Payload>;

    /// Lightweight reachability probe used by health checks.
    fn probe<'a>(&'a self) -> SourceFuture<'a, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint::new(latitude, longitude).expect("valid point")
    }

    #[test]
    fn fingerprint_rounds_coordinates_to_four_places() {
        let a = FetchRequest::at(RequestKind::CurrentConditions, point(40.712_81, -74.006_04));
        let b = FetchRequest::at(RequestKind::CurrentConditions, point(40.712_84, -74.006_01));

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), "current_conditions:40.7128:-74.0060:-");
    }

    #[test]
    fn fingerprint_includes_material_options_but_not_cache_mode() {
        let base = FetchRequest::new(
            RequestKind::Earthquakes,
            None,
            FetchOptions::default().with_min_magnitude(4.5).with_limit(20),
        )
        .expect("valid request");
        let refreshed = FetchRequest {
            options: base.options.clone().with_cache_mode(CacheMode::Refresh),
            ..base.clone()
        };
        let other_limit = FetchRequest {
            options: base.options.clone().with_limit(21),
            ..base.clone()
        };

        assert_eq!(base.fingerprint(), "earthquakes:global:m=4.5;l=20");
        assert_eq!(base.fingerprint(), refreshed.fingerprint());
        assert_ne!(base.fingerprint(), other_limit.fingerprint());
    }

    #[test]
    fn weather_kinds_require_a_location() {
        let error = FetchRequest::new(RequestKind::Forecast, None, FetchOptions::default())
            .expect_err("forecast needs a point");
        assert_eq!(
            error,
            ValidationError::LocationRequired { kind: "forecast" }
        );

        assert!(FetchRequest::new(RequestKind::Wildfires, None, FetchOptions::default()).is_ok());
    }

    #[test]
    fn options_are_validated() {
        let bad_days = FetchOptions::default().with_days(17);
        assert!(matches!(
            bad_days.validate(),
            Err(ValidationError::InvalidForecastDays { value: 17 })
        ));
        assert_eq!(
            FetchOptions::default().with_limit(0).validate(),
            Err(ValidationError::InvalidLimit)
        );
        assert!(FetchOptions::default()
            .with_radius_km(-1.0)
            .validate()
            .is_err());
    }

    #[test]
    fn payload_shape_must_match_kind() {
        let events = Payload::Events(Vec::new());
        assert!(events.satisfies(RequestKind::Earthquakes));
        assert!(events.satisfies(RequestKind::Traffic));
        assert!(!events.satisfies(RequestKind::CurrentConditions));

        let alerts = Payload::Alerts(Vec::new());
        assert!(alerts.satisfies(RequestKind::WeatherAlerts));
        assert!(!alerts.satisfies(RequestKind::SevereWeather));
    }

    #[test]
    fn request_kind_round_trips_through_str() {
        for kind in RequestKind::ALL {
            assert_eq!(kind.as_str().parse::<RequestKind>(), Ok(kind));
        }
        assert_eq!("severe-weather".parse(), Ok(RequestKind::SevereWeather));
    }
}
