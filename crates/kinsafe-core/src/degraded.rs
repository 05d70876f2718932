//! Placeholder payloads returned when no provider can serve a request.

use serde::Serialize;

use crate::data_source::{FetchRequest, Payload, RequestKind};
use crate::domain::{
    AlertKind, CurrentConditions, ForecastDay, GeoPoint, Severity, UtcDateTime, WeatherAlert,
    WeatherCondition, WeatherLocation, WeatherReading, PLACEHOLDER_HUMIDITY_PCT,
    PLACEHOLDER_PRESSURE_HPA, PLACEHOLDER_TEMPERATURE_F, PLACEHOLDER_VISIBILITY_MI,
};

pub const UNAVAILABLE_CONDITION: &str = "unavailable";

const DEFAULT_PLACEHOLDER_DAYS: u32 = 5;

/// Why a fetch fell back to synthesized data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedReason {
    /// Reachability reported no network; no provider was contacted.
    Offline,
    /// Every provider in the chain was attempted and failed.
    Exhausted,
    /// Every provider was skipped by its rate budget.
    RateLimited,
    /// No configured provider serves this request kind.
    NoProviders,
}

impl DegradedReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Exhausted => "exhausted",
            Self::RateLimited => "rate_limited",
            Self::NoProviders => "no_providers",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DegradedNotice {
    pub reason: DegradedReason,
    pub message: String,
}

impl DegradedNotice {
    /// Renders the user-facing message from the reason and the accumulated
    /// `"{Provider}: {message}"` errors.
    pub fn new(kind: RequestKind, reason: DegradedReason, errors: &[String]) -> Self {
        let subject = subject(kind);
        let message = match reason {
            DegradedReason::Offline => {
                format!("{subject} unavailable: network is offline")
            }
            DegradedReason::NoProviders => {
                format!("{subject} unavailable: no provider is configured for this request")
            }
            DegradedReason::RateLimited => {
                format!("{subject} unavailable: every provider is over its rate limit")
            }
            DegradedReason::Exhausted if errors.is_empty() => {
                format!("{subject} unavailable: all providers failed")
            }
            DegradedReason::Exhausted => {
                format!(
                    "{subject} unavailable: all providers failed ({})",
                    errors.join("; ")
                )
            }
        };

        Self { reason, message }
    }
}

fn subject(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::CurrentConditions => "Current conditions",
        RequestKind::Forecast => "Forecast",
        RequestKind::WeatherAlerts => "Weather alerts",
        RequestKind::Earthquakes => "Earthquake data",
        RequestKind::Wildfires => "Wildfire data",
        RequestKind::SevereWeather => "Severe weather data",
        RequestKind::CivilUnrest => "Civil unrest data",
        RequestKind::Traffic => "Traffic data",
    }
}

/// Builds the placeholder payload for `request`. Disaster kinds get an empty
/// list rather than invented hazards.
pub fn synthesize(request: &FetchRequest, notice: &DegradedNotice) -> Payload {
    let now = UtcDateTime::now();
    match request.kind {
        RequestKind::CurrentConditions => Payload::Conditions(Box::new(placeholder_reading(
            request.location,
            notice,
            now,
        ))),
        RequestKind::Forecast => Payload::Forecast(placeholder_forecast(
            request.options.days.unwrap_or(DEFAULT_PLACEHOLDER_DAYS),
            notice,
            now,
        )),
        RequestKind::WeatherAlerts => Payload::Alerts(vec![system_alert(notice, now)]),
        RequestKind::Earthquakes
        | RequestKind::Wildfires
        | RequestKind::SevereWeather
        | RequestKind::CivilUnrest
        | RequestKind::Traffic => Payload::Events(Vec::new()),
    }
}

fn system_alert(notice: &DegradedNotice, now: UtcDateTime) -> WeatherAlert {
    WeatherAlert {
        id: format!("system-{}-{}", notice.reason.as_str(), now.into_inner().unix_timestamp()),
        kind: AlertKind::System,
        event: String::from("Data Unavailable"),
        severity: Severity::Minor,
        headline: String::from("Live weather data is temporarily unavailable"),
        description: notice.message.clone(),
        starts_at: Some(now),
        ends_at: None,
        source: String::from("system"),
    }
}

fn placeholder_reading(
    location: Option<GeoPoint>,
    notice: &DegradedNotice,
    now: UtcDateTime,
) -> WeatherReading {
    let point = location.unwrap_or(GeoPoint::ORIGIN);

    WeatherReading {
        location: WeatherLocation {
            point,
            name: point.to_string(),
        },
        current: CurrentConditions {
            temperature_f: PLACEHOLDER_TEMPERATURE_F,
            feels_like_f: PLACEHOLDER_TEMPERATURE_F,
            humidity_pct: PLACEHOLDER_HUMIDITY_PCT,
            pressure_hpa: PLACEHOLDER_PRESSURE_HPA,
            visibility_mi: PLACEHOLDER_VISIBILITY_MI,
            wind_speed_mph: 0.0,
            wind_direction_deg: None,
            condition: WeatherCondition::new(UNAVAILABLE_CONDITION, notice.message.clone()),
            observed_at: now,
            substitutes: Vec::new(),
        },
        forecast: Vec::new(),
        alerts: vec![system_alert(notice, now)],
    }
}

fn placeholder_forecast(days: u32, notice: &DegradedNotice, now: UtcDateTime) -> Vec<ForecastDay> {
    (0..days)
        .map(|offset| ForecastDay {
            date: now
                .into_inner()
                .checked_add(time::Duration::days(i64::from(offset)))
                .and_then(|at| UtcDateTime::from_offset_datetime(at).ok())
                .unwrap_or(now)
                .date_string(),
            high_f: PLACEHOLDER_TEMPERATURE_F,
            low_f: PLACEHOLDER_TEMPERATURE_F,
            condition: WeatherCondition::new(UNAVAILABLE_CONDITION, notice.message.clone()),
            precipitation_chance_pct: None,
            max_wind_mph: None,
        })
        .collect()
}
