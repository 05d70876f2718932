use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::{cover_days, fetch_json, probe_point, require_location, send};
use crate::data_source::{
    CapabilitySet, DataSource, FetchRequest, Payload, RequestKind, SourceError, SourceFuture,
};
use crate::domain::{
    meters_to_miles, wmo_condition, CurrentConditions, ForecastDay, GeoPoint, ReadingFields,
    UtcDateTime, WeatherLocation, WeatherReading, PLACEHOLDER_HUMIDITY_PCT,
    PLACEHOLDER_PRESSURE_HPA, PLACEHOLDER_TEMPERATURE_F, PLACEHOLDER_VISIBILITY_MI,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::ProviderId;

const CAPABILITIES: CapabilitySet =
    CapabilitySet::new(&[RequestKind::CurrentConditions, RequestKind::Forecast]);

const CURRENT_FIELDS: &str = "temperature_2m,apparent_temperature,relative_humidity_2m,\
surface_pressure,wind_speed_10m,wind_direction_10m,weather_code,visibility";
const DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min,\
precipitation_probability_max,wind_speed_10m_max";

/// Open-Meteo forecast API. Keyless, global, WMO condition codes.
pub struct OpenMeteoAdapter {
    http_client: Arc<dyn HttpClient>,
    policy: ProviderPolicy,
}

impl OpenMeteoAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, policy: ProviderPolicy) -> Self {
        Self {
            http_client,
            policy,
        }
    }

    fn request(&self, point: GeoPoint) -> HttpRequest {
        HttpRequest::get(self.policy.endpoint("forecast"))
            .with_query("latitude", point.latitude().to_string())
            .with_query("longitude", point.longitude().to_string())
            .with_query("temperature_unit", "fahrenheit")
            .with_query("wind_speed_unit", "mph")
            .with_query("timezone", "UTC")
            .with_timeout(self.policy.timeout)
    }
}

impl DataSource for OpenMeteoAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    fn capabilities(&self) -> CapabilitySet {
        CAPABILITIES
    }

    fn policy(&self) -> &ProviderPolicy {
        &self.policy
    }

    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> SourceFuture<'a, Payload> {
        Box::pin(async move {
            let client = self.http_client.as_ref();
            match request.kind {
                RequestKind::CurrentConditions => {
                    let point = require_location(request)?;
                    let body: OmCurrentResponse = fetch_json(
                        client,
                        self.request(point).with_query("current", CURRENT_FIELDS),
                    )
                    .await?;
                    Ok(Payload::Conditions(Box::new(map_current(body.current, point))))
                }
                RequestKind::Forecast => {
                    let point = require_location(request)?;
                    let days = request.options.days.unwrap_or(7);
                    let body: OmDailyResponse = fetch_json(
                        client,
                        self.request(point)
                            .with_query("daily", DAILY_FIELDS)
                            .with_query("forecast_days", days.to_string()),
                    )
                    .await?;
                    let days = map_daily(body.daily)?;
                    cover_days(days, request.options.days).map(Payload::Forecast)
                }
                other => Err(SourceError::unsupported_kind(other)),
            }
        })
    }

    fn probe<'a>(&'a self) -> SourceFuture<'a, ()> {
        Box::pin(async move {
            let request = self
                .request(probe_point()?)
                .with_query("current", "temperature_2m");
            send(self.http_client.as_ref(), request).await.map(|_| ())
        })
    }
}

#[derive(Debug, Deserialize)]
struct OmCurrentResponse {
    current: OmCurrent,
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    time: Option<String>,
    temperature_2m: Option<f64>,
    apparent_temperature: Option<f64>,
    relative_humidity_2m: Option<f64>,
    surface_pressure: Option<f64>,
    wind_speed_10m: Option<f64>,
    wind_direction_10m: Option<f64>,
    weather_code: Option<i64>,
    visibility: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OmDailyResponse {
    daily: OmDaily,
}

/// Column-oriented daily series; every array is indexed by `time`.
#[derive(Debug, Deserialize)]
struct OmDaily {
    time: Vec<String>,
    #[serde(default)]
    weather_code: Vec<Option<i64>>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
}

fn map_current(current: OmCurrent, point: GeoPoint) -> WeatherReading {
    let mut fields = ReadingFields::default();
    let temperature_f = fields.take(
        "temperature_f",
        current.temperature_2m,
        PLACEHOLDER_TEMPERATURE_F,
    );
    let feels_like_f = fields.take("feels_like_f", current.apparent_temperature, temperature_f);
    let humidity_pct = fields.take(
        "humidity_pct",
        current.relative_humidity_2m,
        PLACEHOLDER_HUMIDITY_PCT,
    );
    let pressure_hpa = fields.take(
        "pressure_hpa",
        current.surface_pressure,
        PLACEHOLDER_PRESSURE_HPA,
    );
    let visibility_mi = fields.take(
        "visibility_mi",
        current.visibility.map(meters_to_miles),
        PLACEHOLDER_VISIBILITY_MI,
    );
    let wind_speed_mph = fields.take("wind_speed_mph", current.wind_speed_10m, 0.0);

    WeatherReading {
        location: WeatherLocation {
            point,
            name: point.to_string(),
        },
        current: CurrentConditions {
            temperature_f,
            feels_like_f,
            humidity_pct,
            pressure_hpa,
            visibility_mi,
            wind_speed_mph,
            wind_direction_deg: current.wind_direction_10m,
            condition: wmo_condition(current.weather_code.unwrap_or(-1)),
            observed_at: current
                .time
                .as_deref()
                .and_then(|value| UtcDateTime::parse_lenient(value).ok())
                .unwrap_or_else(UtcDateTime::now),
            substitutes: fields.into_substitutes(),
        },
        forecast: Vec::new(),
        alerts: Vec::new(),
    }
}

fn map_daily(daily: OmDaily) -> Result<Vec<ForecastDay>, SourceError> {
    let column = |values: &[Option<f64>], index: usize| values.get(index).copied().flatten();

    daily
        .time
        .iter()
        .enumerate()
        .map(|(index, date)| {
            let (Some(high_f), Some(low_f)) = (
                column(&daily.temperature_2m_max, index),
                column(&daily.temperature_2m_min, index),
            ) else {
                return Err(SourceError::malformed(format!(
                    "daily series has no temperature range for {date}"
                )));
            };

            Ok(ForecastDay {
                date: date.clone(),
                high_f,
                low_f,
                condition: wmo_condition(
                    daily.weather_code.get(index).copied().flatten().unwrap_or(-1),
                ),
                precipitation_chance_pct: column(&daily.precipitation_probability_max, index),
                max_wind_mph: column(&daily.wind_speed_10m_max, index),
            })
        })
        .collect()
}
