use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::{cover_days, fetch_json, probe_point, require_location, send};
use crate::data_source::{
    CapabilitySet, DataSource, FetchRequest, Payload, RequestKind, SourceError, SourceFuture,
};
use crate::domain::{
    classify_condition, meters_to_miles, CurrentConditions, ForecastDay, GeoPoint,
    ReadingFields, UtcDateTime, WeatherCondition, WeatherLocation, WeatherReading,
    PLACEHOLDER_HUMIDITY_PCT, PLACEHOLDER_PRESSURE_HPA, PLACEHOLDER_TEMPERATURE_F,
    PLACEHOLDER_VISIBILITY_MI,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::ProviderId;

const CAPABILITIES: CapabilitySet =
    CapabilitySet::new(&[RequestKind::CurrentConditions, RequestKind::Forecast]);

/// OpenWeatherMap 2.5 API (imperial units).
pub struct OpenWeatherMapAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    policy: ProviderPolicy,
}

impl OpenWeatherMapAdapter {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        policy: ProviderPolicy,
    ) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            policy,
        }
    }

    fn request(&self, path: &str, point: GeoPoint) -> HttpRequest {
        HttpRequest::get(self.policy.endpoint(path))
            .with_query("lat", point.latitude().to_string())
            .with_query("lon", point.longitude().to_string())
            .with_query("units", "imperial")
            .with_query("appid", &self.api_key)
            .with_timeout(self.policy.timeout)
    }

    async fn current(&self, point: GeoPoint) -> Result<Payload, SourceError> {
        let body: OwmCurrent =
            fetch_json(self.http_client.as_ref(), self.request("weather", point)).await?;
        Ok(Payload::Conditions(Box::new(map_current(body, point))))
    }

    /// The 2.5 feed spans five days in 3-hour slots; longer requests fail
    /// so a provider with a longer horizon can answer.
    async fn forecast(&self, point: GeoPoint, days: Option<u32>) -> Result<Payload, SourceError> {
        let body: OwmForecast =
            fetch_json(self.http_client.as_ref(), self.request("forecast", point)).await?;
        let mapped = map_forecast(body, days.map_or(5, |days| days as usize));
        cover_days(mapped, days).map(Payload::Forecast)
    }
}

impl DataSource for OpenWeatherMapAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeatherMap
    }

    fn capabilities(&self) -> CapabilitySet {
        CAPABILITIES
    }

    fn policy(&self) -> &ProviderPolicy {
        &self.policy
    }

    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> SourceFuture<'a, Payload> {
        Box::pin(async move {
            match request.kind {
                RequestKind::CurrentConditions => self.current(require_location(request)?).await,
                RequestKind::Forecast => {
                    self.forecast(require_location(request)?, request.options.days)
                        .await
                }
                other => Err(SourceError::unsupported_kind(other)),
            }
        })
    }

    fn probe<'a>(&'a self) -> SourceFuture<'a, ()> {
        Box::pin(async move {
            send(
                self.http_client.as_ref(),
                self.request("weather", probe_point()?),
            )
            .await
            .map(|_| ())
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwmCurrent {
    name: Option<String>,
    main: OwmMain,
    visibility: Option<f64>,
    wind: Option<OwmWind>,
    #[serde(default)]
    weather: Vec<OwmWeather>,
    dt: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: Option<f64>,
    feels_like: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: Option<f64>,
    deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmWeather {
    main: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwmForecast {
    list: Vec<OwmSlot>,
}

#[derive(Debug, Deserialize)]
struct OwmSlot {
    dt: i64,
    main: OwmSlotMain,
    #[serde(default)]
    weather: Vec<OwmWeather>,
    pop: Option<f64>,
    wind: Option<OwmWind>,
}

#[derive(Debug, Deserialize)]
struct OwmSlotMain {
    temp_min: f64,
    temp_max: f64,
}

fn condition_of(weather: &[OwmWeather]) -> WeatherCondition {
    weather.first().map_or_else(
        || WeatherCondition::from_text(""),
        |entry| WeatherCondition::new(classify_condition(&entry.main), entry.description.clone()),
    )
}

fn map_current(body: OwmCurrent, point: GeoPoint) -> WeatherReading {
    let mut fields = ReadingFields::default();
    let temperature_f = fields.take("temperature_f", body.main.temp, PLACEHOLDER_TEMPERATURE_F);
    let feels_like_f = fields.take("feels_like_f", body.main.feels_like, temperature_f);
    let humidity_pct = fields.take("humidity_pct", body.main.humidity, PLACEHOLDER_HUMIDITY_PCT);
    let pressure_hpa = fields.take("pressure_hpa", body.main.pressure, PLACEHOLDER_PRESSURE_HPA);
    let visibility_mi = fields.take(
        "visibility_mi",
        body.visibility.map(meters_to_miles),
        PLACEHOLDER_VISIBILITY_MI,
    );
    let wind_speed_mph = fields.take(
        "wind_speed_mph",
        body.wind.as_ref().and_then(|wind| wind.speed),
        0.0,
    );

    let observed_at = body
        .dt
        .and_then(|seconds| UtcDateTime::from_unix_seconds(seconds).ok())
        .unwrap_or_else(UtcDateTime::now);

    WeatherReading {
        location: WeatherLocation {
            point,
            name: body
                .name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| point.to_string()),
        },
        current: CurrentConditions {
            temperature_f,
            feels_like_f,
            humidity_pct,
            pressure_hpa,
            visibility_mi,
            wind_speed_mph,
            wind_direction_deg: body.wind.and_then(|wind| wind.deg),
            condition: condition_of(&body.weather),
            observed_at,
            substitutes: fields.into_substitutes(),
        },
        forecast: Vec::new(),
        alerts: Vec::new(),
    }
}

#[derive(Debug)]
struct DayAccumulator {
    high_f: f64,
    low_f: f64,
    precipitation_chance: Option<f64>,
    max_wind_mph: Option<f64>,
    condition: WeatherCondition,
    /// Hours between the chosen condition's slot and 12:00 UTC.
    condition_distance: u8,
}

/// Folds three-hourly slots into per-day summaries. The day's condition is
/// taken from the slot closest to 12:00 UTC.
fn map_forecast(body: OwmForecast, days: usize) -> Vec<ForecastDay> {
    let mut by_date: BTreeMap<String, DayAccumulator> = BTreeMap::new();

    for slot in body.list {
        let Ok(at) = UtcDateTime::from_unix_seconds(slot.dt) else {
            continue;
        };
        let distance = at.into_inner().hour().abs_diff(12);
        let condition = condition_of(&slot.weather);
        let wind = slot.wind.and_then(|wind| wind.speed);

        by_date
            .entry(at.date_string())
            .and_modify(|day| {
                day.high_f = day.high_f.max(slot.main.temp_max);
                day.low_f = day.low_f.min(slot.main.temp_min);
                day.precipitation_chance = max_option(day.precipitation_chance, slot.pop);
                day.max_wind_mph = max_option(day.max_wind_mph, wind);
                if distance < day.condition_distance {
                    day.condition = condition.clone();
                    day.condition_distance = distance;
                }
            })
            .or_insert_with(|| DayAccumulator {
                high_f: slot.main.temp_max,
                low_f: slot.main.temp_min,
                precipitation_chance: slot.pop,
                max_wind_mph: wind,
                condition: condition.clone(),
                condition_distance: distance,
            });
    }

    by_date
        .into_iter()
        .take(days)
        .map(|(date, day)| ForecastDay {
            date,
            high_f: day.high_f,
            low_f: day.low_f,
            condition: day.condition,
            precipitation_chance_pct: day.precipitation_chance.map(|pop| pop * 100.0),
            max_wind_mph: day.max_wind_mph,
        })
        .collect()
}

fn max_option(current: Option<f64>, candidate: Option<f64>) -> Option<f64> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
