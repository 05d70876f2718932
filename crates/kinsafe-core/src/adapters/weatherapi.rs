use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::{cover_days, fetch_json, probe_point, require_location, send, slug};
use crate::data_source::{
    CapabilitySet, DataSource, FetchRequest, Payload, RequestKind, SourceError, SourceFuture,
};
use crate::domain::{
    AlertKind, CurrentConditions, ForecastDay, GeoPoint, ReadingFields, Severity, UtcDateTime,
    WeatherAlert, WeatherCondition, WeatherLocation, WeatherReading, PLACEHOLDER_HUMIDITY_PCT,
    PLACEHOLDER_PRESSURE_HPA, PLACEHOLDER_TEMPERATURE_F, PLACEHOLDER_VISIBILITY_MI,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::ProviderId;

const CAPABILITIES: CapabilitySet = CapabilitySet::new(&[
    RequestKind::CurrentConditions,
    RequestKind::Forecast,
    RequestKind::WeatherAlerts,
]);

/// WeatherAPI.com v1: current, forecast and alerts keyed by `lat,lon`.
pub struct WeatherApiAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    policy: ProviderPolicy,
}

impl WeatherApiAdapter {
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
            .with_query("key", &self.api_key)
            .with_query("q", format!("{},{}", point.latitude(), point.longitude()))
            .with_timeout(self.policy.timeout)
    }
}

impl DataSource for WeatherApiAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::WeatherApi
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
                    let body: WapiCurrentResponse =
                        fetch_json(client, self.request("current.json", point)).await?;
                    Ok(Payload::Conditions(Box::new(map_current(body, point))))
                }
                RequestKind::Forecast => {
                    let point = require_location(request)?;
                    let days = request.options.days.unwrap_or(3);
                    let http_request = self
                        .request("forecast.json", point)
                        .with_query("days", days.to_string())
                        .with_query("alerts", "no");
                    let body: WapiForecastResponse = fetch_json(client, http_request).await?;
                    cover_days(map_forecast(body), request.options.days).map(Payload::Forecast)
                }
                RequestKind::WeatherAlerts => {
                    let point = require_location(request)?;
                    let body: WapiAlertsResponse =
                        fetch_json(client, self.request("alerts.json", point)).await?;
                    Ok(Payload::Alerts(map_alerts(body)))
                }
                other => Err(SourceError::unsupported_kind(other)),
            }
        })
    }

    fn probe<'a>(&'a self) -> SourceFuture<'a, ()> {
        Box::pin(async move {
            send(
                self.http_client.as_ref(),
                self.request("current.json", probe_point()?),
            )
            .await
            .map(|_| ())
        })
    }
}

#[derive(Debug, Deserialize)]
struct WapiCurrentResponse {
    location: Option<WapiLocation>,
    current: WapiCurrent,
}

#[derive(Debug, Deserialize)]
struct WapiLocation {
    name: Option<String>,
    region: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WapiCurrent {
    temp_f: Option<f64>,
    feelslike_f: Option<f64>,
    humidity: Option<f64>,
    pressure_mb: Option<f64>,
    vis_miles: Option<f64>,
    wind_mph: Option<f64>,
    wind_degree: Option<f64>,
    condition: Option<WapiCondition>,
    last_updated_epoch: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WapiCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WapiForecastResponse {
    forecast: WapiForecast,
}

#[derive(Debug, Deserialize)]
struct WapiForecast {
    forecastday: Vec<WapiForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WapiForecastDay {
    date: String,
    day: WapiDay,
}

#[derive(Debug, Deserialize)]
struct WapiDay {
    maxtemp_f: f64,
    mintemp_f: f64,
    maxwind_mph: Option<f64>,
    daily_chance_of_rain: Option<f64>,
    condition: Option<WapiCondition>,
}

#[derive(Debug, Deserialize)]
struct WapiAlertsResponse {
    alerts: WapiAlerts,
}

#[derive(Debug, Deserialize)]
struct WapiAlerts {
    #[serde(default)]
    alert: Vec<WapiAlert>,
}

#[derive(Debug, Deserialize)]
struct WapiAlert {
    headline: Option<String>,
    severity: Option<String>,
    event: Option<String>,
    effective: Option<String>,
    expires: Option<String>,
    desc: Option<String>,
}

fn condition_of(condition: Option<&WapiCondition>) -> WeatherCondition {
    WeatherCondition::from_text(condition.map_or("", |condition| condition.text.as_str()))
}

fn map_current(body: WapiCurrentResponse, point: GeoPoint) -> WeatherReading {
    let current = body.current;
    let mut fields = ReadingFields::default();
    let temperature_f = fields.take("temperature_f", current.temp_f, PLACEHOLDER_TEMPERATURE_F);
    let feels_like_f = fields.take("feels_like_f", current.feelslike_f, temperature_f);
    let humidity_pct = fields.take("humidity_pct", current.humidity, PLACEHOLDER_HUMIDITY_PCT);
    let pressure_hpa = fields.take("pressure_hpa", current.pressure_mb, PLACEHOLDER_PRESSURE_HPA);
    let visibility_mi = fields.take("visibility_mi", current.vis_miles, PLACEHOLDER_VISIBILITY_MI);
    let wind_speed_mph = fields.take("wind_speed_mph", current.wind_mph, 0.0);

    let name = body
        .location
        .and_then(|location| match (location.name, location.region) {
            (Some(name), Some(region)) if !region.is_empty() => Some(format!("{name}, {region}")),
            (name, _) => name,
        })
        .unwrap_or_else(|| point.to_string());

    WeatherReading {
        location: WeatherLocation { point, name },
        current: CurrentConditions {
            temperature_f,
            feels_like_f,
            humidity_pct,
            pressure_hpa,
            visibility_mi,
            wind_speed_mph,
            wind_direction_deg: current.wind_degree,
            condition: condition_of(current.condition.as_ref()),
            observed_at: current
                .last_updated_epoch
                .and_then(|seconds| UtcDateTime::from_unix_seconds(seconds).ok())
                .unwrap_or_else(UtcDateTime::now),
            substitutes: fields.into_substitutes(),
        },
        forecast: Vec::new(),
        alerts: Vec::new(),
    }
}

fn map_forecast(body: WapiForecastResponse) -> Vec<ForecastDay> {
    body.forecast
        .forecastday
        .into_iter()
        .map(|entry| ForecastDay {
            date: entry.date,
            high_f: entry.day.maxtemp_f,
            low_f: entry.day.mintemp_f,
            condition: condition_of(entry.day.condition.as_ref()),
            precipitation_chance_pct: entry.day.daily_chance_of_rain,
            max_wind_mph: entry.day.maxwind_mph,
        })
        .collect()
}

fn map_alerts(body: WapiAlertsResponse) -> Vec<WeatherAlert> {
    body.alerts
        .alert
        .into_iter()
        .map(|alert| {
            let event = alert.event.unwrap_or_else(|| String::from("Weather Alert"));
            let starts_at = alert
                .effective
                .as_deref()
                .and_then(|value| UtcDateTime::parse_lenient(value).ok());
            let id = format!(
                "weatherapi-{}-{}",
                slug(&event),
                starts_at.map_or_else(String::new, |at| at.into_inner().unix_timestamp().to_string())
            );

            WeatherAlert {
                id: id.trim_end_matches('-').to_owned(),
                kind: AlertKind::Weather,
                headline: alert.headline.unwrap_or_else(|| event.clone()),
                severity: alert
                    .severity
                    .as_deref()
                    .map_or(Severity::Minor, Severity::from_label),
                description: alert.desc.unwrap_or_default(),
                starts_at,
                ends_at: alert
                    .expires
                    .as_deref()
                    .and_then(|value| UtcDateTime::parse_lenient(value).ok()),
                source: String::from(ProviderId::WeatherApi.as_str()),
                event,
            }
        })
        .collect()
}
