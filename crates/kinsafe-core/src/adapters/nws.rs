use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::adapters::{fetch_json, require_location, send};
use crate::data_source::{
    CapabilitySet, DataSource, FetchRequest, Payload, RequestKind, SourceError, SourceFuture,
};
use crate::domain::{
    alert_radius_km, categorize_alert_event, celsius_to_fahrenheit, kph_to_mph, meters_to_miles,
    pascals_to_hpa, AlertKind, CurrentConditions, DisasterEvent, GeoPoint, ReadingFields,
    Severity, UtcDateTime, WeatherAlert, WeatherCondition, WeatherLocation, WeatherReading,
    PLACEHOLDER_HUMIDITY_PCT, PLACEHOLDER_PRESSURE_HPA, PLACEHOLDER_TEMPERATURE_F,
    PLACEHOLDER_VISIBILITY_MI,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::ProviderId;

const CAPABILITIES: CapabilitySet = CapabilitySet::new(&[
    RequestKind::CurrentConditions,
    RequestKind::WeatherAlerts,
    RequestKind::SevereWeather,
]);

/// National Weather Service (`api.weather.gov`). US coverage only; every
/// request carries the configured contact user agent.
pub struct NwsAdapter {
    http_client: Arc<dyn HttpClient>,
    user_agent: String,
    policy: ProviderPolicy,
}

impl NwsAdapter {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        user_agent: impl Into<String>,
        policy: ProviderPolicy,
    ) -> Self {
        Self {
            http_client,
            user_agent: user_agent.into(),
            policy,
        }
    }

    fn request(&self, path: &str) -> HttpRequest {
        HttpRequest::get(self.policy.endpoint(path))
            .with_header("User-Agent", &self.user_agent)
            .with_header("Accept", "application/geo+json")
            .with_timeout(self.policy.timeout)
    }

    /// Resolves point metadata, the nearest station and its latest
    /// observation.
    async fn current(&self, point: GeoPoint) -> Result<Payload, SourceError> {
        let client = self.http_client.as_ref();
        let points: NwsPoints = fetch_json(
            client,
            self.request(&format!(
                "points/{:.4},{:.4}",
                point.latitude(),
                point.longitude()
            )),
        )
        .await?;

        let stations_url = points.properties.observation_stations.ok_or_else(|| {
            SourceError::malformed("point metadata has no observation stations")
        })?;
        let stations: NwsStations = fetch_json(
            client,
            HttpRequest::get(stations_url)
                .with_header("User-Agent", &self.user_agent)
                .with_header("Accept", "application/geo+json")
                .with_timeout(self.policy.timeout),
        )
        .await?;
        let station = stations
            .features
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::unavailable("no observation stations near point"))?;

        let observation: NwsObservation = fetch_json(
            client,
            self.request(&format!(
                "stations/{}/observations/latest",
                station.properties.station_identifier
            )),
        )
        .await?;

        let name = points
            .properties
            .relative_location
            .map(|location| {
                format!(
                    "{}, {}",
                    location.properties.city, location.properties.state
                )
            })
            .unwrap_or_else(|| point.to_string());

        Ok(Payload::Conditions(Box::new(map_observation(
            observation.properties,
            point,
            name,
        ))))
    }

    async fn alerts(&self, point: GeoPoint) -> Result<Payload, SourceError> {
        let request = self
            .request("alerts/active")
            .with_query("point", point_param(point));
        let body: NwsAlertCollection = fetch_json(self.http_client.as_ref(), request).await?;
        Ok(Payload::Alerts(
            body.features.into_iter().map(map_alert).collect(),
        ))
    }

    async fn severe_weather(&self, point: Option<GeoPoint>) -> Result<Payload, SourceError> {
        let mut request = self
            .request("alerts/active")
            .with_query("status", "actual")
            .with_query("severity", "Severe,Extreme");
        if let Some(point) = point {
            request = request.with_query("point", point_param(point));
        }

        let body: NwsAlertCollection = fetch_json(self.http_client.as_ref(), request).await?;
        let events = body
            .features
            .into_iter()
            .filter_map(|feature| map_severe_event(feature, point))
            .collect();
        Ok(Payload::Events(events))
    }
}

impl DataSource for NwsAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Nws
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
                RequestKind::WeatherAlerts => self.alerts(require_location(request)?).await,
                RequestKind::SevereWeather => self.severe_weather(request.location).await,
                other => Err(SourceError::unsupported_kind(other)),
            }
        })
    }

    fn probe<'a>(&'a self) -> SourceFuture<'a, ()> {
        Box::pin(async move {
            send(self.http_client.as_ref(), self.request("alerts/active/count"))
                .await
                .map(|_| ())
        })
    }
}

fn point_param(point: GeoPoint) -> String {
    format!("{:.4},{:.4}", point.latitude(), point.longitude())
}

#[derive(Debug, Deserialize)]
struct NwsPoints {
    properties: NwsPointProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NwsPointProperties {
    observation_stations: Option<String>,
    relative_location: Option<NwsRelativeLocation>,
}

#[derive(Debug, Deserialize)]
struct NwsRelativeLocation {
    properties: NwsCityState,
}

#[derive(Debug, Deserialize)]
struct NwsCityState {
    city: String,
    state: String,
}

#[derive(Debug, Deserialize)]
struct NwsStations {
    #[serde(default)]
    features: Vec<NwsStation>,
}

#[derive(Debug, Deserialize)]
struct NwsStation {
    properties: NwsStationProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NwsStationProperties {
    station_identifier: String,
}

#[derive(Debug, Deserialize)]
struct NwsObservation {
    properties: NwsObservationProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NwsObservationProperties {
    timestamp: Option<String>,
    text_description: Option<String>,
    #[serde(default)]
    temperature: NwsQuantity,
    #[serde(default)]
    heat_index: NwsQuantity,
    #[serde(default)]
    wind_chill: NwsQuantity,
    #[serde(default)]
    relative_humidity: NwsQuantity,
    #[serde(default)]
    barometric_pressure: NwsQuantity,
    #[serde(default)]
    visibility: NwsQuantity,
    #[serde(default)]
    wind_speed: NwsQuantity,
    #[serde(default)]
    wind_direction: NwsQuantity,
}

/// `{ "value": number | null, "unitCode": "wmoUnit:..." }`
#[derive(Debug, Default, Deserialize)]
struct NwsQuantity {
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NwsAlertCollection {
    #[serde(default)]
    features: Vec<NwsAlertFeature>,
}

#[derive(Debug, Deserialize)]
struct NwsAlertFeature {
    #[serde(default)]
    geometry: Option<Value>,
    properties: NwsAlertProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NwsAlertProperties {
    id: String,
    event: Option<String>,
    severity: Option<String>,
    headline: Option<String>,
    description: Option<String>,
    area_desc: Option<String>,
    onset: Option<String>,
    effective: Option<String>,
    ends: Option<String>,
    expires: Option<String>,
}

impl NwsAlertProperties {
    fn starts_at(&self) -> Option<UtcDateTime> {
        parse_optional(self.onset.as_deref()).or_else(|| parse_optional(self.effective.as_deref()))
    }

    fn ends_at(&self) -> Option<UtcDateTime> {
        parse_optional(self.ends.as_deref()).or_else(|| parse_optional(self.expires.as_deref()))
    }

    fn severity(&self) -> Severity {
        self.severity
            .as_deref()
            .map_or(Severity::Minor, Severity::from_label)
    }
}

fn parse_optional(value: Option<&str>) -> Option<UtcDateTime> {
    value.and_then(|value| UtcDateTime::parse_lenient(value).ok())
}

fn map_observation(
    observation: NwsObservationProperties,
    point: GeoPoint,
    name: String,
) -> WeatherReading {
    let mut fields = ReadingFields::default();
    let temperature_f = fields.take(
        "temperature_f",
        observation.temperature.value.map(celsius_to_fahrenheit),
        PLACEHOLDER_TEMPERATURE_F,
    );
    let feels_like = observation
        .heat_index
        .value
        .or(observation.wind_chill.value)
        .map(celsius_to_fahrenheit)
        .unwrap_or(temperature_f);
    let humidity_pct = fields.take(
        "humidity_pct",
        observation.relative_humidity.value,
        PLACEHOLDER_HUMIDITY_PCT,
    );
    let pressure_hpa = fields.take(
        "pressure_hpa",
        observation.barometric_pressure.value.map(pascals_to_hpa),
        PLACEHOLDER_PRESSURE_HPA,
    );
    let visibility_mi = fields.take(
        "visibility_mi",
        observation.visibility.value.map(meters_to_miles),
        PLACEHOLDER_VISIBILITY_MI,
    );
    let wind_speed_mph = fields.take(
        "wind_speed_mph",
        observation.wind_speed.value.map(kph_to_mph),
        0.0,
    );

    WeatherReading {
        location: WeatherLocation { point, name },
        current: CurrentConditions {
            temperature_f,
            feels_like_f: feels_like,
            humidity_pct,
            pressure_hpa,
            visibility_mi,
            wind_speed_mph,
            wind_direction_deg: observation.wind_direction.value,
            condition: WeatherCondition::from_text(
                observation.text_description.as_deref().unwrap_or(""),
            ),
            observed_at: parse_optional(observation.timestamp.as_deref())
                .unwrap_or_else(UtcDateTime::now),
            substitutes: fields.into_substitutes(),
        },
        forecast: Vec::new(),
        alerts: Vec::new(),
    }
}

fn map_alert(feature: NwsAlertFeature) -> WeatherAlert {
    let properties = feature.properties;
    let event = properties
        .event
        .clone()
        .unwrap_or_else(|| String::from("Weather Alert"));

    WeatherAlert {
        starts_at: properties.starts_at(),
        ends_at: properties.ends_at(),
        severity: properties.severity(),
        id: properties.id,
        kind: AlertKind::Weather,
        headline: properties.headline.unwrap_or_else(|| event.clone()),
        description: properties.description.unwrap_or_default(),
        source: String::from(ProviderId::Nws.as_str()),
        event,
    }
}

/// Alerts without geometry are placed at the requested point; national
/// queries without a point drop them.
fn map_severe_event(feature: NwsAlertFeature, fallback: Option<GeoPoint>) -> Option<DisasterEvent> {
    let location = feature
        .geometry
        .as_ref()
        .and_then(centroid)
        .or(fallback)?;
    let properties = feature.properties;
    let severity = properties.severity();
    let event = properties
        .event
        .clone()
        .unwrap_or_else(|| String::from("Severe Weather"));

    Some(DisasterEvent {
        started_at: properties.starts_at().unwrap_or_else(UtcDateTime::now),
        ended_at: properties.ends_at(),
        id: properties.id,
        category: categorize_alert_event(&event),
        severity,
        title: properties.headline.unwrap_or_else(|| event.clone()),
        description: properties.area_desc.or(properties.description),
        location,
        radius_km: alert_radius_km(severity),
        source: ProviderId::Nws,
        is_active: true,
        magnitude: None,
    })
}

/// Mean of every `[lon, lat]` position in a GeoJSON geometry.
fn centroid(geometry: &Value) -> Option<GeoPoint> {
    let mut positions = Vec::new();
    collect_positions(geometry.get("coordinates")?, &mut positions);
    if positions.is_empty() {
        return None;
    }

    let count = positions.len() as f64;
    let (lon_sum, lat_sum) = positions
        .iter()
        .fold((0.0, 0.0), |(lon, lat), (x, y)| (lon + x, lat + y));
    GeoPoint::new(lat_sum / count, lon_sum / count).ok()
}

fn collect_positions(value: &Value, positions: &mut Vec<(f64, f64)>) {
    let Some(items) = value.as_array() else {
        return;
    };
    match (items.first().and_then(Value::as_f64), items.get(1).and_then(Value::as_f64)) {
        (Some(longitude), Some(latitude)) => positions.push((longitude, latitude)),
        _ => {
            for item in items {
                collect_positions(item, positions);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DisasterCategory;
    use crate::http_client::FixtureHttpClient;

    const POINTS: &str = r#"{"properties": {
        "observationStations": "https://api.weather.gov/gridpoints/BOU/62,60/stations",
        "relativeLocation": {"properties": {"city": "Denver", "state": "CO"}}
    }}"#;
    const STATIONS: &str =
        r#"{"features": [{"properties": {"stationIdentifier": "KDEN"}}, {"properties": {"stationIdentifier": "KBKF"}}]}"#;
    const OBSERVATION: &str = r#"{"properties": {
        "timestamp": "2024-06-01T09:53:00+00:00",
        "textDescription": "Mostly Cloudy",
        "temperature": {"value": 20.0, "unitCode": "wmoUnit:degC"},
        "relativeHumidity": {"value": 41.5},
        "barometricPressure": {"value": 101520},
        "visibility": {"value": 16093.44},
        "windSpeed": {"value": 16.0934},
        "windDirection": {"value": 200}
    }}"#;

    fn adapter(client: Arc<FixtureHttpClient>) -> NwsAdapter {
        NwsAdapter::new(
            client,
            "kinsafe-tests (ops@example.com)",
            ProviderPolicy::default_for(ProviderId::Nws),
        )
    }

    fn denver() -> GeoPoint {
        GeoPoint::new(39.7392, -104.9903).expect("valid point")
    }

    #[tokio::test]
    async fn current_conditions_chain_points_station_and_observation() {
        let client = Arc::new(
            FixtureHttpClient::new()
                .with_json("/points/", POINTS)
                .with_json("/stations/KDEN/observations/latest", OBSERVATION)
                .with_json("/stations", STATIONS),
        );

        let reading = adapter(Arc::clone(&client))
            .fetch(&FetchRequest::at(RequestKind::CurrentConditions, denver()))
            .await
            .expect("fetch")
            .into_reading()
            .expect("conditions");

        assert_eq!(reading.location.name, "Denver, CO");
        assert_eq!(reading.current.temperature_f, 68.0);
        assert_eq!(reading.current.pressure_hpa, 1015.2);
        assert!((reading.current.visibility_mi - 10.0).abs() < 1e-9);
        assert!((reading.current.wind_speed_mph - 10.0).abs() < 1e-3);
        assert_eq!(reading.current.condition.code, "cloudy");
        assert!(reading.current.substitutes.is_empty());

        let requests = client.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].url.ends_with("/points/39.7392,-104.9903"));
        assert_eq!(
            requests[0].headers.get("user-agent").map(String::as_str),
            Some("kinsafe-tests (ops@example.com)")
        );
    }

    #[tokio::test]
    async fn missing_observation_values_become_substitutes() {
        let observation = r#"{"properties": {"temperature": {"value": null}, "textDescription": ""}}"#;
        let client = Arc::new(
            FixtureHttpClient::new()
                .with_json("/points/", POINTS)
                .with_json("/observations/latest", observation)
                .with_json("/stations", STATIONS),
        );

        let reading = adapter(client)
            .fetch(&FetchRequest::at(RequestKind::CurrentConditions, denver()))
            .await
            .expect("fetch")
            .into_reading()
            .expect("conditions");

        assert_eq!(reading.current.temperature_f, PLACEHOLDER_TEMPERATURE_F);
        assert!(reading
            .current
            .substitutes
            .contains(&String::from("temperature_f")));
        assert_eq!(reading.current.condition.code, "unknown");
    }

    #[tokio::test]
    async fn no_stations_is_unavailable() {
        let client = Arc::new(
            FixtureHttpClient::new()
                .with_json("/points/", POINTS)
                .with_json("/stations", r#"{"features": []}"#),
        );

        let error = adapter(client)
            .fetch(&FetchRequest::at(RequestKind::CurrentConditions, denver()))
            .await
            .expect_err("no station");
        assert_eq!(error.code(), "source.unavailable");
    }

    #[tokio::test]
    async fn severe_weather_uses_polygon_centroid() {
        let body = r#"{"features": [{
            "geometry": {"type": "Polygon", "coordinates": [[[-100.0, 40.0], [-98.0, 40.0], [-98.0, 42.0], [-100.0, 42.0]]]},
            "properties": {"id": "urn:oid:2.49.0.1.840.0.abc", "event": "Tornado Warning",
                           "severity": "Extreme", "headline": "Tornado Warning for Lincoln County",
                           "areaDesc": "Lincoln, NE", "onset": "2024-06-01T10:00:00-05:00"}
        }, {
            "geometry": null,
            "properties": {"id": "urn:oid:no-geometry", "event": "Flood Warning", "severity": "Severe"}
        }]}"#;
        let client = Arc::new(FixtureHttpClient::new().with_json("/alerts/active", body));
        let request =
            FetchRequest::new(RequestKind::SevereWeather, None, crate::FetchOptions::default())
                .expect("valid");

        let events = adapter(Arc::clone(&client))
            .fetch(&request)
            .await
            .expect("fetch")
            .into_events()
            .expect("events");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].category, DisasterCategory::Storm);
        assert_eq!(events[0].severity, Severity::Extreme);
        assert_eq!(events[0].radius_km, 100.0);
        assert_eq!(events[0].location.latitude(), 41.0);
        assert_eq!(events[0].location.longitude(), -99.0);
        assert_eq!(
            events[0].started_at.format_rfc3339(),
            "2024-06-01T15:00:00Z"
        );
        assert!(client.requests()[0].url.contains("severity=Severe%2CExtreme"));
    }

    #[tokio::test]
    async fn weather_alerts_keep_provider_ids() {
        let body = r#"{"features": [{"properties": {
            "id": "urn:oid:flood", "event": "Flood Watch", "severity": "Moderate",
            "effective": "2024-06-01T10:00:00Z", "expires": "2024-06-02T10:00:00Z"
        }}]}"#;
        let client = Arc::new(FixtureHttpClient::new().with_json("/alerts/active", body));

        let alerts = adapter(client)
            .fetch(&FetchRequest::at(RequestKind::WeatherAlerts, denver()))
            .await
            .expect("fetch")
            .into_alerts()
            .expect("alerts");

        assert_eq!(alerts[0].id, "urn:oid:flood");
        assert_eq!(alerts[0].headline, "Flood Watch");
        assert_eq!(alerts[0].severity, Severity::Moderate);
        assert!(alerts[0].ends_at.is_some());
    }
}
