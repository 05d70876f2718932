use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::{fetch_json, point_from_lon_lat, send};
use crate::data_source::{
    CapabilitySet, DataSource, FetchRequest, Payload, RequestKind, SourceError, SourceFuture,
};
use crate::domain::{
    earthquake_impact, earthquake_is_active, DisasterCategory, DisasterEvent, UtcDateTime,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::ProviderId;

const CAPABILITIES: CapabilitySet = CapabilitySet::new(&[RequestKind::Earthquakes]);

pub(crate) const DEFAULT_MIN_MAGNITUDE: f64 = 2.5;
pub(crate) const DEFAULT_WINDOW_HOURS: u32 = 24;
pub(crate) const DEFAULT_EVENT_LIMIT: usize = 100;

/// USGS FDSN event service, GeoJSON output.
pub struct UsgsAdapter {
    http_client: Arc<dyn HttpClient>,
    policy: ProviderPolicy,
}

impl UsgsAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, policy: ProviderPolicy) -> Self {
        Self {
            http_client,
            policy,
        }
    }

    fn query(&self, request: &FetchRequest, now: UtcDateTime) -> HttpRequest {
        let options = &request.options;
        let start = now.hours_before(options.window_hours.unwrap_or(DEFAULT_WINDOW_HOURS));
        let mut http_request = HttpRequest::get(self.policy.endpoint("query"))
            .with_query("format", "geojson")
            .with_query("starttime", whole_seconds(start))
            .with_query(
                "minmagnitude",
                options
                    .min_magnitude
                    .unwrap_or(DEFAULT_MIN_MAGNITUDE)
                    .to_string(),
            )
            .with_query("orderby", "time")
            .with_query(
                "limit",
                options.limit.unwrap_or(DEFAULT_EVENT_LIMIT).to_string(),
            )
            .with_timeout(self.policy.timeout);

        if let (Some(point), Some(radius_km)) = (request.location, options.radius_km) {
            http_request = http_request
                .with_query("latitude", point.latitude().to_string())
                .with_query("longitude", point.longitude().to_string())
                .with_query("maxradiuskm", radius_km.to_string());
        }
        http_request
    }
}

/// RFC3339 without fractional seconds; FDSN services reject nanoseconds.
pub(crate) fn whole_seconds(at: UtcDateTime) -> String {
    UtcDateTime::from_unix_seconds(at.into_inner().unix_timestamp())
        .unwrap_or(at)
        .format_rfc3339()
}

impl DataSource for UsgsAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Usgs
    }

    fn capabilities(&self) -> CapabilitySet {
        CAPABILITIES
    }

    fn policy(&self) -> &ProviderPolicy {
        &self.policy
    }

    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> SourceFuture<'a, Payload> {
        Box::pin(async move {
            if request.kind != RequestKind::Earthquakes {
                return Err(SourceError::unsupported_kind(request.kind));
            }

            let now = UtcDateTime::now();
            let body: UsgsFeatureCollection =
                fetch_json(self.http_client.as_ref(), self.query(request, now)).await?;
            let events = body
                .features
                .into_iter()
                .filter_map(|feature| map_feature(feature, now).transpose())
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Payload::Events(events))
        })
    }

    fn probe<'a>(&'a self) -> SourceFuture<'a, ()> {
        Box::pin(async move {
            let request =
                HttpRequest::get(self.policy.endpoint("version")).with_timeout(self.policy.timeout);
            send(self.http_client.as_ref(), request).await.map(|_| ())
        })
    }
}

#[derive(Debug, Deserialize)]
struct UsgsFeatureCollection {
    features: Vec<UsgsFeature>,
}

#[derive(Debug, Deserialize)]
struct UsgsFeature {
    id: String,
    geometry: UsgsGeometry,
    properties: UsgsProperties,
}

#[derive(Debug, Deserialize)]
struct UsgsGeometry {
    /// `[longitude, latitude, depth_km]`
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct UsgsProperties {
    mag: Option<f64>,
    place: Option<String>,
    /// Milliseconds since the Unix epoch.
    time: i64,
    title: Option<String>,
}

/// Features without a magnitude are dropped.
fn map_feature(feature: UsgsFeature, now: UtcDateTime) -> Result<Option<DisasterEvent>, SourceError> {
    let Some(magnitude) = feature.properties.mag.filter(|mag| mag.is_finite()) else {
        return Ok(None);
    };

    let location = point_from_lon_lat(&feature.geometry.coordinates)?;
    let started_at = UtcDateTime::from_unix_millis(feature.properties.time)
        .map_err(|error| SourceError::malformed(error.to_string()))?;
    let impact = earthquake_impact(magnitude);
    let place = feature
        .properties
        .place
        .unwrap_or_else(|| String::from("unknown location"));

    Ok(Some(DisasterEvent {
        id: feature.id,
        category: DisasterCategory::Earthquake,
        severity: impact.severity,
        title: feature
            .properties
            .title
            .unwrap_or_else(|| format!("M {magnitude:.1} - {place}")),
        description: Some(place),
        location,
        radius_km: impact.radius_km,
        started_at,
        ended_at: None,
        source: ProviderId::Usgs,
        is_active: earthquake_is_active(started_at, now),
        magnitude: Some(magnitude),
    }))
}
