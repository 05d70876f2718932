use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::usgs::{
    whole_seconds, DEFAULT_EVENT_LIMIT, DEFAULT_MIN_MAGNITUDE, DEFAULT_WINDOW_HOURS,
};
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

/// Kilometres per degree of great-circle arc on the mean Earth sphere.
const KM_PER_DEGREE: f64 = 111.195;

/// EMSC SeismicPortal FDSN service, the earthquake fallback.
pub struct EmscAdapter {
    http_client: Arc<dyn HttpClient>,
    policy: ProviderPolicy,
}

impl EmscAdapter {
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
            .with_query("format", "json")
            .with_query("start", whole_seconds(start))
            .with_query(
                "minmag",
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

        // Radius is expressed in degrees here.
        if let (Some(point), Some(radius_km)) = (request.location, options.radius_km) {
            http_request = http_request
                .with_query("lat", point.latitude().to_string())
                .with_query("lon", point.longitude().to_string())
                .with_query("maxradius", format!("{:.3}", radius_km / KM_PER_DEGREE));
        }
        http_request
    }
}

impl DataSource for EmscAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Emsc
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
            let body: EmscFeatureCollection =
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
            let request = HttpRequest::get(self.policy.endpoint("query"))
                .with_query("format", "json")
                .with_query("limit", "1")
                .with_timeout(self.policy.timeout);
            send(self.http_client.as_ref(), request).await.map(|_| ())
        })
    }
}

#[derive(Debug, Deserialize)]
struct EmscFeatureCollection {
    #[serde(default)]
    features: Vec<EmscFeature>,
}

#[derive(Debug, Deserialize)]
struct EmscFeature {
    geometry: EmscGeometry,
    properties: EmscProperties,
}

#[derive(Debug, Deserialize)]
struct EmscGeometry {
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct EmscProperties {
    unid: String,
    mag: Option<f64>,
    time: String,
    flynn_region: Option<String>,
}

fn map_feature(feature: EmscFeature, now: UtcDateTime) -> Result<Option<DisasterEvent>, SourceError> {
    let properties = feature.properties;
    let Some(magnitude) = properties.mag.filter(|mag| mag.is_finite()) else {
        return Ok(None);
    };

    let location = point_from_lon_lat(&feature.geometry.coordinates)?;
    let started_at = UtcDateTime::parse_lenient(&properties.time)
        .map_err(|error| SourceError::malformed(error.to_string()))?;
    let impact = earthquake_impact(magnitude);
    let region = properties
        .flynn_region
        .map(|region| title_case(&region))
        .unwrap_or_else(|| String::from("Unknown region"));

    Ok(Some(DisasterEvent {
        id: format!("emsc-{}", properties.unid),
        category: DisasterCategory::Earthquake,
        severity: impact.severity,
        title: format!("M {magnitude:.1} - {region}"),
        description: Some(region),
        location,
        radius_km: impact.radius_km,
        started_at,
        ended_at: None,
        source: ProviderId::Emsc,
        is_active: earthquake_is_active(started_at, now),
        magnitude: Some(magnitude),
    }))
}

/// Flinn-Engdahl region names arrive upper-case.
fn title_case(region: &str) -> String {
    region
        .split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
