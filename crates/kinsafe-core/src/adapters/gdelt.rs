use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::{fetch_json, point_from_lon_lat, send, slug};
use crate::data_source::{
    CapabilitySet, DataSource, FetchRequest, Payload, RequestKind, SourceError, SourceFuture,
};
use crate::domain::{DisasterCategory, DisasterEvent, Severity, UtcDateTime};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::ProviderId;

const CAPABILITIES: CapabilitySet = CapabilitySet::new(&[RequestKind::CivilUnrest]);

const UNREST_QUERY: &str = "(protest OR riot OR unrest)";
const DEFAULT_TIMESPAN_HOURS: u32 = 24;
const DEFAULT_MAX_POINTS: usize = 100;

/// GDELT GEO 2.0 point data: news-derived locations mentioning unrest.
pub struct GdeltAdapter {
    http_client: Arc<dyn HttpClient>,
    policy: ProviderPolicy,
}

impl GdeltAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, policy: ProviderPolicy) -> Self {
        Self {
            http_client,
            policy,
        }
    }

    fn query(&self, request: &FetchRequest) -> HttpRequest {
        let hours = request
            .options
            .window_hours
            .unwrap_or(DEFAULT_TIMESPAN_HOURS);
        HttpRequest::get(self.policy.endpoint(""))
            .with_query("query", UNREST_QUERY)
            .with_query("mode", "PointData")
            .with_query("format", "GeoJSON")
            .with_query("timespan", format!("{hours}h"))
            .with_query(
                "maxpoints",
                request
                    .options
                    .limit
                    .unwrap_or(DEFAULT_MAX_POINTS)
                    .to_string(),
            )
            .with_timeout(self.policy.timeout)
    }
}

impl DataSource for GdeltAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Gdelt
    }

    fn capabilities(&self) -> CapabilitySet {
        CAPABILITIES
    }

    fn policy(&self) -> &ProviderPolicy {
        &self.policy
    }

    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> SourceFuture<'a, Payload> {
        Box::pin(async move {
            if request.kind != RequestKind::CivilUnrest {
                return Err(SourceError::unsupported_kind(request.kind));
            }

            let body: GdeltCollection =
                fetch_json(self.http_client.as_ref(), self.query(request)).await?;
            let observed_at = UtcDateTime::now();
            let events = body
                .features
                .into_iter()
                .map(|feature| map_feature(feature, observed_at))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Payload::Events(events))
        })
    }

    fn probe<'a>(&'a self) -> SourceFuture<'a, ()> {
        Box::pin(async move {
            let request = HttpRequest::get(self.policy.endpoint(""))
                .with_query("query", "protest")
                .with_query("mode", "PointData")
                .with_query("format", "GeoJSON")
                .with_query("maxpoints", "1")
                .with_timeout(self.policy.timeout);
            send(self.http_client.as_ref(), request).await.map(|_| ())
        })
    }
}

#[derive(Debug, Deserialize)]
struct GdeltCollection {
    #[serde(default)]
    features: Vec<GdeltFeature>,
}

#[derive(Debug, Deserialize)]
struct GdeltFeature {
    geometry: GdeltGeometry,
    properties: GdeltProperties,
}

#[derive(Debug, Deserialize)]
struct GdeltGeometry {
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct GdeltProperties {
    name: Option<String>,
    #[serde(default)]
    count: u32,
}

/// Report volume stands in for severity.
fn unrest_impact(count: u32) -> (Severity, f64) {
    match count {
        50.. => (Severity::Severe, 10.0),
        10.. => (Severity::Moderate, 5.0),
        _ => (Severity::Minor, 2.0),
    }
}

/// GDELT has no event timestamps; `observed_at` marks when the point was
/// seen.
fn map_feature(feature: GdeltFeature, observed_at: UtcDateTime) -> Result<DisasterEvent, SourceError> {
    let location = point_from_lon_lat(&feature.geometry.coordinates)?;
    let name = feature
        .properties
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| location.to_string());
    let count = feature.properties.count;
    let (severity, radius_km) = unrest_impact(count);

    Ok(DisasterEvent {
        id: format!(
            "gdelt-{}-{:.4}-{:.4}",
            slug(&name),
            location.latitude(),
            location.longitude()
        ),
        category: DisasterCategory::CivilUnrest,
        severity,
        title: format!("Unrest reported near {name}"),
        description: Some(format!("{count} news reports mention protest or unrest")),
        location,
        radius_km,
        started_at: observed_at,
        ended_at: None,
        source: ProviderId::Gdelt,
        is_active: true,
        magnitude: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::FixtureHttpClient;
    use crate::FetchOptions;

    #[tokio::test]
    async fn point_counts_map_to_severity() {
        let body = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [2.3522, 48.8566]},
             "properties": {"name": "Paris, France", "count": 64}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-0.1276, 51.5072]},
             "properties": {"name": "London, United Kingdom", "count": 3}}
        ]}"#;
        let client = Arc::new(FixtureHttpClient::new().with_json("/geo/geo", body));
        let request = FetchRequest::new(
            RequestKind::CivilUnrest,
            None,
            FetchOptions::default().with_window_hours(12),
        )
        .expect("valid");

        let events = GdeltAdapter::new(
            Arc::clone(&client) as Arc<dyn HttpClient>,
            ProviderPolicy::default_for(ProviderId::Gdelt),
        )
        .fetch(&request)
        .await
        .expect("fetch")
        .into_events()
        .expect("events");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "gdelt-paris-france-48.8566-2.3522");
        assert_eq!(events[0].severity, Severity::Severe);
        assert_eq!(events[0].radius_km, 10.0);
        assert_eq!(events[1].severity, Severity::Minor);

        let url = &client.requests()[0].url;
        assert!(url.contains("query=%28protest%20OR%20riot%20OR%20unrest%29"));
        assert!(url.contains("timespan=12h"));
    }

    #[test]
    fn impact_thresholds() {
        assert_eq!(unrest_impact(49), (Severity::Moderate, 5.0));
        assert_eq!(unrest_impact(10), (Severity::Moderate, 5.0));
        assert_eq!(unrest_impact(9), (Severity::Minor, 2.0));
    }
}
