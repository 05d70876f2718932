use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::{fetch_json, point_from_lon_lat, send};
use crate::data_source::{
    CapabilitySet, DataSource, FetchRequest, Payload, RequestKind, SourceError, SourceFuture,
};
use crate::distance::BoundingBox;
use crate::domain::{
    fire_radius_km, fire_severity, DisasterCategory, DisasterEvent, UtcDateTime,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::ProviderId;

const CAPABILITIES: CapabilitySet = CapabilitySet::new(&[RequestKind::Wildfires]);

const DEFAULT_LOOKBACK_DAYS: u32 = 30;
const DEFAULT_FIRE_LIMIT: usize = 50;

/// NASA EONET v3 natural event tracker, wildfire category.
pub struct EonetAdapter {
    http_client: Arc<dyn HttpClient>,
    policy: ProviderPolicy,
}

impl EonetAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, policy: ProviderPolicy) -> Self {
        Self {
            http_client,
            policy,
        }
    }

    fn query(&self, request: &FetchRequest, bbox: Option<BoundingBox>) -> HttpRequest {
        let options = &request.options;
        let days = options
            .window_hours
            .map_or(DEFAULT_LOOKBACK_DAYS, |hours| hours.div_ceil(24));
        let mut http_request = HttpRequest::get(self.policy.endpoint("events"))
            .with_query("status", "open")
            .with_query("category", "wildfires")
            .with_query("days", days.to_string())
            .with_query(
                "limit",
                options.limit.unwrap_or(DEFAULT_FIRE_LIMIT).to_string(),
            )
            .with_timeout(self.policy.timeout);

        if let Some(bbox) = bbox {
            // EONET orders the box as min lon, max lat, max lon, min lat.
            http_request = http_request.with_query(
                "bbox",
                format!(
                    "{:.4},{:.4},{:.4},{:.4}",
                    bbox.min_longitude, bbox.max_latitude, bbox.max_longitude, bbox.min_latitude
                ),
            );
        }
        http_request
    }
}

impl DataSource for EonetAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Eonet
    }

    fn capabilities(&self) -> CapabilitySet {
        CAPABILITIES
    }

    fn policy(&self) -> &ProviderPolicy {
        &self.policy
    }

    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> SourceFuture<'a, Payload> {
        Box::pin(async move {
            if request.kind != RequestKind::Wildfires {
                return Err(SourceError::unsupported_kind(request.kind));
            }

            let boxes: Vec<Option<BoundingBox>> = match (request.location, request.options.radius_km) {
                (Some(center), Some(radius_km)) => BoundingBox::around(center, radius_km)
                    .split()
                    .into_iter()
                    .map(Some)
                    .collect(),
                _ => vec![None],
            };

            let mut events: Vec<DisasterEvent> = Vec::new();
            for bbox in boxes {
                let body: EonetEvents =
                    fetch_json(self.http_client.as_ref(), self.query(request, bbox)).await?;
                for event in body.events {
                    let Some(event) = map_event(event)? else {
                        continue;
                    };
                    if !events.iter().any(|seen| seen.id == event.id) {
                        events.push(event);
                    }
                }
            }
            Ok(Payload::Events(events))
        })
    }

    fn probe<'a>(&'a self) -> SourceFuture<'a, ()> {
        Box::pin(async move {
            let request = HttpRequest::get(self.policy.endpoint("categories"))
                .with_timeout(self.policy.timeout);
            send(self.http_client.as_ref(), request).await.map(|_| ())
        })
    }
}

#[derive(Debug, Deserialize)]
struct EonetEvents {
    #[serde(default)]
    events: Vec<EonetEvent>,
}

#[derive(Debug, Deserialize)]
struct EonetEvent {
    id: String,
    title: String,
    description: Option<String>,
    closed: Option<String>,
    #[serde(default)]
    geometry: Vec<EonetGeometry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EonetGeometry {
    magnitude_value: Option<f64>,
    magnitude_unit: Option<String>,
    date: String,
    #[serde(rename = "type")]
    kind: String,
    coordinates: serde_json::Value,
}

/// The most recent point geometry locates the fire; events with only
/// polygon footprints are skipped.
fn map_event(event: EonetEvent) -> Result<Option<DisasterEvent>, SourceError> {
    let Some(latest) = event
        .geometry
        .iter()
        .rev()
        .find(|geometry| geometry.kind == "Point")
    else {
        return Ok(None);
    };

    let coordinates: Vec<f64> = serde_json::from_value(latest.coordinates.clone())
        .map_err(|error| SourceError::malformed(format!("bad point geometry: {error}")))?;
    let location = point_from_lon_lat(&coordinates)?;
    let started_at = event
        .geometry
        .first()
        .map_or(latest.date.as_str(), |first| first.date.as_str());
    let started_at = UtcDateTime::parse_lenient(started_at)
        .map_err(|error| SourceError::malformed(error.to_string()))?;

    let acres = latest
        .magnitude_value
        .filter(|_| latest.magnitude_unit.as_deref() == Some("acres"))
        .unwrap_or(0.0);
    let ended_at = event
        .closed
        .as_deref()
        .and_then(|value| UtcDateTime::parse_lenient(value).ok());

    Ok(Some(DisasterEvent {
        id: event.id,
        category: DisasterCategory::Fire,
        severity: fire_severity(acres),
        title: event.title,
        description: event.description,
        location,
        radius_km: fire_radius_km(acres),
        started_at,
        ended_at,
        source: ProviderId::Eonet,
        is_active: ended_at.is_none(),
        magnitude: (acres > 0.0).then_some(acres),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GeoPoint, Severity};
    use crate::http_client::FixtureHttpClient;
    use crate::FetchOptions;

    const FIRES: &str = r#"{"events": [
        {"id": "EONET_7001", "title": "Park Fire, California", "description": null, "closed": null,
         "geometry": [
            {"magnitudeValue": 900.0, "magnitudeUnit": "acres", "date": "2024-07-24T18:00:00Z",
             "type": "Point", "coordinates": [-121.9, 39.8]},
            {"magnitudeValue": 350000.0, "magnitudeUnit": "acres", "date": "2024-07-28T12:00:00Z",
             "type": "Point", "coordinates": [-121.8, 40.0]}
         ]},
        {"id": "EONET_7002", "title": "Footprint only", "closed": null,
         "geometry": [{"date": "2024-07-24T18:00:00Z", "type": "Polygon",
                       "coordinates": [[[-120.0, 38.0], [-119.0, 38.0], [-119.0, 39.0]]]}]}
    ]}"#;

    #[tokio::test]
    async fn latest_point_geometry_drives_size_and_position() {
        let client = Arc::new(FixtureHttpClient::new().with_json("/events", FIRES));
        let request = FetchRequest::new(RequestKind::Wildfires, None, FetchOptions::default())
            .expect("valid");

        let events = EonetAdapter::new(client, ProviderPolicy::default_for(ProviderId::Eonet))
            .fetch(&request)
            .await
            .expect("fetch")
            .into_events()
            .expect("events");

        assert_eq!(events.len(), 1);
        let fire = &events[0];
        assert_eq!(fire.category, DisasterCategory::Fire);
        assert_eq!(fire.severity, Severity::Extreme);
        assert_eq!(fire.radius_km, 50.0);
        assert_eq!(fire.location.latitude(), 40.0);
        assert_eq!(fire.started_at.format_rfc3339(), "2024-07-24T18:00:00Z");
        assert!(fire.is_active);
    }

    #[tokio::test]
    async fn bbox_and_days_follow_the_query() {
        let client = Arc::new(FixtureHttpClient::new().with_json("/events", r#"{"events": []}"#));
        let request = FetchRequest::new(
            RequestKind::Wildfires,
            Some(GeoPoint::new(39.0, -121.0).expect("valid")),
            FetchOptions::default()
                .with_radius_km(100.0)
                .with_window_hours(49),
        )
        .expect("valid");

        EonetAdapter::new(
            Arc::clone(&client) as Arc<dyn HttpClient>,
            ProviderPolicy::default_for(ProviderId::Eonet),
        )
        .fetch(&request)
        .await
        .expect("fetch");

        let url = &client.requests()[0].url;
        assert!(url.contains("days=3"));
        assert!(url.contains("category=wildfires"));
        assert!(url.contains("bbox="));
    }
}
