use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::{fetch_json, point_from_lon_lat, probe_point, require_location, send};
use crate::data_source::{
    CapabilitySet, DataSource, FetchRequest, Payload, RequestKind, SourceError, SourceFuture,
};
use crate::distance::BoundingBox;
use crate::domain::{
    traffic_radius_km, DisasterCategory, DisasterEvent, Severity, UtcDateTime,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::ProviderId;

const CAPABILITIES: CapabilitySet = CapabilitySet::new(&[RequestKind::Traffic]);

const DEFAULT_TRAFFIC_RADIUS_KM: f64 = 10.0;
const INCIDENT_FIELDS: &str = "{incidents{type,geometry{type,coordinates},properties{id,\
iconCategory,magnitudeOfDelay,events{description},startTime,endTime,from,to}}}";

/// TomTom Traffic incident details (v5).
pub struct TomTomAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    policy: ProviderPolicy,
}

impl TomTomAdapter {
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

    fn request(&self, bbox: BoundingBox) -> HttpRequest {
        HttpRequest::get(self.policy.endpoint("incidentDetails"))
            .with_query("key", &self.api_key)
            .with_query(
                "bbox",
                format!(
                    "{:.5},{:.5},{:.5},{:.5}",
                    bbox.min_longitude, bbox.min_latitude, bbox.max_longitude, bbox.max_latitude
                ),
            )
            .with_query("fields", INCIDENT_FIELDS)
            .with_query("language", "en-US")
            .with_query("timeValidityFilter", "present")
            .with_timeout(self.policy.timeout)
    }
}

impl DataSource for TomTomAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::TomTom
    }

    fn capabilities(&self) -> CapabilitySet {
        CAPABILITIES
    }

    fn policy(&self) -> &ProviderPolicy {
        &self.policy
    }

    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> SourceFuture<'a, Payload> {
        Box::pin(async move {
            if request.kind != RequestKind::Traffic {
                return Err(SourceError::unsupported_kind(request.kind));
            }

            let center = require_location(request)?;
            let radius_km = request
                .options
                .radius_km
                .unwrap_or(DEFAULT_TRAFFIC_RADIUS_KM);
            let mut events: Vec<DisasterEvent> = Vec::new();
            for bbox in BoundingBox::around(center, radius_km).split() {
                let body: TomTomIncidents =
                    fetch_json(self.http_client.as_ref(), self.request(bbox)).await?;
                for incident in body.incidents {
                    let event = map_incident(incident)?;
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
            send(
                self.http_client.as_ref(),
                self.request(BoundingBox::around(probe_point()?, 1.0)),
            )
            .await
            .map(|_| ())
        })
    }
}

#[derive(Debug, Deserialize)]
struct TomTomIncidents {
    #[serde(default)]
    incidents: Vec<TomTomIncident>,
}

#[derive(Debug, Deserialize)]
struct TomTomIncident {
    geometry: TomTomGeometry,
    properties: TomTomProperties,
}

#[derive(Debug, Deserialize)]
struct TomTomGeometry {
    coordinates: TomTomCoordinates,
}

/// `Point` carries one position, `LineString` a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TomTomCoordinates {
    Point(Vec<f64>),
    Line(Vec<Vec<f64>>),
}

impl TomTomCoordinates {
    fn first(&self) -> Option<&[f64]> {
        match self {
            Self::Point(position) => Some(position.as_slice()),
            Self::Line(positions) => positions.first().map(Vec::as_slice),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TomTomProperties {
    id: String,
    #[serde(default)]
    magnitude_of_delay: u8,
    #[serde(default)]
    events: Vec<TomTomEvent>,
    start_time: Option<String>,
    end_time: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomTomEvent {
    description: String,
}

fn delay_severity(magnitude_of_delay: u8) -> Severity {
    match magnitude_of_delay {
        4 => Severity::Extreme,
        3 => Severity::Severe,
        2 => Severity::Moderate,
        _ => Severity::Minor,
    }
}

fn map_incident(incident: TomTomIncident) -> Result<DisasterEvent, SourceError> {
    let position = incident
        .geometry
        .coordinates
        .first()
        .ok_or_else(|| SourceError::malformed("incident geometry has no positions"))?;
    let location = point_from_lon_lat(position)?;
    let properties = incident.properties;
    let severity = delay_severity(properties.magnitude_of_delay);

    let summary = properties
        .events
        .iter()
        .map(|event| event.description.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    let title = if summary.is_empty() {
        String::from("Traffic incident")
    } else {
        summary
    };
    let description = match (&properties.from, &properties.to) {
        (Some(from), Some(to)) => Some(format!("{from} to {to}")),
        (Some(road), None) | (None, Some(road)) => Some(road.clone()),
        (None, None) => None,
    };
    let parse = |value: Option<&str>| value.and_then(|value| UtcDateTime::parse_lenient(value).ok());
    let ended_at = parse(properties.end_time.as_deref());

    Ok(DisasterEvent {
        id: format!("tomtom-{}", properties.id),
        category: DisasterCategory::Traffic,
        severity,
        title,
        description,
        location,
        radius_km: traffic_radius_km(severity),
        started_at: parse(properties.start_time.as_deref()).unwrap_or_else(UtcDateTime::now),
        ended_at,
        source: ProviderId::TomTom,
        is_active: true,
        magnitude: None,
    })
}
