//! Typed, caller-facing operations over the fallback orchestrator.
//!
//! Every operation returns `Ok` for any provider outcome; errors are limited
//! to invalid arguments. Check [`Resolved::is_degraded`] before treating a
//! result as authoritative.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::cache::CacheMode;
use crate::data_source::{FetchOptions, FetchRequest, Payload, RequestKind};
use crate::distance::filter_within;
use crate::domain::{DisasterEvent, ForecastDay, GeoPoint, WeatherAlert, WeatherReading};
use crate::error::CoreError;
use crate::ingest::{ingest_events, DisasterStore, IngestReport};
use crate::routing::{FallbackOrchestrator, ProviderHealth, ResolutionMeta, Resolved};
use crate::ProviderId;

/// Filters shared by the disaster categories.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisasterQuery {
    pub center: Option<GeoPoint>,
    pub radius_km: Option<f64>,
    pub window_hours: Option<u32>,
    pub limit: Option<usize>,
    pub cache_mode: CacheMode,
}

impl DisasterQuery {
    pub fn around(center: GeoPoint, radius_km: f64) -> Self {
        Self {
            center: Some(center),
            radius_km: Some(radius_km),
            ..Self::default()
        }
    }

    pub fn with_window_hours(mut self, window_hours: u32) -> Self {
        self.window_hours = Some(window_hours);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }

    fn options(&self) -> FetchOptions {
        FetchOptions {
            window_hours: self.window_hours,
            limit: self.limit,
            radius_km: self.radius_km,
            cache_mode: self.cache_mode,
            ..FetchOptions::default()
        }
    }
}

/// Earthquake search: a [`DisasterQuery`] plus a magnitude floor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EarthquakeQuery {
    pub min_magnitude: Option<f64>,
    pub area: DisasterQuery,
}

impl EarthquakeQuery {
    pub fn around(center: GeoPoint, radius_km: f64) -> Self {
        Self {
            min_magnitude: None,
            area: DisasterQuery::around(center, radius_km),
        }
    }

    pub fn with_min_magnitude(mut self, min_magnitude: f64) -> Self {
        self.min_magnitude = Some(min_magnitude);
        self
    }

    pub fn with_window_hours(mut self, window_hours: u32) -> Self {
        self.area = self.area.with_window_hours(window_hours);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.area = self.area.with_limit(limit);
        self
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.area = self.area.with_cache_mode(cache_mode);
        self
    }
}

/// Per-category metadata of a combined fan-out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryOutcome {
    pub kind: RequestKind,
    pub count: usize,
    pub meta: ResolutionMeta,
}

/// Hazards from every disaster category around one point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedAlerts {
    pub events: Vec<DisasterEvent>,
    pub categories: Vec<CategoryOutcome>,
}

impl CombinedAlerts {
    pub fn degraded_kinds(&self) -> Vec<RequestKind> {
        self.categories
            .iter()
            .filter(|outcome| outcome.meta.degraded.is_some())
            .map(|outcome| outcome.kind)
            .collect()
    }

    pub fn is_degraded(&self) -> bool {
        self.categories
            .iter()
            .any(|outcome| outcome.meta.degraded.is_some())
    }
}

/// Category order used by [`SafetyDataService::combined_alerts`].
pub const COMBINED_KINDS: [RequestKind; 5] = [
    RequestKind::Earthquakes,
    RequestKind::Wildfires,
    RequestKind::SevereWeather,
    RequestKind::CivilUnrest,
    RequestKind::Traffic,
];

/// Weather and disaster lookups for a safety application.
///
/// # Example
///
/// ```rust,ignore
/// use kinsafe_core::{GeoPoint, SafetyDataService};
///
/// let service = SafetyDataService::from_env();
/// let reading = service.current_conditions(GeoPoint::new(39.74, -104.99)?).await?;
/// if reading.is_degraded() {
///     eprintln!("{}", reading.data.current.condition.description);
/// }
/// ```
pub struct SafetyDataService {
    orchestrator: FallbackOrchestrator,
}

impl SafetyDataService {
    pub fn new(orchestrator: FallbackOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Stock providers configured from the environment.
    pub fn from_env() -> Self {
        Self::new(FallbackOrchestrator::builder().build())
    }

    pub fn orchestrator(&self) -> &FallbackOrchestrator {
        &self.orchestrator
    }

    pub async fn current_conditions(
        &self,
        point: GeoPoint,
    ) -> Result<Resolved<WeatherReading>, CoreError> {
        let request = FetchRequest::at(RequestKind::CurrentConditions, point);
        let resolved = self.orchestrator.fetch(&request).await;
        extract(resolved, "conditions", Payload::into_reading)
    }

    /// Daily forecast for `days` in `1..=16`.
    pub async fn forecast(
        &self,
        point: GeoPoint,
        days: u32,
    ) -> Result<Resolved<Vec<ForecastDay>>, CoreError> {
        let request = FetchRequest::new(
            RequestKind::Forecast,
            Some(point),
            FetchOptions::default().with_days(days),
        )?;
        let resolved = self.orchestrator.fetch(&request).await;
        extract(resolved, "forecast", Payload::into_forecast)
    }

    pub async fn active_alerts(
        &self,
        point: GeoPoint,
    ) -> Result<Resolved<Vec<WeatherAlert>>, CoreError> {
        let request = FetchRequest::at(RequestKind::WeatherAlerts, point);
        let resolved = self.orchestrator.fetch(&request).await;
        extract(resolved, "alerts", Payload::into_alerts)
    }

    pub async fn recent_earthquakes(
        &self,
        query: &EarthquakeQuery,
    ) -> Result<Resolved<Vec<DisasterEvent>>, CoreError> {
        let mut options = query.area.options();
        options.min_magnitude = query.min_magnitude;
        self.disaster_events(RequestKind::Earthquakes, &query.area, options)
            .await
    }

    pub async fn active_wildfires(
        &self,
        query: &DisasterQuery,
    ) -> Result<Resolved<Vec<DisasterEvent>>, CoreError> {
        self.disaster_events(RequestKind::Wildfires, query, query.options())
            .await
    }

    pub async fn civil_unrest(
        &self,
        query: &DisasterQuery,
    ) -> Result<Resolved<Vec<DisasterEvent>>, CoreError> {
        self.disaster_events(RequestKind::CivilUnrest, query, query.options())
            .await
    }

    pub async fn severe_weather(
        &self,
        query: &DisasterQuery,
    ) -> Result<Resolved<Vec<DisasterEvent>>, CoreError> {
        self.disaster_events(RequestKind::SevereWeather, query, query.options())
            .await
    }

    /// Requires `query.center`.
    pub async fn traffic_incidents(
        &self,
        query: &DisasterQuery,
    ) -> Result<Resolved<Vec<DisasterEvent>>, CoreError> {
        self.disaster_events(RequestKind::Traffic, query, query.options())
            .await
    }

    /// Queries every disaster category concurrently, concatenates the events
    /// in [`COMBINED_KINDS`] order and keeps those within `radius_km`.
    pub async fn combined_alerts(
        &self,
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<CombinedAlerts, CoreError> {
        let area = DisasterQuery::around(center, radius_km);
        let quakes = EarthquakeQuery {
            min_magnitude: None,
            area: area.clone(),
        };

        let (earthquakes, wildfires, severe, unrest, traffic) = tokio::join!(
            self.recent_earthquakes(&quakes),
            self.active_wildfires(&area),
            self.severe_weather(&area),
            self.civil_unrest(&area),
            self.traffic_incidents(&area),
        );

        let mut combined = CombinedAlerts {
            events: Vec::new(),
            categories: Vec::with_capacity(COMBINED_KINDS.len()),
        };
        for (kind, resolved) in COMBINED_KINDS
            .into_iter()
            .zip([earthquakes?, wildfires?, severe?, unrest?, traffic?])
        {
            combined.categories.push(CategoryOutcome {
                kind,
                count: resolved.data.len(),
                meta: resolved.meta,
            });
            combined.events.extend(resolved.data);
        }
        combined.events = filter_within(combined.events, center, radius_km);

        Ok(combined)
    }

    /// One direct probe per registered provider.
    pub async fn health_check(&self) -> BTreeMap<ProviderId, ProviderHealth> {
        self.orchestrator.health_check().await
    }

    /// Fetches recent earthquakes and stores the ones `store` has not seen.
    /// A degraded fetch yields an empty report. Store calls run on the
    /// blocking pool.
    pub async fn ingest_recent_earthquakes(
        &self,
        store: Arc<dyn DisasterStore>,
        query: &EarthquakeQuery,
    ) -> Result<Resolved<IngestReport>, CoreError> {
        let Resolved { data: events, meta } = self.recent_earthquakes(query).await?;
        let report =
            tokio::task::spawn_blocking(move || ingest_events(store.as_ref(), &events)).await?;
        Ok(Resolved { data: report, meta })
    }

    async fn disaster_events(
        &self,
        kind: RequestKind,
        query: &DisasterQuery,
        options: FetchOptions,
    ) -> Result<Resolved<Vec<DisasterEvent>>, CoreError> {
        let request = FetchRequest::new(kind, query.center, options)?;
        let resolved = self.orchestrator.fetch(&request).await;
        let resolved = extract(resolved, "events", Payload::into_events)?;

        Ok(resolved.map(|events| narrow(events, query)))
    }
}

fn narrow(events: Vec<DisasterEvent>, query: &DisasterQuery) -> Vec<DisasterEvent> {
    let fetched = events.len();
    let mut events = match (query.center, query.radius_km) {
        (Some(center), Some(radius_km)) => filter_within(events, center, radius_km),
        _ => events,
    };
    if let Some(limit) = query.limit {
        events.truncate(limit);
    }
    debug!(fetched, kept = events.len(), "narrowed disaster events");
    events
}

fn extract<T>(
    resolved: Resolved<Payload>,
    expected: &'static str,
    into: impl FnOnce(Payload) -> Option<T>,
) -> Result<Resolved<T>, CoreError> {
    let Resolved { data, meta } = resolved;
    let found = data.shape();
    match into(data) {
        Some(data) => Ok(Resolved { data, meta }),
        None => Err(CoreError::PayloadShape { expected, found }),
    }
}
