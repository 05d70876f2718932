//! Lookup-before-create persistence of discovered disaster events.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use kinsafe_warehouse::{DisasterRecord, Warehouse, WarehouseError};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{DisasterEvent, GeoPoint, UtcDateTime};
use crate::ValidationError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("stored event '{id}' is unreadable: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("event '{id}' already exists")]
    Duplicate { id: String },
}

/// Persistence collaborator used by ingestion. Calls may block.
pub trait DisasterStore: Send + Sync {
    fn find_by_id(&self, id: &str) -> Result<Option<DisasterEvent>, StoreError>;

    fn create(&self, event: &DisasterEvent) -> Result<DisasterEvent, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestFailure {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub created: usize,
    pub skipped: usize,
    pub failed: Vec<IngestFailure>,
}

/// Creates every event whose id is not stored yet. Existing ids are
/// skipped; a failure on one event does not stop the rest.
pub fn ingest_events(store: &dyn DisasterStore, events: &[DisasterEvent]) -> IngestReport {
    let mut report = IngestReport::default();

    for event in events {
        if event.id.trim().is_empty() {
            warn!(title = %event.title, "event without an id, not stored");
            report.failed.push(IngestFailure {
                id: event.id.clone(),
                message: ValidationError::EmptyEventId.to_string(),
            });
            continue;
        }

        let outcome = store.find_by_id(&event.id).and_then(|existing| match existing {
            Some(_) => Ok(false),
            None => store.create(event).map(|_| true),
        });

        match outcome {
            Ok(true) => report.created += 1,
            Ok(false) => {
                debug!(id = %event.id, "event already stored, skipping");
                report.skipped += 1;
            }
            Err(error) => {
                warn!(id = %event.id, %error, "event ingestion failed");
                report.failed.push(IngestFailure {
                    id: event.id.clone(),
                    message: error.to_string(),
                });
            }
        }
    }

    report
}

impl DisasterStore for Warehouse {
    fn find_by_id(&self, id: &str) -> Result<Option<DisasterEvent>, StoreError> {
        self.find_event_by_id(id)?
            .map(|record| record_to_event(&record))
            .transpose()
    }

    fn create(&self, event: &DisasterEvent) -> Result<DisasterEvent, StoreError> {
        let record = self.create_event(&event_to_record(event))?;
        record_to_event(&record)
    }
}

fn event_to_record(event: &DisasterEvent) -> DisasterRecord {
    DisasterRecord {
        id: event.id.clone(),
        category: event.category.as_str().to_owned(),
        severity: event.severity.as_str().to_owned(),
        title: event.title.clone(),
        description: event.description.clone(),
        latitude: event.location.latitude(),
        longitude: event.location.longitude(),
        radius_km: event.radius_km,
        started_at: event.started_at.format_rfc3339(),
        ended_at: event.ended_at.map(UtcDateTime::format_rfc3339),
        source: event.source.as_str().to_owned(),
        is_active: event.is_active,
        magnitude: event.magnitude,
    }
}

fn record_to_event(record: &DisasterRecord) -> Result<DisasterEvent, StoreError> {
    let corrupt = |error: ValidationError| StoreError::Corrupt {
        id: record.id.clone(),
        reason: error.to_string(),
    };

    Ok(DisasterEvent {
        id: record.id.clone(),
        category: record.category.parse().map_err(corrupt)?,
        severity: record.severity.parse().map_err(corrupt)?,
        title: record.title.clone(),
        description: record.description.clone(),
        location: GeoPoint::new(record.latitude, record.longitude).map_err(corrupt)?,
        radius_km: record.radius_km,
        started_at: UtcDateTime::parse(&record.started_at).map_err(corrupt)?,
        ended_at: record
            .ended_at
            .as_deref()
            .map(UtcDateTime::parse)
            .transpose()
            .map_err(corrupt)?,
        source: record.source.parse().map_err(corrupt)?,
        is_active: record.is_active,
        magnitude: record.magnitude,
    })
}

/// Process-local store keyed by event id.
#[derive(Debug, Default)]
pub struct InMemoryDisasterStore {
    events: Mutex<BTreeMap<String, DisasterEvent>>,
}

impl InMemoryDisasterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DisasterStore for InMemoryDisasterStore {
    fn find_by_id(&self, id: &str) -> Result<Option<DisasterEvent>, StoreError> {
        Ok(self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    fn create(&self, event: &DisasterEvent) -> Result<DisasterEvent, StoreError> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        if events.contains_key(&event.id) {
            return Err(StoreError::Duplicate {
                id: event.id.clone(),
            });
        }
        events.insert(event.id.clone(), event.clone());
        Ok(event.clone())
    }
}
