//! Scripted in-process providers shared by the behavior tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use kinsafe_core::data_source::SourceFuture;
use kinsafe_core::{
    CapabilitySet, DataSource, DisasterCategory, DisasterEvent, FetchRequest, GeoPoint, Payload,
    ProviderId, ProviderPolicy, RequestKind, Severity, SourceError, UtcDateTime,
};

pub const QUAKES: &[RequestKind] = &[RequestKind::Earthquakes];
pub const CONDITIONS: &[RequestKind] = &[RequestKind::CurrentConditions];

/// Order in which scripted providers were invoked.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<ProviderId>>>);

impl CallLog {
    pub fn record(&self, provider: ProviderId) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(provider);
    }

    pub fn calls(&self) -> Vec<ProviderId> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.calls().len()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[derive(Debug, Clone)]
pub enum Script {
    Succeed(Payload),
    Fail(&'static str),
    /// Sleeps before answering with the payload.
    Slow(Duration, Payload),
}

pub struct ScriptedSource {
    id: ProviderId,
    kinds: &'static [RequestKind],
    policy: ProviderPolicy,
    script: Script,
    log: CallLog,
}

impl ScriptedSource {
    pub fn new(
        id: ProviderId,
        kinds: &'static [RequestKind],
        script: Script,
        log: &CallLog,
    ) -> Arc<Self> {
        Self::with_policy(id, kinds, script, log, ProviderPolicy::default_for(id))
    }

    pub fn with_policy(
        id: ProviderId,
        kinds: &'static [RequestKind],
        script: Script,
        log: &CallLog,
        policy: ProviderPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            kinds,
            policy,
            script,
            log: log.clone(),
        })
    }
}

impl DataSource for ScriptedSource {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(self.kinds)
    }

    fn policy(&self) -> &ProviderPolicy {
        &self.policy
    }

    fn fetch<'a>(&'a self, _request: &'a FetchRequest) -> SourceFuture<'a, Payload> {
        self.log.record(self.id);
        Box::pin(async move {
            match &self.script {
                Script::Succeed(payload) => Ok(payload.clone()),
                Script::Fail(message) => Err(SourceError::unavailable(*message)),
                Script::Slow(delay, payload) => {
                    tokio::time::sleep(*delay).await;
                    Ok(payload.clone())
                }
            }
        })
    }

    fn probe<'a>(&'a self) -> SourceFuture<'a, ()> {
        Box::pin(async move {
            match &self.script {
                Script::Fail(message) => Err(SourceError::unavailable(*message)),
                _ => Ok(()),
            }
        })
    }
}

pub fn point(latitude: f64, longitude: f64) -> GeoPoint {
    GeoPoint::new(latitude, longitude).expect("valid point")
}

pub fn quake(id: &str, source: ProviderId, location: GeoPoint) -> DisasterEvent {
    DisasterEvent {
        id: id.to_owned(),
        category: DisasterCategory::Earthquake,
        severity: Severity::Minor,
        title: format!("M 3.0 - {id}"),
        description: None,
        location,
        radius_km: 25.0,
        started_at: UtcDateTime::parse("2024-06-01T10:00:00Z").expect("timestamp"),
        ended_at: None,
        source,
        is_active: false,
        magnitude: Some(3.0),
    }
}

pub fn events(events: Vec<DisasterEvent>) -> Payload {
    Payload::Events(events)
}
