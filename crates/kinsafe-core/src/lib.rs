//! # Kinsafe Core
//!
//! Resilient weather and disaster data for the kinsafe safety toolkit.
//!
//! ## Overview
//!
//! This crate turns a set of unreliable third-party providers into one
//! dependable source:
//!
//! - **Normalized domain models** for weather readings, forecasts, alerts and disaster events
//! - **Provider adapters** for nine public weather, seismic, fire, unrest and traffic APIs
//! - **Fallback orchestration** with per-kind provider priority, caching and rate budgets
//! - **Degraded results** instead of errors when no provider can answer
//! - **Idempotent ingestion** of disaster events into a persistence collaborator
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters (OpenWeatherMap, WeatherAPI, NWS, Open-Meteo, USGS, EMSC, EONET, GDELT, TomTom) |
//! | [`cache`] | TTL response cache keyed by request fingerprint |
//! | [`config`] | Provider credentials from the environment |
//! | [`data_source`] | Data source trait and request/payload types |
//! | [`degraded`] | Placeholder payloads for exhausted or offline fetches |
//! | [`distance`] | Haversine distance and radius filtering |
//! | [`domain`] | Domain models (WeatherReading, DisasterEvent, GeoPoint) |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`ingest`] | Lookup-before-create event persistence |
//! | [`provider_policy`] | Per-provider timeout, budget and base URL |
//! | [`reachability`] | Network reachability port |
//! | [`routing`] | Fallback orchestrator |
//! | [`service`] | Caller-facing operations |
//! | [`source`] | Provider identifiers |
//! | [`throttling`] | Per-provider rate limiting |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kinsafe_core::{EarthquakeQuery, GeoPoint, SafetyDataService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = SafetyDataService::from_env();
//!     let denver = GeoPoint::new(39.7392, -104.9903)?;
//!
//!     let quakes = service
//!         .recent_earthquakes(&EarthquakeQuery::around(denver, 500.0).with_min_magnitude(3.0))
//!         .await?;
//!     for event in &quakes.data {
//!         println!("{} ({})", event.title, event.severity);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / Caller   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ SafetyData      │────▶│ Distance Filter  │
//! │ Service         │     └──────────────────┘
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Fallback        │────▶│ Cache / Rate     │
//! │ Orchestrator    │     │ Limiter          │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Data Source     │────▶│ HTTP Client      │
//! │ (Adapter Trait) │     │ (reqwest/fixture)│
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Provider failures never reach the caller. Only invalid arguments do:
//!
//! ```rust
//! use kinsafe_core::{CoreError, GeoPoint, ValidationError};
//!
//! fn describe(error: CoreError) -> &'static str {
//!     match error {
//!         CoreError::Validation(ValidationError::InvalidForecastDays { .. }) => "bad days",
//!         CoreError::Validation(_) => "bad input",
//!         _ => "internal",
//!     }
//! }
//!
//! assert!(GeoPoint::new(91.0, 0.0).is_err());
//! ```
//!
//! ## Security
//!
//! - API keys are read from environment variables only (never logged)
//! - All HTTP requests use TLS via rustls

pub mod adapters;
pub mod cache;
pub mod config;
pub mod data_source;
pub mod degraded;
pub mod distance;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod ingest;
pub mod provider_policy;
pub mod reachability;
pub mod routing;
pub mod service;
pub mod source;
pub mod throttling;

// Adapter implementations
pub use adapters::{
    EmscAdapter, EonetAdapter, GdeltAdapter, NwsAdapter, OpenMeteoAdapter, OpenWeatherMapAdapter,
    TomTomAdapter, UsgsAdapter, WeatherApiAdapter,
};

// Caching
pub use cache::{CacheMode, ResponseCache};

// Configuration
pub use config::ProviderCredentials;

// Data source trait and types
pub use data_source::{
    CapabilitySet, DataSource, FetchOptions, FetchRequest, Payload, RequestKind, SourceError,
    SourceErrorKind,
};

// Degraded results
pub use degraded::{DegradedNotice, DegradedReason};

// Distance filtering
pub use distance::{filter_within, haversine_km, BoundingBox, Located};

// Domain models
pub use domain::{
    AlertKind, CurrentConditions, DisasterCategory, DisasterEvent, ForecastDay, GeoPoint,
    Severity, UtcDateTime, WeatherAlert, WeatherCondition, WeatherLocation, WeatherReading,
};

// Error types
pub use error::{CoreError, ValidationError};

// Warehouse (re-exported from kinsafe-warehouse)
pub use kinsafe_warehouse::{DisasterRecord, Warehouse, WarehouseConfig, WarehouseError};

// HTTP client types
pub use http_client::{
    FixtureHttpClient, HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient,
};

// Ingestion
pub use ingest::{
    ingest_events, DisasterStore, InMemoryDisasterStore, IngestFailure, IngestReport, StoreError,
};

// Provider policies
pub use provider_policy::ProviderPolicy;

// Reachability
pub use reachability::{AlwaysOnline, NetworkReachability, ReachabilityFlag};

// Routing types
pub use routing::{
    FallbackOrchestrator, HealthStatus, OrchestratorBuilder, Origin, ProviderHealth,
    ResolutionMeta, Resolved, SkippedProvider,
};

// Service API
pub use service::{CategoryOutcome, CombinedAlerts, DisasterQuery, EarthquakeQuery, SafetyDataService};

// Source identifiers
pub use source::ProviderId;

// Throttling
pub use throttling::{RateGate, RateLimiter};
