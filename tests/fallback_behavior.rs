//! Behavior-driven tests for the fallback orchestrator
//!
//! These tests verify HOW a fetch resolves: cache short-circuit, TTL
//! expiry, provider priority, degraded results and rate-limit gating.

mod support;

use std::sync::Arc;
use std::time::Duration;

use governor::clock::FakeRelativeClock;
use kinsafe_core::{
    CacheMode, DegradedReason, FallbackOrchestrator, FetchOptions, FetchRequest,
    FixtureHttpClient, Origin, ProviderCredentials, ProviderId, RateLimiter, RequestKind,
    SafetyDataService,
};
use support::{events, point, quake, CallLog, Script, ScriptedSource, CONDITIONS, QUAKES};

fn quake_request() -> FetchRequest {
    FetchRequest::new(RequestKind::Earthquakes, None, FetchOptions::default())
        .expect("valid request")
}

fn single_usgs(log: &CallLog) -> FallbackOrchestrator {
    let payload = events(vec![quake("q1", ProviderId::Usgs, point(35.0, -118.0))]);
    FallbackOrchestrator::builder()
        .without_stock_sources()
        .with_source(ScriptedSource::new(
            ProviderId::Usgs,
            QUAKES,
            Script::Succeed(payload),
            log,
        ))
        .build()
}

// =============================================================================
// Cache
// =============================================================================

#[tokio::test]
async fn when_fresh_entry_is_cached_no_provider_is_invoked() {
    // Given: An orchestrator whose cache was filled by a first fetch
    let log = CallLog::default();
    let orchestrator = single_usgs(&log);
    let first = orchestrator.fetch(&quake_request()).await;
    assert_eq!(first.meta.origin, Origin::Live);
    log.clear();

    // When: The same request is fetched again inside the TTL
    let second = orchestrator.fetch(&quake_request()).await;

    // Then: It is served from the cache with zero provider calls
    assert_eq!(log.count(), 0);
    assert_eq!(second.meta.origin, Origin::Cache);
    assert_eq!(second.meta.selected_provider, Some(ProviderId::Usgs));
    assert!(second.meta.source_chain.is_empty());
    assert_eq!(second.data, first.data);
}

#[tokio::test]
async fn when_entry_outlives_ttl_providers_are_invoked_again() {
    // Given: A 1 ms TTL for earthquake results
    let log = CallLog::default();
    let payload = events(vec![quake("q1", ProviderId::Usgs, point(35.0, -118.0))]);
    let orchestrator = FallbackOrchestrator::builder()
        .without_stock_sources()
        .with_source(ScriptedSource::new(
            ProviderId::Usgs,
            QUAKES,
            Script::Succeed(payload),
            &log,
        ))
        .with_cache_ttl(RequestKind::Earthquakes, Duration::from_millis(1))
        .build();
    orchestrator.fetch(&quake_request()).await;

    // When: The entry is looked up after 10 ms
    tokio::time::sleep(Duration::from_millis(10)).await;
    let again = orchestrator.fetch(&quake_request()).await;

    // Then: The expired entry is treated as absent
    assert_eq!(again.meta.origin, Origin::Live);
    assert_eq!(log.count(), 2);
}

#[tokio::test]
async fn when_cache_mode_is_refresh_the_cache_is_skipped_but_rewritten() {
    // Given: A populated cache
    let log = CallLog::default();
    let orchestrator = single_usgs(&log);
    orchestrator.fetch(&quake_request()).await;

    // When: A refresh fetch is issued, then a normal one
    let refresh = FetchRequest::new(
        RequestKind::Earthquakes,
        None,
        FetchOptions::default().with_cache_mode(CacheMode::Refresh),
    )
    .expect("valid request");
    let refreshed = orchestrator.fetch(&refresh).await;
    let cached = orchestrator.fetch(&quake_request()).await;

    // Then: The refresh goes live and the follow-up hits the cache
    assert_eq!(refreshed.meta.origin, Origin::Live);
    assert_eq!(cached.meta.origin, Origin::Cache);
    assert_eq!(log.count(), 2);
}

// =============================================================================
// Priority order
// =============================================================================

#[tokio::test]
async fn when_first_provider_fails_second_answers_and_third_is_never_called() {
    // Given: A fails, B and C would both succeed
    let log = CallLog::default();
    let orchestrator = FallbackOrchestrator::builder()
        .without_stock_sources()
        .with_source(ScriptedSource::new(
            ProviderId::Usgs,
            QUAKES,
            Script::Fail("returned status 503"),
            &log,
        ))
        .with_source(ScriptedSource::new(
            ProviderId::Emsc,
            QUAKES,
            Script::Succeed(events(vec![quake("b", ProviderId::Emsc, point(1.0, 1.0))])),
            &log,
        ))
        .with_source(ScriptedSource::new(
            ProviderId::Eonet,
            QUAKES,
            Script::Succeed(events(vec![quake("c", ProviderId::Eonet, point(2.0, 2.0))])),
            &log,
        ))
        .with_priority(
            RequestKind::Earthquakes,
            vec![ProviderId::Usgs, ProviderId::Emsc, ProviderId::Eonet],
        )
        .build();

    // When: The request is fetched
    let resolved = orchestrator.fetch(&quake_request()).await;

    // Then: B's result is returned after A was tried, and C is untouched
    assert_eq!(log.calls(), vec![ProviderId::Usgs, ProviderId::Emsc]);
    assert_eq!(resolved.meta.selected_provider, Some(ProviderId::Emsc));
    assert_eq!(
        resolved.meta.errors,
        vec![String::from("USGS: returned status 503")]
    );
    let events = resolved.data.into_events().expect("events payload");
    assert_eq!(events[0].id, "b");
}

// =============================================================================
// Forecast horizon
// =============================================================================

fn open_meteo_days(count: usize) -> String {
    let dates = (1..=count)
        .map(|day| format!("\"2024-06-{day:02}\""))
        .collect::<Vec<_>>()
        .join(",");
    let column = |value: &str| vec![value; count].join(",");
    format!(
        r#"{{"daily": {{"time": [{dates}], "weather_code": [{}],
            "temperature_2m_max": [{}], "temperature_2m_min": [{}]}}}}"#,
        column("0"),
        column("75.0"),
        column("55.0"),
    )
}

#[tokio::test]
async fn when_primary_forecast_is_too_short_the_next_provider_answers() {
    // Given: OpenWeatherMap only covers two days, Open-Meteo covers ten
    let owm_body = r#"{"list": [
        {"dt": 1717243200, "main": {"temp_min": 60.0, "temp_max": 70.0},
         "weather": [{"main": "Clear", "description": "clear sky"}]},
        {"dt": 1717329600, "main": {"temp_min": 58.0, "temp_max": 72.0},
         "weather": [{"main": "Clouds", "description": "few clouds"}]}
    ]}"#;
    let http = FixtureHttpClient::new()
        .with_json("owm.test/forecast", owm_body)
        .with_json("meteo.test/forecast", open_meteo_days(10));
    let service = SafetyDataService::new(
        FallbackOrchestrator::builder()
            .with_credentials(
                ProviderCredentials::default().with_key(ProviderId::OpenWeatherMap, "owm-key"),
            )
            .with_http_client(Arc::new(http))
            .with_base_url(ProviderId::OpenWeatherMap, "https://owm.test")
            .with_base_url(ProviderId::OpenMeteo, "https://meteo.test")
            .build(),
    );

    // When: Ten days are requested
    let resolved = service
        .forecast(point(39.74, -104.99), 10)
        .await
        .expect("valid forecast request");

    // Then: The short answer is recorded as a failure and Open-Meteo serves all ten days
    assert_eq!(resolved.meta.origin, Origin::Live);
    assert_eq!(resolved.meta.selected_provider, Some(ProviderId::OpenMeteo));
    assert_eq!(
        resolved.meta.errors,
        vec![String::from(
            "OpenWeatherMap: covers 2 of 10 requested forecast days"
        )]
    );
    assert_eq!(resolved.data.len(), 10);
}

// =============================================================================
// Total failure
// =============================================================================

#[tokio::test]
async fn when_every_provider_fails_result_is_degraded_and_not_cached() {
    // Given: Two weather providers that both fail
    let log = CallLog::default();
    let orchestrator = FallbackOrchestrator::builder()
        .without_stock_sources()
        .with_source(ScriptedSource::new(
            ProviderId::OpenWeatherMap,
            CONDITIONS,
            Script::Fail("returned status 401"),
            &log,
        ))
        .with_source(ScriptedSource::new(
            ProviderId::Nws,
            CONDITIONS,
            Script::Fail("transport error: connection refused"),
            &log,
        ))
        .build();
    let request = FetchRequest::at(RequestKind::CurrentConditions, point(39.74, -104.99));

    // When: Current conditions are fetched
    let resolved = orchestrator.fetch(&request).await;

    // Then: A placeholder naming every failure comes back instead of an error
    assert_eq!(resolved.meta.origin, Origin::Degraded);
    let notice = resolved.meta.degraded.clone().expect("degraded notice");
    assert_eq!(notice.reason, DegradedReason::Exhausted);
    let reading = resolved.data.into_reading().expect("placeholder reading");
    let description = &reading.current.condition.description;
    assert!(description.contains("OpenWeatherMap: returned status 401"));
    assert!(description.contains("NWS: transport error: connection refused"));
    assert_eq!(reading.current.condition.code, "unavailable");
    assert_eq!(reading.alerts.len(), 1);

    // And: The placeholder was not cached, so a retry reaches providers again
    assert!(orchestrator.cache().is_empty().await);
    log.clear();
    let retry = orchestrator.fetch(&request).await;
    assert_eq!(retry.meta.origin, Origin::Degraded);
    assert_eq!(
        log.calls(),
        vec![ProviderId::OpenWeatherMap, ProviderId::Nws]
    );
}

// =============================================================================
// Rate limiting
// =============================================================================

#[test]
fn rate_budget_closes_for_the_window_and_reopens_after_sixty_seconds() {
    // Given: A budget of three calls per minute on a controllable clock
    let clock = FakeRelativeClock::default();
    let limiter = RateLimiter::with_clock(clock.clone()).with_budget(ProviderId::Gdelt, 3);

    // When: The budget is spent
    for _ in 0..3 {
        assert!(limiter.try_acquire(ProviderId::Gdelt));
    }

    // Then: Calls are refused for the rest of the window
    assert!(!limiter.try_acquire(ProviderId::Gdelt));
    clock.advance(Duration::from_secs(30));
    assert!(!limiter.try_acquire(ProviderId::Gdelt));

    // And: Admitted again once more than 60 seconds have passed
    clock.advance(Duration::from_secs(31));
    assert!(limiter.try_acquire(ProviderId::Gdelt));
}

#[tokio::test]
async fn when_budget_is_spent_provider_is_skipped_without_an_error() {
    // Given: USGS has a budget of one call; EMSC is unrestricted
    let log = CallLog::default();
    let orchestrator = FallbackOrchestrator::builder()
        .without_stock_sources()
        .with_source(ScriptedSource::new(
            ProviderId::Usgs,
            QUAKES,
            Script::Succeed(events(vec![quake("u", ProviderId::Usgs, point(1.0, 1.0))])),
            &log,
        ))
        .with_source(ScriptedSource::new(
            ProviderId::Emsc,
            QUAKES,
            Script::Succeed(events(vec![quake("e", ProviderId::Emsc, point(1.0, 1.0))])),
            &log,
        ))
        .with_rate_limiter(Arc::new(
            RateLimiter::with_clock(FakeRelativeClock::default())
                .with_budget(ProviderId::Usgs, 1),
        ))
        .build();
    let bypass = FetchRequest::new(
        RequestKind::Earthquakes,
        None,
        FetchOptions::default().with_cache_mode(CacheMode::Bypass),
    )
    .expect("valid request");

    // When: Two uncached fetches are made
    let first = orchestrator.fetch(&bypass).await;
    let second = orchestrator.fetch(&bypass).await;

    // Then: The second skips USGS silently and is served by EMSC
    assert_eq!(first.meta.selected_provider, Some(ProviderId::Usgs));
    assert_eq!(second.meta.selected_provider, Some(ProviderId::Emsc));
    assert_eq!(second.meta.source_chain, vec![ProviderId::Emsc]);
    assert_eq!(second.meta.skipped.len(), 1);
    assert_eq!(second.meta.skipped[0].provider, ProviderId::Usgs);
    assert!(second.meta.errors.is_empty());
    assert_eq!(
        log.calls(),
        vec![ProviderId::Usgs, ProviderId::Emsc]
    );
}
