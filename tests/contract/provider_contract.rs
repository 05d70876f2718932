//! Provider adapters exercised over real HTTP against a local mock server.
//!
//! These tests pin the wire contract each adapter relies on: request path,
//! required query parameters and headers, and the mapping of a
//! representative response body into the normalized models.

use std::sync::Arc;

use kinsafe_core::{
    DataSource, FallbackOrchestrator, FetchOptions, FetchRequest, GeoPoint, HealthStatus,
    HttpClient, NwsAdapter, OpenWeatherMapAdapter, Origin, ProviderCredentials, ProviderId,
    ProviderPolicy, ReqwestHttpClient, RequestKind, Severity, SourceErrorKind, UsgsAdapter,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http() -> Arc<dyn HttpClient> {
    Arc::new(ReqwestHttpClient::new())
}

fn denver() -> GeoPoint {
    GeoPoint::new(39.7392, -104.9903).expect("valid point")
}

const USGS_FEED: &str = r#"{"type": "FeatureCollection", "features": [
    {"id": "us7000abcd", "geometry": {"type": "Point", "coordinates": [-104.9, 39.8, 5.0]},
     "properties": {"mag": 4.2, "place": "5 km N of Denver, CO", "time": 1717236000000,
                    "title": "M 4.2 - 5 km N of Denver, CO"}}
]}"#;

const EMSC_FEED: &str = r#"{"type": "FeatureCollection", "features": [
    {"type": "Feature", "id": "20240601_0000001",
     "geometry": {"type": "Point", "coordinates": [-104.8, 39.6, -8.0]},
     "properties": {"unid": "20240601_0000001", "mag": 3.1, "time": "2024-06-01T10:00:00.0Z",
                    "flynn_region": "COLORADO"}}
]}"#;

#[tokio::test]
async fn openweather_current_conditions_contract() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("appid", "owm-key"))
        .and(query_param("units", "imperial"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"name": "Denver",
                "main": {"temp": 72.5, "feels_like": 71.0, "humidity": 30, "pressure": 1016},
                "visibility": 16093, "wind": {"speed": 8.1, "deg": 220},
                "weather": [{"main": "Clouds", "description": "broken clouds"}],
                "dt": 1717236000}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = OpenWeatherMapAdapter::new(
        http(),
        "owm-key",
        ProviderPolicy::default_for(ProviderId::OpenWeatherMap).with_base_url(server.uri()),
    );
    let reading = adapter
        .fetch(&FetchRequest::at(RequestKind::CurrentConditions, denver()))
        .await
        .expect("fetch succeeds")
        .into_reading()
        .expect("conditions payload");

    assert_eq!(reading.location.name, "Denver");
    assert_eq!(reading.current.temperature_f, 72.5);
    assert_eq!(reading.current.humidity_pct, 30.0);
    assert_eq!(reading.current.condition.code, "cloudy");
    assert_eq!(reading.current.condition.description, "broken clouds");
    assert!((reading.current.visibility_mi - 10.0).abs() < 0.01);
    assert!(reading.current.substitutes.is_empty());
}

#[tokio::test]
async fn nws_alerts_send_contact_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/alerts/active"))
        .and(header("user-agent", "kinsafe-tests (ops@example.com)"))
        .and(header("accept", "application/geo+json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"features": [{"geometry": null, "properties": {
                "id": "urn:oid:2.49.0.1.840.0.abc", "event": "Winter Storm Warning",
                "severity": "Severe", "headline": "Winter Storm Warning until 6 PM MDT",
                "description": "Heavy snow expected.", "onset": "2024-01-10T12:00:00-07:00",
                "ends": "2024-01-11T18:00:00-07:00"}}]}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = NwsAdapter::new(
        http(),
        "kinsafe-tests (ops@example.com)",
        ProviderPolicy::default_for(ProviderId::Nws).with_base_url(server.uri()),
    );
    let alerts = adapter
        .fetch(&FetchRequest::at(RequestKind::WeatherAlerts, denver()))
        .await
        .expect("fetch succeeds")
        .into_alerts()
        .expect("alerts payload");

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].event, "Winter Storm Warning");
    assert_eq!(alerts[0].severity, Severity::Severe);
    assert_eq!(alerts[0].source, "nws");
    assert!(alerts[0].starts_at.is_some());
}

#[tokio::test]
async fn usgs_server_errors_are_unavailable_and_throttling_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken/query"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/throttled/query"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let request = FetchRequest::new(RequestKind::Earthquakes, None, FetchOptions::default())
        .expect("valid request");
    let broken = UsgsAdapter::new(
        http(),
        ProviderPolicy::default_for(ProviderId::Usgs)
            .with_base_url(format!("{}/broken", server.uri())),
    );
    let throttled = UsgsAdapter::new(
        http(),
        ProviderPolicy::default_for(ProviderId::Usgs)
            .with_base_url(format!("{}/throttled", server.uri())),
    );

    let error = broken.fetch(&request).await.expect_err("503 must fail");
    assert_eq!(error.kind(), SourceErrorKind::Unavailable);
    assert_eq!(error.message(), "returned status 503");

    let error = throttled.fetch(&request).await.expect_err("429 must fail");
    assert_eq!(error.kind(), SourceErrorKind::RateLimited);
}

#[tokio::test]
async fn orchestrator_falls_back_from_usgs_to_emsc_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/usgs/query"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/emsc/query"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EMSC_FEED))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = FallbackOrchestrator::builder()
        .with_http_client(http())
        .with_base_url(ProviderId::Usgs, format!("{}/usgs", server.uri()))
        .with_base_url(ProviderId::Emsc, format!("{}/emsc", server.uri()))
        .build();
    let request = FetchRequest::new(RequestKind::Earthquakes, None, FetchOptions::default())
        .expect("valid request");

    let resolved = orchestrator.fetch(&request).await;

    assert_eq!(resolved.meta.origin, Origin::Live);
    assert_eq!(resolved.meta.selected_provider, Some(ProviderId::Emsc));
    assert_eq!(
        resolved.meta.source_chain,
        vec![ProviderId::Usgs, ProviderId::Emsc]
    );
    assert_eq!(resolved.meta.errors, vec![String::from("USGS: returned status 500")]);

    let events = resolved.data.into_events().expect("events payload");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, "emsc-20240601_0000001");
    assert_eq!(events[0].title, "M 3.1 - Colorado");
}

#[tokio::test]
async fn health_check_probes_each_provider_directly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/usgs/version"))
        .respond_with(ResponseTemplate::new(200).set_body_string("1.14.1"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/usgs/query"))
        .respond_with(ResponseTemplate::new(200).set_body_string(USGS_FEED))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/emsc/query"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = FallbackOrchestrator::builder()
        .with_http_client(http())
        .with_base_url(ProviderId::Usgs, format!("{}/usgs", server.uri()))
        .with_base_url(ProviderId::Emsc, format!("{}/emsc", server.uri()))
        .without_provider(ProviderId::Nws)
        .without_provider(ProviderId::OpenMeteo)
        .without_provider(ProviderId::Eonet)
        .without_provider(ProviderId::Gdelt)
        .build();

    let report = orchestrator.health_check().await;

    assert_eq!(
        report.keys().copied().collect::<Vec<_>>(),
        vec![ProviderId::Usgs, ProviderId::Emsc]
    );
    assert_eq!(report[&ProviderId::Usgs].status, HealthStatus::Up);
    assert!(report[&ProviderId::Usgs].error.is_none());
    assert_eq!(report[&ProviderId::Emsc].status, HealthStatus::Down);
    assert_eq!(
        report[&ProviderId::Emsc].error.as_deref(),
        Some("returned status 502")
    );
    assert!(orchestrator.cache().is_empty().await);
}

#[tokio::test]
async fn transport_failures_never_expose_api_keys() {
    // Nothing listens on port 1, so every provider fails to connect.
    let unreachable = "http://127.0.0.1:1";
    let orchestrator = FallbackOrchestrator::builder()
        .with_http_client(http())
        .with_credentials(
            ProviderCredentials::default().with_key(ProviderId::OpenWeatherMap, "owm-secret-key"),
        )
        .with_base_url(ProviderId::OpenWeatherMap, unreachable)
        .with_base_url(ProviderId::Nws, unreachable)
        .with_base_url(ProviderId::OpenMeteo, unreachable)
        .build();

    let resolved = orchestrator
        .fetch(&FetchRequest::at(RequestKind::CurrentConditions, denver()))
        .await;

    assert_eq!(resolved.meta.origin, Origin::Degraded);
    assert!(resolved.meta.errors[0].starts_with("OpenWeatherMap: "));
    for error in &resolved.meta.errors {
        assert!(!error.contains("owm-secret-key"), "key in error: {error}");
        assert!(!error.contains("appid"), "query in error: {error}");
    }
    let notice = resolved.meta.degraded.expect("degraded notice");
    assert!(!notice.message.contains("owm-secret-key"));

    let reading = resolved.data.into_reading().expect("placeholder reading");
    assert!(!reading.current.condition.description.contains("owm-secret-key"));
    assert!(reading
        .alerts
        .iter()
        .all(|alert| !alert.description.contains("owm-secret-key")));
}
