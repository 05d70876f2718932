//! Provider adapters: one HTTP exchange per call, one schema mapping each.

mod emsc;
mod eonet;
mod gdelt;
mod nws;
mod open_meteo;
mod openweather;
mod tomtom;
mod usgs;
mod weatherapi;

use std::sync::Arc;

use serde::de::DeserializeOwned;

pub use emsc::EmscAdapter;
pub use eonet::EonetAdapter;
pub use gdelt::GdeltAdapter;
pub use nws::NwsAdapter;
pub use open_meteo::OpenMeteoAdapter;
pub use openweather::OpenWeatherMapAdapter;
pub use tomtom::TomTomAdapter;
pub use usgs::UsgsAdapter;
pub use weatherapi::WeatherApiAdapter;

use crate::config::ProviderCredentials;
use crate::data_source::{DataSource, FetchRequest, SourceError};
use crate::domain::{ForecastDay, GeoPoint};
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::provider_policy::ProviderPolicy;
use crate::ProviderId;

/// Fixed coordinate used by health probes (Washington, DC).
pub(crate) const PROBE_LATITUDE: f64 = 38.8977;
pub(crate) const PROBE_LONGITUDE: f64 = -77.0365;

/// Builds the stock adapter for `provider`, or `None` when it needs a key
/// that is not configured.
pub fn build_adapter(
    provider: ProviderId,
    http_client: Arc<dyn HttpClient>,
    policy: ProviderPolicy,
    credentials: &ProviderCredentials,
) -> Option<Arc<dyn DataSource>> {
    let key = credentials.key_for(provider).map(str::to_owned);
    if policy.requires_key && key.is_none() {
        return None;
    }

    let adapter: Arc<dyn DataSource> = match provider {
        ProviderId::OpenWeatherMap => Arc::new(OpenWeatherMapAdapter::new(
            http_client,
            key.unwrap_or_default(),
            policy,
        )),
        ProviderId::WeatherApi => Arc::new(WeatherApiAdapter::new(
            http_client,
            key.unwrap_or_default(),
            policy,
        )),
        ProviderId::Nws => Arc::new(NwsAdapter::new(
            http_client,
            credentials.nws_user_agent.clone(),
            policy,
        )),
        ProviderId::OpenMeteo => Arc::new(OpenMeteoAdapter::new(http_client, policy)),
        ProviderId::Usgs => Arc::new(UsgsAdapter::new(http_client, policy)),
        ProviderId::Emsc => Arc::new(EmscAdapter::new(http_client, policy)),
        ProviderId::Eonet => Arc::new(EonetAdapter::new(http_client, policy)),
        ProviderId::Gdelt => Arc::new(GdeltAdapter::new(http_client, policy)),
        ProviderId::TomTom => Arc::new(TomTomAdapter::new(
            http_client,
            key.unwrap_or_default(),
            policy,
        )),
    };
    Some(adapter)
}

/// Executes a request and rejects transport failures and non-2xx statuses.
pub(crate) async fn send(
    client: &dyn HttpClient,
    request: HttpRequest,
) -> Result<HttpResponse, SourceError> {
    let response = client.execute(request).await.map_err(|error| {
        if error.is_timeout() {
            SourceError::timeout(error.message().to_owned())
        } else {
            SourceError::unavailable(format!("transport error: {}", error.message()))
        }
    })?;

    let status = response.status;
    if status == 429 {
        return Err(SourceError::rate_limited("returned status 429"));
    }
    if !response.is_success() {
        return Err(SourceError::unavailable(format!("returned status {status}")));
    }
    Ok(response)
}

/// Executes a request and decodes the body into the provider's wire shape.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    client: &dyn HttpClient,
    request: HttpRequest,
) -> Result<T, SourceError> {
    let response = send(client, request).await?;
    serde_json::from_str(&response.body)
        .map_err(|error| SourceError::malformed(format!("unexpected response shape: {error}")))
}

pub(crate) fn require_location(request: &FetchRequest) -> Result<GeoPoint, SourceError> {
    request.location.ok_or_else(|| {
        SourceError::invalid_request(format!(
            "request kind '{}' needs a location",
            request.kind
        ))
    })
}

/// GeoJSON-style `[longitude, latitude, ...]` pair into a validated point.
pub(crate) fn point_from_lon_lat(coordinates: &[f64]) -> Result<GeoPoint, SourceError> {
    match coordinates {
        [longitude, latitude, ..] => GeoPoint::new(*latitude, *longitude)
            .map_err(|error| SourceError::malformed(format!("bad coordinate: {error}"))),
        _ => Err(SourceError::malformed(format!(
            "expected [lon, lat], got {} values",
            coordinates.len()
        ))),
    }
}

/// Rejects a forecast shorter than the caller asked for, so the chain can
/// move on to a provider with a longer horizon.
pub(crate) fn cover_days(
    mut days: Vec<ForecastDay>,
    requested: Option<u32>,
) -> Result<Vec<ForecastDay>, SourceError> {
    let Some(requested) = requested.map(|value| value as usize) else {
        return Ok(days);
    };
    if days.len() < requested {
        return Err(SourceError::unavailable(format!(
            "covers {} of {requested} requested forecast days",
            days.len()
        )));
    }
    days.truncate(requested);
    Ok(days)
}

/// Lowercase ASCII slug used to build synthetic ids.
pub(crate) fn slug(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            output.push(ch.to_ascii_lowercase());
        } else if !output.ends_with('-') && !output.is_empty() {
            output.push('-');
        }
    }
    output.trim_end_matches('-').to_owned()
}

pub(crate) fn probe_point() -> Result<GeoPoint, SourceError> {
    GeoPoint::new(PROBE_LATITUDE, PROBE_LONGITUDE)
        .map_err(|error| SourceError::internal(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{FixtureHttpClient, HttpError};

    #[tokio::test]
    async fn send_classifies_failures() {
        let client = FixtureHttpClient::new()
            .with_response("/busy", HttpResponse::with_status(429, ""))
            .with_response("/down", HttpResponse::with_status(503, "oops"))
            .with_error("/slow", HttpError::timeout("request timeout"));

        let busy = send(&client, HttpRequest::get("https://p.test/busy"))
            .await
            .expect_err("429");
        let down = send(&client, HttpRequest::get("https://p.test/down"))
            .await
            .expect_err("503");
        let slow = send(&client, HttpRequest::get("https://p.test/slow"))
            .await
            .expect_err("timeout");

        assert_eq!(busy.code(), "source.rate_limited");
        assert_eq!(down.message(), "returned status 503");
        assert_eq!(slow.code(), "source.timeout");
    }

    #[tokio::test]
    async fn fetch_json_reports_shape_mismatch_as_malformed() {
        #[derive(Debug, serde::Deserialize)]
        struct Expected {
            #[allow(dead_code)]
            features: Vec<u8>,
        }

        let client = FixtureHttpClient::new().with_json("/feed", r#"{"rows":[]}"#);
        let error = fetch_json::<Expected>(&client, HttpRequest::get("https://p.test/feed"))
            .await
            .expect_err("missing field");

        assert_eq!(error.code(), "source.malformed");
        assert!(error.message().contains("features"));
    }

    #[test]
    fn keyed_providers_are_skipped_without_credentials() {
        let client: Arc<dyn HttpClient> = Arc::new(FixtureHttpClient::new());
        let credentials = ProviderCredentials::default();

        let owm = build_adapter(
            ProviderId::OpenWeatherMap,
            Arc::clone(&client),
            ProviderPolicy::default_for(ProviderId::OpenWeatherMap),
            &credentials,
        );
        let usgs = build_adapter(
            ProviderId::Usgs,
            client,
            ProviderPolicy::default_for(ProviderId::Usgs),
            &credentials,
        );

        assert!(owm.is_none());
        assert_eq!(usgs.map(|adapter| adapter.id()), Some(ProviderId::Usgs));
    }

    #[test]
    fn slug_collapses_separators() {
        assert_eq!(slug("  Flash Flood -- Warning! "), "flash-flood-warning");
        assert_eq!(slug("São Paulo"), "s-o-paulo");
    }

    #[test]
    fn lon_lat_pairs_are_validated() {
        let point = point_from_lon_lat(&[-117.5, 35.7, 8.2]).expect("valid");
        assert_eq!(point.latitude(), 35.7);
        assert!(point_from_lon_lat(&[1.0]).is_err());
        assert!(point_from_lon_lat(&[200.0, 10.0]).is_err());
    }
}
