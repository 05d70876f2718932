use std::time::Duration;

use crate::ProviderId;

/// Static per-provider call policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPolicy {
    pub provider_id: ProviderId,
    /// Upper bound on a single adapter call, enforced by the orchestrator.
    pub timeout: Duration,
    pub requests_per_minute: u32,
    /// Providers without a free tier are dropped when no key is configured.
    pub requires_key: bool,
    pub base_url: String,
}

impl ProviderPolicy {
    pub fn default_for(provider_id: ProviderId) -> Self {
        let (timeout_secs, requests_per_minute, requires_key, base_url) = match provider_id {
            ProviderId::OpenWeatherMap => {
                (5, 60, true, "https://api.openweathermap.org/data/2.5")
            }
            ProviderId::WeatherApi => (8, 60, true, "https://api.weatherapi.com/v1"),
            ProviderId::Nws => (12, 30, false, "https://api.weather.gov"),
            ProviderId::OpenMeteo => (10, 60, false, "https://api.open-meteo.com/v1"),
            ProviderId::Usgs => (10, 30, false, "https://earthquake.usgs.gov/fdsnws/event/1"),
            ProviderId::Emsc => (10, 30, false, "https://www.seismicportal.eu/fdsnws/event/1"),
            ProviderId::Eonet => (12, 20, false, "https://eonet.gsfc.nasa.gov/api/v3"),
            ProviderId::Gdelt => (12, 10, false, "https://api.gdeltproject.org/api/v2/geo/geo"),
            ProviderId::TomTom => (5, 30, true, "https://api.tomtom.com/traffic/services/5"),
        };

        Self {
            provider_id,
            timeout: Duration::from_secs(timeout_secs),
            requests_per_minute,
            requires_key,
            base_url: String::from(base_url),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_requests_per_minute(mut self, requests_per_minute: u32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }

    /// Joins a path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        if path.is_empty() {
            return self.base_url.clone();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
