use std::env;

use crate::ProviderId;

/// Default NWS user agent; api.weather.gov rejects anonymous clients.
pub const DEFAULT_NWS_USER_AGENT: &str = concat!("kinsafe/", env!("CARGO_PKG_VERSION"));

/// Provider credentials resolved from configuration.
///
/// # Environment Variables
///
/// | Provider | Primary Env Var | Fallback Env Var |
/// |----------|----------------|------------------|
/// | OpenWeatherMap | `KINSAFE_OPENWEATHER_API_KEY` | `OPENWEATHER_API_KEY` |
/// | WeatherAPI | `KINSAFE_WEATHERAPI_KEY` | `WEATHERAPI_KEY` |
/// | TomTom | `KINSAFE_TOMTOM_API_KEY` | `TOMTOM_API_KEY` |
/// | NWS user agent | `KINSAFE_NWS_USER_AGENT` | - |
/// | NWS, Open-Meteo, USGS, EMSC, EONET, GDELT | (no key required) | - |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub openweather_api_key: Option<String>,
    pub weatherapi_key: Option<String>,
    pub tomtom_api_key: Option<String>,
    pub nws_user_agent: String,
}

impl Default for ProviderCredentials {
    fn default() -> Self {
        Self {
            openweather_api_key: None,
            weatherapi_key: None,
            tomtom_api_key: None,
            nws_user_agent: String::from(DEFAULT_NWS_USER_AGENT),
        }
    }
}

impl ProviderCredentials {
    pub fn from_env() -> Self {
        Self {
            openweather_api_key: read_env("KINSAFE_OPENWEATHER_API_KEY", "OPENWEATHER_API_KEY"),
            weatherapi_key: read_env("KINSAFE_WEATHERAPI_KEY", "WEATHERAPI_KEY"),
            tomtom_api_key: read_env("KINSAFE_TOMTOM_API_KEY", "TOMTOM_API_KEY"),
            nws_user_agent: env::var("KINSAFE_NWS_USER_AGENT")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| String::from(DEFAULT_NWS_USER_AGENT)),
        }
    }

    pub fn with_key(mut self, provider: ProviderId, key: impl Into<String>) -> Self {
        let key = Some(key.into());
        match provider {
            ProviderId::OpenWeatherMap => self.openweather_api_key = key,
            ProviderId::WeatherApi => self.weatherapi_key = key,
            ProviderId::TomTom => self.tomtom_api_key = key,
            _ => {}
        }
        self
    }

    pub fn key_for(&self, provider: ProviderId) -> Option<&str> {
        match provider {
            ProviderId::OpenWeatherMap => self.openweather_api_key.as_deref(),
            ProviderId::WeatherApi => self.weatherapi_key.as_deref(),
            ProviderId::TomTom => self.tomtom_api_key.as_deref(),
            _ => None,
        }
    }
}

fn read_env(primary: &str, fallback: &str) -> Option<String> {
    env::var(primary)
        .or_else(|_| env::var(fallback))
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
