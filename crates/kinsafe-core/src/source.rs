use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical provider identifiers used in metadata, cache entries and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "openweathermap")]
    OpenWeatherMap,
    #[serde(rename = "weatherapi")]
    WeatherApi,
    #[serde(rename = "nws")]
    Nws,
    #[serde(rename = "open_meteo")]
    OpenMeteo,
    #[serde(rename = "usgs")]
    Usgs,
    #[serde(rename = "emsc")]
    Emsc,
    #[serde(rename = "eonet")]
    Eonet,
    #[serde(rename = "gdelt")]
    Gdelt,
    #[serde(rename = "tomtom")]
    TomTom,
}

impl ProviderId {
    pub const ALL: [Self; 9] = [
        Self::OpenWeatherMap,
        Self::WeatherApi,
        Self::Nws,
        Self::OpenMeteo,
        Self::Usgs,
        Self::Emsc,
        Self::Eonet,
        Self::Gdelt,
        Self::TomTom,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenWeatherMap => "openweathermap",
            Self::WeatherApi => "weatherapi",
            Self::Nws => "nws",
            Self::OpenMeteo => "open_meteo",
            Self::Usgs => "usgs",
            Self::Emsc => "emsc",
            Self::Eonet => "eonet",
            Self::Gdelt => "gdelt",
            Self::TomTom => "tomtom",
        }
    }

    /// Human-facing name used when rendering error lists.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::OpenWeatherMap => "OpenWeatherMap",
            Self::WeatherApi => "WeatherAPI",
            Self::Nws => "NWS",
            Self::OpenMeteo => "Open-Meteo",
            Self::Usgs => "USGS",
            Self::Emsc => "EMSC",
            Self::Eonet => "NASA EONET",
            Self::Gdelt => "GDELT",
            Self::TomTom => "TomTom",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|provider| provider.as_str() == normalized)
            .ok_or_else(|| ValidationError::InvalidProvider {
                value: value.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_and_dashed_names() {
        assert_eq!("usgs".parse::<ProviderId>(), Ok(ProviderId::Usgs));
        assert_eq!("Open-Meteo".parse::<ProviderId>(), Ok(ProviderId::OpenMeteo));
        assert!(matches!(
            "darksky".parse::<ProviderId>(),
            Err(ValidationError::InvalidProvider { .. })
        ));
    }

    #[test]
    fn serde_name_matches_as_str() {
        for provider in ProviderId::ALL {
            let encoded = serde_json::to_string(&provider).expect("serialize");
            assert_eq!(encoded, format!("\"{}\"", provider.as_str()));
        }
    }
}
