use std::collections::BTreeMap;

use kinsafe_core::{HealthStatus, ProviderHealth, ProviderId, SafetyDataService};
use serde_json::{json, Value};

use crate::error::CliError;
use crate::output::Envelope;

/// Degraded when any provider is down.
pub async fn run(service: &SafetyDataService) -> Result<Envelope, CliError> {
    let report = service.health_check().await;
    let (resolution, degraded) = resolution(&report);

    Ok(Envelope::new(serde_json::to_value(&report)?, resolution, degraded))
}

/// Resolution metadata in the shape single-fetch envelopes use, so strict
/// mode can name what is down.
fn resolution(report: &BTreeMap<ProviderId, ProviderHealth>) -> (Value, bool) {
    let down = report
        .iter()
        .filter(|(_, health)| health.status == HealthStatus::Down)
        .map(|(provider, _)| *provider)
        .collect::<Vec<_>>();

    let degraded = if down.is_empty() {
        Value::Null
    } else {
        let names = down
            .iter()
            .map(|provider| provider.display_name())
            .collect::<Vec<_>>()
            .join(", ");
        json!({
            "reason": "providers_down",
            "message": format!("{} of {} providers down: {names}", down.len(), report.len()),
        })
    };

    (
        json!({
            "providers": report.len(),
            "down": down,
            "degraded": degraded,
        }),
        !down.is_empty(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::degraded_summary;

    fn health(status: HealthStatus, error: Option<&str>) -> ProviderHealth {
        ProviderHealth {
            status,
            response_time_ms: 12,
            error: error.map(str::to_owned),
        }
    }

    #[test]
    fn down_providers_mark_the_envelope_degraded() {
        let report = BTreeMap::from([
            (ProviderId::Usgs, health(HealthStatus::Up, None)),
            (ProviderId::Emsc, health(HealthStatus::Down, Some("returned status 502"))),
        ]);

        let (resolution, degraded) = resolution(&report);

        assert!(degraded);
        assert_eq!(resolution["down"], json!(["emsc"]));
        assert_eq!(
            resolution["degraded"]["message"],
            json!("1 of 2 providers down: EMSC")
        );
        assert_eq!(degraded_summary(&resolution), "providers_down");
    }

    #[test]
    fn all_up_is_not_degraded() {
        let report = BTreeMap::from([(ProviderId::Usgs, health(HealthStatus::Up, None))]);

        let (resolution, degraded) = resolution(&report);

        assert!(!degraded);
        assert!(resolution["degraded"].is_null());
    }
}
