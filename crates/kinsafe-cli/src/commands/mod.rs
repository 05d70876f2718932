mod disasters;
mod health;
mod ingest;
mod weather;

use std::sync::Arc;

use kinsafe_core::{
    CacheMode, DisasterQuery, EarthquakeQuery, FallbackOrchestrator, GeoPoint, ReachabilityFlag,
    Resolved, SafetyDataService,
};
use serde::Serialize;
use serde_json::Value;

use crate::cli::{AreaArgs, Cli, Command, PointArgs, QuakeArgs};
use crate::error::CliError;
use crate::output::Envelope;

pub async fn run(cli: &Cli) -> Result<Envelope, CliError> {
    let service = build_service(cli.offline);

    match &cli.command {
        Command::Weather(args) => weather::current(&service, args).await,
        Command::Forecast(args) => weather::forecast(&service, args).await,
        Command::Alerts(args) => weather::alerts(&service, args).await,
        Command::Quakes(args) => disasters::quakes(&service, args).await,
        Command::Fires(args) => disasters::fires(&service, args).await,
        Command::Unrest(args) => disasters::unrest(&service, args).await,
        Command::Severe(args) => disasters::severe(&service, args).await,
        Command::Traffic(args) => disasters::traffic(&service, args).await,
        Command::Combined(args) => disasters::combined(&service, args).await,
        Command::Health => health::run(&service).await,
        Command::IngestQuakes(args) => ingest::run(&service, args).await,
    }
}

fn build_service(offline: bool) -> SafetyDataService {
    let mut builder = FallbackOrchestrator::builder().with_credentials(
        kinsafe_core::ProviderCredentials::from_env(),
    );
    if offline {
        builder = builder.with_reachability(Arc::new(ReachabilityFlag::new(false)));
    }
    SafetyDataService::new(builder.build())
}

/// Wraps a resolved result in the output envelope.
fn envelope<T: Serialize>(resolved: Resolved<T>) -> Result<Envelope, CliError> {
    let degraded = resolved.is_degraded();
    Ok(Envelope::new(
        serde_json::to_value(resolved.data)?,
        serde_json::to_value(resolved.meta)?,
        degraded,
    ))
}

fn point(args: &PointArgs) -> Result<GeoPoint, CliError> {
    Ok(GeoPoint::new(args.lat, args.lon)?)
}

fn area_query(args: &AreaArgs) -> Result<DisasterQuery, CliError> {
    let center = match (args.lat, args.lon) {
        (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)?),
        (None, None) => None,
        _ => {
            return Err(CliError::Command(String::from(
                "--lat and --lon must be given together",
            )))
        }
    };

    Ok(DisasterQuery {
        center,
        radius_km: args.radius_km,
        window_hours: args.hours,
        limit: args.limit,
        cache_mode: if args.no_cache {
            CacheMode::Bypass
        } else {
            CacheMode::Use
        },
    })
}

fn quake_query(args: &QuakeArgs) -> Result<EarthquakeQuery, CliError> {
    Ok(EarthquakeQuery {
        min_magnitude: args.min_magnitude,
        area: area_query(&args.area)?,
    })
}

/// Degraded reasons found in envelope resolution metadata, for the strict
/// mode error message.
pub fn degraded_summary(resolution: &Value) -> String {
    let reasons = match resolution {
        Value::Array(categories) => categories
            .iter()
            .filter_map(|category| {
                let reason = category.pointer("/meta/degraded/reason")?.as_str()?;
                let kind = category.get("kind")?.as_str()?;
                Some(format!("{kind}: {reason}"))
            })
            .collect::<Vec<_>>(),
        other => other
            .pointer("/degraded/reason")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .into_iter()
            .collect(),
    };

    if reasons.is_empty() {
        String::from("unknown")
    } else {
        reasons.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn area(lat: Option<f64>, lon: Option<f64>) -> AreaArgs {
        AreaArgs {
            lat,
            lon,
            radius_km: Some(25.0),
            hours: None,
            limit: Some(3),
            no_cache: true,
        }
    }

    #[test]
    fn area_args_become_a_bypassing_query() {
        let query = area_query(&area(Some(34.0), Some(-118.0))).expect("valid area");

        assert!(query.center.is_some());
        assert_eq!(query.radius_km, Some(25.0));
        assert_eq!(query.limit, Some(3));
        assert_eq!(query.cache_mode, CacheMode::Bypass);
    }

    #[test]
    fn half_a_center_is_rejected() {
        let error = area_query(&area(Some(34.0), None)).expect_err("missing lon");
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn out_of_range_center_is_a_validation_error() {
        let error = area_query(&area(Some(95.0), Some(0.0))).expect_err("bad latitude");
        assert!(matches!(error, CliError::Validation(_)));
    }

    #[test]
    fn degraded_summary_reads_single_and_combined_metadata() {
        let single = json!({"origin": "degraded", "degraded": {"reason": "offline", "message": "x"}});
        assert_eq!(degraded_summary(&single), "offline");

        let combined = json!([
            {"kind": "earthquakes", "meta": {"degraded": null}},
            {"kind": "traffic", "meta": {"degraded": {"reason": "no_providers"}}}
        ]);
        assert_eq!(degraded_summary(&combined), "traffic: no_providers");
    }
}
