use kinsafe_core::SafetyDataService;

use crate::cli::{AreaArgs, CombinedArgs, QuakeArgs};
use crate::error::CliError;
use crate::output::Envelope;

use super::{area_query, envelope, point, quake_query};

pub async fn quakes(service: &SafetyDataService, args: &QuakeArgs) -> Result<Envelope, CliError> {
    let resolved = service.recent_earthquakes(&quake_query(args)?).await?;
    envelope(resolved)
}

pub async fn fires(service: &SafetyDataService, args: &AreaArgs) -> Result<Envelope, CliError> {
    let resolved = service.active_wildfires(&area_query(args)?).await?;
    envelope(resolved)
}

pub async fn unrest(service: &SafetyDataService, args: &AreaArgs) -> Result<Envelope, CliError> {
    let resolved = service.civil_unrest(&area_query(args)?).await?;
    envelope(resolved)
}

pub async fn severe(service: &SafetyDataService, args: &AreaArgs) -> Result<Envelope, CliError> {
    let resolved = service.severe_weather(&area_query(args)?).await?;
    envelope(resolved)
}

pub async fn traffic(service: &SafetyDataService, args: &AreaArgs) -> Result<Envelope, CliError> {
    let resolved = service.traffic_incidents(&area_query(args)?).await?;
    envelope(resolved)
}

pub async fn combined(
    service: &SafetyDataService,
    args: &CombinedArgs,
) -> Result<Envelope, CliError> {
    let combined = service
        .combined_alerts(point(&args.point)?, args.radius_km)
        .await?;
    let degraded = combined.is_degraded();

    Ok(Envelope::new(
        serde_json::to_value(&combined.events)?,
        serde_json::to_value(&combined.categories)?,
        degraded,
    ))
}
