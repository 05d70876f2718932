use kinsafe_core::SafetyDataService;

use crate::cli::{ForecastArgs, PointArgs};
use crate::error::CliError;
use crate::output::Envelope;

use super::{envelope, point};

pub async fn current(service: &SafetyDataService, args: &PointArgs) -> Result<Envelope, CliError> {
    let resolved = service.current_conditions(point(args)?).await?;
    envelope(resolved)
}

pub async fn forecast(
    service: &SafetyDataService,
    args: &ForecastArgs,
) -> Result<Envelope, CliError> {
    let resolved = service.forecast(point(&args.point)?, args.days).await?;
    envelope(resolved)
}

pub async fn alerts(service: &SafetyDataService, args: &PointArgs) -> Result<Envelope, CliError> {
    let resolved = service.active_alerts(point(args)?).await?;
    envelope(resolved)
}
