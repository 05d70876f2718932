use std::sync::Arc;

use kinsafe_core::{SafetyDataService, Warehouse, WarehouseConfig};
use tracing::info;

use crate::cli::IngestArgs;
use crate::error::CliError;
use crate::output::Envelope;

use super::{envelope, quake_query};

pub async fn run(service: &SafetyDataService, args: &IngestArgs) -> Result<Envelope, CliError> {
    let query = quake_query(&args.quakes)?;
    let warehouse = match &args.db {
        Some(db_path) => Warehouse::open(WarehouseConfig {
            db_path: db_path.clone(),
            ..WarehouseConfig::default()
        })?,
        None => Warehouse::open_default()?,
    };

    let resolved = service
        .ingest_recent_earthquakes(Arc::new(warehouse.clone()), &query)
        .await?;
    info!(
        db = %warehouse.db_path().display(),
        created = resolved.data.created,
        skipped = resolved.data.skipped,
        failed = resolved.data.failed.len(),
        "earthquake ingestion finished"
    );
    envelope(resolved)
}
