//! CLI argument definitions for kinsafe.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `weather` | Current conditions at a coordinate |
//! | `forecast` | Daily forecast (1-16 days) |
//! | `alerts` | Active weather alerts at a coordinate |
//! | `quakes` | Recent earthquakes |
//! | `fires` | Active wildfires |
//! | `unrest` | Civil unrest reports |
//! | `severe` | Severe weather events |
//! | `traffic` | Traffic incidents around a coordinate |
//! | `combined` | Every disaster category around a coordinate |
//! | `health` | Probe each configured provider |
//! | `ingest-quakes` | Store recent earthquakes in the local warehouse |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--offline` | `false` | Skip providers and return degraded results |
//! | `--strict` | `false` | Exit with code 3 when a result is degraded |
//! | `--log-level` | `KINSAFE_LOG` or `warn` | Tracing filter for stderr logs |
//!
//! # Examples
//!
//! ```bash
//! kinsafe weather --lat 39.7392 --lon -104.9903
//! kinsafe quakes --min-magnitude 4.5 --hours 48 --pretty
//! kinsafe combined --lat 34.05 --lon -118.24 --radius-km 100 --strict
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// kinsafe - resilient weather and disaster data
///
/// Queries several public providers per request, falls back in priority
/// order and always answers, marking results that are placeholders.
#[derive(Debug, Parser)]
#[command(name = "kinsafe", author, version, about = "Resilient weather and disaster data CLI")]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat the network as unreachable.
    #[arg(long, global = true, default_value_t = false)]
    pub offline: bool,

    /// Exit with code 3 when any result is degraded.
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Log filter (e.g. `debug`, `kinsafe_core=trace`). Overrides KINSAFE_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Current conditions at a coordinate.
    Weather(PointArgs),
    /// Daily forecast at a coordinate.
    Forecast(ForecastArgs),
    /// Active weather alerts at a coordinate.
    Alerts(PointArgs),
    /// Recent earthquakes, optionally around a coordinate.
    Quakes(QuakeArgs),
    /// Active wildfires.
    Fires(AreaArgs),
    /// Civil unrest reports.
    Unrest(AreaArgs),
    /// Severe weather events.
    Severe(AreaArgs),
    /// Traffic incidents around a coordinate.
    Traffic(AreaArgs),
    /// Every disaster category around a coordinate.
    Combined(CombinedArgs),
    /// Probe each configured provider.
    Health,
    /// Fetch recent earthquakes and store unseen ones.
    IngestQuakes(IngestArgs),
}

#[derive(Debug, Clone, Args)]
pub struct PointArgs {
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,
}

#[derive(Debug, Clone, Args)]
pub struct ForecastArgs {
    #[command(flatten)]
    pub point: PointArgs,

    /// Number of days, 1 to 16.
    #[arg(long, default_value_t = 5)]
    pub days: u32,
}

#[derive(Debug, Clone, Args)]
pub struct AreaArgs {
    /// Center latitude; requires --lon.
    #[arg(long, allow_negative_numbers = true, requires = "lon")]
    pub lat: Option<f64>,

    /// Center longitude; requires --lat.
    #[arg(long, allow_negative_numbers = true, requires = "lat")]
    pub lon: Option<f64>,

    /// Keep only events within this distance of the center.
    #[arg(long)]
    pub radius_km: Option<f64>,

    /// Look-back window in hours.
    #[arg(long)]
    pub hours: Option<u32>,

    #[arg(long)]
    pub limit: Option<usize>,

    /// Skip the response cache for this request.
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,
}

#[derive(Debug, Clone, Args)]
pub struct QuakeArgs {
    #[arg(long)]
    pub min_magnitude: Option<f64>,

    #[command(flatten)]
    pub area: AreaArgs,
}

#[derive(Debug, Clone, Args)]
pub struct CombinedArgs {
    #[command(flatten)]
    pub point: PointArgs,

    #[arg(long, default_value_t = 50.0)]
    pub radius_km: f64,
}

#[derive(Debug, Clone, Args)]
pub struct IngestArgs {
    #[command(flatten)]
    pub quakes: QuakeArgs,

    /// DuckDB file to write to. Defaults to $KINSAFE_HOME/data/events.duckdb.
    #[arg(long)]
    pub db: Option<PathBuf>,
}
