use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use donor_pair::config::{LoggingSettings, Settings};
use donor_pair::services::{spatial_from_settings, write_pairs, write_summary, UnitLoader};
use donor_pair::DonorMatcher;

/// Pair receiver catchments with donor catchments by attribute similarity
/// and spatial proximity
#[derive(Debug, Parser)]
#[command(name = "donor-pair", version, about)]
struct Args {
    /// Configuration file, layered over config/default and config/local
    #[arg(long)]
    config: Option<PathBuf>,

    /// Attribute distance method (gower or urf)
    #[arg(long)]
    method: Option<String>,

    /// Attribute set used for the main round
    #[arg(long)]
    scenario: Option<String>,

    /// Pairing table destination
    #[arg(long)]
    output: Option<PathBuf>,

    /// Run summary destination (JSON)
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(method) = args.method {
        settings.method = method;
    }
    if let Some(scenario) = args.scenario {
        settings.scenario = scenario;
    }
    if let Some(output) = &args.output {
        settings.output.pairs = output.display().to_string();
    }
    if let Some(summary) = &args.summary {
        settings.output.summary = Some(summary.display().to_string());
    }

    init_logging(&settings.logging);

    info!(method = %settings.method, scenario = %settings.scenario, "starting donor-receiver pairing");

    let matcher = DonorMatcher::from_settings(&settings).context("invalid pairing configuration")?;

    let units_path = settings
        .input
        .units
        .as_deref()
        .context("input.units is not set")?;
    let units = UnitLoader::new(settings.category_col.clone(), settings.non_attr_cols.clone())
        .load(Path::new(units_path))
        .with_context(|| format!("failed to load units from {}", units_path))?;
    let spatial = spatial_from_settings(&settings.input, &units).context("failed to obtain spatial distances")?;

    let started = Instant::now();
    let result = matcher.run(&units, &spatial).context("pairing failed")?;
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "pairing run finished");

    write_pairs(&result.table, Path::new(&settings.output.pairs))
        .with_context(|| format!("failed to write {}", settings.output.pairs))?;
    if let Some(path) = &settings.output.summary {
        write_summary(&result.summary, Path::new(path)).with_context(|| format!("failed to write {}", path))?;
    }

    Ok(())
}

/// `RUST_LOG` wins over `logging.level`; `LOG_FORMAT` wins over `logging.format`
fn init_logging(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| logging.format.clone());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.pretty().init();
    }
}
