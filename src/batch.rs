use anyhow::{Result, bail};
use owo_colors::OwoColorize;

use crate::aoi::read_aoi_csv;
use crate::cli::RunConfig;
use crate::config::AppConfig;
use crate::coords::CoordinateConverter;
use crate::fetch::{HttpTileSource, TileFetcher};
use crate::output::ArtifactWriter;
use crate::pipeline::{Pipeline, print_summary};
use crate::service::HttpGeodeticService;

pub fn run_batch(config: &RunConfig) -> Result<()> {
    let app_config = match &config.config {
        Some(path) => {
            let loaded = AppConfig::load_from_path(path)?;
            println!(
                "{} Loaded config: {}",
                "ℹ".blue().bold(),
                path.display()
            );
            loaded
        }
        None => AppConfig::default(),
    }
    .with_env_access_key();
    let app_config = match config.zoom {
        Some(zoom) => app_config.with_zoom(zoom)?,
        None => app_config,
    };

    let records = read_aoi_csv(&config.input)?;
    if records.is_empty() {
        bail!("No AOI records found in {}", config.input.display());
    }
    println!(
        "{} Read {} AOI record(s) from {}",
        "✔".green().bold(),
        records.len(),
        config.input.display()
    );

    let writer = ArtifactWriter::prepare(&config.output)?;
    let service = HttpGeodeticService::new(app_config.service())?;
    let source = HttpTileSource::new(app_config.tiles())?;
    let fetcher = TileFetcher::new(
        source,
        app_config.layer(),
        app_config.fetch_concurrency(),
    );
    println!(
        "{} Zoom {}, {} tiles, {} concurrent fetches, cache {}",
        "ℹ".blue().bold(),
        app_config.zoom(),
        app_config.layer(),
        app_config.fetch_concurrency(),
        app_config.cache_dir().display()
    );

    let pipeline = Pipeline::new(
        CoordinateConverter::new(service),
        fetcher,
        app_config.zoom(),
        app_config.cache_dir(),
    );
    let summary = pipeline.run_all(&records, &writer);
    print_summary(&summary, writer.root());
    Ok(())
}
