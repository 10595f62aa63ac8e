use std::fmt;
use std::path::{Path, PathBuf};

use image::RgbImage;
use owo_colors::OwoColorize;

use crate::aoi::AoiRecord;
use crate::coords::{CoordinateConverter, GeoBounds, GeodeticService, VendorGeodetic};
use crate::crop::crop;
use crate::fetch::{DirTileCache, FetchReport, LayerType, TileFetcher, TileSource};
use crate::grid::{GridPlan, plan_grid};
use crate::mask::mask;
use crate::metadata::{AoiSummary, SummaryInput};
use crate::mosaic::{Mosaic, assemble};
use crate::output::{ArtifactKind, ArtifactWriter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Plan,
    Fetch,
    Assemble,
    Crop,
    Mask,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Plan => "plan",
            Stage::Fetch => "fetch",
            Stage::Assemble => "assemble",
            Stage::Crop => "crop",
            Stage::Mask => "mask",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {error:#}")]
pub struct StageError {
    pub stage: Stage,
    pub error: anyhow::Error,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, StageError>;
}

impl<T, E: Into<anyhow::Error>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, StageError> {
        self.map_err(|err| StageError {
            stage,
            error: err.into(),
        })
    }
}

/// Everything derived for one AOI before anything is written.
pub struct ProcessedAoi {
    pub plan: GridPlan,
    pub fetch: FetchReport,
    pub mosaic: Mosaic,
    pub mosaic_bounds: GeoBounds<VendorGeodetic>,
    pub cropped: RgbImage,
    pub masked: RgbImage,
}

pub struct AoiFailure {
    pub address: String,
    pub stage: Stage,
    pub message: String,
}

#[derive(Default)]
pub struct RunSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub tiles_downloaded: usize,
    pub tiles_cached: usize,
    pub tiles_failed: usize,
    pub failures: Vec<AoiFailure>,
}

pub struct Pipeline<S, T> {
    converter: CoordinateConverter<S>,
    fetcher: TileFetcher<T>,
    zoom: u8,
    cache_root: PathBuf,
}

impl<S: GeodeticService, T: TileSource> Pipeline<S, T> {
    pub fn new(
        converter: CoordinateConverter<S>,
        fetcher: TileFetcher<T>,
        zoom: u8,
        cache_root: &Path,
    ) -> Self {
        Self {
            converter,
            fetcher,
            zoom,
            cache_root: cache_root.to_path_buf(),
        }
    }

    /// Plan, fetch, assemble, crop and mask one AOI.
    pub fn process(&self, record: &AoiRecord) -> Result<ProcessedAoi, StageError> {
        let plan = plan_grid(&self.converter, self.zoom, &record.bounds).at(Stage::Plan)?;
        let cache = DirTileCache::prepare(&self.cache_root, &record.address).at(Stage::Fetch)?;
        let mut fetch = self
            .fetcher
            .fetch_range(&plan.range, &cache, &record.address)
            .at(Stage::Fetch)?;
        let mosaic = assemble(&fetch.tiles, &plan.grid).at(Stage::Assemble)?;
        let mosaic_bounds = mosaic
            .geographic_bounds(&self.converter)
            .at(Stage::Assemble)?;
        // encoded bytes live on in the cache
        fetch.tiles.clear();
        let cropped = crop(&self.converter, &mosaic, &record.bounds, self.zoom).at(Stage::Crop)?;
        let masked = mask(&cropped, &record.polygon, &record.bounds).at(Stage::Mask)?;
        Ok(ProcessedAoi {
            plan,
            fetch,
            mosaic,
            mosaic_bounds,
            cropped,
            masked,
        })
    }

    pub fn run_one(
        &self,
        record: &AoiRecord,
        writer: &ArtifactWriter,
    ) -> Result<ProcessedAoi, StageError> {
        let processed = self.process(record)?;
        write_artifacts(record, &processed, self.zoom, self.fetcher.layer(), writer)
            .at(Stage::Write)?;
        Ok(processed)
    }

    /// Runs every record in order. A failing AOI is reported and skipped.
    pub fn run_all(&self, records: &[AoiRecord], writer: &ArtifactWriter) -> RunSummary {
        let mut summary = RunSummary::default();
        let total = records.len();
        for (idx, record) in records.iter().enumerate() {
            summary.processed += 1;
            println!(
                "{} [{}/{}] {}",
                "ℹ".blue().bold(),
                idx + 1,
                total,
                record.address.bold()
            );
            match self.run_one(record, writer) {
                Ok(processed) => {
                    summary.succeeded += 1;
                    summary.tiles_downloaded += processed.fetch.downloaded;
                    summary.tiles_cached += processed.fetch.cached;
                    summary.tiles_failed += processed.fetch.failures.len();
                    report_tile_problems(&processed);
                    println!(
                        "  {} {} tile(s) placed, {}x{} mosaic, {}x{} masked",
                        "✔".green().bold(),
                        processed.mosaic.placed(),
                        processed.mosaic.width(),
                        processed.mosaic.height(),
                        processed.masked.width(),
                        processed.masked.height()
                    );
                }
                Err(err) => {
                    println!("  {} {}", "✖".red().bold(), err);
                    summary.failures.push(AoiFailure {
                        address: record.address.clone(),
                        stage: err.stage,
                        message: format!("{:#}", err.error),
                    });
                }
            }
        }
        summary
    }
}

fn write_artifacts(
    record: &AoiRecord,
    processed: &ProcessedAoi,
    zoom: u8,
    layer: LayerType,
    writer: &ArtifactWriter,
) -> anyhow::Result<()> {
    writer.write_raster(ArtifactKind::Stitched, &record.address, processed.mosaic.image())?;
    writer.write_raster(ArtifactKind::Cropped, &record.address, &processed.cropped)?;
    writer.write_raster(ArtifactKind::Masked, &record.address, &processed.masked)?;
    let summary = AoiSummary::from_run(SummaryInput {
        address: &record.address,
        centroid: &record.centroid,
        zoom,
        layer,
        bounds: &record.bounds,
        grid: &processed.plan.grid,
        mosaic_bounds: &processed.mosaic_bounds,
        tile_size: processed.mosaic.tile_size(),
        placed: processed.mosaic.placed(),
        fetch: &processed.fetch,
        skipped: processed.mosaic.skipped().len(),
        mosaic_size: processed.mosaic.image().dimensions(),
        cropped_size: processed.cropped.dimensions(),
        masked_size: processed.masked.dimensions(),
    });
    writer.write_summary(&summary)?;
    Ok(())
}

fn report_tile_problems(processed: &ProcessedAoi) {
    for failure in &processed.fetch.failures {
        println!(
            "  {} Tile {} left blank: {}",
            "⚠".yellow().bold(),
            failure.index,
            failure.message
        );
    }
    for skipped in processed.mosaic.skipped() {
        println!(
            "  {} Tile {} skipped: {:?}",
            "⚠".yellow().bold(),
            skipped.index,
            skipped.reason
        );
    }
}

pub fn print_summary(summary: &RunSummary, output: &Path) {
    println!();
    if summary.failures.is_empty() {
        println!(
            "{} {}",
            "✔".green().bold(),
            "All AOIs processed".green().bold()
        );
    } else {
        println!(
            "{} {}",
            "⚠".yellow().bold(),
            "Finished with failures".yellow().bold()
        );
    }
    println!(
        "  {} {}",
        "Output directory:".bright_black(),
        output.display()
    );
    println!(
        "  {} {:>8}    {} {:>8}",
        "AOIs".cyan().bold(),
        summary.processed,
        "Succeeded".cyan().bold(),
        summary.succeeded
    );
    println!(
        "  {} {:>8}    {} {:>8}    {} {:>8}",
        "Downloaded".purple().bold(),
        summary.tiles_downloaded,
        "Cached".purple().bold(),
        summary.tiles_cached,
        "Failed".purple().bold(),
        summary.tiles_failed
    );
    for failure in &summary.failures {
        println!(
            "  {} {} ({}): {}",
            "✖".red().bold(),
            failure.address,
            failure.stage,
            failure.message
        );
    }
}
