use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::coords::{GeoBounds, VendorGeodetic};
use crate::fetch::{FetchReport, LayerType};
use crate::grid::TileGrid;

/// Per-AOI run record written next to the rasters.
#[derive(Debug, Serialize, Deserialize)]
pub struct AoiSummary {
    pub address: String,
    pub centroid: String,
    pub zoom: u8,
    pub layer: LayerType,
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
    pub origin_tile_x: i64,
    pub origin_tile_y: i64,
    pub grid_width: u32,
    pub grid_height: u32,
    pub mosaic_bounds: [f64; 4],
    pub tile_size: [u32; 2],
    pub tiles_placed: usize,
    pub tiles_downloaded: usize,
    pub tiles_cached: usize,
    pub tiles_skipped: usize,
    pub failed_tiles: Vec<String>,
    pub mosaic_size: [u32; 2],
    pub cropped_size: [u32; 2],
    pub masked_size: [u32; 2],
}

pub struct SummaryInput<'a> {
    pub address: &'a str,
    pub centroid: &'a str,
    pub zoom: u8,
    pub layer: LayerType,
    pub bounds: &'a GeoBounds<VendorGeodetic>,
    pub grid: &'a TileGrid,
    pub mosaic_bounds: &'a GeoBounds<VendorGeodetic>,
    pub tile_size: (u32, u32),
    pub placed: usize,
    pub fetch: &'a FetchReport,
    pub skipped: usize,
    pub mosaic_size: (u32, u32),
    pub cropped_size: (u32, u32),
    pub masked_size: (u32, u32),
}

impl AoiSummary {
    pub fn from_run(input: SummaryInput<'_>) -> Self {
        Self {
            address: input.address.to_string(),
            centroid: input.centroid.to_string(),
            zoom: input.zoom,
            layer: input.layer,
            min_lat: input.bounds.min_lat,
            min_lng: input.bounds.min_lng,
            max_lat: input.bounds.max_lat,
            max_lng: input.bounds.max_lng,
            origin_tile_x: input.grid.origin.x,
            origin_tile_y: input.grid.origin.y,
            grid_width: input.grid.width,
            grid_height: input.grid.height,
            mosaic_bounds: [
                input.mosaic_bounds.min_lat,
                input.mosaic_bounds.min_lng,
                input.mosaic_bounds.max_lat,
                input.mosaic_bounds.max_lng,
            ],
            tile_size: [input.tile_size.0, input.tile_size.1],
            tiles_placed: input.placed,
            tiles_downloaded: input.fetch.downloaded,
            tiles_cached: input.fetch.cached,
            tiles_skipped: input.skipped,
            failed_tiles: input
                .fetch
                .failures
                .iter()
                .map(|failure| failure.index.to_string())
                .collect(),
            mosaic_size: [input.mosaic_size.0, input.mosaic_size.1],
            cropped_size: [input.cropped_size.0, input.cropped_size.1],
            masked_size: [input.masked_size.0, input.masked_size.1],
        }
    }
}

pub fn write_summary(path: &Path, summary: &AoiSummary) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write summary {}", path.display()))?;
    Ok(path.to_path_buf())
}
