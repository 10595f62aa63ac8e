//! Shared fixtures for unit tests.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::Mutex;

use anyhow::{Result, bail};
use image::{ImageFormat, Rgb, RgbImage};
use indicatif::ProgressBar;

use crate::coords::{GeodeticService, TileIndex};
use crate::error::{CoreResult, Error};
use crate::fetch::{LayerType, TileSource};

/// Projected units per degree used by [`LinearService`].
pub const UNITS_PER_DEGREE: f64 = 100_000.0;

/// Stand-in for the conversion service: projected = degrees * constant.
#[derive(Default)]
pub struct LinearService {
    fail: bool,
}

impl LinearService {
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl GeodeticService for LinearService {
    fn geodetic_to_projected(&self, lng: f64, lat: f64) -> CoreResult<(f64, f64)> {
        if self.fail {
            return Err(Error::conversion("service offline"));
        }
        Ok((lng * UNITS_PER_DEGREE, lat * UNITS_PER_DEGREE))
    }

    fn projected_to_geodetic(&self, x: f64, y: f64) -> CoreResult<(f64, f64)> {
        if self.fail {
            return Err(Error::conversion("service offline"));
        }
        Ok((x / UNITS_PER_DEGREE, y / UNITS_PER_DEGREE))
    }
}

pub fn solid_tile(size: u32, color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(size, size, Rgb(color))
}

pub fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("encode png fixture");
    bytes.into_inner()
}

pub fn solid_tile_png(size: u32, color: [u8; 3]) -> Vec<u8> {
    encode_png(&solid_tile(size, color))
}

/// Serves one colour per tile and fails for the listed indices.
pub struct MemoryTileSource {
    colors: HashMap<TileIndex, [u8; 3]>,
    default_color: [u8; 3],
    failing: HashSet<TileIndex>,
    size: u32,
    pub requests: Mutex<Vec<TileIndex>>,
}

impl MemoryTileSource {
    pub fn uniform(color: [u8; 3], size: u32) -> Self {
        Self {
            colors: HashMap::new(),
            default_color: color,
            failing: HashSet::new(),
            size,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_color(mut self, tile: TileIndex, color: [u8; 3]) -> Self {
        self.colors.insert(tile, color);
        self
    }

    pub fn failing_on(mut self, tile: TileIndex) -> Self {
        self.failing.insert(tile);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

impl TileSource for MemoryTileSource {
    fn fetch(&self, tile: TileIndex, _layer: LayerType, _pb: &ProgressBar) -> Result<Vec<u8>> {
        self.requests.lock().expect("requests lock").push(tile);
        if self.failing.contains(&tile) {
            bail!("simulated outage for tile {tile}");
        }
        let color = self
            .colors
            .get(&tile)
            .copied()
            .unwrap_or(self.default_color);
        Ok(solid_tile_png(self.size, color))
    }
}
