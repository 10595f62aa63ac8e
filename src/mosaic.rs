use image::{RgbImage, imageops};
use rayon::prelude::*;

use crate::coords::{CoordinateConverter, GeoBounds, GeodeticService, TileIndex, VendorGeodetic};
use crate::error::{CoreResult, Error};
use crate::grid::TileGrid;

/// Encoded raster bytes of one tile at a known grid position.
#[derive(Clone, Debug)]
pub struct FetchedTile {
    pub index: TileIndex,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    OutsideGrid,
    Undecodable(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SkippedTile {
    pub index: TileIndex,
    pub reason: SkipReason,
}

pub struct Mosaic {
    image: RgbImage,
    grid: TileGrid,
    tile_width: u32,
    tile_height: u32,
    placed: usize,
    skipped: Vec<SkippedTile>,
}

impl Mosaic {
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn tile_size(&self) -> (u32, u32) {
        (self.tile_width, self.tile_height)
    }

    pub fn placed(&self) -> usize {
        self.placed
    }

    pub fn skipped(&self) -> &[SkippedTile] {
        &self.skipped
    }

    /// Geographic box spanned from the origin tile corner to the opposite
    /// grid corner.
    pub fn geographic_bounds<S: GeodeticService>(
        &self,
        converter: &CoordinateConverter<S>,
    ) -> CoreResult<GeoBounds<VendorGeodetic>> {
        let top_left = converter.tile_corner(self.grid.origin)?;
        let bottom_right = converter.tile_corner(self.grid.bottom_right())?;
        Ok(GeoBounds::new(
            bottom_right.lat,
            top_left.lng,
            top_left.lat,
            bottom_right.lng,
        ))
    }
}

/// Pastes tiles onto one canvas. Rows are visited south to north (ascending
/// y, then x) and row `r` lands at `(height - 1 - r) * tile_height`, so the
/// northmost row ends up at the top of the image. Absent tiles stay black.
/// Decoding runs on the global rayon pool.
///
/// The tile size comes from the first decoded tile. If nothing decodes there
/// is no size to lay the canvas out with, so the call fails with `NoTiles`
/// and the AOI is reported at the assemble stage instead of yielding an
/// all-black raster.
pub fn assemble(tiles: &[FetchedTile], grid: &TileGrid) -> CoreResult<Mosaic> {
    let mut ordered: Vec<&FetchedTile> = tiles.iter().collect();
    ordered.sort_by_key(|tile| (tile.index.y, tile.index.x));

    let outcomes: Vec<Result<(TileIndex, (u32, u32), RgbImage), SkippedTile>> = ordered
        .par_iter()
        .map(|tile| decode_tile(tile, grid))
        .collect();

    let mut skipped = Vec::new();
    let mut decoded = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            Ok(placed) => decoded.push(placed),
            Err(skip) => skipped.push(skip),
        }
    }

    let Some((_, _, first)) = decoded.first() else {
        return Err(Error::NoTiles);
    };
    let (tile_width, tile_height) = first.dimensions();

    let mut canvas = RgbImage::new(grid.width * tile_width, grid.height * tile_height);
    for (index, (col, row), raster) in &decoded {
        if raster.dimensions() != (tile_width, tile_height) {
            return Err(Error::InconsistentTileSize {
                tile: *index,
                expected_width: tile_width,
                expected_height: tile_height,
                found_width: raster.width(),
                found_height: raster.height(),
            });
        }
        let x = (col * tile_width) as i64;
        let y = ((grid.height - 1 - row) * tile_height) as i64;
        imageops::replace(&mut canvas, raster, x, y);
    }

    Ok(Mosaic {
        image: canvas,
        grid: *grid,
        tile_width,
        tile_height,
        placed: decoded.len(),
        skipped,
    })
}

fn decode_tile(
    tile: &FetchedTile,
    grid: &TileGrid,
) -> Result<(TileIndex, (u32, u32), RgbImage), SkippedTile> {
    let cell = grid.cell_of(tile.index).ok_or(SkippedTile {
        index: tile.index,
        reason: SkipReason::OutsideGrid,
    })?;
    let raster = image::load_from_memory(&tile.bytes).map_err(|err| SkippedTile {
        index: tile.index,
        reason: SkipReason::Undecodable(err.to_string()),
    })?;
    Ok((tile.index, cell, raster.into_rgb8()))
}
