use thiserror::Error;

use crate::coords::TileIndex;

pub type CoreResult<T> = std::result::Result<T, Error>;

/// Failures of the geometry and raster stages.
///
/// Every variant is local to the AOI being processed; the pipeline reports it
/// and moves on to the next record.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Coordinate conversion unavailable: {reason}")]
    ConversionUnavailable { reason: String },

    #[error(
        "Tile {tile} is {found_width}x{found_height} but the mosaic uses {expected_width}x{expected_height} tiles"
    )]
    InconsistentTileSize {
        tile: TileIndex,
        expected_width: u32,
        expected_height: u32,
        found_width: u32,
        found_height: u32,
    },

    #[error("No tiles available to assemble a mosaic")]
    NoTiles,

    #[error("Polygon is empty ({vertices} distinct vertices, {width}x{height} px footprint)")]
    EmptyPolygon {
        vertices: usize,
        width: u32,
        height: u32,
    },

    #[error("Tile bounds have no extent (lat span {lat_span}, lng span {lng_span})")]
    DegenerateBounds { lat_span: f64, lng_span: f64 },

    #[error("Pixel coordinates at zoom {found} cannot be used with a zoom {expected} mosaic")]
    ZoomMismatch { expected: u8, found: u8 },
}

impl Error {
    pub fn conversion(reason: impl Into<String>) -> Self {
        Self::ConversionUnavailable {
            reason: reason.into(),
        }
    }
}
